/// 翻译服务与站点相关常量
///
/// 该文件定义了所有翻译服务、站点地图和抓取相关的常量配置，方便统一管理和维护

/// 翻译API配置（OpenRouter，OpenAI兼容接口）
pub mod api_config {
    /// OpenRouter聊天补全接口地址
    pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

    /// 默认模型
    pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

    /// API密钥环境变量名
    pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

    /// 单次请求最大输出token数（HTML内容较长）
    pub const MAX_TOKENS: u32 = 8000;

    /// 采样温度，较低以保证译文稳定
    pub const TEMPERATURE: f32 = 0.2;

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 180;

    /// 最大重试次数
    pub const MAX_RETRIES: usize = 3;

    /// 重试延迟基数（毫秒）
    pub const RETRY_DELAY_BASE_MS: u64 = 800;

    /// 单次重试等待上限（毫秒）
    pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

    /// 两次请求之间的最小间隔（毫秒）
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 500;

    /// 请求来源标识
    pub const HTTP_REFERER: &str = "https://allmuffins.com";

    /// 请求标题标识
    pub const X_TITLE: &str = "AllMuffins Recipe Translator";
}

/// 站点与语言配置
pub mod site_config {
    /// 源站语言
    pub const SOURCE_LANG: &str = "en";

    /// 默认站点地图地址
    pub const DEFAULT_SITEMAP_URL: &str = "https://allmuffins.com/sitemap_index.xml";

    /// 语言代码到镜像域名的默认映射
    pub const DEFAULT_DOMAINS: &[(&str, &str)] = &[
        ("en", "allmuffins.com"),
        ("fr", "jelorec.com"),
        ("es", "dietaypeso.com"),
        ("de", "allemuffins.de"),
        ("sv", "allamuffins.se"),
    ];

    /// 默认目标语言
    pub const DEFAULT_TARGET_LANGS: &[&str] = &["fr", "es"];
}

/// 网页抓取配置
pub mod crawler_config {
    /// 默认抓取超时时间（秒）
    pub const DEFAULT_CRAWL_TIMEOUT: u64 = 15;

    /// 站点地图请求超时时间（秒）
    pub const SITEMAP_TIMEOUT: u64 = 10;

    /// 默认User-Agent
    pub const DEFAULT_USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (compatible; RecipeTranslator/0.1)";

    /// 最大重试次数
    pub const MAX_CRAWL_RETRIES: u32 = 3;

    /// 重试延迟基数（毫秒）
    pub const RETRY_DELAY_BASE_MS: u64 = 1000;

    /// 最大页面大小（字节）
    pub const MAX_PAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;
}

/// 站点地图过滤配置
pub mod sitemap_config {
    /// 非食谱页面的URL特征
    pub const EXCLUDE_PATTERNS: &[&str] = &[
        "/category/",
        "/tag/",
        "/page/",
        "/author/",
        "/about",
        "/contact",
        "/privacy",
        "/sitemap",
    ];
}

/// 实用工具函数
/// 验证API URL是否有效
pub fn is_valid_api_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 查询语言的显示名称和区域设置
pub fn language_info(lang: &str) -> Option<(&'static str, &'static str)> {
    match lang {
        "en" => Some(("English", "en_US")),
        "fr" => Some(("French", "fr_FR")),
        "es" => Some(("Spanish", "es_ES")),
        "de" => Some(("German", "de_DE")),
        "sv" => Some(("Swedish", "sv_SE")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_validation() {
        assert!(is_valid_api_url(api_config::OPENROUTER_URL));
        assert!(is_valid_api_url("http://localhost:8080"));
        assert!(!is_valid_api_url("ftp://example.com"));
        assert!(!is_valid_api_url("invalid-url"));
    }

    #[test]
    fn test_every_default_domain_has_language_info() {
        for (lang, _) in site_config::DEFAULT_DOMAINS {
            assert!(language_info(lang).is_some(), "missing info for {}", lang);
        }
        assert!(language_info("xx").is_none());
    }
}
