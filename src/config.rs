//! 配置管理模块
//!
//! 提供CLI参数解析和运行配置管理功能。`AppConfig` 在启动时构建一次，
//! 之后以只读引用的方式传给各个组件。

// 标准库导入
use std::path::{Path, PathBuf};

// 第三方crate导入
use clap::{Parser, Subcommand};

// 本地模块导入
use crate::api_constants::{api_config, crawler_config, is_valid_api_url, site_config};
use crate::domain_map::{DomainMap, LangCode};
use crate::error::Result;
use crate::pipeline_error;

/// 运行配置（构建后不可变）
#[derive(Debug, Clone)]
pub struct AppConfig {
    source_lang: LangCode,
    domains: DomainMap,
    sitemap_url: String,
    api_key: Option<String>,
    api_url: String,
    model: String,
    output_dir: PathBuf,
    crawl_timeout: u64,
    request_timeout: u64,
}

impl AppConfig {
    /// 创建配置构建器
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_translator::config::AppConfig;
    ///
    /// let config = AppConfig::builder()
    ///     .with_api_key("sk-test")
    ///     .with_model("anthropic/claude-sonnet-4")
    ///     .with_output_dir("translations")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.source_domain(), "allmuffins.com");
    /// ```
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    pub fn source_lang(&self) -> LangCode {
        self.source_lang
    }

    pub fn domains(&self) -> &DomainMap {
        &self.domains
    }

    /// 源站域名
    pub fn source_domain(&self) -> &str {
        // build() 已确认源语言在映射表中
        self.domains.resolve(self.source_lang).unwrap_or_default()
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn crawl_timeout(&self) -> u64 {
        self.crawl_timeout
    }

    pub fn request_timeout(&self) -> u64 {
        self.request_timeout
    }

    /// 获取API密钥，未配置时返回配置错误
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            pipeline_error!(
                config,
                "api_key",
                format!("缺少API密钥，请设置环境变量 {} 或使用 --api-key", api_config::API_KEY_ENV)
            )
        })
    }

    /// 解析并校验目标语言列表
    ///
    /// 未知语言、源语言以及没有配置域名的语言都是配置错误；重复项只保留第一次出现。
    pub fn resolve_target_langs<S: AsRef<str>>(&self, codes: &[S]) -> Result<Vec<LangCode>> {
        let mut langs = Vec::new();

        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            let lang: LangCode = code.parse()?;
            self.check_target_lang(lang)?;
            if !langs.contains(&lang) {
                langs.push(lang);
            }
        }

        if langs.is_empty() {
            return Err(pipeline_error!(config, "langs", "至少需要一个目标语言"));
        }

        Ok(langs)
    }

    /// 目标语言必须有域名且不能是源语言
    pub fn check_target_lang(&self, lang: LangCode) -> Result<()> {
        if lang == self.source_lang {
            return Err(pipeline_error!(
                config,
                "langs",
                format!("目标语言不能是源语言 {}", lang)
            ));
        }
        self.domains.resolve(lang).map(|_| ())
    }
}

/// `AppConfig` 构建器
#[derive(Debug, Clone)]
pub struct AppConfigBuilder {
    source_lang: String,
    domains: Option<DomainMap>,
    sitemap_url: String,
    api_key: Option<String>,
    api_url: String,
    model: String,
    output_dir: PathBuf,
    crawl_timeout: u64,
    request_timeout: u64,
}

impl AppConfigBuilder {
    /// 创建具有默认值的构建器：
    /// - 源语言: en
    /// - 域名表: 内置默认表
    /// - 站点地图: allmuffins.com
    /// - 输出目录: output
    pub fn new() -> Self {
        Self {
            source_lang: site_config::SOURCE_LANG.to_string(),
            domains: None,
            sitemap_url: site_config::DEFAULT_SITEMAP_URL.to_string(),
            api_key: None,
            api_url: api_config::OPENROUTER_URL.to_string(),
            model: api_config::DEFAULT_MODEL.to_string(),
            output_dir: PathBuf::from("output"),
            crawl_timeout: crawler_config::DEFAULT_CRAWL_TIMEOUT,
            request_timeout: api_config::REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// 设置源语言代码
    pub fn with_source_lang(mut self, lang: &str) -> Self {
        self.source_lang = lang.to_string();
        self
    }

    /// 使用自定义域名映射表
    pub fn with_domains(mut self, domains: DomainMap) -> Self {
        self.domains = Some(domains);
        self
    }

    /// 设置站点地图地址
    pub fn with_sitemap_url(mut self, url: &str) -> Self {
        self.sitemap_url = url.trim().to_string();
        self
    }

    /// 设置API密钥
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// 可选的API密钥（来自CLI或环境变量）
    pub fn with_optional_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// 设置API地址
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim().to_string();
        self
    }

    /// 设置模型
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.trim().to_string();
        self
    }

    /// 设置输出目录
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 设置页面抓取超时（秒）
    pub fn with_crawl_timeout(mut self, seconds: u64) -> Self {
        self.crawl_timeout = seconds;
        self
    }

    /// 设置翻译请求超时（秒）
    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }

    /// 校验并生成配置
    pub fn build(self) -> Result<AppConfig> {
        let source_lang: LangCode = self.source_lang.parse()?;
        let domains = match self.domains {
            Some(domains) => domains,
            None => DomainMap::with_defaults()?,
        };

        if !domains.contains(source_lang) {
            return Err(pipeline_error!(
                config,
                "source_lang",
                format!("源语言 {} 没有配置域名", source_lang)
            ));
        }
        if !is_valid_api_url(&self.sitemap_url) {
            return Err(pipeline_error!(
                config,
                "sitemap",
                format!("站点地图地址必须以http://或https://开头: '{}'", self.sitemap_url)
            ));
        }
        if !is_valid_api_url(&self.api_url) {
            return Err(pipeline_error!(config, "api_url", format!("无效的API地址: '{}'", self.api_url)));
        }
        if self.model.is_empty() {
            return Err(pipeline_error!(config, "model", "模型名称不能为空"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(pipeline_error!(config, "output_dir", "输出目录不能为空"));
        }
        if self.crawl_timeout == 0 || self.request_timeout == 0 {
            return Err(pipeline_error!(config, "timeout", "超时时间必须大于0"));
        }

        Ok(AppConfig {
            source_lang,
            domains,
            sitemap_url: self.sitemap_url,
            api_key: self.api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            api_url: self.api_url,
            model: self.model,
            output_dir: self.output_dir,
            crawl_timeout: self.crawl_timeout,
            request_timeout: self.request_timeout,
        })
    }
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// CLI参数结构
#[derive(Parser, Debug)]
#[command(author, version, about = "食谱翻译CLI工具 - 抓取、翻译并改写站内链接", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 站点地图地址
    #[arg(long, global = true, default_value = site_config::DEFAULT_SITEMAP_URL)]
    pub sitemap: String,

    /// OpenRouter API密钥
    #[arg(long, global = true, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// 翻译模型
    #[arg(long, global = true, default_value = api_config::DEFAULT_MODEL)]
    pub model: String,

    /// 输出目录
    #[arg(long, global = true, value_name = "DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// 详细输出模式
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 静默模式 (仅输出错误)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// 子命令
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// 列出站点地图中的食谱URL
    List {
        /// 最多列出的数量
        #[arg(long)]
        limit: Option<usize>,
    },

    /// 翻译单个食谱
    Translate {
        /// 食谱页面URL
        url: String,

        /// 目标语言代码 (如: fr es de sv)
        #[arg(long, num_args = 1.., value_delimiter = ',', required = true)]
        langs: Vec<String>,

        /// 保存结果到输出目录
        #[arg(long)]
        save: bool,
    },

    /// 批量翻译站点地图中的食谱
    Batch {
        /// 处理的食谱数量
        #[arg(long, default_value = "5")]
        count: usize,

        /// 目标语言代码
        #[arg(long, num_args = 1.., value_delimiter = ',', default_values = site_config::DEFAULT_TARGET_LANGS)]
        langs: Vec<String>,
    },
}

impl Cli {
    /// 由命令行参数构建运行配置
    pub fn to_config(&self) -> Result<AppConfig> {
        AppConfig::builder()
            .with_sitemap_url(&self.sitemap)
            .with_optional_api_key(self.api_key.clone())
            .with_model(&self.model)
            .with_output_dir(&self.output_dir)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds() {
        let config = AppConfig::builder().build().unwrap();
        assert_eq!(config.source_lang(), LangCode::En);
        assert_eq!(config.source_domain(), "allmuffins.com");
        assert_eq!(config.sitemap_url(), site_config::DEFAULT_SITEMAP_URL);
        assert_eq!(config.model(), api_config::DEFAULT_MODEL);
        assert_eq!(config.output_dir(), Path::new("output"));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = AppConfig::builder().with_api_key("   ").build().unwrap();
        let err = config.require_api_key().unwrap_err();
        assert!(err.is_fatal());

        let config = AppConfig::builder().with_api_key("sk-test").build().unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(AppConfig::builder().with_sitemap_url("allmuffins.com/sitemap.xml").build().is_err());
        assert!(AppConfig::builder().with_api_url("localhost").build().is_err());
        assert!(AppConfig::builder().with_model(" ").build().is_err());
        assert!(AppConfig::builder().with_source_lang("xx").build().is_err());
        assert!(AppConfig::builder().with_crawl_timeout(0).build().is_err());

        let domains = DomainMap::new([(LangCode::Fr, "tousmuffins.com")]).unwrap();
        assert!(AppConfig::builder().with_domains(domains).build().is_err());
    }

    #[test]
    fn test_resolve_target_langs() {
        let config = AppConfig::builder().build().unwrap();

        assert_eq!(
            config.resolve_target_langs(&["fr", "ES", "fr"]).unwrap(),
            vec![LangCode::Fr, LangCode::Es]
        );

        let err = config.resolve_target_langs(&["en"]).unwrap_err();
        assert!(err.is_fatal());
        assert!(config.resolve_target_langs(&["xx"]).unwrap_err().is_fatal());
        assert!(config.resolve_target_langs::<&str>(&[]).is_err());
    }

    #[test]
    fn test_target_lang_without_domain_rejected() {
        let domains = DomainMap::new([(LangCode::En, "allmuffins.com"), (LangCode::Fr, "tousmuffins.com")]).unwrap();
        let config = AppConfig::builder().with_domains(domains).build().unwrap();
        assert!(config.check_target_lang(LangCode::Fr).is_ok());
        assert!(config.check_target_lang(LangCode::De).is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "recipe-translator",
            "translate",
            "https://allmuffins.com/chocolate-muffins/",
            "--langs",
            "fr",
            "es",
            "--save",
            "--api-key",
            "sk-test",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Translate {
                url: "https://allmuffins.com/chocolate-muffins/".to_string(),
                langs: vec!["fr".to_string(), "es".to_string()],
                save: true,
            }
        );
        let config = cli.to_config().unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_cli_batch_defaults_and_delimiter() {
        let cli = Cli::try_parse_from(["recipe-translator", "batch"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Batch {
                count: 5,
                langs: vec!["fr".to_string(), "es".to_string()],
            }
        );

        let cli = Cli::try_parse_from(["recipe-translator", "batch", "--count", "3", "--langs", "de,sv"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Batch {
                count: 3,
                langs: vec!["de".to_string(), "sv".to_string()],
            }
        );
    }

    #[test]
    fn test_cli_translate_requires_langs() {
        assert!(Cli::try_parse_from(["recipe-translator", "translate", "https://allmuffins.com/a/"]).is_err());
    }
}
