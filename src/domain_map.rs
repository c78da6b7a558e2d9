//! 语言与镜像域名映射模块
//!
//! 每种语言对应一个独立的镜像域名，所有域名共同组成同一个站点的“域名家族”。
//! 映射表在启动时构建一次，构建时校验双射性，之后只读。

// 标准库导入
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// 第三方crate导入
use serde::{Deserialize, Serialize};
use url::Url;

// 本地模块导入
use crate::api_constants::{language_info, site_config};
use crate::error::{PipelineError, Result};
use crate::pipeline_error;

/// 支持的语言代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangCode {
    En,
    Fr,
    Es,
    De,
    Sv,
}

impl LangCode {
    /// 全部语言，按固定顺序
    pub const ALL: [LangCode; 5] = [LangCode::En, LangCode::Fr, LangCode::Es, LangCode::De, LangCode::Sv];

    pub fn as_str(&self) -> &'static str {
        match self {
            LangCode::En => "en",
            LangCode::Fr => "fr",
            LangCode::Es => "es",
            LangCode::De => "de",
            LangCode::Sv => "sv",
        }
    }

    /// 语言的英文名称，用于构造翻译提示词
    pub fn display_name(&self) -> &'static str {
        language_info(self.as_str()).map(|(name, _)| name).unwrap_or("English")
    }

    /// 区域设置（如 fr_FR）
    pub fn locale(&self) -> &'static str {
        language_info(self.as_str()).map(|(_, locale)| locale).unwrap_or("en_US")
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LangCode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(LangCode::En),
            "fr" => Ok(LangCode::Fr),
            "es" => Ok(LangCode::Es),
            "de" => Ok(LangCode::De),
            "sv" => Ok(LangCode::Sv),
            other => Err(pipeline_error!(config, "lang", format!("UnknownLanguage: {}", other))),
        }
    }
}

/// 语言 → 域名的静态映射表
///
/// # Examples
///
/// ```rust
/// use recipe_translator::domain_map::{DomainMap, LangCode};
///
/// let map = DomainMap::new([(LangCode::En, "allmuffins.com"), (LangCode::Fr, "tousmuffins.com")]).unwrap();
/// assert_eq!(map.resolve(LangCode::Fr).unwrap(), "tousmuffins.com");
/// assert_eq!(map.language_for("tousmuffins.com"), Some(LangCode::Fr));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMap {
    domains: BTreeMap<LangCode, String>,
}

impl DomainMap {
    /// 从（语言, 域名）表构建映射，并校验没有两种语言共享同一个域名
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (LangCode, S)>,
        S: AsRef<str>,
    {
        let mut domains: BTreeMap<LangCode, String> = BTreeMap::new();

        for (lang, domain) in entries {
            let domain = normalize_domain(domain.as_ref());
            if !is_valid_host(&domain) {
                return Err(pipeline_error!(
                    config,
                    "domains",
                    format!("语言 {} 的域名无效: '{}'", lang, domain)
                ));
            }
            if domains.contains_key(&lang) {
                return Err(pipeline_error!(config, "domains", format!("语言 {} 重复配置", lang)));
            }
            if let Some((other, _)) = domains.iter().find(|(_, d)| **d == domain) {
                return Err(pipeline_error!(
                    config,
                    "domains",
                    format!("域名 {} 同时映射到 {} 和 {}", domain, other, lang)
                ));
            }
            domains.insert(lang, domain);
        }

        if domains.is_empty() {
            return Err(pipeline_error!(config, "domains", "域名映射表为空"));
        }

        Ok(Self { domains })
    }

    /// 使用内置的默认站点表构建
    pub fn with_defaults() -> Result<Self> {
        let entries = site_config::DEFAULT_DOMAINS
            .iter()
            .map(|(lang, domain)| -> Result<(LangCode, &str)> { Ok((lang.parse::<LangCode>()?, *domain)) })
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }

    /// 解析语言对应的域名，未配置的语言返回 UnknownLanguage 配置错误
    pub fn resolve(&self, lang: LangCode) -> Result<&str> {
        self.domains
            .get(&lang)
            .map(String::as_str)
            .ok_or_else(|| pipeline_error!(config, "lang", format!("UnknownLanguage: {} 未配置域名", lang)))
    }

    /// 按语言代码字符串解析域名
    pub fn resolve_code(&self, code: &str) -> Result<&str> {
        self.resolve(code.parse()?)
    }

    /// 与 `resolve` 相同的正向查找
    pub fn domain_for(&self, lang: LangCode) -> Result<&str> {
        self.resolve(lang)
    }

    /// 反向查找：域名属于哪种语言（忽略 www. 前缀和大小写）
    pub fn language_for(&self, domain: &str) -> Option<LangCode> {
        let domain = normalize_domain(domain);
        self.domains
            .iter()
            .find(|(_, d)| **d == domain)
            .map(|(lang, _)| *lang)
    }

    /// 已配置的语言
    pub fn languages(&self) -> impl Iterator<Item = LangCode> + '_ {
        self.domains.keys().copied()
    }

    /// 域名家族中的全部域名
    pub fn family(&self) -> impl Iterator<Item = &str> + '_ {
        self.domains.values().map(String::as_str)
    }

    pub fn contains(&self, lang: LangCode) -> bool {
        self.domains.contains_key(&lang)
    }
}

/// 域名必须能原样作为URL的主机名（不含端口、路径、空白等）
fn is_valid_host(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    Url::parse(&format!("https://{}/", domain))
        .map(|url| url.host_str() == Some(domain))
        .unwrap_or(false)
}

/// 规范化域名：去掉协议、首尾空白、末尾斜杠、www. 前缀，并转为小写
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let trimmed = without_scheme.trim_end_matches('/');
    trimmed.strip_prefix("www.").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_map_resolves_every_language() {
        let map = DomainMap::with_defaults().unwrap();
        assert_eq!(map.resolve(LangCode::Fr).unwrap(), "jelorec.com");
        assert_eq!(map.resolve(LangCode::Sv).unwrap(), "allamuffins.se");
        assert_eq!(map.resolve_code("es").unwrap(), "dietaypeso.com");
    }

    #[test]
    fn test_unknown_language_is_configuration_error() {
        let map = DomainMap::new([(LangCode::En, "allmuffins.com")]).unwrap();
        let err = map.resolve(LangCode::De).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("UnknownLanguage"));

        let err = map.resolve_code("xx").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_shared_domain_rejected() {
        let result = DomainMap::new([(LangCode::Fr, "muffins.com"), (LangCode::Es, "MUFFINS.com")]);
        assert!(matches!(result, Err(PipelineError::Configuration { .. })));
    }

    #[test]
    fn test_duplicate_language_rejected() {
        let result = DomainMap::new([(LangCode::Fr, "a.com"), (LangCode::Fr, "b.com")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_or_invalid_domain_rejected() {
        assert!(DomainMap::new(Vec::<(LangCode, &str)>::new()).is_err());
        assert!(DomainMap::new([(LangCode::Fr, "  ")]).is_err());
        assert!(DomainMap::new([(LangCode::Fr, "a.com/path")]).is_err());

        for bad in ["bad domain", "a_b:c", "a.com:8080", "user@a.com", "a.com?x", "[::1"] {
            let err = DomainMap::new([(LangCode::Fr, bad)]).unwrap_err();
            assert!(err.is_fatal(), "domain {:?}", bad);
        }
        assert!(DomainMap::new([(LangCode::Fr, "jelorec.com"), (LangCode::De, "allemuffins.de")]).is_ok());
    }

    #[test]
    fn test_domain_bijection() {
        let map = DomainMap::with_defaults().unwrap();
        let domains: HashSet<&str> = map.family().collect();
        assert_eq!(domains.len(), map.languages().count());

        for lang in map.languages() {
            let domain = map.domain_for(lang).unwrap();
            assert_eq!(map.language_for(domain), Some(lang));
        }
    }

    #[test]
    fn test_reverse_lookup_normalizes() {
        let map = DomainMap::with_defaults().unwrap();
        assert_eq!(map.language_for("https://www.Jelorec.com/"), Some(LangCode::Fr));
        assert_eq!(map.language_for("example.org"), None);
    }

    #[test]
    fn test_lang_code_parse_and_display() {
        for lang in LangCode::ALL {
            assert_eq!(lang.as_str().parse::<LangCode>().unwrap(), lang);
            assert_eq!(lang.to_string(), lang.as_str());
        }
        assert_eq!(" FR ".parse::<LangCode>().unwrap(), LangCode::Fr);
        assert_eq!(LangCode::De.display_name(), "German");
        assert_eq!(LangCode::Es.locale(), "es_ES");
    }
}
