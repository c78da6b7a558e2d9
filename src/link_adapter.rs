//! 站内链接改写模块
//!
//! 扫描译文中的每个 `href` 属性：指向源站域名的链接改写为目标域名，
//! 并在 slug 映射表中找得到时替换末尾的 slug。其他链接（外部站点、CDN、
//! 相对路径、无法解析的地址）保持逐字节不变。

// 标准库导入
use std::collections::{BTreeSet, HashMap};

// 第三方crate导入
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

// 本地模块导入
use crate::domain_map::normalize_domain;
use crate::error::{PipelineError, Result};

/// 匹配 href 属性值：双引号、单引号或不带引号三种写法
const HREF_PATTERN: &str = r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#;

/// 一次改写的明细
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptOutcome {
    /// 改写后的内容
    pub content: String,
    /// 被改写域名的链接数
    pub rewritten: usize,
    /// 同时替换了 slug 的链接数
    pub slugs_translated: usize,
    /// 映射表中没有的源 slug（通常是尚未翻译的食谱）
    pub unresolved_slugs: BTreeSet<String>,
}

/// 链接统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub total_links: usize,
    pub internal_links: Vec<String>,
    pub external_links: Vec<String>,
}

/// 站内链接改写器
#[derive(Debug, Clone)]
pub struct LinkAdapter {
    href_regex: Regex,
}

impl LinkAdapter {
    /// 创建改写器（编译 href 正则）
    pub fn new() -> Result<Self> {
        let href_regex = Regex::new(HREF_PATTERN).map_err(|e| PipelineError::Adaptation {
            details: format!("编译href正则表达式失败: {}", e),
        })?;
        Ok(Self { href_regex })
    }

    /// 改写内容中的站内链接
    ///
    /// `slug_map` 为源 slug → 目标 slug。对已经改写过的内容再次调用不会产生变化。
    pub fn adapt(
        &self,
        content: &str,
        source_domain: &str,
        target_domain: &str,
        slug_map: &HashMap<String, String>,
    ) -> String {
        self.adapt_detailed(content, source_domain, target_domain, slug_map)
            .content
    }

    /// 与 [`LinkAdapter::adapt`] 相同，但同时返回改写统计
    pub fn adapt_detailed(
        &self,
        content: &str,
        source_domain: &str,
        target_domain: &str,
        slug_map: &HashMap<String, String>,
    ) -> AdaptOutcome {
        let source = normalize_domain(source_domain);
        let target = normalize_domain(target_domain);
        let mut outcome = AdaptOutcome::default();

        let adapted = self.href_regex.replace_all(content, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let Some(value) = href_value(caps) else {
                return whole.to_string();
            };

            match rewrite_url(value.as_str(), &source, &target, slug_map) {
                Some(rewrite) => {
                    outcome.rewritten += 1;
                    match rewrite.slug {
                        SlugChange::Translated => outcome.slugs_translated += 1,
                        SlugChange::Unresolved(slug) => {
                            outcome.unresolved_slugs.insert(slug);
                        }
                        SlugChange::NoSlug => {}
                    }

                    // 只替换属性值本身，属性名、引号和空白保持原样
                    let offset = caps.get(0).map(|m| m.start()).unwrap_or_default();
                    let start = value.start() - offset;
                    let end = value.end() - offset;
                    format!("{}{}{}", &whole[..start], rewrite.url, &whole[end..])
                }
                None => whole.to_string(),
            }
        });

        debug!(
            "🔗 链接改写 {} -> {}: 改写 {} 个, slug翻译 {} 个, 未解析 {} 个",
            source,
            target,
            outcome.rewritten,
            outcome.slugs_translated,
            outcome.unresolved_slugs.len()
        );

        outcome.content = adapted.into_owned();
        outcome
    }

    /// 提取内容中指向源站的所有链接（绝对地址，去重）
    ///
    /// 提供 `base` 时相对链接会先解析为绝对地址。
    pub fn extract_internal_links(&self, content: &str, source_domain: &str, base: Option<&Url>) -> BTreeSet<String> {
        let source = normalize_domain(source_domain);

        self.href_values(content)
            .filter_map(|value| resolve_link(value, base))
            .filter(|url| url.host_str().map(normalize_domain).as_deref() == Some(source.as_str()))
            .map(|url| url.to_string())
            .collect()
    }

    /// 统计内容中的链接：属于域名家族的算站内，其余为外部
    pub fn validate_links<'a, I>(&self, content: &str, family: I) -> LinkReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let family: Vec<String> = family.into_iter().map(normalize_domain).collect();
        let mut report = LinkReport::default();

        for value in self.href_values(content) {
            let Ok(url) = Url::parse(value.trim()) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }

            report.total_links += 1;
            let host = url.host_str().map(normalize_domain).unwrap_or_default();
            if family.iter().any(|d| *d == host) {
                report.internal_links.push(value.to_string());
            } else {
                report.external_links.push(value.to_string());
            }
        }

        report
    }

    fn href_values<'c>(&'c self, content: &'c str) -> impl Iterator<Item = &'c str> + 'c {
        self.href_regex
            .captures_iter(content)
            .filter_map(|caps| href_value(&caps).map(|m| m.as_str()))
    }
}

enum SlugChange {
    Translated,
    Unresolved(String),
    NoSlug,
}

struct Rewrite {
    url: String,
    slug: SlugChange,
}

fn href_value<'h>(caps: &Captures<'h>) -> Option<regex::Match<'h>> {
    caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))
}

/// 改写单个链接；不属于源站的链接返回 None
///
/// 只替换主机名和最后一个路径段所在的字节区间，协议、端口、查询串、锚点和其余字节原样保留。
fn rewrite_url(raw: &str, source: &str, target: &str, slug_map: &HashMap<String, String>) -> Option<Rewrite> {
    // 协议相对地址（//domain/path）按 https 校验
    let authority_start = if raw.starts_with("//") {
        2
    } else if starts_with_ignore_case(raw, "http://") {
        7
    } else if starts_with_ignore_case(raw, "https://") {
        8
    } else {
        return None;
    };

    let parsable = if authority_start == 2 {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    };
    Url::parse(&parsable).ok()?;

    let rest = &raw[authority_start..];
    let authority_len = rest.find(['/', '\\', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];
    let host_start = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host_end = authority[host_start..]
        .find(':')
        .map(|i| host_start + i)
        .unwrap_or(authority.len());

    if normalize_domain(&authority[host_start..host_end]) != source {
        return None;
    }

    let host_range = (authority_start + host_start, authority_start + host_end);
    let path_start = authority_start + authority_len;
    let after_host = &raw[path_start..];
    let path = &after_host[..after_host.find(['?', '#']).unwrap_or(after_host.len())];

    let mut url = String::with_capacity(raw.len() + target.len());
    url.push_str(&raw[..host_range.0]);
    url.push_str(target);

    let slug = match terminal_segment(path) {
        Some((start, end)) => {
            let (start, end) = (path_start + start, path_start + end);
            let segment = &raw[start..end];
            match slug_map.get(segment) {
                Some(translated) => {
                    url.push_str(&raw[host_range.1..start]);
                    url.push_str(translated);
                    url.push_str(&raw[end..]);
                    SlugChange::Translated
                }
                None => {
                    url.push_str(&raw[host_range.1..]);
                    SlugChange::Unresolved(segment.to_string())
                }
            }
        }
        None => {
            url.push_str(&raw[host_range.1..]);
            SlugChange::NoSlug
        }
    };

    Some(Rewrite { url, slug })
}

/// 路径中最后一个非空段的字节区间
fn terminal_segment(path: &str) -> Option<(usize, usize)> {
    let end = path.trim_end_matches('/').len();
    let start = path[..end].rfind('/').map(|i| i + 1).unwrap_or(0);
    (start < end).then_some((start, end))
}

fn resolve_link(value: &str, base: Option<&Url>) -> Option<Url> {
    let value = value.trim();
    let url = match base {
        Some(base) => base.join(value).ok()?,
        None => Url::parse(value).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "allmuffins.com";
    const TARGET: &str = "tousmuffins.com";

    fn adapter() -> LinkAdapter {
        LinkAdapter::new().unwrap()
    }

    fn french_map() -> HashMap<String, String> {
        HashMap::from([("chocolate-muffins".to_string(), "muffins-au-chocolat".to_string())])
    }

    #[test]
    fn test_domain_and_slug_rewritten() {
        let content = r#"<p>Try our <a href="https://allmuffins.com/chocolate-muffins">chocolate muffins</a>.</p>"#;
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert_eq!(
            adapted,
            r#"<p>Try our <a href="https://tousmuffins.com/muffins-au-chocolat">chocolate muffins</a>.</p>"#
        );
    }

    #[test]
    fn test_unknown_slug_keeps_path_but_rewrites_domain() {
        let content = r#"<a href="https://allmuffins.com/chocolate-muffins">x</a>"#;
        let adapted = adapter().adapt(content, SOURCE, TARGET, &HashMap::new());
        assert!(adapted.contains(r#"href="https://tousmuffins.com/chocolate-muffins""#));
    }

    #[test]
    fn test_external_links_untouched() {
        let content = concat!(
            r#"<a href="https://www.pinterest.com/allmuffins/chocolate-muffins">pin</a>"#,
            r#"<a href='https://cdn.example.net/chocolate-muffins'>cdn</a>"#,
            r#"<a href="https://allmuffins.com.evil.io/chocolate-muffins">lookalike</a>"#,
        );
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert_eq!(adapted, content);
    }

    #[test]
    fn test_image_sources_and_text_untouched() {
        let content = concat!(
            r#"<img src="https://allmuffins.com/wp-content/uploads/chocolate-muffins.jpg" alt="https://allmuffins.com/chocolate-muffins">"#,
            "<p>Visit https://allmuffins.com/chocolate-muffins today</p>",
        );
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert_eq!(adapted, content);
    }

    #[test]
    fn test_idempotent() {
        let content = concat!(
            r#"<a href="https://allmuffins.com/chocolate-muffins/">a</a> "#,
            r#"<a href='http://www.allmuffins.com/banana-bread?utm=x#steps'>b</a> "#,
            r#"<a href="https://example.org/">c</a>"#,
        );
        let adapter = adapter();
        let map = french_map();
        let once = adapter.adapt(content, SOURCE, TARGET, &map);
        let twice = adapter.adapt(&once, SOURCE, TARGET, &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_query_fragment_trailing_slash_and_quotes_preserved() {
        let content = concat!(
            r#"<a href='http://www.allmuffins.com/chocolate-muffins/?utm=x#steps'>a</a>"#,
            r#"<a HREF = "https://allmuffins.com/recipes/chocolate-muffins">b</a>"#,
        );
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert!(adapted.contains(r#"href='http://tousmuffins.com/muffins-au-chocolat/?utm=x#steps'"#));
        assert!(adapted.contains(r#"HREF = "https://tousmuffins.com/recipes/muffins-au-chocolat""#));
    }

    #[test]
    fn test_protocol_relative_and_unquoted() {
        let content = r#"<a href="//allmuffins.com/chocolate-muffins">a</a><a href=https://allmuffins.com/chocolate-muffins>b</a>"#;
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert!(adapted.contains(r#"href="//tousmuffins.com/muffins-au-chocolat""#));
        assert!(adapted.contains("href=https://tousmuffins.com/muffins-au-chocolat>"));
    }

    #[test]
    fn test_relative_and_malformed_links_unchanged() {
        let content = r##"<a href="/chocolate-muffins">rel</a><a href="mailto:hi@allmuffins.com">mail</a><a href="https://">bad</a><a href="#top">top</a>"##;
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());
        assert_eq!(adapted, content);
    }

    #[test]
    fn test_only_host_and_slug_bytes_change() {
        let content = concat!(
            r#"<a href="https://allmuffins.com">home</a>"#,
            r#"<a href="HTTPS://AllMuffins.com/chocolate-muffins">upper</a>"#,
            r#"<a href="https://allmuffins.com:8443/chocolate-muffins?q=a b">port</a>"#,
            r#"<a href="https://allmuffins.com/my recipes/lemon%20muffins">spaces</a>"#,
        );
        let adapted = adapter().adapt(content, SOURCE, TARGET, &french_map());

        assert!(adapted.contains(r#"<a href="https://tousmuffins.com">home</a>"#));
        assert!(adapted.contains(r#"<a href="HTTPS://tousmuffins.com/muffins-au-chocolat">upper</a>"#));
        assert!(adapted.contains(r#"<a href="https://tousmuffins.com:8443/muffins-au-chocolat?q=a b">port</a>"#));
        assert!(adapted.contains(r#"<a href="https://tousmuffins.com/my recipes/lemon%20muffins">spaces</a>"#));
    }

    #[test]
    fn test_terminal_segment() {
        assert_eq!(terminal_segment("/recipes/chocolate-muffins/"), Some((9, 26)));
        assert_eq!(terminal_segment("/a"), Some((1, 2)));
        assert_eq!(terminal_segment("/"), None);
        assert_eq!(terminal_segment(""), None);
    }

    #[test]
    fn test_content_without_links_returned_unchanged() {
        let content = "<p>no links <b>here</b> <<< broken markup";
        assert_eq!(adapter().adapt(content, SOURCE, TARGET, &french_map()), content);
    }

    #[test]
    fn test_adapt_detailed_counts() {
        let content = concat!(
            r#"<a href="https://allmuffins.com/chocolate-muffins">a</a>"#,
            r#"<a href="https://allmuffins.com/lemon-muffins">b</a>"#,
            r#"<a href="https://allmuffins.com/">home</a>"#,
        );
        let outcome = adapter().adapt_detailed(content, SOURCE, TARGET, &french_map());
        assert_eq!(outcome.rewritten, 3);
        assert_eq!(outcome.slugs_translated, 1);
        assert_eq!(
            outcome.unresolved_slugs.into_iter().collect::<Vec<_>>(),
            vec!["lemon-muffins".to_string()]
        );
        assert!(outcome.content.contains(r#"href="https://tousmuffins.com/""#));
    }

    #[test]
    fn test_extract_internal_links() {
        let content = concat!(
            r#"<a href="https://allmuffins.com/a">a</a>"#,
            r#"<a href="/b">b</a>"#,
            r#"<a href="https://allmuffins.com/a">dup</a>"#,
            r#"<a href="https://other.com/c">c</a>"#,
        );
        let base = Url::parse("https://allmuffins.com/recipe/").unwrap();
        let links = adapter().extract_internal_links(content, SOURCE, Some(&base));
        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec!["https://allmuffins.com/a".to_string(), "https://allmuffins.com/b".to_string()]
        );

        let links = adapter().extract_internal_links(content, SOURCE, None);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_validate_links() {
        let content = concat!(
            r#"<a href="https://tousmuffins.com/a">a</a>"#,
            r#"<a href="https://allmuffins.com/b">b</a>"#,
            r#"<a href="https://pinterest.com/c">c</a>"#,
            r#"<a href="/relative">d</a>"#,
        );
        let report = adapter().validate_links(content, ["allmuffins.com", "tousmuffins.com"]);
        assert_eq!(report.total_links, 3);
        assert_eq!(report.internal_links.len(), 2);
        assert_eq!(report.external_links, vec!["https://pinterest.com/c".to_string()]);
    }
}
