//! 站点地图解析模块
//!
//! 食谱URL的发现来源。支持站点地图索引（逐个读取子地图直到满足数量上限）
//! 和普通的 `<urlset>` 地图，并过滤掉分类、标签、作者等非食谱页面。

// 标准库导入
use std::collections::HashSet;

// 第三方crate导入
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

// 本地模块导入
use crate::api_constants::sitemap_config::EXCLUDE_PATTERNS;
use crate::error::{PipelineError, Result};
use crate::pipeline_error;
use crate::web_crawler::WebCrawler;

/// 站点地图中的一个食谱条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<String>,
}

/// URL发现接口：返回有序、有限、可重复调用的条目序列
#[async_trait]
pub trait UrlSource: Send + Sync {
    async fn discover(&self, limit: Option<usize>) -> Result<Vec<SitemapEntry>>;
}

#[derive(Debug, Deserialize)]
struct SitemapIndexXml {
    #[serde(default)]
    sitemap: Vec<SitemapLocXml>,
}

#[derive(Debug, Deserialize)]
struct SitemapLocXml {
    loc: String,
}

#[derive(Debug, Deserialize)]
struct UrlsetXml {
    #[serde(default)]
    url: Vec<UrlEntryXml>,
}

#[derive(Debug, Deserialize)]
struct UrlEntryXml {
    loc: String,
    lastmod: Option<String>,
}

/// 解析后的站点地图文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// 站点地图索引：子地图地址列表
    Index(Vec<String>),
    /// 普通站点地图：URL条目
    UrlSet(Vec<SitemapEntry>),
}

/// 解析站点地图XML（根元素为 `<sitemapindex>` 或 `<urlset>`）
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument> {
    if xml.contains("<sitemapindex") {
        let index = from_str::<SitemapIndexXml>(xml)
            .map_err(|e| pipeline_error!(parse, "sitemap", format!("站点地图索引解析失败: {}", e)))?;
        let locs = index
            .sitemap
            .into_iter()
            .map(|s| s.loc.trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect();
        return Ok(SitemapDocument::Index(locs));
    }

    if !xml.contains("<urlset") {
        return Err(pipeline_error!(parse, "sitemap", "文档不是站点地图（缺少 <urlset> 或 <sitemapindex>）"));
    }

    let urlset = from_str::<UrlsetXml>(xml)
        .map_err(|e| pipeline_error!(parse, "sitemap", format!("站点地图XML解析失败: {}", e)))?;

    let entries = urlset
        .url
        .into_iter()
        .map(|u| SitemapEntry {
            url: u.loc.trim().to_string(),
            lastmod: u.lastmod.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        })
        .filter(|e| !e.url.is_empty())
        .collect();

    Ok(SitemapDocument::UrlSet(entries))
}

/// 判断URL是否为食谱页面：排除首页和非食谱路径
pub fn is_recipe_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let path = parsed.path().to_lowercase();
    if path.trim_matches('/').is_empty() {
        return false;
    }

    !EXCLUDE_PATTERNS.iter().any(|pattern| path.contains(pattern))
}

/// 过滤食谱URL，保持顺序并去重
pub fn filter_recipe_urls(entries: Vec<SitemapEntry>) -> Vec<SitemapEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| is_recipe_url(&e.url))
        .filter(|e| seen.insert(e.url.clone()))
        .collect()
}

/// 通过HTTP读取站点地图的URL来源
pub struct SitemapSource {
    sitemap_url: String,
    crawler: WebCrawler,
}

impl SitemapSource {
    pub fn new(sitemap_url: &str, crawler: WebCrawler) -> Self {
        Self {
            sitemap_url: sitemap_url.to_string(),
            crawler,
        }
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument> {
        let xml = self.crawler.fetch(url).await?;
        parse_sitemap(&xml).map_err(|e| match e {
            PipelineError::Parse { details, .. } => pipeline_error!(parse, url, details),
            other => other,
        })
    }
}

#[async_trait]
impl UrlSource for SitemapSource {
    async fn discover(&self, limit: Option<usize>) -> Result<Vec<SitemapEntry>> {
        info!("🗺️ 读取站点地图: {}", self.sitemap_url);
        let reached = |entries: &Vec<SitemapEntry>| limit.map(|l| entries.len() >= l).unwrap_or(false);

        let mut recipes = match self.fetch_document(&self.sitemap_url).await? {
            SitemapDocument::UrlSet(entries) => filter_recipe_urls(entries),
            SitemapDocument::Index(sub_sitemaps) => {
                info!("📑 发现 {} 个子站点地图", sub_sitemaps.len());
                let mut collected: Vec<SitemapEntry> = Vec::new();

                for sub_url in sub_sitemaps {
                    match self.fetch_document(&sub_url).await {
                        Ok(SitemapDocument::UrlSet(entries)) => {
                            let before = collected.len();
                            collected.extend(entries);
                            collected = filter_recipe_urls(collected);
                            debug!("  - {}: {} 个食谱", sub_url, collected.len() - before);
                        }
                        Ok(SitemapDocument::Index(_)) => {
                            warn!("⚠️ 跳过嵌套的站点地图索引: {}", sub_url);
                        }
                        Err(e) => {
                            warn!("⚠️ 子站点地图读取失败，已跳过: {}", e);
                        }
                    }

                    if reached(&collected) {
                        break;
                    }
                }
                collected
            }
        };

        if let Some(limit) = limit {
            recipes.truncate(limit);
        }

        info!("✅ 共发现 {} 个食谱URL", recipes.len());
        Ok(recipes)
    }
}
