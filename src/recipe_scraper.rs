//! 食谱抓取模块
//!
//! `Scraper` 是流水线使用的抓取接口：给定URL返回 `RecipeRecord`，
//! 失败时返回 `Fetch`（网络/超时）或 `Parse`（页面结构不符合预期）错误。
//! 两种错误都只影响当前食谱。

// 第三方crate导入
use async_trait::async_trait;
use tracing::{debug, info};

// 本地模块导入
use crate::error::Result;
use crate::html_processor::extract_page;
use crate::link_adapter::LinkAdapter;
use crate::model::RecipeRecord;
use crate::utils::validate_source_url;
use crate::web_crawler::WebCrawler;

/// 食谱抓取接口
#[async_trait]
pub trait Scraper: Send + Sync {
    /// 抓取并解析一个食谱页面
    async fn scrape(&self, url: &str) -> Result<RecipeRecord>;
}

/// 基于HTTP下载和DOM解析的抓取器
pub struct RecipeScraper {
    crawler: WebCrawler,
    link_adapter: LinkAdapter,
    source_domain: String,
}

impl RecipeScraper {
    /// `source_domain` 用于识别正文中的站内链接
    pub fn new(crawler: WebCrawler, source_domain: &str) -> Result<Self> {
        Ok(Self {
            crawler,
            link_adapter: LinkAdapter::new()?,
            source_domain: source_domain.to_string(),
        })
    }

    /// 从已下载的HTML构建食谱记录（不访问网络）
    pub fn parse_page(&self, url: &str, html: &str) -> Result<RecipeRecord> {
        let page_url = validate_source_url(url)?;
        let page = extract_page(html, &page_url)?;

        let internal_links = self
            .link_adapter
            .extract_internal_links(&page.content, &self.source_domain, Some(&page_url));

        Ok(RecipeRecord {
            url: page_url.to_string(),
            title: page.title,
            content: page.content,
            meta_description: page.meta_description,
            featured_image: page.featured_image,
            images: page.images,
            internal_links,
            recipe_schema: page.recipe_schema,
            word_count: page.word_count,
        })
    }
}

#[async_trait]
impl Scraper for RecipeScraper {
    async fn scrape(&self, url: &str) -> Result<RecipeRecord> {
        info!("🕷️ 抓取食谱: {}", url);
        let html = self.crawler.fetch(url).await?;
        let record = self.parse_page(url, &html)?;

        debug!(
            "📋 {}: {} 词, {} 张图片, {} 个站内链接, schema={}",
            record.title,
            record.word_count,
            record.images.len(),
            record.internal_links.len(),
            record.recipe_schema.is_some()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PAGE: &str = r#"<html><head><title>Banana Bread | AllMuffins</title></head>
<body><h1>Banana Bread</h1>
<div class="entry-content">
  <p>Pairs well with <a href="https://allmuffins.com/chocolate-muffins">chocolate muffins</a>
  and <a href="/lemon-muffins/">lemon muffins</a>.</p>
  <p>Pin it on <a href="https://www.pinterest.com/allmuffins/">Pinterest</a>.</p>
</div></body></html>"#;

    fn scraper() -> RecipeScraper {
        RecipeScraper::new(WebCrawler::with_defaults().unwrap(), "allmuffins.com").unwrap()
    }

    #[test]
    fn test_parse_page_builds_record() {
        let record = scraper().parse_page("https://allmuffins.com/banana-bread/", PAGE).unwrap();

        assert_eq!(record.url, "https://allmuffins.com/banana-bread/");
        assert_eq!(record.title, "Banana Bread");
        assert!(record.content.contains("chocolate muffins"));
        assert_eq!(
            record.internal_links.into_iter().collect::<Vec<_>>(),
            vec![
                "https://allmuffins.com/chocolate-muffins".to_string(),
                "https://allmuffins.com/lemon-muffins/".to_string(),
            ]
        );
    }

    #[test]
    fn test_relative_links_are_adapted_after_scraping() {
        let record = scraper().parse_page("https://allmuffins.com/banana-bread/", PAGE).unwrap();
        assert!(record.content.contains(r#"href="https://allmuffins.com/lemon-muffins/""#));

        let slug_map = HashMap::from([("lemon-muffins".to_string(), "muffins-au-citron".to_string())]);
        let adapted = LinkAdapter::new()
            .unwrap()
            .adapt(&record.content, "allmuffins.com", "jelorec.com", &slug_map);

        assert!(adapted.contains(r#"<a href="https://jelorec.com/muffins-au-citron/">lemon muffins</a>"#));
        assert!(adapted.contains(r#"href="https://jelorec.com/chocolate-muffins""#));
        assert!(adapted.contains(r#"href="https://www.pinterest.com/allmuffins/""#));
    }

    #[test]
    fn test_parse_page_rejects_invalid_url() {
        let err = scraper().parse_page("allmuffins.com/banana-bread", PAGE).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_scrape_invalid_url_fails_without_network() {
        let err = scraper().scrape("ftp://allmuffins.com/banana-bread").await.unwrap_err();
        assert!(!err.is_fatal());
    }
}
