//! Web抓取模块 - 基于reqwest的页面下载
//!
//! 此模块负责：
//! - 下载食谱页面和站点地图的原始内容
//! - 对网络错误、超时和5xx响应按线性退避重试
//! - 限制页面大小，拒绝非成功状态码

// 标准库导入
use std::time::Duration;

// 第三方crate导入
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

// 本地模块导入
use crate::api_constants::crawler_config;
use crate::error::{PipelineError, Result};
use crate::pipeline_error;
use crate::utils::validate_source_url;

/// Web抓取配置结构体
#[derive(Debug, Clone)]
pub struct WebCrawlerConfig {
    /// 用户代理字符串
    pub user_agent: String,
    /// 请求超时时间（秒）
    pub timeout: u64,
    /// 最大尝试次数（含第一次）
    pub max_retries: u32,
    /// 重试延迟基数（毫秒），第 n 次失败后等待 n * base
    pub retry_delay_base_ms: u64,
    /// 最大页面大小（字节）
    pub max_page_size: usize,
}

impl Default for WebCrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: crawler_config::DEFAULT_USER_AGENT.to_string(),
            timeout: crawler_config::DEFAULT_CRAWL_TIMEOUT,
            max_retries: crawler_config::MAX_CRAWL_RETRIES,
            retry_delay_base_ms: crawler_config::RETRY_DELAY_BASE_MS,
            max_page_size: crawler_config::MAX_PAGE_SIZE_BYTES,
        }
    }
}

impl WebCrawlerConfig {
    /// 设置用户代理
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// 设置请求超时
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// 设置重试策略
    pub fn retries(mut self, max_retries: u32, delay_base_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay_base_ms = delay_base_ms;
        self
    }

    /// 设置最大页面大小
    pub fn max_page_size(mut self, bytes: usize) -> Self {
        self.max_page_size = bytes;
        self
    }
}

/// 页面下载器
///
/// 内部持有一个复用的 `reqwest::Client`，可同时用于食谱页面和站点地图。
#[derive(Debug, Clone)]
pub struct WebCrawler {
    config: WebCrawlerConfig,
    client: Client,
}

impl WebCrawler {
    /// 创建下载器
    pub fn new(config: WebCrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| pipeline_error!(config, "http_client", format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 使用默认配置创建下载器
    pub fn with_defaults() -> Result<Self> {
        Self::new(WebCrawlerConfig::default())
    }

    pub fn config(&self) -> &WebCrawlerConfig {
        &self.config
    }

    /// 下载页面内容（带重试）
    pub async fn fetch(&self, url: &str) -> Result<String> {
        validate_source_url(url)?;
        debug!("🕷️ 开始下载: {}", url);

        let max_retries = self.config.max_retries.max(1);
        let mut last_error: Option<PipelineError> = None;

        for attempt in 1..=max_retries {
            match self.fetch_once(url).await {
                Ok(content) => {
                    if attempt > 1 {
                        info!("✅ 重试成功: {}", url);
                    }
                    return Ok(content);
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        return Err(e);
                    }

                    warn!("❌ 下载失败 (尝试 {}/{}): {}", attempt, max_retries, e);
                    last_error = Some(e);

                    if attempt < max_retries {
                        let delay = Duration::from_millis(attempt as u64 * self.config.retry_delay_base_ms);
                        debug!("⏳ 等待 {:?} 后重试...", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| pipeline_error!(fetch, url, "所有重试尝试均失败")))
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| pipeline_error!(fetch, url, describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(pipeline_error!(
                fetch,
                url,
                status.canonical_reason().unwrap_or("unexpected status"),
                status.as_u16()
            ));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.config.max_page_size {
                return Err(pipeline_error!(
                    parse,
                    url,
                    format!("页面过大: {} 字节 (上限 {})", length, self.config.max_page_size)
                ));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| pipeline_error!(fetch, url, format!("读取响应失败: {}", e)))?;

        if body.len() > self.config.max_page_size {
            return Err(pipeline_error!(
                parse,
                url,
                format!("页面过大: {} 字节 (上限 {})", body.len(), self.config.max_page_size)
            ));
        }

        debug!("✅ 下载完成，大小: {} 字节", body.len());
        Ok(body)
    }
}

/// 是否值得重试：网络错误、超时、408/429和5xx
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Fetch { status_code: None, .. } => true,
        PipelineError::Fetch { status_code: Some(code), .. } => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        _ => false,
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("请求超时: {}", error)
    } else if error.is_connect() {
        format!("连接失败: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_crawler_config_default() {
        let config = WebCrawlerConfig::default();
        assert_eq!(config.timeout, crawler_config::DEFAULT_CRAWL_TIMEOUT);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_page_size, 10 * 1024 * 1024);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_web_crawler_config_builder() {
        let config = WebCrawlerConfig::default()
            .user_agent("test-agent")
            .timeout(60)
            .retries(0, 10)
            .max_page_size(1024);

        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout, 60);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay_base_ms, 10);
        assert_eq!(config.max_page_size, 1024);

        let crawler = WebCrawler::new(config).unwrap();
        assert_eq!(crawler.config().timeout, 60);
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(&pipeline_error!(fetch, "https://a.com", "timeout")));
        assert!(is_retryable(&pipeline_error!(fetch, "https://a.com", "busy", 503)));
        assert!(is_retryable(&pipeline_error!(fetch, "https://a.com", "slow down", 429)));
        assert!(is_retryable(&pipeline_error!(fetch, "https://a.com", "timeout", 408)));
        assert!(!is_retryable(&pipeline_error!(fetch, "https://a.com", "not found", 404)));
        assert!(!is_retryable(&pipeline_error!(parse, "https://a.com", "too large")));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let crawler = WebCrawler::with_defaults().unwrap();
        for url in ["", "invalid-url", "ftp://example.com"] {
            assert!(crawler.fetch(url).await.is_err(), "URL should be rejected: {:?}", url);
        }
    }

    #[tokio::test]
    async fn test_fetch_nonexistent_domain() {
        let config = WebCrawlerConfig::default().timeout(5).retries(1, 0);
        let crawler = WebCrawler::new(config).unwrap();

        let result = crawler.fetch("https://this-domain-should-not-exist-12345.com").await;
        // 具体错误因网络环境而异，只检查失败类别
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "fetch");
    }
}
