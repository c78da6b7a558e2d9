//! 翻译服务模块
//!
//! `TranslationProvider` 是流水线使用的翻译接口。`OpenRouterTranslator` 通过
//! OpenAI 兼容的 chat completions 接口调用大模型，要求模型按固定分段格式返回
//! 标题、正文和SEO字段，并严格解析响应：缺少标题或正文段即视为翻译失败。

// 标准库导入
use std::time::{Duration, Instant};

// 第三方crate导入
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// 本地模块导入
use crate::api_constants::{api_config, is_valid_api_url};
use crate::domain_map::LangCode;
use crate::error::{PipelineError, Result};
use crate::pipeline_error;
use crate::utils::truncate_for_log;

/// 响应中的分段标记
const SECTION_PATTERN: &str = r"(?m)^[ \t]*(?:#+[ \t]*)?(?:\*\*)?[ \t]*(TRANSLATED_TITLE|TRANSLATED_SLUG|FOCUS_KEYWORD|SEO_TITLE|SEO_DESCRIPTION|TRANSLATED_CONTENT)[ \t]*(?:\*\*)?[ \t]*:[ \t]*(?:\*\*)?";

/// 一次翻译的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedContent {
    pub title: String,
    /// 保留HTML结构的译文正文
    pub content: String,
    pub meta_description: Option<String>,
    pub focus_keyword: Option<String>,
    pub seo_title: Option<String>,
}

/// 翻译服务接口
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 将标题和HTML正文翻译为目标语言
    async fn translate(&self, title: &str, content: &str, lang: LangCode) -> Result<TranslatedContent>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// 单次请求的结果分类
enum AttemptError {
    /// 临时错误，可以重试
    Retry(PipelineError),
    /// 永久错误，直接返回
    Fail(PipelineError),
}

/// OpenRouter 翻译客户端
pub struct OpenRouterTranslator {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_retries: usize,
    retry_delay_base_ms: u64,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl OpenRouterTranslator {
    /// 创建客户端，`timeout_secs` 为单次请求超时
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(pipeline_error!(
                config,
                "api_key",
                format!("缺少API密钥，请设置 {} 或使用 --api-key", api_config::API_KEY_ENV)
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| pipeline_error!(config, "http_client", format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            api_url: api_config::OPENROUTER_URL.to_string(),
            model: api_config::DEFAULT_MODEL.to_string(),
            max_retries: api_config::MAX_RETRIES,
            retry_delay_base_ms: api_config::RETRY_DELAY_BASE_MS,
            min_interval: Duration::from_millis(api_config::MIN_REQUEST_INTERVAL_MS),
            last_request: Mutex::new(None),
        })
    }

    /// 设置模型
    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// 设置接口地址
    pub fn api_url(mut self, api_url: &str) -> Result<Self> {
        if !is_valid_api_url(api_url) {
            return Err(pipeline_error!(config, "api_url", format!("无效的API地址: {}", api_url)));
        }
        self.api_url = api_url.to_string();
        Ok(self)
    }

    /// 设置重试策略
    pub fn retries(mut self, max_retries: usize, delay_base_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay_base_ms = delay_base_ms;
        self
    }

    /// 设置两次请求之间的最小间隔
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// 两次请求之间至少间隔 `min_interval`
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// 指数退避，上限为 `MAX_RETRY_DELAY_MS`
    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 2_u64.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        let millis = self
            .retry_delay_base_ms
            .saturating_mul(factor)
            .min(api_config::MAX_RETRY_DELAY_MS);
        Duration::from_millis(millis)
    }

    /// 发送请求并返回模型输出文本（带重试）
    async fn complete(&self, prompt: &str, lang: LangCode) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            self.rate_limit().await;

            match self.send_once(prompt, lang).await {
                Ok(text) => return Ok(text),
                Err(AttemptError::Fail(e)) => return Err(e),
                Err(AttemptError::Retry(e)) => {
                    warn!("❌ 翻译请求失败 [{}] (尝试 {}/{}): {}", lang, attempt + 1, self.max_retries, e);
                    last_error = Some(e);
                    if attempt + 1 < self.max_retries {
                        let delay = self.backoff(attempt);
                        debug!("⏳ 等待 {:?} 后重试...", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| pipeline_error!(translation, lang, "所有重试尝试均失败")))
    }

    async fn send_once(&self, prompt: &str, lang: LangCode) -> std::result::Result<String, AttemptError> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens: api_config::MAX_TOKENS,
            temperature: api_config::TEMPERATURE,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", api_config::HTTP_REFERER)
            .header("X-Title", api_config::X_TITLE)
            .json(&request)
            .send()
            .await
            .map_err(|e| AttemptError::Retry(pipeline_error!(translation, lang, format!("请求发送失败: {}", e))))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Retry(pipeline_error!(translation, lang, format!("读取响应失败: {}", e))))?;

        if !status.is_success() {
            let error = pipeline_error!(translation, lang, extract_error_message(status, &body), status.as_u16());
            return Err(if should_retry_http(status) {
                AttemptError::Retry(error)
            } else {
                AttemptError::Fail(error)
            });
        }

        extract_completion_text(&body, lang).map_err(AttemptError::Fail)
    }
}

#[async_trait]
impl TranslationProvider for OpenRouterTranslator {
    async fn translate(&self, title: &str, content: &str, lang: LangCode) -> Result<TranslatedContent> {
        info!("🌐 翻译为 {} ({}): {}", lang.display_name(), lang, title);
        let prompt = build_prompt(title, content, lang);
        let raw = self.complete(&prompt, lang).await?;
        let translated = parse_translation_response(&raw, lang)?;
        debug!("✅ 译文标题 [{}]: {}", lang, translated.title);
        Ok(translated)
    }
}

/// 408/429/5xx 通常是临时错误
pub fn should_retry_http(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 从错误响应中提取可读的错误信息
fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = v.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    format!("HTTP {}: {}", status.as_u16(), truncate_for_log(body.trim(), 400))
}

/// 从 chat completions 响应体中取出第一条回复文本
pub fn extract_completion_text(body: &str, lang: LangCode) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        pipeline_error!(
            translation,
            lang,
            format!("响应格式错误: {} ({})", e, truncate_for_log(body, 200))
        )
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| pipeline_error!(translation, lang, "响应中没有回复内容"))
}

/// 构造翻译提示词
pub fn build_prompt(title: &str, content: &str, lang: LangCode) -> String {
    let language = lang.display_name();

    format!(
        r#"You are a professional recipe translator specializing in culinary content.

Translate the following recipe from English to {language}.

HTML FORMATTING RULES:
1. Preserve all HTML tags exactly (<h2>, <h3>, <p>, <ul>, <ol>, <li>, <table>, <strong>, <em>, <a href="...">, <img src="..." alt="...">)
2. Do not remove or modify the HTML structure
3. Only translate the text content between tags and the alt text of images
4. Keep every href and src attribute unchanged

TRANSLATION GUIDELINES:
1. Keep the same friendly, informative tone
2. Adapt cooking terms naturally for a {language} audience
3. Keep ingredient names accurate in {language}

ORIGINAL TITLE:
{title}

ORIGINAL CONTENT (HTML):
{content}

SEO FIELDS (all 100% in {language}):
1. FOCUS_KEYWORD: 2-4 words
2. SEO_TITLE: starts with the focus keyword, max 60 characters
3. SEO_DESCRIPTION: includes the focus keyword, 150-160 characters

Reply in this exact format:

TRANSLATED_TITLE:
[title in {language}]

FOCUS_KEYWORD:
[focus keyword in {language}]

SEO_TITLE:
[SEO title in {language}]

SEO_DESCRIPTION:
[meta description in {language}]

TRANSLATED_CONTENT:
[full translated content with all HTML tags preserved]"#
    )
}

/// 严格解析分段格式的模型输出
///
/// 标题和正文段必须存在且非空；SEO字段缺失时为 `None`。
/// 分段标记可以带 Markdown 加粗（`**TRANSLATED_TITLE:**`）或标题符号。
pub fn parse_translation_response(response: &str, lang: LangCode) -> Result<TranslatedContent> {
    let section_regex = Regex::new(SECTION_PATTERN)
        .map_err(|e| pipeline_error!(translation, lang, format!("编译分段正则表达式失败: {}", e)))?;

    let headers: Vec<(String, usize, usize)> = section_regex
        .captures_iter(response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_string();
            Some((name, whole.start(), whole.end()))
        })
        .collect();

    let section = |wanted: &str| -> Option<String> {
        headers.iter().enumerate().find(|(_, (name, _, _))| name == wanted).map(|(i, (_, _, end))| {
            let stop = headers.get(i + 1).map(|(_, start, _)| *start).unwrap_or(response.len());
            response[*end..stop].trim().to_string()
        })
    };

    let title = section("TRANSLATED_TITLE")
        .map(|t| clean_inline(&t))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| pipeline_error!(translation, lang, "响应缺少 TRANSLATED_TITLE 段"))?;

    let content = section("TRANSLATED_CONTENT")
        .map(|c| strip_code_fence(&c))
        .filter(|c| !c.is_empty())
        .ok_or_else(|| pipeline_error!(translation, lang, "响应缺少 TRANSLATED_CONTENT 段"))?;

    let optional = |name: &str| section(name).map(|v| clean_inline(&v)).filter(|v| !v.is_empty());

    Ok(TranslatedContent {
        title,
        content,
        meta_description: optional("SEO_DESCRIPTION"),
        focus_keyword: optional("FOCUS_KEYWORD"),
        seo_title: optional("SEO_TITLE"),
    })
}

/// 单行字段：取第一行非空文本，去掉加粗标记和包裹的引号
fn clean_inline(value: &str) -> String {
    let line = value.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    let line = line.replace("**", "");
    line.trim()
        .trim_matches(|c| c == '"' || c == '“' || c == '”')
        .trim()
        .to_string()
}

/// 去掉包裹正文的 Markdown 代码块
fn strip_code_fence(value: &str) -> String {
    let trimmed = value.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or_default();
    without_open.trim_end().trim_end_matches("```").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "TRANSLATED_TITLE:
Muffins au Chocolat

TRANSLATED_SLUG:
muffins-chocolat

FOCUS_KEYWORD:
muffins au chocolat

SEO_TITLE:
Muffins au Chocolat : 7 Secrets Délicieux

SEO_DESCRIPTION:
Découvrez nos muffins au chocolat moelleux.

TRANSLATED_CONTENT:
<p>Ces muffins sont <strong>délicieux</strong>.</p>
<p>Essayez aussi <a href=\"https://allmuffins.com/banana-bread\">le pain aux bananes</a>.</p>";

    #[test]
    fn test_parse_well_formed_response() {
        let parsed = parse_translation_response(WELL_FORMED, LangCode::Fr).unwrap();

        assert_eq!(parsed.title, "Muffins au Chocolat");
        assert_eq!(parsed.focus_keyword.as_deref(), Some("muffins au chocolat"));
        assert_eq!(parsed.seo_title.as_deref(), Some("Muffins au Chocolat : 7 Secrets Délicieux"));
        assert_eq!(
            parsed.meta_description.as_deref(),
            Some("Découvrez nos muffins au chocolat moelleux.")
        );
        assert!(parsed.content.starts_with("<p>Ces muffins"));
        assert!(parsed.content.ends_with("</a>.</p>"));
        assert!(!parsed.content.contains("TRANSLATED"));
    }

    #[test]
    fn test_parse_markdown_decorated_headers() {
        let response = "**TRANSLATED_TITLE:** **Magdalenas de Chocolate**\n\n## TRANSLATED_CONTENT:\n```html\n<p>Hola</p>\n```\n";
        let parsed = parse_translation_response(response, LangCode::Es).unwrap();

        assert_eq!(parsed.title, "Magdalenas de Chocolate");
        assert_eq!(parsed.content, "<p>Hola</p>");
        assert_eq!(parsed.focus_keyword, None);
        assert_eq!(parsed.seo_title, None);
    }

    #[test]
    fn test_missing_required_sections_fail() {
        let no_content = "TRANSLATED_TITLE:\nMuffins\n\nFOCUS_KEYWORD:\nmuffins";
        let err = parse_translation_response(no_content, LangCode::Fr).unwrap_err();
        assert_eq!(err.kind(), "translation");
        assert!(err.to_string().contains("TRANSLATED_CONTENT"));

        let no_title = "TRANSLATED_CONTENT:\n<p>Bonjour</p>";
        assert!(parse_translation_response(no_title, LangCode::Fr).is_err());

        let empty_title = "TRANSLATED_TITLE:\n\nTRANSLATED_CONTENT:\n<p>Bonjour</p>";
        assert!(parse_translation_response(empty_title, LangCode::Fr).is_err());

        assert!(parse_translation_response("Sorry, I cannot help with that.", LangCode::Fr).is_err());
    }

    #[test]
    fn test_extract_completion_text() {
        let body = r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"TRANSLATED_TITLE:\nA"}}]}"#;
        assert_eq!(extract_completion_text(body, LangCode::De).unwrap(), "TRANSLATED_TITLE:\nA");

        for bad in [r#"{"choices":[]}"#, r#"{"choices":[{"message":{"content":null}}]}"#, "<html>502</html>"] {
            let err = extract_completion_text(bad, LangCode::De).unwrap_err();
            assert_eq!(err.kind(), "translation", "body {:?}", bad);
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("Chocolate Muffins", "<p>Rich.</p>", LangCode::Sv);
        assert!(prompt.contains("from English to Swedish"));
        assert!(prompt.contains("Chocolate Muffins"));
        assert!(prompt.contains("<p>Rich.</p>"));
        for header in ["TRANSLATED_TITLE:", "FOCUS_KEYWORD:", "SEO_TITLE:", "SEO_DESCRIPTION:", "TRANSLATED_CONTENT:"] {
            assert!(prompt.contains(header), "missing {}", header);
        }
    }

    #[test]
    fn test_should_retry_http() {
        assert!(should_retry_http(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_http(StatusCode::BAD_GATEWAY));
        assert!(should_retry_http(StatusCode::REQUEST_TIMEOUT));
        assert!(!should_retry_http(StatusCode::UNAUTHORIZED));
        assert!(!should_retry_http(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_extract_error_message() {
        let msg = extract_error_message(StatusCode::UNAUTHORIZED, r#"{"error":{"message":"No auth credentials found"}}"#);
        assert_eq!(msg, "HTTP 401: No auth credentials found");
        let msg = extract_error_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(msg, "HTTP 502: upstream down");
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenRouterTranslator::new("  ", 10).err().unwrap();
        assert!(err.is_fatal());

        let translator = OpenRouterTranslator::new("sk-test", 10).unwrap().model("openai/gpt-4o");
        assert_eq!(translator.model_name(), "openai/gpt-4o");
        assert!(OpenRouterTranslator::new("sk-test", 10).unwrap().api_url("not-a-url").is_err());
    }

    #[test]
    fn test_backoff_grows_and_saturates() {
        let translator = OpenRouterTranslator::new("sk-test", 10).unwrap().retries(500, 800);

        assert_eq!(translator.backoff(0), Duration::from_millis(800));
        assert_eq!(translator.backoff(2), Duration::from_millis(3200));
        assert_eq!(translator.backoff(64), Duration::from_millis(api_config::MAX_RETRY_DELAY_MS));
        assert_eq!(translator.backoff(usize::MAX), Duration::from_millis(api_config::MAX_RETRY_DELAY_MS));
    }

    #[tokio::test]
    async fn test_rate_limit_spaces_requests() {
        let translator = OpenRouterTranslator::new("sk-test", 10)
            .unwrap()
            .min_interval(Duration::from_millis(50));

        let start = Instant::now();
        translator.rate_limit().await;
        translator.rate_limit().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
