//! 翻译流水线
//!
//! 每个食谱只抓取一次，然后按语言依次执行：翻译 → 生成 slug → 改写链接 → 组装结果。
//! 单个语言失败只把该（食谱, 语言）单元标记为失败，不影响同一食谱的其他语言，
//! 也不影响批次中的其他食谱。
//!
//! 每种语言维护一张只增不减的 slug 映射表（源 slug → 目标 slug），
//! 批次中已完成的食谱都会登记进去，所以后面的食谱可以解析到前面食谱的链接。

// 标准库导入
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// 第三方crate导入
use tracing::{debug, error, info, warn};

// 本地模块导入
use crate::config::AppConfig;
use crate::domain_map::{DomainMap, LangCode};
use crate::error::{PipelineError, Result};
use crate::html_processor::count_words;
use crate::link_adapter::LinkAdapter;
use crate::model::{RecipeRecord, TranslationResult};
use crate::output::{OutputRecord, OutputSink};
use crate::pipeline_error;
use crate::recipe_scraper::Scraper;
use crate::sitemap::SitemapEntry;
use crate::slug::{slug_from_url, translate_slug};
use crate::translator::TranslationProvider;

/// （食谱, 语言）单元的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Scraped,
    Translated,
    LinksAdapted,
    Done,
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Scraped => "scraped",
            UnitState::Translated => "translated",
            UnitState::LinksAdapted => "links-adapted",
            UnitState::Done => "done",
            UnitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 单个语言单元的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub lang: LangCode,
    pub state: UnitState,
    /// 失败前到达的最后状态
    pub failed_at: Option<UnitState>,
    pub error: Option<String>,
    pub target_url: Option<String>,
}

impl UnitReport {
    fn pending(lang: LangCode) -> Self {
        Self {
            lang,
            state: UnitState::Pending,
            failed_at: None,
            error: None,
            target_url: None,
        }
    }

    fn failed(lang: LangCode, reached: UnitState, error: &PipelineError) -> Self {
        Self {
            lang,
            state: UnitState::Failed,
            failed_at: Some(reached),
            error: Some(error.to_string()),
            target_url: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == UnitState::Done
    }
}

/// 食谱级别的汇总状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeStatus {
    /// 所有语言都成功
    Done,
    /// 部分语言成功
    Partial,
    /// 抓取失败、保存失败或所有语言都失败
    Failed,
    /// 运行被中断，未开始处理
    Skipped,
}

impl fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecipeStatus::Done => "done",
            RecipeStatus::Partial => "partial",
            RecipeStatus::Failed => "failed",
            RecipeStatus::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// 单个食谱的处理结果
#[derive(Debug, Clone)]
pub struct RecipeOutcome {
    pub url: String,
    pub status: RecipeStatus,
    pub units: Vec<UnitReport>,
    /// 食谱级错误（抓取、解析或保存）
    pub error: Option<String>,
    pub record: Option<OutputRecord>,
    pub saved_to: Option<PathBuf>,
    pub elapsed: Duration,
}

impl RecipeOutcome {
    fn skipped(url: &str, langs: &[LangCode]) -> Self {
        Self {
            url: url.to_string(),
            status: RecipeStatus::Skipped,
            units: langs.iter().map(|lang| UnitReport::pending(*lang)).collect(),
            error: None,
            record: None,
            saved_to: None,
            elapsed: Duration::ZERO,
        }
    }

    fn scrape_failed(url: &str, langs: &[LangCode], error: &PipelineError, elapsed: Duration) -> Self {
        Self {
            url: url.to_string(),
            status: RecipeStatus::Failed,
            units: langs
                .iter()
                .map(|lang| UnitReport::failed(*lang, UnitState::Pending, error))
                .collect(),
            error: Some(error.to_string()),
            record: None,
            saved_to: None,
            elapsed,
        }
    }

    fn rollup(units: &[UnitReport]) -> RecipeStatus {
        let done = units.iter().filter(|u| u.is_done()).count();
        if done == units.len() && done > 0 {
            RecipeStatus::Done
        } else if done > 0 {
            RecipeStatus::Partial
        } else {
            RecipeStatus::Failed
        }
    }
}

/// 批次汇总
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecipeOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, status: RecipeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// 成功完成的（食谱, 语言）单元数
    pub fn units_done(&self) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| o.units.iter())
            .filter(|u| u.is_done())
            .count()
    }

    pub fn units_failed(&self) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| o.units.iter())
            .filter(|u| u.state == UnitState::Failed)
            .count()
    }

    pub fn was_interrupted(&self) -> bool {
        self.count(RecipeStatus::Skipped) > 0
    }
}

/// 翻译流水线，持有批次范围内的 slug 映射表
pub struct TranslationPipeline<'a> {
    scraper: &'a dyn Scraper,
    provider: &'a dyn TranslationProvider,
    domains: DomainMap,
    source_lang: LangCode,
    source_domain: String,
    link_adapter: LinkAdapter,
    slug_maps: HashMap<LangCode, HashMap<String, String>>,
}

impl<'a> TranslationPipeline<'a> {
    /// 创建流水线；源语言必须在域名映射表中
    pub fn new(
        scraper: &'a dyn Scraper,
        provider: &'a dyn TranslationProvider,
        domains: DomainMap,
        source_lang: LangCode,
    ) -> Result<Self> {
        let source_domain = domains.resolve(source_lang)?.to_string();
        Ok(Self {
            scraper,
            provider,
            domains,
            source_lang,
            source_domain,
            link_adapter: LinkAdapter::new()?,
            slug_maps: HashMap::new(),
        })
    }

    /// 由运行配置创建
    pub fn from_config(
        config: &AppConfig,
        scraper: &'a dyn Scraper,
        provider: &'a dyn TranslationProvider,
    ) -> Result<Self> {
        Self::new(scraper, provider, config.domains().clone(), config.source_lang())
    }

    pub fn source_domain(&self) -> &str {
        &self.source_domain
    }

    /// 某语言当前的 slug 映射表
    pub fn slug_map(&self, lang: LangCode) -> Option<&HashMap<String, String>> {
        self.slug_maps.get(&lang)
    }

    /// 目标语言校验：必须有域名且不是源语言，至少一个
    pub fn validate_langs(&self, langs: &[LangCode]) -> Result<()> {
        if langs.is_empty() {
            return Err(pipeline_error!(config, "langs", "至少需要一个目标语言"));
        }
        for lang in langs {
            if *lang == self.source_lang {
                return Err(pipeline_error!(
                    config,
                    "langs",
                    format!("目标语言不能是源语言 {}", lang)
                ));
            }
            self.domains.resolve(*lang)?;
        }
        Ok(())
    }

    /// 处理单个食谱的全部目标语言
    ///
    /// 只有配置错误会返回 `Err`；抓取和翻译失败记录在返回的结果中。
    pub async fn translate_recipe(&mut self, url: &str, langs: &[LangCode]) -> Result<RecipeOutcome> {
        self.validate_langs(langs)?;
        Ok(self.process_recipe(url, langs).await)
    }

    /// 依次处理批次中的食谱
    ///
    /// 每个食谱开始前检查 `stop`，置位后剩余食谱记为跳过。
    /// 提供 `sink` 时每个抓取成功的食谱都会写出。
    pub async fn run_batch(
        &mut self,
        entries: &[SitemapEntry],
        langs: &[LangCode],
        stop: &AtomicBool,
        sink: Option<&dyn OutputSink>,
    ) -> Result<BatchReport> {
        self.validate_langs(langs)?;

        let start = Instant::now();
        let mut report = BatchReport::default();
        let total = entries.len();

        info!(
            "🚀 开始批量翻译: {} 个食谱 × {} 种语言",
            total,
            langs.len()
        );

        for (index, entry) in entries.iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                warn!("⏹️ 运行已中断，跳过剩余 {} 个食谱", total - index);
                report
                    .outcomes
                    .extend(entries[index..].iter().map(|e| RecipeOutcome::skipped(&e.url, langs)));
                break;
            }

            info!("📖 [{}/{}] {}", index + 1, total, entry.url);
            let mut outcome = self.process_recipe(&entry.url, langs).await;

            if let (Some(sink), Some(record)) = (sink, outcome.record.as_ref()) {
                match sink.write(record).await {
                    Ok(path) => outcome.saved_to = Some(path),
                    Err(e) => {
                        error!("❌ 保存失败 {}: {}", entry.url, e);
                        outcome.status = RecipeStatus::Failed;
                        outcome.error = Some(e.to_string());
                    }
                }
            }

            report.outcomes.push(outcome);
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }

    async fn process_recipe(&mut self, url: &str, langs: &[LangCode]) -> RecipeOutcome {
        let start = Instant::now();

        let record = match self.scrape(url).await {
            Ok(record) => record,
            Err(e) => {
                error!("❌ 抓取失败 {}: {}", url, e);
                return RecipeOutcome::scrape_failed(url, langs, &e, start.elapsed());
            }
        };

        let mut units = Vec::with_capacity(langs.len());
        let mut translations = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for &lang in langs {
            match self.translate_unit(&record, lang).await {
                Ok(result) => {
                    info!("  ✅ {} → {}", lang, result.target_url);
                    units.push(UnitReport {
                        lang,
                        state: UnitState::Done,
                        failed_at: None,
                        error: None,
                        target_url: Some(result.target_url.clone()),
                    });
                    translations.insert(lang, result);
                }
                Err((reached, e)) => {
                    warn!("  ⚠️ {} 失败 ({}): {}", lang, reached, e);
                    failures.insert(lang, e.to_string());
                    units.push(UnitReport::failed(lang, reached, &e));
                }
            }
        }

        let status = RecipeOutcome::rollup(&units);
        let record = OutputRecord::new(record, self.source_lang, translations, failures);

        RecipeOutcome {
            url: url.to_string(),
            status,
            units,
            error: None,
            record: Some(record),
            saved_to: None,
            elapsed: start.elapsed(),
        }
    }

    async fn scrape(&self, url: &str) -> Result<RecipeRecord> {
        let record = self.scraper.scrape(url).await?;
        if slug_from_url(&record.url).is_none() {
            return Err(pipeline_error!(parse, record.url, "URL中没有可用的slug"));
        }
        Ok(record)
    }

    /// 单个语言单元；失败时返回到达的最后状态
    async fn translate_unit(
        &mut self,
        record: &RecipeRecord,
        lang: LangCode,
    ) -> std::result::Result<TranslationResult, (UnitState, PipelineError)> {
        let mut state = UnitState::Scraped;

        let target_domain = self
            .domains
            .resolve(lang)
            .map(str::to_string)
            .map_err(|e| (state, e))?;
        let source_slug = slug_from_url(&record.url)
            .ok_or_else(|| (state, pipeline_error!(parse, record.url, "URL中没有可用的slug")))?;

        let translated = self
            .provider
            .translate(&record.title, &record.content, lang)
            .await
            .map_err(|e| (state, e))?;
        state = UnitState::Translated;
        debug!("  📝 {} {}: {}", lang, state, translated.title);

        let slug = translate_slug(&source_slug, &translated.title, lang);

        // 先登记本食谱的映射，正文中的自引用链接才能解析
        let slug_map = self.slug_maps.entry(lang).or_default();
        slug_map.insert(source_slug, slug.clone());

        let outcome =
            self.link_adapter
                .adapt_detailed(&translated.content, &self.source_domain, &target_domain, slug_map);
        state = UnitState::LinksAdapted;
        debug!("  🔗 {} {}: 改写 {} 个链接", lang, state, outcome.rewritten);

        if !outcome.unresolved_slugs.is_empty() {
            debug!(
                "  🔗 {} 个链接暂无 {} 译文，仅替换域名: {:?}",
                outcome.unresolved_slugs.len(),
                lang,
                outcome.unresolved_slugs
            );
        }

        let links = self.link_adapter.validate_links(&outcome.content, self.domains.family());
        let leftover = self
            .link_adapter
            .extract_internal_links(&outcome.content, &self.source_domain, None);
        if !leftover.is_empty() {
            warn!("  ⚠️ {} 译文中仍有 {} 个源站链接", lang, leftover.len());
        }
        debug!(
            "  🔍 {} 链接检查: 共 {} 个, 站内 {} 个, 外部 {} 个",
            lang,
            links.total_links,
            links.internal_links.len(),
            links.external_links.len()
        );

        Ok(TranslationResult {
            lang_code: lang,
            title: translated.title,
            word_count: count_words(&outcome.content),
            content: outcome.content,
            target_url: format!("https://{}/{}", target_domain, slug),
            slug,
            meta_description: translated.meta_description,
            focus_keyword: translated.focus_keyword,
            seo_title: translated.seo_title,
        })
    }
}
