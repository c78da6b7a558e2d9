use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use recipe_translator::api_constants::crawler_config;
use recipe_translator::config::{AppConfig, Cli, Commands};
use recipe_translator::output::{JsonFileSink, OutputSink};
use recipe_translator::pipeline::{RecipeStatus, TranslationPipeline};
use recipe_translator::recipe_scraper::RecipeScraper;
use recipe_translator::sitemap::{SitemapEntry, SitemapSource, UrlSource};
use recipe_translator::stats::{format_duration, print_batch_summary, print_recipe_outcome};
use recipe_translator::translator::OpenRouterTranslator;
use recipe_translator::utils::init_logging;
use recipe_translator::web_crawler::{WebCrawler, WebCrawlerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(cli.verbose, cli.quiet);

    let config = cli.to_config().context("配置无效")?;

    match &cli.command {
        Commands::List { limit } => run_list(&config, *limit).await,
        Commands::Translate { url, langs, save } => run_translate(&config, url, langs, *save, cli.quiet).await,
        Commands::Batch { count, langs } => run_batch(&config, *count, langs, cli.quiet).await,
    }
}

/// 列出站点地图中的食谱URL
async fn run_list(config: &AppConfig, limit: Option<usize>) -> Result<()> {
    let entries = discover(config, limit).await?;

    for entry in &entries {
        match &entry.lastmod {
            Some(lastmod) => println!("{}\t{}", entry.url, lastmod),
            None => println!("{}", entry.url),
        }
    }
    Ok(())
}

/// 翻译单个食谱
async fn run_translate(config: &AppConfig, url: &str, langs: &[String], save: bool, quiet: bool) -> Result<()> {
    let langs = config.resolve_target_langs(langs)?;
    let api_key = config.require_api_key()?;

    let scraper = build_scraper(config)?;
    let translator = build_translator(config, api_key)?;
    let mut pipeline = TranslationPipeline::from_config(config, &scraper, &translator)?;

    if !quiet {
        info!("🚀 启动食谱翻译");
        info!("📖 食谱: {}", url);
        info!("🌐 目标语言: {:?}", langs);
        info!("🤖 模型: {}", translator.model_name());
    }

    let mut outcome = pipeline.translate_recipe(url, &langs).await?;

    if save {
        if let Some(record) = &outcome.record {
            let sink = JsonFileSink::new(config.output_dir());
            let path = sink.write(record).await.context("保存翻译结果失败")?;
            outcome.saved_to = Some(path);
        }
    }

    if !quiet {
        print_recipe_outcome(&outcome);
        if let Some(record) = &outcome.record {
            for translation in record.translations.values() {
                println!("   📝 {}: {}", translation.lang_code, translation.title);
            }
        }
    }

    if outcome.status == RecipeStatus::Failed {
        bail!("食谱翻译失败: {}", url);
    }
    Ok(())
}

/// 批量翻译站点地图中的食谱
async fn run_batch(config: &AppConfig, count: usize, langs: &[String], quiet: bool) -> Result<()> {
    if count == 0 {
        bail!("--count 必须大于0");
    }
    let langs = config.resolve_target_langs(langs)?;
    let api_key = config.require_api_key()?;

    let total_start = Instant::now();
    let entries = discover(config, Some(count)).await?;

    let scraper = build_scraper(config)?;
    let translator = build_translator(config, api_key)?;
    let mut pipeline = TranslationPipeline::from_config(config, &scraper, &translator)?;
    let sink = JsonFileSink::new(config.output_dir());

    // Ctrl-C 只设置停止标志，当前食谱处理完后停止
    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，当前食谱完成后停止");
            stop_signal.store(true, Ordering::SeqCst);
        }
    });

    if !quiet {
        info!("📂 输出目录: {}", sink.dir().display());
        info!("🤖 模型: {}", translator.model_name());
    }

    let report = pipeline.run_batch(&entries, &langs, &stop, Some(&sink)).await?;

    if !quiet {
        print_batch_summary(&report);
        info!("✅ 批量翻译结束！总耗时: {}", format_duration(total_start.elapsed()));
    }

    Ok(())
}

async fn discover(config: &AppConfig, limit: Option<usize>) -> Result<Vec<SitemapEntry>> {
    let crawler = WebCrawler::new(WebCrawlerConfig::default().timeout(crawler_config::SITEMAP_TIMEOUT))?;
    let source = SitemapSource::new(config.sitemap_url(), crawler);

    let entries = source
        .discover(limit)
        .await
        .with_context(|| format!("读取站点地图失败: {}", source.sitemap_url()))?;

    if entries.is_empty() {
        bail!("站点地图中没有发现食谱URL: {}", source.sitemap_url());
    }
    Ok(entries)
}

fn build_scraper(config: &AppConfig) -> Result<RecipeScraper> {
    let crawler = WebCrawler::new(WebCrawlerConfig::default().timeout(config.crawl_timeout()))?;
    Ok(RecipeScraper::new(crawler, config.source_domain())?)
}

fn build_translator(config: &AppConfig, api_key: &str) -> Result<OpenRouterTranslator> {
    let translator = OpenRouterTranslator::new(api_key, config.request_timeout())?
        .model(config.model())
        .api_url(config.api_url())?;
    Ok(translator)
}
