//! 输出模块
//!
//! 将一个食谱的原文、各语言译文和失败信息组装成 `OutputRecord`，
//! 并通过 `OutputSink` 写出。默认实现 `JsonFileSink` 把每个食谱写成一个JSON文件。

// 标准库导入
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// 第三方crate导入
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// 本地模块导入
use crate::domain_map::LangCode;
use crate::error::Result;
use crate::model::{RecipeRecord, TranslationResult};
use crate::pipeline_error;
use crate::utils::output_filename;

/// 单个食谱的完整输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub source_url: String,
    pub original: RecipeRecord,
    pub translations: BTreeMap<LangCode, TranslationResult>,
    /// 失败语言 → 错误信息
    pub failures: BTreeMap<LangCode, String>,
    pub hreflang: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl OutputRecord {
    /// 组装输出记录并生成 hreflang 标签
    pub fn new(
        original: RecipeRecord,
        source_lang: LangCode,
        translations: BTreeMap<LangCode, TranslationResult>,
        failures: BTreeMap<LangCode, String>,
    ) -> Self {
        let hreflang = hreflang_tags(&original.url, source_lang, &translations);
        Self {
            source_url: original.url.clone(),
            original,
            translations,
            failures,
            hreflang,
            generated_at: Utc::now(),
        }
    }

    /// 是否至少有一个语言翻译成功
    pub fn has_translations(&self) -> bool {
        !self.translations.is_empty()
    }
}

/// 生成多语言备用链接标签：源页面、每个译文页面，最后是指向源页面的 x-default
pub fn hreflang_tags(
    source_url: &str,
    source_lang: LangCode,
    translations: &BTreeMap<LangCode, TranslationResult>,
) -> Vec<String> {
    let mut tags = Vec::with_capacity(translations.len() + 2);
    tags.push(alternate_link(source_lang.as_str(), source_url));
    for (lang, result) in translations {
        tags.push(alternate_link(lang.as_str(), &result.target_url));
    }
    tags.push(alternate_link("x-default", source_url));
    tags
}

fn alternate_link(hreflang: &str, href: &str) -> String {
    format!(r#"<link rel="alternate" hreflang="{}" href="{}"/>"#, hreflang, href)
}

/// 输出接口：按源URL接收输出记录
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, record: &OutputRecord) -> Result<PathBuf>;
}

/// 把输出记录写成格式化JSON文件
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 记录对应的文件路径
    pub fn path_for(&self, source_url: &str) -> PathBuf {
        self.dir.join(output_filename(source_url))
    }
}

#[async_trait]
impl OutputSink for JsonFileSink {
    async fn write(&self, record: &OutputRecord) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| pipeline_error!(file_op, self.dir.display(), "创建目录", e))?;

        let path = self.path_for(&record.source_url);
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::write(&path, json)
            .await
            .map_err(|e| pipeline_error!(file_op, path.display(), "写入", e))?;

        info!("💾 已保存: {}", path.display());
        Ok(path)
    }
}
