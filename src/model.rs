//! 食谱数据模型
//!
//! `RecipeRecord` 由抓取阶段生成，之后只读；`TranslationResult` 每个（食谱, 语言）
//! 生成一个，链接改写完成后组装，不再修改。

// 标准库导入
use std::collections::BTreeSet;

// 第三方crate导入
use serde::{Deserialize, Serialize};

// 本地模块导入
use crate::domain_map::LangCode;

/// 页面中的图片，按页面出现顺序保存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
}

/// schema.org Recipe 结构化数据（来自 JSON-LD）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeSchema {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub recipe_yield: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

/// 源语言食谱记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    /// 规范的源URL（绝对地址，http/https）
    pub url: String,
    /// 纯文本标题
    pub title: String,
    /// 清理后的正文HTML
    pub content: String,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub images: Vec<ImageRef>,
    /// 正文中指向源站的绝对链接
    pub internal_links: BTreeSet<String>,
    pub recipe_schema: Option<RecipeSchema>,
    /// 正文文本词数（仅供参考）
    pub word_count: usize,
}

/// 单一目标语言的翻译结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub lang_code: LangCode,
    pub title: String,
    /// 链接改写后的译文正文
    pub content: String,
    pub slug: String,
    /// `https://{domain}/{slug}`
    pub target_url: String,
    pub word_count: usize,
    pub meta_description: Option<String>,
    pub focus_keyword: Option<String>,
    pub seo_title: Option<String>,
}
