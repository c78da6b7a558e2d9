//! Recipe Translator - 多语言食谱翻译工具库
//!
//! 这个库提供了站点地图发现、食谱抓取、LLM翻译、slug生成和站内链接改写等核心功能。
//! `pipeline_error!` 宏通过 `#[macro_export]` 在crate根导出。

pub mod api_constants;
pub mod config;
pub mod domain_map;
pub mod error;
pub mod html_processor;
pub mod link_adapter;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod recipe_scraper;
pub mod sitemap;
pub mod slug;
pub mod stats;
pub mod translator;
pub mod utils;
pub mod web_crawler;
