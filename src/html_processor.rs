//! HTML处理模块
//!
//! 基于 html5ever DOM 的页面解析、正文定位、清理和元数据提取。
//! 清理后的正文保留原有的格式标签（段落、列表、表格、图片、链接），
//! 只去掉脚本、导航、广告、分享按钮等与食谱无关的部分。

// 标准库导入
use std::collections::HashSet;

// 第三方crate导入
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde_json::Value;
use tracing::debug;
use url::Url;

// 本地模块导入
use crate::error::Result;
use crate::model::{ImageRef, RecipeSchema};
use crate::pipeline_error;

/// 需要整体删除的标签
const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "footer", "aside", "form", "button", "input",
    "select", "textarea", "header",
];

/// class 中出现这些单词的元素整体删除（按 `-`/`_` 切分后比较）
const NOISE_CLASS_WORDS: &[&str] = &[
    "share", "social", "comment", "comments", "related", "sidebar", "widget", "advertisement", "ad",
    "ads", "newsletter", "subscribe", "popup", "breadcrumb", "breadcrumbs", "menu",
];

/// class 中包含这些片段的元素整体删除
const NOISE_CLASS_FRAGMENTS: &[&str] = &["author-box", "post-navigation"];

/// 即使没有文本也保留的元素
const KEEP_EMPTY_TAGS: &[&str] = &["br", "hr", "img", "source", "picture"];

/// 图片地址中出现这些词时视为装饰图片
const DECORATIVE_IMAGE_WORDS: &[&str] = &["avatar", "icon", "logo", "emoji", "gravatar"];

/// 找不到正文容器时收集的块级元素
const FALLBACK_BLOCK_TAGS: &[&str] = &["p", "h2", "h3", "h4", "ul", "ol", "table"];

/// 正文容器选择器，按优先级排列
enum ContentSelector {
    /// div 或 article 带有该 class
    Class(&'static str),
    /// div 或 article 带有该 id
    Id(&'static str),
    /// 任意该标签
    Tag(&'static str),
}

const CONTENT_SELECTORS: &[ContentSelector] = &[
    ContentSelector::Class("entry-content"),
    ContentSelector::Class("post-content"),
    ContentSelector::Class("article-content"),
    ContentSelector::Class("content-area"),
    ContentSelector::Class("single-content"),
    ContentSelector::Id("content"),
    ContentSelector::Class("wprm-recipe"),
    ContentSelector::Tag("article"),
    ContentSelector::Tag("main"),
];

/// 从一个页面中提取出的全部信息
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub images: Vec<ImageRef>,
    pub recipe_schema: Option<RecipeSchema>,
    pub word_count: usize,
}

/// 解析HTML文档
pub fn parse_html(html: &str) -> Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| pipeline_error!(parse, "html", format!("HTML解析失败: {:?}", e)))
}

/// 从页面HTML中提取食谱信息
///
/// `page_url` 用于把相对的图片地址解析为绝对地址。
pub fn extract_page(html: &str, page_url: &Url) -> Result<ExtractedPage> {
    let dom = parse_html(html)?;
    let document = dom.document.clone();

    let title = extract_title(&document)
        .ok_or_else(|| pipeline_error!(parse, page_url, "页面缺少标题（h1 或 title）"))?;
    let meta_description = extract_meta_description(&document);
    let recipe_schema = extract_recipe_schema(&document);

    // 备用文档必须与正文节点同生命周期，RcDom 析构时会清空所有后代
    let fallback_dom;
    let content_node = match find_content_node(&document) {
        Some(node) => node,
        None => {
            debug!("⚠️ 未找到正文容器，改为收集块级元素: {}", page_url);
            fallback_dom = fallback_document(&document)?;
            fallback_dom
                .as_ref()
                .and_then(|dom| find_first(&dom.document, |n| is_element(n, "div")))
                .ok_or_else(|| pipeline_error!(parse, page_url, "页面中没有可识别的正文内容"))?
        }
    };

    // 图片在清理前提取，清理会去掉宽高等属性
    let images = extract_images(&content_node, page_url);
    let featured_image = extract_featured_image(&document, page_url).or_else(|| images.first().map(|i| i.url.clone()));

    clean_content(&content_node, page_url);
    if text_content(&content_node).trim().is_empty() && find_first(&content_node, |n| is_element(n, "img")).is_none() {
        return Err(pipeline_error!(parse, page_url, "清理后的正文为空"));
    }

    let content = serialize_node(&content_node)?;
    let word_count = count_text_words(&content_node);

    debug!(
        "📄 页面提取完成: 标题='{}', 正文 {} 字节, {} 词, {} 张图片",
        title,
        content.len(),
        word_count,
        images.len()
    );

    Ok(ExtractedPage {
        title,
        content,
        meta_description,
        featured_image,
        images,
        recipe_schema,
        word_count,
    })
}

/// 统计HTML片段中文本的词数（不计标签）
pub fn count_words(html: &str) -> usize {
    match parse_html(html) {
        Ok(dom) => count_text_words(&dom.document),
        Err(_) => 0,
    }
}

/// 提取标题：优先第一个 h1，其次 `<title>` 中 `|` 之前的部分
pub fn extract_title(document: &Handle) -> Option<String> {
    let from_h1 = find_first(document, |n| is_element(n, "h1"))
        .map(|h1| collapse_whitespace(&text_content(&h1)))
        .filter(|t| !t.is_empty());
    if from_h1.is_some() {
        return from_h1;
    }

    find_first(document, |n| is_element(n, "title"))
        .map(|t| text_content(&t))
        .and_then(|t| t.split('|').next().map(collapse_whitespace))
        .filter(|t| !t.is_empty())
}

/// 提取 meta description，其次 og:description
pub fn extract_meta_description(document: &Handle) -> Option<String> {
    meta_content(document, "name", "description").or_else(|| meta_content(document, "property", "og:description"))
}

/// 提取特色图片：og:image → twitter:image → 带 featured/hero/post-thumbnail class 的图片
pub fn extract_featured_image(document: &Handle, page_url: &Url) -> Option<String> {
    let candidate = meta_content(document, "property", "og:image")
        .or_else(|| meta_content(document, "name", "twitter:image"))
        .or_else(|| meta_content(document, "property", "twitter:image"))
        .or_else(|| {
            find_first(document, |n| {
                is_element(n, "img")
                    && attr_value(n, "class")
                        .map(|c| {
                            let c = c.to_lowercase();
                            ["featured", "hero", "post-thumbnail"].iter().any(|p| c.contains(p))
                        })
                        .unwrap_or(false)
            })
            .and_then(|img| image_source(&img))
        })?;

    resolve_url(page_url, &candidate)
}

/// 提取正文图片，按出现顺序去重，跳过头像、图标等装饰图片和过小的图片
pub fn extract_images(root: &Handle, page_url: &Url) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for img in find_all(root, |n| is_element(n, "img")) {
        let Some(src) = image_source(&img) else {
            continue;
        };
        let lower = src.to_lowercase();
        if DECORATIVE_IMAGE_WORDS.iter().any(|w| lower.contains(w)) {
            continue;
        }
        if is_small_image(&img) {
            continue;
        }
        let Some(url) = resolve_url(page_url, &src) else {
            continue;
        };
        if seen.insert(url.clone()) {
            images.push(ImageRef {
                url,
                alt: attr_value(&img, "alt").unwrap_or_default(),
            });
        }
    }

    images
}

/// 提取 JSON-LD 中的 schema.org Recipe 数据（支持 `@graph` 和数组形式）
pub fn extract_recipe_schema(document: &Handle) -> Option<RecipeSchema> {
    let scripts = find_all(document, |n| {
        is_element(n, "script")
            && attr_value(n, "type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
    });

    for script in scripts {
        let raw = text_content(&script);
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                debug!("跳过无法解析的JSON-LD: {}", e);
                continue;
            }
        };
        if let Some(recipe) = find_recipe_node(&value) {
            return Some(recipe_schema_from(recipe));
        }
    }

    None
}

/// 按选择器优先级查找正文容器
pub fn find_content_node(document: &Handle) -> Option<Handle> {
    CONTENT_SELECTORS.iter().find_map(|selector| {
        find_first(document, |n| match selector {
            ContentSelector::Class(class) => (is_element(n, "div") || is_element(n, "article")) && has_class(n, class),
            ContentSelector::Id(id) => {
                (is_element(n, "div") || is_element(n, "article")) && attr_value(n, "id").as_deref() == Some(*id)
            }
            ContentSelector::Tag(tag) => is_element(n, tag),
        })
    })
}

/// 清理正文：删除无关元素和空元素，精简属性，相对链接改为绝对地址（原地修改）
pub fn clean_content(node: &Handle, page_url: &Url) {
    node.children.borrow_mut().retain(|child| !is_noise(child));

    for child in node.children.borrow().iter() {
        clean_content(child, page_url);
    }

    node.children.borrow_mut().retain(|child| !is_empty_element(child));
    sanitize_attributes(node, page_url);
}

/// 序列化单个节点（包括节点本身）为HTML
pub fn serialize_node(node: &Handle) -> Result<String> {
    use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
    use markup5ever_rcdom::SerializableHandle;

    let mut buffer = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    serialize(&mut buffer, &SerializableHandle::from(node.clone()), opts)
        .map_err(|e| pipeline_error!(parse, "html", format!("HTML序列化失败: {:?}", e)))?;

    String::from_utf8(buffer).map_err(|e| pipeline_error!(parse, "html", format!("UTF-8转换失败: {}", e)))
}

/// 节点下全部文本（按文档顺序拼接）
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { ref contents } = node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

fn count_text_words(node: &Handle) -> usize {
    text_content(node).split_whitespace().count()
}

/// 找不到正文容器时，把顶层的块级元素收集到一个新文档的 div 中
fn fallback_document(document: &Handle) -> Result<Option<RcDom>> {
    let mut blocks = Vec::new();
    collect_top_level(document, &mut blocks);
    if blocks.is_empty() {
        return Ok(None);
    }

    let mut wrapped = String::from("<div>");
    for block in &blocks {
        wrapped.push_str(&serialize_node(block)?);
    }
    wrapped.push_str("</div>");

    parse_html(&wrapped).map(Some)
}

fn collect_top_level(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if FALLBACK_BLOCK_TAGS.iter().any(|tag| is_element(child, tag)) {
            out.push(child.clone());
        } else if !REMOVE_TAGS.iter().any(|tag| is_element(child, tag)) {
            collect_top_level(child, out);
        }
    }
}

fn is_noise(node: &Handle) -> bool {
    match node.data {
        NodeData::Comment { .. } => true,
        NodeData::Element { ref name, .. } => {
            let tag = name.local.as_ref();
            REMOVE_TAGS.contains(&tag) || attr_value(node, "class").map(|c| is_noise_class(&c)).unwrap_or(false)
        }
        _ => false,
    }
}

fn is_noise_class(class_attr: &str) -> bool {
    class_attr.split_whitespace().any(|token| {
        let token = token.to_lowercase();
        NOISE_CLASS_FRAGMENTS.iter().any(|f| token.contains(f))
            || token.split(['-', '_']).any(|word| NOISE_CLASS_WORDS.contains(&word))
    })
}

fn is_empty_element(node: &Handle) -> bool {
    match node.data {
        NodeData::Element { ref name, .. } => {
            let tag = name.local.as_ref();
            !KEEP_EMPTY_TAGS.contains(&tag)
                && text_content(node).trim().is_empty()
                && find_first(node, |n| is_element(n, "img")).is_none()
        }
        _ => false,
    }
}

fn sanitize_attributes(node: &Handle, page_url: &Url) {
    let NodeData::Element { ref name, ref attrs, .. } = node.data else {
        return;
    };

    match name.local.as_ref() {
        "img" => {
            let src = image_source(node);
            let alt = attr_value(node, "alt").filter(|a| !a.is_empty());
            let mut cleaned = Vec::new();
            if let Some(src) = src {
                cleaned.push(html_attribute("src", &src));
            }
            if let Some(alt) = alt {
                cleaned.push(html_attribute("alt", &alt));
            }
            cleaned.push(html_attribute("loading", "lazy"));
            *attrs.borrow_mut() = cleaned;
        }
        "a" => {
            let mut attrs = attrs.borrow_mut();
            attrs.retain(|attr| attr.name.local.as_ref() == "href" && !attr.value.is_empty());
            for attr in attrs.iter_mut() {
                if let Some(absolute) = absolutize_href(&attr.value, page_url) {
                    attr.value = absolute.into();
                }
            }
        }
        _ => {
            attrs.borrow_mut().retain(|attr| attr.name.local.as_ref() != "style");
        }
    }
}

fn html_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: value.into(),
    }
}

/// 图片地址：src 为空或是 data: 占位图时改用懒加载属性
fn image_source(img: &Handle) -> Option<String> {
    let candidates = ["src", "data-src", "data-lazy-src"];
    let values: Vec<String> = candidates
        .iter()
        .filter_map(|name| attr_value(img, name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    values
        .iter()
        .find(|v| !v.starts_with("data:"))
        .or_else(|| values.first())
        .cloned()
}

fn is_small_image(img: &Handle) -> bool {
    let width = attr_value(img, "width").map(|w| w.trim().parse::<u32>());
    let height = attr_value(img, "height").map(|h| h.trim().parse::<u32>());
    match (width, height) {
        (Some(Err(_)), _) | (_, Some(Err(_))) => false,
        (w, h) => {
            let w = w.and_then(|r| r.ok()).unwrap_or(999);
            let h = h.and_then(|r| r.ok()).unwrap_or(999);
            w <= 100 || h <= 100
        }
    }
}

fn meta_content(document: &Handle, key: &str, value: &str) -> Option<String> {
    find_all(document, |n| is_element(n, "meta"))
        .into_iter()
        .filter(|meta| {
            attr_value(meta, key)
                .map(|v| v.trim().eq_ignore_ascii_case(value))
                .unwrap_or(false)
        })
        .filter_map(|meta| attr_value(&meta, "content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// 相对链接解析为绝对地址；已带协议、协议相对和页内锚点链接保持原样（返回 None）
fn absolutize_href(href: &str, page_url: &Url) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.starts_with('#') || trimmed.starts_with("//") || Url::parse(trimmed).is_ok() {
        return None;
    }
    resolve_url(page_url, trimmed)
}

fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

fn find_recipe_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_recipe_node),
        Value::Object(map) => {
            if map.get("@type").map(is_recipe_type).unwrap_or(false) {
                return Some(value);
            }
            map.get("@graph").and_then(find_recipe_node)
        }
        _ => None,
    }
}

fn is_recipe_type(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "Recipe",
        Value::Array(items) => items.iter().any(|v| v.as_str() == Some("Recipe")),
        _ => false,
    }
}

fn recipe_schema_from(recipe: &Value) -> RecipeSchema {
    let text = |key: &str| recipe.get(key).and_then(json_text);

    let ingredients = match recipe.get("recipeIngredient") {
        Some(Value::Array(items)) => items.iter().filter_map(json_text).collect(),
        Some(other) => json_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    let mut instructions = Vec::new();
    if let Some(value) = recipe.get("recipeInstructions") {
        collect_instructions(value, &mut instructions);
    }

    RecipeSchema {
        name: text("name"),
        description: text("description"),
        prep_time: text("prepTime"),
        cook_time: text("cookTime"),
        total_time: text("totalTime"),
        recipe_yield: text("recipeYield"),
        ingredients,
        instructions,
    }
}

/// HowToStep / HowToSection / 纯字符串三种写法展开为步骤文本
fn collect_instructions(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = collapse_whitespace(s);
            if !s.is_empty() {
                out.push(s);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_instructions(item, out)),
        Value::Object(map) => {
            if let Some(steps) = map.get("itemListElement") {
                collect_instructions(steps, out);
            } else if let Some(text) = map.get("text").or_else(|| map.get("name")) {
                collect_instructions(text, out);
            }
        }
        _ => {}
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(json_text),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_element(node: &Handle, tag: &str) -> bool {
    matches!(node.data, NodeData::Element { ref name, .. } if name.local.as_ref() == tag)
}

fn attr_value(node: &Handle, name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn has_class(node: &Handle, class: &str) -> bool {
    attr_value(node, "class")
        .map(|c| c.split_whitespace().any(|token| token.eq_ignore_ascii_case(class)))
        .unwrap_or(false)
}

/// 文档顺序（先序）查找第一个满足条件的节点，不含根节点本身
fn find_first<F>(root: &Handle, pred: F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        if pred(&node) {
            return Some(node);
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
    None
}

/// 文档顺序查找全部满足条件的节点
fn find_all<F>(root: &Handle, pred: F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        if pred(&node) {
            found.push(node.clone());
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
    found
}
