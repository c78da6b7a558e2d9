//! URL slug 生成模块
//!
//! 根据已翻译的标题生成目标语言的 slug。整个过程不访问网络、不含随机性，
//! 相同输入总是得到相同输出，目标URL因此只取决于标题译文和语言。

// 第三方crate导入
use url::Url;

// 本地模块导入
use crate::domain_map::LangCode;

/// 由译文标题生成目标 slug
///
/// 规则：转小写 → 去除变音符号转为ASCII → 非字母数字字符连续段替换为单个连字符
/// → 去掉首尾连字符。若结果为空（例如标题全部是没有ASCII近似的字符），
/// 退回到 `{source_slug}-{lang}`。
///
/// # Examples
///
/// ```rust
/// use recipe_translator::domain_map::LangCode;
/// use recipe_translator::slug::translate_slug;
///
/// let slug = translate_slug("chocolate-muffins", "Muffins au Chocolat", LangCode::Fr);
/// assert_eq!(slug, "muffins-au-chocolat");
/// ```
pub fn translate_slug(source_slug: &str, translated_title: &str, lang: LangCode) -> String {
    let candidate = slugify(translated_title);
    if !candidate.is_empty() {
        return candidate;
    }

    let fallback = slugify(&format!("{}-{}", source_slug, lang.as_str()));
    if fallback.is_empty() {
        lang.as_str().to_string()
    } else {
        fallback
    }
}

/// 把任意文本规范化为 slug（可能返回空字符串）
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        // 组合用变音符号直接丢弃，不作为分隔符
        if is_combining_mark(ch) {
            continue;
        }

        let folded = fold_to_ascii(ch);
        if folded.is_empty() {
            pending_hyphen = true;
            continue;
        }

        for c in folded.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c);
            } else {
                pending_hyphen = true;
            }
        }
    }

    slug
}

/// 判断 slug 是否合法：`^[a-z0-9]+(-[a-z0-9]+)*$`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// 提取URL路径的最后一个非空段作为源 slug
pub fn slug_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

fn is_combining_mark(ch: char) -> bool {
    matches!(ch, '\u{0300}'..='\u{036F}')
}

/// 单个（已小写的）字符转为ASCII近似；无法转换的返回空字符串
fn fold_to_ascii(ch: char) -> &'static str {
    if ch.is_ascii() {
        return ascii_str(ch);
    }

    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => "",
    }
}

fn ascii_str(ch: char) -> &'static str {
    const ALNUM: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
    match ALNUM.find(ch) {
        Some(idx) => &ALNUM[idx..idx + 1],
        // 其余ASCII字符都是分隔符
        None => "-",
    }
}
