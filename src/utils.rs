use tracing::warn;
use url::Url;

use crate::error::Result;
use crate::pipeline_error;

/// 初始化日志系统
pub fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// 验证源URL：必须是带主机名的 http/https 绝对地址
pub fn validate_source_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(pipeline_error!(parse, "url", "URL不能为空"));
    }

    let url = Url::parse(trimmed).map_err(|e| pipeline_error!(parse, trimmed, format!("URL格式无效: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(pipeline_error!(parse, trimmed, "URL必须以http://或https://开头"));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(pipeline_error!(parse, trimmed, "URL缺少主机名"));
    }

    Ok(url)
}

/// 根据源URL生成输出文件名：`{slug}.json`，根路径使用 `{host}_index.json`
pub fn output_filename(source_url: &str) -> String {
    let (host, page_name) = match Url::parse(source_url) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("recipe").to_string();
            let page = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string));
            (host, page)
        }
        Err(_) => {
            warn!("⚠️ 无法解析URL，使用默认文件名: {}", source_url);
            ("recipe".to_string(), None)
        }
    };

    let stem = match page_name {
        // 移除文件扩展名（如果有的话）
        Some(page) => match page.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => page[..dot_pos].to_string(),
            _ => page,
        },
        None => format!("{}_index", host),
    };

    // 清理文件名中的非法字符
    let safe_stem: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
        .collect();

    format!("{}.json", safe_stem)
}

/// 截断过长文本用于日志和错误信息
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_url() {
        assert!(validate_source_url("https://allmuffins.com/chocolate-muffins/").is_ok());
        assert!(validate_source_url("  http://allmuffins.com/a ").is_ok());

        for bad in ["", "   ", "allmuffins.com/a", "ftp://allmuffins.com/a", "mailto:hi@allmuffins.com"] {
            let err = validate_source_url(bad).unwrap_err();
            assert_eq!(err.kind(), "parse", "input {:?}", bad);
        }
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("https://allmuffins.com/chocolate-muffins/"), "chocolate-muffins.json");
        assert_eq!(output_filename("https://allmuffins.com/recipes/banana.html"), "banana.json");
        assert_eq!(output_filename("https://allmuffins.com/"), "allmuffins.com_index.json");
        assert_eq!(output_filename("https://allmuffins.com/a%20b"), "a_20b.json");
        assert_eq!(output_filename("not a url"), "recipe_index.json");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("muffins au chocolat", 7), "muffins...");
        assert_eq!(truncate_for_log("crème", 3), "crè...");
    }
}
