//! 统一错误处理模块
//!
//! 定义食谱翻译流水线的错误分类。只有配置错误是致命的，
//! 其余错误都被限制在单个食谱或单个（食谱, 语言）单元内。

// 标准库导入
use std::fmt;

// 第三方crate导入
use anyhow::Error as AnyhowError;

/// 流水线统一错误类型
#[derive(Debug)]
pub enum PipelineError {
    /// 配置错误（未知语言、缺少凭据、域名冲突等），终止整个运行
    Configuration {
        /// 配置项名称
        field: String,
        /// 错误原因
        reason: String,
    },

    /// 网络抓取错误（连接失败、超时、非成功状态码）
    Fetch {
        /// 请求地址
        url: String,
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 页面结构或数据格式不符合预期
    Parse {
        /// 出错的来源（URL或文档名）
        source: String,
        /// 具体错误信息
        details: String,
    },

    /// 翻译服务错误（认证失败、限流、响应格式错误）
    Translation {
        /// 目标语言代码
        lang: String,
        /// 错误消息
        message: String,
        /// API响应状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 链接改写错误，正常输入下不应出现
    Adaptation {
        /// 具体错误信息
        details: String,
    },

    /// 文件操作错误
    FileOperation {
        /// 文件路径
        path: String,
        /// 操作类型（读取、写入、创建等）
        operation: String,
        /// 底层错误信息
        source: String,
    },

    /// 内部处理错误（包装anyhow::Error）
    Internal {
        /// 包装的错误
        source: AnyhowError,
    },
}

impl PipelineError {
    /// 是否为致命错误（需要终止整个运行）
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Configuration { .. })
    }

    /// 简短的错误类别名，用于汇总报告
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration { .. } => "configuration",
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Parse { .. } => "parse",
            PipelineError::Translation { .. } => "translation",
            PipelineError::Adaptation { .. } => "adaptation",
            PipelineError::FileOperation { .. } => "file",
            PipelineError::Internal { .. } => "internal",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration { field, reason } => {
                write!(f, "配置错误 [{}]: {}", field, reason)
            }
            PipelineError::Fetch { url, message, status_code } => {
                if let Some(code) = status_code {
                    write!(f, "页面抓取失败 [{}] {}: {}", code, url, message)
                } else {
                    write!(f, "页面抓取失败 {}: {}", url, message)
                }
            }
            PipelineError::Parse { source, details } => {
                write!(f, "解析失败 [{}]: {}", source, details)
            }
            PipelineError::Translation { lang, message, status_code } => {
                if let Some(code) = status_code {
                    write!(f, "翻译失败 [{}] ({}): {}", lang, code, message)
                } else {
                    write!(f, "翻译失败 [{}]: {}", lang, message)
                }
            }
            PipelineError::Adaptation { details } => {
                write!(f, "链接改写失败: {}", details)
            }
            PipelineError::FileOperation { path, operation, source } => {
                write!(f, "文件{}操作失败 [{}]: {}", operation, path, source)
            }
            PipelineError::Internal { source } => {
                write!(f, "内部处理错误: {}", source)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Internal { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// 流水线结果类型别名
pub type Result<T> = std::result::Result<T, PipelineError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! pipeline_error {
    (config, $field:expr, $reason:expr) => {
        $crate::error::PipelineError::Configuration {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
    (fetch, $url:expr, $msg:expr) => {
        $crate::error::PipelineError::Fetch {
            url: $url.to_string(),
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (fetch, $url:expr, $msg:expr, $code:expr) => {
        $crate::error::PipelineError::Fetch {
            url: $url.to_string(),
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (parse, $source:expr, $details:expr) => {
        $crate::error::PipelineError::Parse {
            source: $source.to_string(),
            details: $details.to_string(),
        }
    };
    (translation, $lang:expr, $msg:expr) => {
        $crate::error::PipelineError::Translation {
            lang: $lang.to_string(),
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (translation, $lang:expr, $msg:expr, $code:expr) => {
        $crate::error::PipelineError::Translation {
            lang: $lang.to_string(),
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (file_op, $path:expr, $op:expr, $source:expr) => {
        $crate::error::PipelineError::FileOperation {
            path: $path.to_string(),
            operation: $op.to_string(),
            source: $source.to_string(),
        }
    };
}

/// 从anyhow::Error转换为PipelineError
impl From<AnyhowError> for PipelineError {
    fn from(error: AnyhowError) -> Self {
        PipelineError::Internal { source: error }
    }
}

/// 从reqwest::Error转换为PipelineError
impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        let url = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        PipelineError::Fetch {
            url,
            message: error.to_string(),
            status_code,
        }
    }
}

/// 从std::io::Error转换为PipelineError
impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::FileOperation {
            path: "unknown".to_string(),
            operation: "io".to_string(),
            source: error.to_string(),
        }
    }
}

/// 从serde_json::Error转换为PipelineError
impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Parse {
            source: "json".to_string(),
            details: error.to_string(),
        }
    }
}
