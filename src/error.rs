//! Sentence Deck 统一错误类型
//!
//! 单条目级错误（传输/解析/校验/合成）在批处理内部被记录为警告并跳过，
//! 只有打包失败会作为硬错误返回给调用方。

use serde::Serialize;
use thiserror::Error;

/// 流水线统一错误类型
#[derive(Debug, Error, Serialize)]
pub enum DeckError {
    /// 外部调用直接失败（鉴权、限流、网络、响应格式异常），不重试
    #[error("Transport error: {0}")]
    Transport(String),

    /// 模型输出不是合法的结构化数据（计入重试次数）
    #[error("Parse error: {0}")]
    Parse(String),

    /// 解析成功但未通过语言特征校验（计入重试次数）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 重试次数耗尽，该词条被丢弃
    #[error("Exhausted retries for '{word}' after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        word: String,
        attempts: usize,
        last_error: String,
    },

    /// 单句语音合成失败，该笔记被跳过
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// 牌组打包失败（整次构建失败，但临时文件仍会被清理）
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// 配置缺失或无效
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(String),
}

impl DeckError {
    /// 是否属于校验层重试范围（只有"能解析但语言不对"或"解析失败"才重试）
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeckError::Parse(_) | DeckError::Validation(_))
    }

    /// 稳定的错误码，便于上层展示层按类型区分
    pub fn code(&self) -> &'static str {
        match self {
            DeckError::Transport(_) => "TRANSPORT_ERROR",
            DeckError::Parse(_) => "PARSE_ERROR",
            DeckError::Validation(_) => "VALIDATION_ERROR",
            DeckError::ExhaustedRetries { .. } => "EXHAUSTED_RETRIES",
            DeckError::Synthesis(_) => "SYNTHESIS_ERROR",
            DeckError::Packaging(_) => "PACKAGING_ERROR",
            DeckError::Configuration(_) => "CONFIGURATION_ERROR",
            DeckError::InvalidInput(_) => "INVALID_INPUT",
            DeckError::Io(_) => "IO_ERROR",
        }
    }
}

// 从 rusqlite::Error 转换
impl From<rusqlite::Error> for DeckError {
    fn from(e: rusqlite::Error) -> Self {
        DeckError::Packaging(format!("collection database: {}", e))
    }
}

// 从 zip 错误转换
impl From<zip::result::ZipError> for DeckError {
    fn from(e: zip::result::ZipError) -> Self {
        DeckError::Packaging(format!("zip: {}", e))
    }
}

// 从 serde_json::Error 转换
impl From<serde_json::Error> for DeckError {
    fn from(e: serde_json::Error) -> Self {
        DeckError::Parse(e.to_string())
    }
}

// 从 std::io::Error 转换
impl From<std::io::Error> for DeckError {
    fn from(e: std::io::Error) -> Self {
        DeckError::Io(e.to_string())
    }
}

// 从 reqwest::Error 转换
impl From<reqwest::Error> for DeckError {
    fn from(e: reqwest::Error) -> Self {
        DeckError::Transport(e.to_string())
    }
}

/// Result 类型别名
pub type DeckResult<T> = Result<T, DeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeckError::Validation("sentence 2 is not German".to_string());
        assert_eq!(err.to_string(), "Validation error: sentence 2 is not German");

        let err = DeckError::ExhaustedRetries {
            word: "koşmak".to_string(),
            attempts: 3,
            last_error: "Parse error: EOF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Exhausted retries for 'koşmak' after 3 attempts: Parse error: EOF"
        );
    }

    #[test]
    fn test_only_parse_and_validation_are_retryable() {
        assert!(DeckError::Parse("x".into()).is_retryable());
        assert!(DeckError::Validation("x".into()).is_retryable());
        assert!(!DeckError::Transport("x".into()).is_retryable());
        assert!(!DeckError::Synthesis("x".into()).is_retryable());
        assert!(!DeckError::Packaging("x".into()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DeckError::Transport("x".into()).code(), "TRANSPORT_ERROR");
        assert_eq!(DeckError::Io("x".into()).code(), "IO_ERROR");
    }
}
