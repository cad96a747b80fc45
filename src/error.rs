use thiserror::Error;

/// 去重引擎错误
#[derive(Debug, Error)]
pub enum DedupError {
    /// 存储读写失败，可重试；绝不能被当作 "unique" 结论吞掉
    #[error("duplicate-check failed: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// 权重/阈值配置错误，启动时即失败
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Input(String),
}

impl DedupError {
    /// 调用方据此决定是否重试 (重试策略属于调用方的任务层)
    pub fn is_retryable(&self) -> bool {
        matches!(self, DedupError::Storage(_))
    }
}

impl From<sqlx::Error> for DedupError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DedupError::NotFound(error.to_string()),
            other => DedupError::Storage(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for DedupError {
    fn from(error: config::ConfigError) -> Self {
        DedupError::Config(error.to_string())
    }
}

pub type DedupResult<T> = Result<T, DedupError>;
