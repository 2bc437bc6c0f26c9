//! Log store errors / 日志存储错误

use std::time::Duration;

use thiserror::Error;

/// Boxed error coming from the object storage client / 对象存储客户端错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by log store operations / 日志存储操作错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object is absent on download / 下载对象不存在
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Network or API failure talking to the endpoint / 与存储端通信失败
    #[error("{op} failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// Endpoint answered with a non-success status / 存储端返回非成功状态码
    #[error("{op} failed with HTTP {status}: {body}")]
    Http {
        op: &'static str,
        status: u16,
        body: String,
    },

    /// Readiness check failed / 就绪检查失败
    #[error("bucket {bucket} is not reachable: {source}")]
    Connectivity {
        bucket: String,
        #[source]
        source: BoxError,
    },

    /// Presigning a link failed / 预签名失败
    #[error("failed to presign {key}: {source}")]
    Signing {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid link expiry {0:?}, expected 1s..=7d")]
    InvalidExpiry(Duration),

    #[error("invalid object key {0:?}")]
    InvalidKey(String),

    /// Reading the upload source failed / 读取上传数据源失败
    #[error("failed to read upload source: {0}")]
    Source(#[from] std::io::Error),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn transport<E>(op: &'static str, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Transport { op, source: err.into() }
    }

    pub fn http(op: &'static str, status: u16, body: impl Into<String>) -> Self {
        StoreError::Http { op, status, body: body.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::http("delete", 500, "InternalError");
        assert_eq!(err.to_string(), "delete failed with HTTP 500: InternalError");

        let err = StoreError::NotFound { key: "logs/a".to_string() };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object not found: logs/a");

        let err = StoreError::transport("list", "connection reset");
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "list failed: connection reset");
    }
}
