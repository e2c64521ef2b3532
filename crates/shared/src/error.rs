//! 统一错误处理模块
//!
//! 定义 SDK 对外暴露的结构化错误：错误类别 + 描述信息 + 可选的底层原因。
//! 失败回调、同步校验和内部日志都使用同一个错误类型。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 错误类别
///
/// 调用方依据类别区分可重试的网络故障与终态的后端拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedPayload,
    NotRegistered,
    NetworkFailure,
    BackendRejected,
    InternalInconsistency,
    Unsupported,
    InvalidState,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::NotRegistered => "NOT_REGISTERED",
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::BackendRejected => "BACKEND_REJECTED",
            Self::InternalInconsistency => "INTERNAL_INCONSISTENCY",
            Self::Unsupported => "UNSUPPORTED",
            Self::InvalidState => "INVALID_STATE",
            Self::Config => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SDK 错误类型
///
/// 实现 `Clone`：一次批量提交失败需要分别回报给多个等待中的调用方。
/// 底层原因以文本形式保留，避免把传输层的错误类型泄漏到公共接口。
#[derive(Debug, Clone, Error)]
pub enum PushError {
    // ==================== 输入错误 ====================
    #[error("推送消息格式错误: {reason}")]
    MalformedPayload {
        reason: String,
        cause: Option<String>,
    },

    // ==================== 状态错误 ====================
    #[error("设备尚未完成注册: {operation}")]
    NotRegistered { operation: String },

    #[error("非法的注册状态转换: {from} -> {to}")]
    InvalidState { from: String, to: String },

    // ==================== 后端错误 ====================
    #[error("网络请求失败: {message}")]
    NetworkFailure {
        message: String,
        cause: Option<String>,
    },

    #[error("后端拒绝请求: status={status}, {message}")]
    BackendRejected { status: u16, message: String },

    // ==================== 平台错误 ====================
    #[error("平台不支持该能力: {capability}")]
    Unsupported { capability: String },

    // ==================== 通用错误 ====================
    #[error("内部状态不一致: {0}")]
    InternalInconsistency(String),

    #[error("配置错误: {0}")]
    Config(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PushError>;

impl From<config::ConfigError> for PushError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl PushError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn malformed_with_cause(reason: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn not_registered(operation: impl Into<String>) -> Self {
        Self::NotRegistered {
            operation: operation.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
            cause: None,
        }
    }

    pub fn network_with_cause(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::NetworkFailure {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            status,
            message: message.into(),
        }
    }

    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::NotRegistered { .. } => ErrorKind::NotRegistered,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::BackendRejected { .. } => ErrorKind::BackendRejected,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::InternalInconsistency(_) => ErrorKind::InternalInconsistency,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// 底层原因（如传输层错误描述）
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::MalformedPayload { cause, .. } | Self::NetworkFailure { cause, .. } => {
                cause.as_deref()
            }
            _ => None,
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有传输层故障可以重试；后端明确拒绝的请求重发也不会成功。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. })
    }
}
