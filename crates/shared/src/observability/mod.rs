//! 统一可观测性模块
//!
//! 日志初始化、运行时日志级别调整，以及 SDK 内部指标的记录函数。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

use crate::config::ObservabilityConfig;

/// SDK 日志级别
///
/// 与宿主应用习惯的七级日志对应，映射到 `EnvFilter` 指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl LogLevel {
    /// 转换为 tracing 过滤指令
    ///
    /// tracing 没有 fatal 级别，Fatal 与 Error 使用同一过滤级别。
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Fatal | Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Verbose => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "verbose" | "trace" => Ok(Self::Verbose),
            other => Err(format!("未知的日志级别: {other}")),
        }
    }
}

/// 可观测性资源守卫
pub struct ObservabilityGuard {
    _tracing_guard: Option<tracing::TracingGuard>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用日志时）
    pub fn empty() -> Self {
        Self {
            _tracing_guard: None,
        }
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if self._tracing_guard.is_some() {
            info!("Shutting down observability...");
        }
    }
}

/// 初始化日志与指标描述
///
/// 指标只通过 `metrics` facade 记录，是否导出由宿主应用安装的 recorder 决定。
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing_guard = tracing::init(config)?;
    metrics::describe();

    info!(
        log_level = config.log_level.as_directive(),
        log_format = %config.log_format,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        _tracing_guard: Some(tracing_guard),
    })
}

/// 运行时调整日志级别
pub fn set_log_level(level: LogLevel) -> Result<()> {
    tracing::reload_level(level)
}
