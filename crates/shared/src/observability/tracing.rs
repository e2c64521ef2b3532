//! 日志初始化
//!
//! 组合 `EnvFilter` 与 fmt 层；过滤器包装在 reload 层中，以支持运行时调整级别。

use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
};

use super::LogLevel;
use crate::config::ObservabilityConfig;

/// 全局过滤器句柄，供 `set_log_level` 使用
static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Tracing 资源守卫
pub struct TracingGuard {
    _private: (),
}

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先于配置中的级别。重复初始化返回错误而不是 panic。
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let fmt_layer = if config.json_logs() {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    let _ = FILTER_HANDLE.set(handle);

    Ok(TracingGuard { _private: () })
}

/// 替换当前的过滤级别
pub(crate) fn reload_level(level: LogLevel) -> Result<()> {
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| anyhow!("日志系统尚未初始化"))?;
    handle.reload(EnvFilter::new(level.as_directive()))?;
    Ok(())
}
