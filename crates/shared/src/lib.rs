//! 共享库
//!
//! 推送 SDK 各组件共用的基础设施：错误类型、配置加载、重试策略与可观测性初始化。

pub mod config;
pub mod error;
pub mod observability;
pub mod retry;
