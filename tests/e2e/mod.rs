//! 推送 SDK 端到端测试
//!
//! 以内存后端和模拟平台驱动完整的客户端，覆盖：
//! - 设备注册与订阅
//! - 离线标签队列与批量提交
//! - 通知接收、展示与交互路由
//! - 异步操作的单次回报

pub mod data;
pub mod helpers;
pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;
