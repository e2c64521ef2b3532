//! 推送通知客户端 SDK
//!
//! 应用通过 `PushClient` 注册设备、管理标签、接收通知并响应用户交互。
//!
//! - `envelope`：推送消息解析与展示策略
//! - `router`：接收与交互回调的路由、去重
//! - `registration`：设备注册状态机
//! - `tags`：带离线缓冲的标签变更队列
//! - `completion`：异步操作的单次结果回报
//! - `backend` / `platform`：后端传输与平台协作方
//! - `client`：对外入口

pub mod backend;
pub mod client;
pub mod completion;
pub mod email;
pub mod envelope;
pub mod platform;
pub mod registration;
pub mod router;
pub mod store;
pub mod tags;
pub mod test_utils;

pub use backend::{HttpBackend, PushBackend, TagMap};
pub use client::{EventSender, PushClient, PushClientBuilder};
pub use completion::{Completion, Ticket};
pub use envelope::{
    ActionButton, ActionType, AppState, DisplayType, Notification, NotificationAction,
    NotificationPayload, NotificationResult, ReceiveDecision,
};
pub use platform::{Capabilities, Location, NotificationCenterDelegate, Platform, PresentationOptions};
pub use push_shared::error::{ErrorKind, PushError, Result};
pub use push_shared::observability::{LogLevel, set_log_level};
pub use registration::{DeviceIdentity, RegistrationState};
pub use router::{ActionHandler, ReceivedHandler, UserInteraction};
pub use store::{JsonFileTagStore, MemoryTagStore, TagStore};
pub use tags::TagResult;

/// SDK 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
