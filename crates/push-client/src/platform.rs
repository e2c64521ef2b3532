//! 平台协作方
//!
//! SDK 不直接调用系统 API：权限请求、推送令牌、通知展示与定位都通过
//! `Platform` trait 交给宿主应用的平台胶水层实现。
//! 版本相关的能力（如通知中心代理）以 `Capabilities` 在运行时协商。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::{AppState, Notification, NotificationResult};

/// 平台在运行时声明的可选能力
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// 支持通知中心代理（前台展示选项与交互回执）
    pub notification_center: bool,
    /// 支持定位权限请求
    pub location: bool,
}

/// 地理位置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// 平台接口
#[async_trait]
pub trait Platform: Send + Sync {
    /// 上报给后端的设备类型
    fn device_type(&self) -> String {
        "unknown".to_string()
    }

    fn capabilities(&self) -> Capabilities;

    /// 当前应用生命周期状态
    fn app_state(&self) -> AppState;

    /// 弹出推送权限请求，返回用户是否授权
    async fn request_permission(&self) -> bool;

    /// 当前推送令牌；未授权或尚未分配时为 None
    async fn push_token(&self) -> Option<String>;

    /// 展示通知（原生通知或应用内弹窗，取决于展示方式）
    fn display(&self, notification: &Notification);

    /// 请求定位权限并返回当前位置
    async fn request_location(&self) -> Option<Location> {
        None
    }
}

/// 前台展示选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationOptions {
    pub alert: bool,
    pub sound: bool,
    pub badge: bool,
}

impl PresentationOptions {
    pub fn all() -> Self {
        Self {
            alert: true,
            sound: true,
            badge: true,
        }
    }

    pub fn none() -> Self {
        Self {
            alert: false,
            sound: false,
            badge: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.alert || self.sound || self.badge)
    }
}

/// 通知中心代理
///
/// 在应用自己的回调之后被调用；只有声明了 `notification_center` 能力的平台才能设置。
pub trait NotificationCenterDelegate: Send + Sync {
    /// 决定一条即将展示的通知使用哪些展示选项；返回空选项表示不展示
    fn will_present(&self, _notification: &Notification) -> PresentationOptions {
        PresentationOptions::all()
    }

    fn did_receive_response(&self, _result: &NotificationResult) {}
}
