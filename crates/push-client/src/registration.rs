//! 设备注册状态机
//!
//! `Unregistered → Registering → Registered(subscribed | unsubscribed)`。
//! 注册失败回到 `Unregistered`，等待下一次权限请求或令牌刷新再次触发。
//! 状态通过 watch 通道广播，标签提交与邮箱同步等待进入 `Registered` 后执行。

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use push_shared::error::{PushError, Result};
use tokio::sync::watch;
use tracing::{info, warn};

/// 注册状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered { subscribed: bool },
}

impl RegistrationState {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::Registering => write!(f, "registering"),
            Self::Registered { subscribed: true } => write!(f, "registered(subscribed)"),
            Self::Registered { subscribed: false } => write!(f, "registered(unsubscribed)"),
        }
    }
}

/// 后端分配的用户 ID 与当前推送令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub user_id: String,
    pub push_token: Option<String>,
}

/// 用户 ID / 推送令牌可用回调
pub type IdsAvailableHandler = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// 注册状态与设备身份
pub struct Registration {
    state: watch::Sender<RegistrationState>,
    identity: Mutex<Option<DeviceIdentity>>,
    /// 调用方期望的订阅状态；注册前设置的值在注册完成时生效
    desired_subscription: Mutex<bool>,
    ids_handlers: Mutex<Vec<IdsAvailableHandler>>,
}

impl Registration {
    pub fn new(subscribed_by_default: bool) -> Self {
        let (state, _) = watch::channel(RegistrationState::Unregistered);
        Self {
            state,
            identity: Mutex::new(None),
            desired_subscription: Mutex::new(subscribed_by_default),
            ids_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.lock().clone()
    }

    /// 已注册时返回用户 ID
    pub fn player_id(&self) -> Option<String> {
        if !self.state().is_registered() {
            return None;
        }
        self.identity.lock().as_ref().map(|id| id.user_id.clone())
    }

    pub fn desired_subscription(&self) -> bool {
        *self.desired_subscription.lock()
    }

    /// Unregistered → Registering
    pub fn begin(&self) -> Result<()> {
        self.transition(RegistrationState::Registering, |from| {
            matches!(from, RegistrationState::Unregistered)
        })
    }

    /// Registering → Registered，并通知 ids 回调
    pub fn complete(&self, identity: DeviceIdentity) -> Result<()> {
        let subscribed = self.desired_subscription();
        // 先写入身份再广播状态，等待方被唤醒时总能读到身份
        let previous = self.identity.lock().replace(identity.clone());
        let result = self.transition(RegistrationState::Registered { subscribed }, |from| {
            matches!(from, RegistrationState::Registering)
        });
        if result.is_err() {
            *self.identity.lock() = previous;
            return result;
        }

        info!(
            user_id = %identity.user_id,
            has_push_token = identity.push_token.is_some(),
            subscribed,
            "设备注册完成"
        );
        self.notify_ids(&identity);
        Ok(())
    }

    /// Registering → Unregistered
    pub fn fail(&self) {
        if let Err(e) = self.transition(RegistrationState::Unregistered, |from| {
            matches!(from, RegistrationState::Registering)
        }) {
            warn!(error = %e, "忽略注册失败回退");
        }
    }

    /// 已注册状态下更新身份；变化时返回 true 并通知 ids 回调
    pub fn update_identity(&self, identity: DeviceIdentity) -> bool {
        if !self.state().is_registered() {
            return false;
        }
        {
            let mut current = self.identity.lock();
            if current.as_ref() == Some(&identity) {
                return false;
            }
            *current = Some(identity.clone());
        }
        info!(user_id = %identity.user_id, "设备身份已更新");
        self.notify_ids(&identity);
        true
    }

    /// 设置订阅状态，幂等
    ///
    /// 返回 true 表示已注册设备的订阅状态发生了变化，需要同步到后端。
    pub fn set_subscription(&self, enabled: bool) -> bool {
        *self.desired_subscription.lock() = enabled;
        self.state.send_if_modified(|state| match state {
            RegistrationState::Registered { subscribed } if *subscribed != enabled => {
                *subscribed = enabled;
                true
            }
            _ => false,
        })
    }

    /// 等待进入 Registered，返回当时的设备身份
    pub async fn wait_registered(&self) -> Result<DeviceIdentity> {
        let mut rx = self.state.subscribe();
        rx.wait_for(RegistrationState::is_registered)
            .await
            .map_err(|_| PushError::InternalInconsistency("注册状态通道已关闭".to_string()))?;
        self.identity()
            .ok_or_else(|| PushError::InternalInconsistency("已注册但缺少设备身份".to_string()))
    }

    /// 注册 ids 回调；已注册时立即回调一次
    pub fn on_ids_available(&self, handler: IdsAvailableHandler) {
        self.ids_handlers.lock().push(Arc::clone(&handler));
        if self.state().is_registered() {
            if let Some(identity) = self.identity() {
                handler(&identity.user_id, identity.push_token.as_deref());
            }
        }
    }

    fn notify_ids(&self, identity: &DeviceIdentity) {
        // 回调在锁外执行，允许回调内再注册新的回调
        let handlers = self.ids_handlers.lock().clone();
        for handler in handlers {
            handler(&identity.user_id, identity.push_token.as_deref());
        }
    }

    fn transition(
        &self,
        to: RegistrationState,
        allowed: impl Fn(&RegistrationState) -> bool,
    ) -> Result<()> {
        let mut rejected_from = None;
        self.state.send_if_modified(|state| {
            if allowed(state) {
                *state = to;
                true
            } else {
                rejected_from = Some(*state);
                false
            }
        });
        match rejected_from {
            None => Ok(()),
            Some(from) => Err(PushError::InvalidState {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}
