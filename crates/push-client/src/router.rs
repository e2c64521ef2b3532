//! 通知路由
//!
//! 两个入口：接收（推送到达）与交互（用户点击通知或按钮）。
//! 路由器由分发任务独占，所有事件串行处理，因此某条通知的交互回调
//! 一定在它的接收回调返回之后才会触发。
//!
//! - 接收：去重 → 构造 `Notification` → 同步调用接收回调（可否决展示）
//!   → 通知中心代理 → 平台展示
//! - 交互：构造 `NotificationAction` 与 `NotificationResult` → 交互回调，
//!   每条通知最多一次

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use push_shared::config::RouterConfig;
use push_shared::error::{PushError, Result};
use push_shared::observability::metrics::{record_notification_action, record_notification_received};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::envelope::{
    AppState, Notification, NotificationAction, NotificationPayload, NotificationResult,
    ReceiveDecision,
};
use crate::platform::{NotificationCenterDelegate, Platform};

/// 接收回调，返回是否展示
pub type ReceivedHandler = Arc<dyn Fn(&Notification) -> ReceiveDecision + Send + Sync>;

/// 交互回调
pub type ActionHandler = Arc<dyn Fn(NotificationResult) + Send + Sync>;

// ---------------------------------------------------------------------------
// RecentCache
// ---------------------------------------------------------------------------

/// 有容量上限、可选时间窗口的最近记录集合
///
/// 超过窗口的条目视为不存在；超过容量时淘汰最早写入的条目。
pub struct RecentCache<V> {
    capacity: usize,
    window: Option<Duration>,
    entries: HashMap<String, (Instant, V)>,
    /// 写入顺序；同一个键被重写后旧位置作废，淘汰时跳过
    order: VecDeque<(String, Instant)>,
}

impl<V> RecentCache<V> {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window: Some(window),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// 只按容量淘汰，条目不会过期
    pub fn bounded(capacity: usize) -> Self {
        Self {
            window: None,
            ..Self::new(capacity, Duration::ZERO)
        }
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.expire();
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.expire();
        let key = key.into();
        let now = Instant::now();
        self.entries.insert(key.clone(), (now, value));
        self.order.push_back((key, now));

        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some((oldest, at)) => self.remove_if_current(&oldest, at),
                None => break,
            }
        }
        if self.order.len() > self.capacity * 2 {
            self.compact();
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.expire();
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn len(&mut self) -> usize {
        self.expire();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    fn expire(&mut self) {
        let Some(window) = self.window else {
            return;
        };
        let now = Instant::now();
        while let Some((_, at)) = self.order.front() {
            if now.duration_since(*at) < window {
                break;
            }
            if let Some((key, at)) = self.order.pop_front() {
                self.remove_if_current(&key, at);
            }
        }
    }

    fn remove_if_current(&mut self, key: &str, at: Instant) {
        if self.entries.get(key).is_some_and(|(written, _)| *written == at) {
            self.entries.remove(key);
        }
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(key, at)| entries.get(key).is_some_and(|(written, _)| written == at));
    }
}

// ---------------------------------------------------------------------------
// 事件
// ---------------------------------------------------------------------------

/// 平台上报的一次用户交互
#[derive(Debug, Clone)]
pub struct UserInteraction {
    pub notification_id: String,
    /// 点击的按钮；None 表示点击通知本身
    pub action_id: Option<String>,
    /// 平台随交互一并提供的原始内容（冷启动时路由器可能从未见过这条通知）
    pub payload: Option<NotificationPayload>,
    pub app_state: AppState,
}

impl UserInteraction {
    pub fn opened(notification_id: impl Into<String>, app_state: AppState) -> Self {
        Self {
            notification_id: notification_id.into(),
            action_id: None,
            payload: None,
            app_state,
        }
    }

    pub fn button(
        notification_id: impl Into<String>,
        action_id: impl Into<String>,
        app_state: AppState,
    ) -> Self {
        Self {
            notification_id: notification_id.into(),
            action_id: Some(action_id.into()),
            payload: None,
            app_state,
        }
    }

    /// 由原始推送消息构造，携带完整内容
    pub fn from_raw(raw: &Value, action_id: Option<String>, app_state: AppState) -> Result<Self> {
        let payload = NotificationPayload::parse(raw)?;
        Ok(Self {
            notification_id: payload.notification_id().to_string(),
            action_id,
            payload: Some(payload),
            app_state,
        })
    }
}

/// 接收结果
#[derive(Debug, Clone)]
pub enum ReceiveOutcome {
    Delivered(Notification),
    /// 窗口内重复投递，已忽略
    Duplicate,
}

/// 交互结果
#[derive(Debug)]
pub enum InteractionOutcome {
    /// 交互回调已执行
    Dispatched(NotificationResult),
    /// 未注册交互回调，交互被丢弃
    Unhandled(NotificationResult),
    /// 该通知已产生过一次交互
    Duplicate,
    /// 找不到对应的通知
    Orphaned,
    /// 交互本身不合法（如按钮 ID 为空）
    Invalid(PushError),
}

impl InteractionOutcome {
    pub fn result(&self) -> Option<&NotificationResult> {
        match self {
            Self::Dispatched(result) | Self::Unhandled(result) => Some(result),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRouter
// ---------------------------------------------------------------------------

/// 通知路由器
pub struct ActionRouter {
    in_app_alerts: bool,
    on_received: Option<ReceivedHandler>,
    on_action: Option<ActionHandler>,
    delegate: Option<Arc<dyn NotificationCenterDelegate>>,
    platform: Arc<dyn Platform>,
    /// 近期收到过的通知 ID，用于去重
    seen: RecentCache<()>,
    /// 已接收、等待用户交互的通知；不随去重窗口过期
    awaiting_action: RecentCache<Notification>,
    /// 已产生过交互的通知 ID
    acted: RecentCache<()>,
}

impl ActionRouter {
    pub fn new(
        config: &RouterConfig,
        in_app_alerts: bool,
        platform: Arc<dyn Platform>,
        on_received: Option<ReceivedHandler>,
        on_action: Option<ActionHandler>,
    ) -> Self {
        let tracked = config.tracked_notifications;
        Self {
            in_app_alerts,
            on_received,
            on_action,
            delegate: None,
            platform,
            seen: RecentCache::new(config.dedup_capacity, config.dedup_window()),
            awaiting_action: RecentCache::bounded(tracked),
            acted: RecentCache::bounded(tracked),
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn NotificationCenterDelegate>) {
        self.delegate = Some(delegate);
    }

    /// 处理一条到达的推送
    pub fn handle_received(
        &mut self,
        payload: NotificationPayload,
        app_state: AppState,
    ) -> ReceiveOutcome {
        let id = payload.notification_id().to_string();
        if self.seen.contains(&id) || self.awaiting_action.contains(&id) || self.acted.contains(&id)
        {
            debug!(notification_id = %id, "重复投递，忽略");
            record_notification_received("duplicate");
            return ReceiveOutcome::Duplicate;
        }

        let notification = self.deliver(payload, app_state, true);
        self.awaiting_action.insert(id, notification.clone());
        ReceiveOutcome::Delivered(notification)
    }

    /// 处理一次用户交互
    pub fn handle_interaction(&mut self, interaction: UserInteraction) -> InteractionOutcome {
        let UserInteraction {
            notification_id: id,
            action_id,
            payload,
            app_state,
        } = interaction;

        let action = match action_id {
            None => NotificationAction::Opened,
            Some(action_id) => match NotificationAction::action_taken(action_id) {
                Ok(action) => action,
                Err(e) => {
                    warn!(notification_id = %id, error = %e, "交互不合法，忽略");
                    return InteractionOutcome::Invalid(e);
                }
            },
        };
        let action_label = action.action_type().to_string();

        if self.acted.contains(&id) {
            debug!(notification_id = %id, "通知已产生过交互，忽略");
            record_notification_action(&action_label, "duplicate");
            return InteractionOutcome::Duplicate;
        }

        let notification = match self.awaiting_action.remove(&id) {
            Some(notification) => notification,
            None => match payload {
                // 冷启动：接收回调先于交互回调执行，但不再展示
                Some(payload) if !self.seen.contains(&id) => self.deliver(payload, app_state, false),
                Some(payload) => Notification::new(payload, app_state, self.in_app_alerts),
                None => {
                    let err = PushError::InternalInconsistency(format!(
                        "交互指向未知通知 {id}"
                    ));
                    error!(notification_id = %id, error = %err, "无法路由交互，已丢弃");
                    record_notification_action(&action_label, "orphaned");
                    return InteractionOutcome::Orphaned;
                }
            },
        };

        self.acted.insert(id.clone(), ());
        let result = NotificationResult::new(notification, action);

        let outcome = match &self.on_action {
            Some(handler) => {
                let handler = Arc::clone(handler);
                let delivered = result.clone();
                if catch_unwind(AssertUnwindSafe(|| handler(delivered))).is_err() {
                    error!(notification_id = %id, "交互回调 panic");
                }
                info!(notification_id = %id, action = %action_label, "交互已分发");
                record_notification_action(&action_label, "dispatched");
                InteractionOutcome::Dispatched(result)
            }
            None => {
                debug!(notification_id = %id, "未注册交互回调，丢弃交互");
                record_notification_action(&action_label, "no_handler");
                InteractionOutcome::Unhandled(result)
            }
        };

        if let (Some(delegate), Some(result)) = (&self.delegate, outcome.result()) {
            delegate.did_receive_response(result);
        }
        outcome
    }

    /// 构造通知并执行接收回调；`display` 为假时只回调不展示
    fn deliver(
        &mut self,
        payload: NotificationPayload,
        app_state: AppState,
        display: bool,
    ) -> Notification {
        let id = payload.notification_id().to_string();
        self.seen.insert(id.clone(), ());

        let mut notification = Notification::new(payload, app_state, self.in_app_alerts);

        if let Some(handler) = &self.on_received {
            let handler = Arc::clone(handler);
            match catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
                Ok(ReceiveDecision::Display) => {}
                Ok(ReceiveDecision::Suppress) => {
                    debug!(notification_id = %id, "接收回调否决展示");
                    notification = notification.suppressed();
                }
                Err(_) => error!(notification_id = %id, "接收回调 panic"),
            }
        }

        if display && notification.was_shown() {
            if let Some(delegate) = &self.delegate {
                if delegate.will_present(&notification).is_empty() {
                    debug!(notification_id = %id, "通知中心代理否决展示");
                    notification = notification.suppressed();
                }
            }
        }

        if display && notification.was_shown() {
            self.platform.display(&notification);
        }

        info!(
            notification_id = %id,
            display_type = %notification.display_type(),
            shown = notification.was_shown(),
            silent = notification.is_silent(),
            "通知已接收"
        );
        record_notification_received("delivered");
        notification
    }
}
