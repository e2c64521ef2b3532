//! 通知信封模型
//!
//! 把平台投递的原始推送消息解析为不可变的 `NotificationPayload`，
//! 再结合应用前后台状态与应用内弹窗配置决定展示方式，得到 `Notification`。
//! 用户交互产生的 `NotificationAction` 与通知配对后形成 `NotificationResult`。
//!
//! 原始消息格式：
//! ```text
//! { "aps":    { "alert": "text" | {"title","subtitle","body"}, "badge": n,
//!               "sound": "s", "content-available": 1 },
//!   "custom": { "i": "<通知 ID>", "u": "<启动 URL>",
//!               "a": { ...附加数据..., "actionButtons": [{"id","text"}] } },
//!   "att":    { "<附件 ID>": "<URL>" } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use push_shared::error::{PushError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// 附加数据中保留给按钮列表的键
const ACTION_BUTTONS_KEY: &str = "actionButtons";

// ---------------------------------------------------------------------------
// 枚举
// ---------------------------------------------------------------------------

/// 应用生命周期状态，由平台在投递时提供
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    /// 应用在前台
    Active,
    Background,
    NotRunning,
}

impl AppState {
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// 通知的展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayType {
    /// 系统原生通知
    Native,
    /// 应用自行渲染的弹窗
    InAppAlert,
    /// 静默通知，或应用在前台且关闭了应用内弹窗
    None,
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Native => "NATIVE",
            Self::InAppAlert => "IN_APP_ALERT",
            Self::None => "NONE",
        };
        write!(f, "{s}")
    }
}

/// 接收回调对展示的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveDecision {
    #[default]
    Display,
    /// 静音：不交给平台展示
    Suppress,
}

// ---------------------------------------------------------------------------
// NotificationPayload
// ---------------------------------------------------------------------------

/// 通知按钮
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    pub id: String,
    pub text: String,
}

/// 推送消息内容，构造后只读
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    notification_id: String,
    content_available: bool,
    badge: u32,
    sound: Option<String>,
    title: Option<String>,
    subtitle: Option<String>,
    body: Option<String>,
    #[serde(rename = "launchURL")]
    launch_url: Option<String>,
    additional_data: Option<Map<String, Value>>,
    attachments: Option<BTreeMap<String, String>>,
    action_buttons: Option<Vec<ActionButton>>,
    raw_payload: Value,
}

impl NotificationPayload {
    /// 从原始消息解析
    ///
    /// 缺少通知 ID、badge 不是非负整数或按钮定义不完整时返回 `MalformedPayload`。
    pub fn parse(raw: &Value) -> Result<Self> {
        let root = raw
            .as_object()
            .ok_or_else(|| PushError::malformed("推送消息必须是 JSON 对象"))?;

        let empty = Map::new();
        let aps = match root.get("aps") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(aps)) => aps,
            Some(_) => return Err(PushError::malformed("aps 必须是 JSON 对象")),
        };
        let custom = match root.get("custom") {
            Some(Value::Object(custom)) => custom,
            _ => return Err(PushError::malformed("缺少 custom 字段")),
        };

        let notification_id = custom
            .get("i")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PushError::malformed("缺少通知 ID (custom.i)"))?
            .to_string();

        let (title, subtitle, body) = match aps.get("alert") {
            Some(Value::String(text)) => (None, None, Some(text.clone())),
            Some(Value::Object(alert)) => (
                string_field(alert, "title"),
                string_field(alert, "subtitle"),
                string_field(alert, "body"),
            ),
            _ => (None, None, None),
        };

        let badge = match aps.get("badge") {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PushError::malformed(format!("badge 必须是非负整数: {value}")))?,
        };

        let content_available = match aps.get("content-available") {
            Some(Value::Bool(flag)) => *flag,
            Some(value) => value.as_u64() == Some(1),
            None => false,
        };

        let (additional_data, action_buttons) = match custom.get("a") {
            Some(Value::Object(data)) => {
                let mut data = data.clone();
                let buttons = data
                    .remove(ACTION_BUTTONS_KEY)
                    .map(|buttons| parse_buttons(&buttons))
                    .transpose()?;
                let data = if data.is_empty() { None } else { Some(data) };
                (data, buttons)
            }
            _ => (None, None),
        };

        let attachments = match root.get("att") {
            Some(Value::Object(att)) => Some(
                att.iter()
                    .filter_map(|(k, v)| v.as_str().map(|url| (k.clone(), url.to_string())))
                    .collect(),
            ),
            _ => None,
        };

        Ok(Self {
            notification_id,
            content_available,
            badge,
            sound: string_field(aps, "sound"),
            title,
            subtitle,
            body,
            launch_url: string_field(custom, "u"),
            additional_data,
            attachments,
            action_buttons,
            raw_payload: raw.clone(),
        })
    }

    pub fn notification_id(&self) -> &str {
        &self.notification_id
    }

    pub fn content_available(&self) -> bool {
        self.content_available
    }

    pub fn badge(&self) -> u32 {
        self.badge
    }

    pub fn sound(&self) -> Option<&str> {
        self.sound.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn launch_url(&self) -> Option<&str> {
        self.launch_url.as_deref()
    }

    pub fn additional_data(&self) -> Option<&Map<String, Value>> {
        self.additional_data.as_ref()
    }

    pub fn attachments(&self) -> Option<&BTreeMap<String, String>> {
        self.attachments.as_ref()
    }

    pub fn action_buttons(&self) -> Option<&[ActionButton]> {
        self.action_buttons.as_deref()
    }

    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }

    /// aps 中没有 alert、sound、badge 任何一项
    pub fn is_silent(&self) -> bool {
        let aps = self.raw_payload.get("aps").and_then(Value::as_object);
        match aps {
            Some(aps) => !["alert", "sound", "badge"]
                .iter()
                .any(|key| aps.get(*key).is_some_and(|v| !v.is_null())),
            None => true,
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_buttons(value: &Value) -> Result<Vec<ActionButton>> {
    let items = value
        .as_array()
        .ok_or_else(|| PushError::malformed("actionButtons 必须是数组"))?;

    items
        .iter()
        .map(|item| {
            let id = item.get("id").and_then(Value::as_str).filter(|s| !s.is_empty());
            let text = item.get("text").and_then(Value::as_str);
            match (id, text) {
                (Some(id), Some(text)) => Ok(ActionButton {
                    id: id.to_string(),
                    text: text.to_string(),
                }),
                _ => Err(PushError::malformed(format!("按钮定义不完整: {item}"))),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// 一条已接收的通知
///
/// 不变式：`silent` 为真时 `shown` 为假且展示方式为 `None`。
#[derive(Debug, Clone)]
pub struct Notification {
    payload: Arc<NotificationPayload>,
    display_type: DisplayType,
    shown: bool,
    silent: bool,
    received_at: DateTime<Utc>,
}

impl Notification {
    /// 解析原始消息并决定展示方式
    pub fn from_raw(raw: &Value, app_state: AppState, in_app_alerts: bool) -> Result<Self> {
        let payload = NotificationPayload::parse(raw)?;
        Ok(Self::new(payload, app_state, in_app_alerts))
    }

    pub fn new(payload: NotificationPayload, app_state: AppState, in_app_alerts: bool) -> Self {
        let silent = payload.is_silent();
        let display_type = resolve_display_type(silent, app_state, in_app_alerts);
        Self {
            payload: Arc::new(payload),
            display_type,
            shown: display_type != DisplayType::None,
            silent,
            received_at: Utc::now(),
        }
    }

    /// 接收回调否决展示后的通知
    pub(crate) fn suppressed(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            display_type: DisplayType::None,
            shown: false,
            silent: self.silent,
            received_at: self.received_at,
        }
    }

    pub fn payload(&self) -> &NotificationPayload {
        &self.payload
    }

    pub fn id(&self) -> &str {
        self.payload.notification_id()
    }

    pub fn display_type(&self) -> DisplayType {
        self.display_type
    }

    pub fn was_shown(&self) -> bool {
        self.shown
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// 展示策略
///
/// 前台且关闭应用内弹窗 → None；静默 → None；后台或未运行 → Native；其余 → InAppAlert。
pub fn resolve_display_type(silent: bool, app_state: AppState, in_app_alerts: bool) -> DisplayType {
    if app_state.is_foreground() && !in_app_alerts {
        return DisplayType::None;
    }
    if silent {
        return DisplayType::None;
    }
    if !app_state.is_foreground() {
        return DisplayType::Native;
    }
    DisplayType::InAppAlert
}

// ---------------------------------------------------------------------------
// NotificationAction / NotificationResult
// ---------------------------------------------------------------------------

/// 按钮 ID，保证非空
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PushError::malformed("按钮 ID 不能为空"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 交互类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Opened,
    ActionTaken,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::ActionTaken => write!(f, "action_taken"),
        }
    }
}

/// 用户对通知的一次交互
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    /// 点击通知本身
    Opened,
    /// 点击某个按钮
    ActionTaken { action_id: ActionId },
}

impl NotificationAction {
    pub fn action_taken(action_id: impl Into<String>) -> Result<Self> {
        Ok(Self::ActionTaken {
            action_id: ActionId::new(action_id)?,
        })
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Opened => ActionType::Opened,
            Self::ActionTaken { .. } => ActionType::ActionTaken,
        }
    }

    pub fn action_id(&self) -> Option<&str> {
        match self {
            Self::Opened => None,
            Self::ActionTaken { action_id } => Some(action_id.as_str()),
        }
    }
}

/// 一次交互事件：一条通知 + 一个动作
#[derive(Debug, Clone)]
pub struct NotificationResult {
    notification: Notification,
    action: NotificationAction,
}

impl NotificationResult {
    pub(crate) fn new(notification: Notification, action: NotificationAction) -> Self {
        Self {
            notification,
            action,
        }
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub fn action(&self) -> &NotificationAction {
        &self.action
    }
}
