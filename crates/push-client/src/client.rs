//! SDK 客户端
//!
//! `PushClient` 是应用持有的唯一入口。所有网络操作立即返回，结果稍后通过
//! `Completion`（回调对或 `Ticket`）回报；平台事件经 `EventSender`
//! 投递到单一的有序分发队列。

use std::sync::{Arc, Weak};

use push_shared::config::SdkConfig;
use push_shared::error::{PushError, Result};
use push_shared::observability::metrics::{record_notification_received, record_registration};
use push_shared::retry::{RetryPolicy, retry_with_policy};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::backend::{DeviceRegistration, DeviceUpdate, HttpBackend, PushBackend, TagMap};
use crate::completion::{Completion, Ticket};
use crate::email::hash_email;
use crate::envelope::{AppState, NotificationPayload};
use crate::platform::{NotificationCenterDelegate, Platform};
use crate::registration::{DeviceIdentity, Registration, RegistrationState};
use crate::router::{ActionHandler, ActionRouter, ReceivedHandler, UserInteraction};
use crate::store::{JsonFileTagStore, MemoryTagStore, TagOp, TagStore};
use crate::tags::{TagQueue, TagResult};

/// 分发队列中的事件
enum DispatchEvent {
    Received {
        payload: NotificationPayload,
        app_state: AppState,
    },
    Interaction(UserInteraction),
    TokenRefreshed,
    SetDelegate(Arc<dyn NotificationCenterDelegate>),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// 客户端构造器
pub struct PushClientBuilder {
    config: SdkConfig,
    platform: Option<Arc<dyn Platform>>,
    backend: Option<Arc<dyn PushBackend>>,
    store: Option<Arc<dyn TagStore>>,
    on_received: Option<ReceivedHandler>,
    on_action: Option<ActionHandler>,
    launch: Option<(Value, Option<String>)>,
    runtime: Option<Handle>,
}

impl PushClientBuilder {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            platform: None,
            backend: None,
            store: None,
            on_received: None,
            on_action: None,
            launch: None,
            runtime: None,
        }
    }

    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// 自定义后端；默认使用 `HttpBackend`
    pub fn backend(mut self, backend: Arc<dyn PushBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 自定义待提交标签存储；默认按配置选择文件或内存
    pub fn tag_store(mut self, store: Arc<dyn TagStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_received(mut self, handler: ReceivedHandler) -> Self {
        self.on_received = Some(handler);
        self
    }

    pub fn on_action(mut self, handler: ActionHandler) -> Self {
        self.on_action = Some(handler);
        self
    }

    /// 应用由点击通知启动时的原始推送，初始化后作为一次交互回放
    pub fn launch_notification(mut self, raw: Value, action_id: Option<String>) -> Self {
        self.launch = Some((raw, action_id));
        self
    }

    /// 指定运行时；默认使用当前 tokio 运行时
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// 初始化客户端并开始设备注册
    pub fn initialize(self) -> Result<PushClient> {
        if self.config.app_id.trim().is_empty() {
            return Err(PushError::Config("app_id 不能为空".to_string()));
        }
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|e| PushError::Config(format!("需要在 tokio 运行时内初始化: {e}")))?,
        };
        let platform = self
            .platform
            .ok_or_else(|| PushError::Config("缺少平台实现".to_string()))?;
        let backend: Arc<dyn PushBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(&self.config)?),
        };
        let store: Arc<dyn TagStore> = match (self.store, &self.config.storage.pending_tags_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileTagStore::new(path)),
            (None, None) => Arc::new(MemoryTagStore::new()),
        };

        let launch = self.launch.and_then(|(raw, action_id)| {
            UserInteraction::from_raw(&raw, action_id, AppState::NotRunning)
                .inspect_err(|e| warn!(error = %e, "启动通知无法解析，忽略"))
                .ok()
        });

        let router = ActionRouter::new(
            &self.config.router,
            self.config.settings.in_app_alerts,
            Arc::clone(&platform),
            self.on_received,
            self.on_action,
        );

        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            retry: self.config.retry_policy(),
            registration: Registration::new(self.config.settings.subscribed_by_default),
            tags: TagQueue::restoring(store),
            config: self.config,
            runtime,
            backend,
            platform,
            events,
            delegate: parking_lot::Mutex::new(None),
        });

        inner
            .runtime
            .spawn(run_dispatcher(Arc::downgrade(&inner), router, rx));

        if let Some(interaction) = launch {
            info!(notification_id = %interaction.notification_id, "回放启动通知");
            inner.dispatch(DispatchEvent::Interaction(interaction));
        }

        let startup = Arc::clone(&inner);
        inner.runtime.spawn(async move {
            startup.tags.restore().await;
            let prompt = startup.config.settings.auto_prompt;
            startup.register(prompt).await;
        });

        info!(
            app_id = %inner.config.app_id,
            version = crate::VERSION,
            auto_prompt = inner.config.settings.auto_prompt,
            in_app_alerts = inner.config.settings.in_app_alerts,
            "推送 SDK 已初始化"
        );
        Ok(PushClient { inner })
    }
}

// ---------------------------------------------------------------------------
// PushClient
// ---------------------------------------------------------------------------

struct Inner {
    config: SdkConfig,
    runtime: Handle,
    backend: Arc<dyn PushBackend>,
    platform: Arc<dyn Platform>,
    registration: Registration,
    tags: TagQueue,
    events: mpsc::UnboundedSender<DispatchEvent>,
    retry: RetryPolicy,
    delegate: parking_lot::Mutex<Option<Arc<dyn NotificationCenterDelegate>>>,
}

/// 推送客户端句柄，可廉价克隆
#[derive(Clone)]
pub struct PushClient {
    inner: Arc<Inner>,
}

impl PushClient {
    pub fn builder(config: SdkConfig) -> PushClientBuilder {
        PushClientBuilder::new(config)
    }

    pub fn app_id(&self) -> &str {
        &self.inner.config.app_id
    }

    pub fn state(&self) -> RegistrationState {
        self.inner.registration.state()
    }

    /// 订阅注册状态变化
    pub fn state_updates(&self) -> watch::Receiver<RegistrationState> {
        self.inner.registration.subscribe()
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.inner.registration.identity()
    }

    /// 等待设备注册完成
    pub async fn wait_registered(&self) -> Result<DeviceIdentity> {
        self.inner.registration.wait_registered().await
    }

    /// 平台事件入口
    pub fn events(&self) -> EventSender {
        EventSender {
            tx: self.inner.events.clone(),
            platform: Arc::clone(&self.inner.platform),
        }
    }

    /// 尚未提交的标签键数量
    pub fn pending_tags(&self) -> usize {
        self.inner.tags.pending_len()
    }

    // -- 注册与订阅 ---------------------------------------------------------

    /// 请求推送权限；注册失败后也用于重新发起注册
    pub fn register_for_push_notifications(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let granted = inner.platform.request_permission().await;
            info!(granted, "推送权限请求结束");
            inner.refresh_token().await;
            // 之前因网络故障放回队列的标签
            inner.flush_tags().await;
        });
    }

    /// 设置订阅状态，幂等
    pub fn set_subscription(&self, enabled: bool) {
        if !self.inner.registration.set_subscription(enabled) {
            debug!(enabled, "订阅状态未变化");
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            inner.sync_subscription(enabled).await;
        });
    }

    /// 注册用户 ID / 推送令牌回调；已注册时立即回调一次
    pub fn ids_available<F>(&self, callback: F)
    where
        F: Fn(&str, Option<&str>) + Send + Sync + 'static,
    {
        self.inner.registration.on_ids_available(Arc::new(callback));
    }

    // -- 标签 ---------------------------------------------------------------

    pub fn send_tag(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Ticket<TagResult>> {
        self.enqueue_checked("send_tag", vec![(key.into(), set_op(value.into()))])
    }

    pub fn send_tags<K, V>(&self, tags: impl IntoIterator<Item = (K, V)>) -> Result<Ticket<TagResult>>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let changes = tags
            .into_iter()
            .map(|(k, v)| (k.into(), set_op(v.into())))
            .collect();
        self.enqueue_checked("send_tags", changes)
    }

    pub fn delete_tag(&self, key: impl Into<String>) -> Result<Ticket<TagResult>> {
        self.enqueue_checked("delete_tag", vec![(key.into(), TagOp::Delete)])
    }

    pub fn delete_tags<K>(&self, keys: impl IntoIterator<Item = K>) -> Result<Ticket<TagResult>>
    where
        K: Into<String>,
    {
        let changes = keys.into_iter().map(|k| (k.into(), TagOp::Delete)).collect();
        self.enqueue_checked("delete_tags", changes)
    }

    /// 回调版本：参数不合法时同步调用失败回调
    pub fn send_tags_with<K, V>(
        &self,
        tags: impl IntoIterator<Item = (K, V)>,
        completion: Completion<TagResult>,
    ) where
        K: Into<String>,
        V: Into<String>,
    {
        let changes = tags
            .into_iter()
            .map(|(k, v)| (k.into(), set_op(v.into())))
            .collect();
        match validate_tag_keys(changes) {
            Ok(changes) => self.enqueue(changes, completion),
            Err(e) => completion.fail(e),
        }
    }

    pub fn delete_tags_with<K>(
        &self,
        keys: impl IntoIterator<Item = K>,
        completion: Completion<TagResult>,
    ) where
        K: Into<String>,
    {
        let changes = keys.into_iter().map(|k| (k.into(), TagOp::Delete)).collect();
        match validate_tag_keys(changes) {
            Ok(changes) => self.enqueue(changes, completion),
            Err(e) => completion.fail(e),
        }
    }

    /// `{"key": "value" | number | bool | null}`，null 表示删除
    pub fn send_tags_json(&self, json: &str) -> Result<Ticket<TagResult>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| PushError::malformed_with_cause("标签 JSON 无法解析", e))?;
        let object = value
            .as_object()
            .ok_or_else(|| PushError::malformed("标签 JSON 必须是对象"))?;

        let changes = object
            .iter()
            .map(|(key, value)| {
                let op = match value {
                    Value::Null => TagOp::Delete,
                    Value::String(s) => set_op(s.clone()),
                    Value::Number(n) => TagOp::Set(n.to_string()),
                    Value::Bool(b) => TagOp::Set(b.to_string()),
                    other => {
                        return Err(PushError::malformed(format!(
                            "标签 {key} 的值必须是标量: {other}"
                        )));
                    }
                };
                Ok((key.clone(), op))
            })
            .collect::<Result<Vec<_>>>()?;
        self.enqueue_checked("send_tags", changes)
    }

    /// `["key1", "key2"]`
    pub fn delete_tags_json(&self, json: &str) -> Result<Ticket<TagResult>> {
        let keys: Vec<String> = serde_json::from_str(json)
            .map_err(|e| PushError::malformed_with_cause("标签键 JSON 必须是字符串数组", e))?;
        self.delete_tags(keys)
    }

    /// 读取后端确认的标签；注册前失败为 `NotRegistered`
    pub fn get_tags(&self) -> Ticket<TagMap> {
        let (completion, ticket) = Completion::channel("get_tags");
        self.get_tags_with(completion);
        ticket
    }

    pub fn get_tags_with(&self, completion: Completion<TagMap>) {
        let Some(player_id) = self.inner.registration.player_id() else {
            completion.fail(PushError::not_registered("get_tags"));
            return;
        };
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = retry_with_policy(&inner.retry, "get_tags", || {
                inner.backend.get_tags(&player_id)
            })
            .await;
            completion.resolve(result);
        });
    }

    // -- 通知 ---------------------------------------------------------------

    /// 发送一条通知，请求体必须是 JSON 对象
    pub fn post_notification(&self, payload: Value) -> Result<Ticket<Value>> {
        if !payload.is_object() {
            return Err(PushError::malformed("通知内容必须是 JSON 对象"));
        }
        let (completion, ticket) = Completion::channel("post_notification");
        self.spawn_post(payload, completion);
        Ok(ticket)
    }

    pub fn post_notification_json(&self, json: &str) -> Result<Ticket<Value>> {
        let payload: Value = serde_json::from_str(json)
            .map_err(|e| PushError::malformed_with_cause("通知 JSON 无法解析", e))?;
        self.post_notification(payload)
    }

    pub fn post_notification_with(&self, payload: Value, completion: Completion<Value>) {
        if !payload.is_object() {
            completion.fail(PushError::malformed("通知内容必须是 JSON 对象"));
            return;
        }
        self.spawn_post(payload, completion);
    }

    // -- 其他 ---------------------------------------------------------------

    /// 同步邮箱哈希，不回报结果；邮箱格式不合法时同步返回错误
    pub fn sync_hashed_email(&self, email: &str) -> Result<()> {
        let hashes = hash_email(email)?;
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let identity = match inner.registration.wait_registered().await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(error = %e, "等待注册失败，放弃同步邮箱");
                    return;
                }
            };
            let result = retry_with_policy(&inner.retry, "sync_hashed_email", || {
                inner.backend.sync_hashed_email(&identity.user_id, &hashes)
            })
            .await;
            match result {
                Ok(()) => info!(user_id = %identity.user_id, "邮箱哈希已同步"),
                Err(e) => warn!(user_id = %identity.user_id, error = %e, "同步邮箱哈希失败"),
            }
        });
        Ok(())
    }

    /// 请求定位权限并在注册后上传位置
    pub fn prompt_location(&self) -> Result<()> {
        if !self.inner.platform.capabilities().location {
            return Err(PushError::unsupported("location"));
        }
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let Some(location) = inner.platform.request_location().await else {
                info!("未获得定位");
                return;
            };
            let identity = match inner.registration.wait_registered().await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(error = %e, "等待注册失败，放弃上传位置");
                    return;
                }
            };
            let result = retry_with_policy(&inner.retry, "update_location", || {
                inner.backend.update_location(&identity.user_id, &location)
            })
            .await;
            if let Err(e) = result {
                warn!(user_id = %identity.user_id, error = %e, "上传位置失败");
            }
        });
        Ok(())
    }

    /// 设置通知中心代理；平台未声明该能力时返回 `Unsupported`
    pub fn set_notification_center_delegate(
        &self,
        delegate: Arc<dyn NotificationCenterDelegate>,
    ) -> Result<()> {
        if !self.inner.platform.capabilities().notification_center {
            return Err(PushError::unsupported("notification_center"));
        }
        *self.inner.delegate.lock() = Some(Arc::clone(&delegate));
        self.inner.dispatch(DispatchEvent::SetDelegate(delegate));
        Ok(())
    }

    /// 当前的通知中心代理
    pub fn notification_center_delegate(&self) -> Option<Arc<dyn NotificationCenterDelegate>> {
        self.inner.delegate.lock().clone()
    }

    fn enqueue_checked(
        &self,
        operation: &'static str,
        changes: Vec<(String, TagOp)>,
    ) -> Result<Ticket<TagResult>> {
        let changes = validate_tag_keys(changes)?;
        let (completion, ticket) = Completion::channel(operation);
        self.enqueue(changes, completion);
        Ok(ticket)
    }

    fn enqueue(&self, changes: Vec<(String, TagOp)>, completion: Completion<TagResult>) {
        self.inner.tags.enqueue(changes, completion);
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            inner.tags.persist().await;
            inner.flush_tags().await;
        });
    }

    fn spawn_post(&self, payload: Value, completion: Completion<Value>) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = retry_with_policy(&inner.retry, "post_notification", || {
                inner.backend.post_notification(&payload)
            })
            .await;
            if let Err(e) = &result {
                warn!(error = %e, "发送通知失败");
            }
            completion.resolve(result);
        });
    }
}

/// 空字符串的值在后端表示删除
fn set_op(value: String) -> TagOp {
    if value.is_empty() {
        TagOp::Delete
    } else {
        TagOp::Set(value)
    }
}

fn validate_tag_keys(changes: Vec<(String, TagOp)>) -> Result<Vec<(String, TagOp)>> {
    if let Some((key, _)) = changes.iter().find(|(key, _)| key.trim().is_empty()) {
        return Err(PushError::malformed(format!("标签键不能为空: {key:?}")));
    }
    Ok(changes)
}

// ---------------------------------------------------------------------------
// 后台流程
// ---------------------------------------------------------------------------

impl Inner {
    fn dispatch(&self, event: DispatchEvent) {
        if self.events.send(event).is_err() {
            error!("分发任务已停止，事件被丢弃");
        }
    }

    /// 设备注册；已在注册中或已注册时忽略
    async fn register(self: &Arc<Self>, prompt: bool) {
        if let Err(e) = self.registration.begin() {
            debug!(error = %e, "跳过注册");
            return;
        }

        let push_token = if prompt {
            let granted = self.platform.request_permission().await;
            info!(granted, "推送权限请求结束");
            if granted {
                self.platform.push_token().await
            } else {
                None
            }
        } else {
            self.platform.push_token().await
        };

        let request = DeviceRegistration {
            app_id: self.config.app_id.clone(),
            device_type: self.platform.device_type(),
            push_token: push_token.clone(),
            subscribed: self.registration.desired_subscription(),
            sdk_version: crate::VERSION.to_string(),
        };

        let result = retry_with_policy(&self.retry, "register_device", || {
            self.backend.register_device(&request)
        })
        .await;

        match result {
            Ok(user_id) => {
                record_registration("success");
                let identity = DeviceIdentity {
                    user_id,
                    push_token,
                };
                if let Err(e) = self.registration.complete(identity) {
                    error!(error = %e, "注册状态不一致");
                    return;
                }
                // 注册期间订阅状态被修改过
                let desired = self.registration.desired_subscription();
                if desired != request.subscribed {
                    self.sync_subscription(desired).await;
                }
                self.flush_tags().await;
            }
            Err(e) => {
                record_registration("failed");
                error!(error = %e, retryable = e.is_retryable(), "设备注册失败");
                self.registration.fail();
            }
        }
    }

    /// 令牌变化后同步：未注册时重新注册，已注册时更新设备
    async fn refresh_token(self: &Arc<Self>) {
        let identity = match self.registration.state() {
            RegistrationState::Unregistered => {
                self.register(false).await;
                return;
            }
            RegistrationState::Registering | RegistrationState::Registered { .. } => {
                match self.registration.wait_registered().await {
                    Ok(identity) => identity,
                    Err(e) => {
                        warn!(error = %e, "等待注册失败，放弃更新令牌");
                        return;
                    }
                }
            }
        };

        let push_token = self.platform.push_token().await;
        if push_token == identity.push_token {
            debug!("推送令牌未变化");
            return;
        }

        let update = DeviceUpdate {
            push_token: push_token.clone(),
            subscribed: None,
        };
        let result = retry_with_policy(&self.retry, "update_device", || {
            self.backend.update_device(&identity.user_id, &update)
        })
        .await;
        match result {
            Ok(()) => {
                self.registration.update_identity(DeviceIdentity {
                    user_id: identity.user_id,
                    push_token,
                });
            }
            Err(e) => warn!(user_id = %identity.user_id, error = %e, "更新推送令牌失败"),
        }
    }

    async fn sync_subscription(self: &Arc<Self>, subscribed: bool) {
        let Some(player_id) = self.registration.player_id() else {
            return;
        };
        let update = DeviceUpdate {
            push_token: None,
            subscribed: Some(subscribed),
        };
        let result = retry_with_policy(&self.retry, "update_device", || {
            self.backend.update_device(&player_id, &update)
        })
        .await;
        match result {
            Ok(()) => info!(player_id = %player_id, subscribed, "订阅状态已同步"),
            Err(e) => warn!(player_id = %player_id, error = %e, "同步订阅状态失败"),
        }
    }

    /// 已注册时提交待提交标签
    async fn flush_tags(&self) {
        let Some(player_id) = self.registration.player_id() else {
            debug!(pending = self.tags.pending_len(), "尚未注册，标签保留在队列中");
            return;
        };
        self.tags
            .flush(self.backend.as_ref(), &player_id, &self.retry)
            .await;
    }

    /// 注册完成后上报通知被打开，失败只记录日志
    fn spawn_report_opened(self: &Arc<Self>, notification_id: String) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let identity = match inner.registration.wait_registered().await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(error = %e, "等待注册失败，放弃上报打开事件");
                    return;
                }
            };
            let result = retry_with_policy(&inner.retry, "report_opened", || {
                inner.backend.report_opened(&identity.user_id, &notification_id)
            })
            .await;
            if let Err(e) = result {
                warn!(notification_id = %notification_id, error = %e, "上报打开事件失败");
            }
        });
    }

    fn spawn_refresh_token(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.refresh_token().await;
        });
    }
}

/// 分发循环：按到达顺序逐个处理平台事件
async fn run_dispatcher(
    inner: Weak<Inner>,
    mut router: ActionRouter,
    mut rx: mpsc::UnboundedReceiver<DispatchEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            DispatchEvent::Received { payload, app_state } => {
                router.handle_received(payload, app_state);
            }
            DispatchEvent::Interaction(interaction) => {
                let outcome = router.handle_interaction(interaction);
                if let (Some(result), Some(inner)) = (outcome.result(), inner.upgrade()) {
                    inner.spawn_report_opened(result.notification().id().to_string());
                }
            }
            DispatchEvent::TokenRefreshed => {
                if let Some(inner) = inner.upgrade() {
                    inner.spawn_refresh_token();
                }
            }
            DispatchEvent::SetDelegate(delegate) => {
                router.set_delegate(delegate);
                debug!("通知中心代理已设置");
            }
        }
    }
    debug!("分发任务退出");
}

// ---------------------------------------------------------------------------
// EventSender
// ---------------------------------------------------------------------------

/// 平台事件投递句柄，可在任意线程使用
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<DispatchEvent>,
    platform: Arc<dyn Platform>,
}

impl EventSender {
    /// 投递一条到达的推送；消息格式错误时同步返回 `MalformedPayload`
    pub fn push_received(&self, raw: &Value, app_state: AppState) -> Result<()> {
        let payload = NotificationPayload::parse(raw).inspect_err(|e| {
            warn!(error = %e, "丢弃格式错误的推送");
            record_notification_received("malformed");
        })?;
        self.send(DispatchEvent::Received { payload, app_state });
        Ok(())
    }

    /// 同 `push_received`，生命周期状态取自平台
    pub fn push_received_now(&self, raw: &Value) -> Result<()> {
        self.push_received(raw, self.platform.app_state())
    }

    pub fn user_interaction(&self, interaction: UserInteraction) {
        self.send(DispatchEvent::Interaction(interaction));
    }

    /// 用户点击了通知或按钮，生命周期状态取自平台
    pub fn interacted_now(&self, notification_id: impl Into<String>, action_id: Option<String>) {
        let app_state = self.platform.app_state();
        let interaction = match action_id {
            Some(action_id) => UserInteraction::button(notification_id, action_id, app_state),
            None => UserInteraction::opened(notification_id, app_state),
        };
        self.user_interaction(interaction);
    }

    /// 平台通知推送令牌已变化
    pub fn token_refreshed(&self) {
        self.send(DispatchEvent::TokenRefreshed);
    }

    fn send(&self, event: DispatchEvent) {
        if self.tx.send(event).is_err() {
            error!("分发任务已停止，事件被丢弃");
        }
    }
}
