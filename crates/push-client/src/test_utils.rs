//! 测试工具
//!
//! `InMemoryBackend` 在内存中模拟推送服务，记录所有调用，可切换离线
//! 或预置下一次调用的错误；`FakePlatform` 模拟宿主平台。
//! 供单元测试、集成测试与 `push-sim` 演示程序使用。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use push_shared::error::{PushError, Result};
use serde_json::{Value, json};
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::{
    DeviceRegistration, DeviceUpdate, EmailHashes, PushBackend, TagChanges, TagMap,
};
use crate::envelope::{AppState, Notification};
use crate::platform::{Capabilities, Location, Platform};

// ---------------------------------------------------------------------------
// InMemoryBackend
// ---------------------------------------------------------------------------

/// 后端保存的设备记录
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub device_type: String,
    pub push_token: Option<String>,
    pub subscribed: bool,
    pub tags: TagMap,
    pub email: Option<EmailHashes>,
    pub location: Option<Location>,
}

/// 内存后端
pub struct InMemoryBackend {
    players: Mutex<HashMap<String, PlayerRecord>>,
    tag_calls: Mutex<Vec<(String, TagChanges)>>,
    notifications: Mutex<Vec<Value>>,
    opened: Mutex<Vec<(String, String)>>,
    failures: Mutex<VecDeque<PushError>>,
    offline: AtomicBool,
    registration_attempts: AtomicUsize,
    device_updates: AtomicUsize,
    /// 为 true 时注册请求挂起，直到放行
    registration_held: watch::Sender<bool>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (registration_held, _) = watch::channel(false);
        Self {
            players: Mutex::new(HashMap::new()),
            tag_calls: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            registration_attempts: AtomicUsize::new(0),
            device_updates: AtomicUsize::new(0),
            registration_held,
        }
    }

    /// 离线时所有调用返回 `NetworkFailure`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 下一次调用（任意操作）返回指定错误
    pub fn fail_next(&self, err: PushError) {
        self.failures.lock().push_back(err);
    }

    pub fn hold_registrations(&self) {
        self.registration_held.send_replace(true);
    }

    pub fn release_registrations(&self) {
        self.registration_held.send_replace(false);
    }

    pub fn player(&self, player_id: &str) -> Option<PlayerRecord> {
        self.players.lock().get(player_id).cloned()
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players.lock().keys().cloned().collect()
    }

    pub fn tags(&self, player_id: &str) -> TagMap {
        self.player(player_id).map(|p| p.tags).unwrap_or_default()
    }

    /// 每次成功的标签提交，按到达顺序
    pub fn tag_calls(&self) -> Vec<(String, TagChanges)> {
        self.tag_calls.lock().clone()
    }

    pub fn posted_notifications(&self) -> Vec<Value> {
        self.notifications.lock().clone()
    }

    /// (player_id, notification_id)
    pub fn opened_reports(&self) -> Vec<(String, String)> {
        self.opened.lock().clone()
    }

    pub fn registration_attempts(&self) -> usize {
        self.registration_attempts.load(Ordering::SeqCst)
    }

    pub fn device_updates(&self) -> usize {
        self.device_updates.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(PushError::network("backend offline"));
        }
        Ok(())
    }

    fn with_player<T>(
        &self,
        player_id: &str,
        f: impl FnOnce(&mut PlayerRecord) -> T,
    ) -> Result<T> {
        let mut players = self.players.lock();
        let player = players
            .get_mut(player_id)
            .ok_or_else(|| PushError::rejected(404, format!("player {player_id} not found")))?;
        Ok(f(player))
    }
}

#[async_trait]
impl PushBackend for InMemoryBackend {
    async fn register_device(&self, registration: &DeviceRegistration) -> Result<String> {
        self.registration_attempts.fetch_add(1, Ordering::SeqCst);
        let mut held = self.registration_held.subscribe();
        held.wait_for(|held| !*held)
            .await
            .map_err(|_| PushError::network("registration gate closed"))?;

        self.check_available()?;
        let player_id = Uuid::new_v4().to_string();
        self.players.lock().insert(
            player_id.clone(),
            PlayerRecord {
                device_type: registration.device_type.clone(),
                push_token: registration.push_token.clone(),
                subscribed: registration.subscribed,
                tags: TagMap::new(),
                email: None,
                location: None,
            },
        );
        Ok(player_id)
    }

    async fn update_device(&self, player_id: &str, update: &DeviceUpdate) -> Result<()> {
        self.check_available()?;
        self.with_player(player_id, |player| {
            if let Some(token) = &update.push_token {
                player.push_token = Some(token.clone());
            }
            if let Some(subscribed) = update.subscribed {
                player.subscribed = subscribed;
            }
        })?;
        self.device_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_tags(&self, player_id: &str, changes: &TagChanges) -> Result<()> {
        self.check_available()?;
        self.with_player(player_id, |player| {
            for (key, value) in changes {
                match value {
                    Some(value) => {
                        player.tags.insert(key.clone(), value.clone());
                    }
                    None => {
                        player.tags.remove(key);
                    }
                }
            }
        })?;
        self.tag_calls
            .lock()
            .push((player_id.to_string(), changes.clone()));
        Ok(())
    }

    async fn get_tags(&self, player_id: &str) -> Result<TagMap> {
        self.check_available()?;
        self.with_player(player_id, |player| player.tags.clone())
    }

    async fn post_notification(&self, payload: &Value) -> Result<Value> {
        self.check_available()?;
        let id = Uuid::new_v4().to_string();
        self.notifications.lock().push(payload.clone());
        Ok(json!({ "id": id, "recipients": 1 }))
    }

    async fn report_opened(&self, player_id: &str, notification_id: &str) -> Result<()> {
        self.check_available()?;
        self.opened
            .lock()
            .push((player_id.to_string(), notification_id.to_string()));
        Ok(())
    }

    async fn sync_hashed_email(&self, player_id: &str, hashes: &EmailHashes) -> Result<()> {
        self.check_available()?;
        self.with_player(player_id, |player| player.email = Some(hashes.clone()))
    }

    async fn update_location(&self, player_id: &str, location: &Location) -> Result<()> {
        self.check_available()?;
        self.with_player(player_id, |player| player.location = Some(*location))
    }
}

// ---------------------------------------------------------------------------
// FakePlatform
// ---------------------------------------------------------------------------

/// 模拟平台
pub struct FakePlatform {
    device_type: String,
    capabilities: Capabilities,
    app_state: Mutex<AppState>,
    permission: AtomicBool,
    token: Mutex<Option<String>>,
    location: Mutex<Option<Location>>,
    permission_requests: AtomicUsize,
    displayed: Mutex<Vec<String>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            device_type: "simulator".to_string(),
            capabilities: Capabilities::default(),
            app_state: Mutex::new(AppState::Active),
            permission: AtomicBool::new(true),
            token: Mutex::new(None),
            location: Mutex::new(None),
            permission_requests: AtomicUsize::new(0),
            displayed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock() = Some(token.to_string());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_location(self, location: Location) -> Self {
        *self.location.lock() = Some(location);
        self
    }

    pub fn set_token(&self, token: Option<&str>) {
        *self.token.lock() = token.map(str::to_string);
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn set_app_state(&self, state: AppState) {
        *self.app_state.lock() = state;
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// 已交给平台展示的通知 ID
    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn device_type(&self) -> String {
        self.device_type.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn app_state(&self) -> AppState {
        *self.app_state.lock()
    }

    async fn request_permission(&self) -> bool {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission.load(Ordering::SeqCst)
    }

    async fn push_token(&self) -> Option<String> {
        if !self.permission.load(Ordering::SeqCst) {
            return None;
        }
        self.token.lock().clone()
    }

    fn display(&self, notification: &Notification) {
        self.displayed.lock().push(notification.id().to_string());
    }

    async fn request_location(&self) -> Option<Location> {
        *self.location.lock()
    }
}
