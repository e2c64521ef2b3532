//! 测试环境管理
//!
//! 统一创建内存后端、模拟平台与客户端，并记录应用回调。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use push_client::test_utils::{FakePlatform, InMemoryBackend};
use push_client::{
    Capabilities, DeviceIdentity, Location, Notification, NotificationResult, PushClient,
    ReceiveDecision,
};
use push_shared::config::SdkConfig;

/// 测试环境配置
#[derive(Debug, Clone)]
pub struct TestEnvConfig {
    pub app_id: String,
    pub auto_prompt: bool,
    pub in_app_alerts: bool,
    /// 初始化时后端离线
    pub start_offline: bool,
    /// 注册请求挂起，直到调用 `release_registration`
    pub hold_registration: bool,
    pub push_token: Option<String>,
    /// 接收回调是否否决展示
    pub suppress_display: bool,
    /// 平台提供的位置；设置后平台声明定位能力
    pub location: Option<Location>,
    /// 等待异步结果的超时时间
    pub timeout: Duration,
}

impl Default for TestEnvConfig {
    fn default() -> Self {
        Self {
            app_id: "e2e-app".to_string(),
            auto_prompt: true,
            in_app_alerts: true,
            start_offline: false,
            hold_registration: false,
            push_token: Some("e2e-token".to_string()),
            suppress_display: false,
            location: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub config: TestEnvConfig,
    pub client: PushClient,
    pub backend: Arc<InMemoryBackend>,
    pub platform: Arc<FakePlatform>,
    /// 接收回调看到的通知 ID
    pub received: Arc<Mutex<Vec<String>>>,
    /// 交互回调看到的 (通知 ID, 按钮 ID)
    pub actions: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl TestEnvironment {
    /// 使用默认配置创建环境，需在 tokio 运行时内调用
    pub fn setup() -> Result<Self> {
        Self::setup_with(TestEnvConfig::default())
    }

    pub fn setup_with(config: TestEnvConfig) -> Result<Self> {
        let backend = Arc::new(InMemoryBackend::new());
        if config.start_offline {
            backend.set_offline(true);
        }
        if config.hold_registration {
            backend.hold_registrations();
        }

        let mut platform = FakePlatform::new();
        if let Some(token) = &config.push_token {
            platform = platform.with_token(token);
        }
        if let Some(location) = config.location {
            platform = platform
                .with_location(location)
                .with_capabilities(Capabilities {
                    notification_center: false,
                    location: true,
                });
        }
        let platform = Arc::new(platform);

        let mut sdk = SdkConfig::with_app_id(&config.app_id);
        sdk.settings.auto_prompt = config.auto_prompt;
        sdk.settings.in_app_alerts = config.in_app_alerts;
        sdk.api.retry.max_retries = 2;
        sdk.api.retry.initial_delay_ms = 1;
        sdk.api.retry.max_delay_ms = 5;

        let received = Arc::new(Mutex::new(Vec::new()));
        let actions = Arc::new(Mutex::new(Vec::new()));
        let received_log = received.clone();
        let action_log = actions.clone();
        let suppress = config.suppress_display;

        let client = PushClient::builder(sdk)
            .backend(backend.clone())
            .platform(platform.clone())
            .on_received(Arc::new(move |n: &Notification| {
                received_log.lock().push(n.id().to_string());
                if suppress {
                    ReceiveDecision::Suppress
                } else {
                    ReceiveDecision::Display
                }
            }))
            .on_action(Arc::new(move |r: NotificationResult| {
                action_log.lock().push((
                    r.notification().id().to_string(),
                    r.action().action_id().map(str::to_string),
                ));
            }))
            .initialize()
            .context("客户端初始化失败")?;

        Ok(Self {
            config,
            client,
            backend,
            platform,
            received,
            actions,
        })
    }

    /// 等待设备注册完成
    pub async fn wait_registered(&self) -> Result<DeviceIdentity> {
        let identity = tokio::time::timeout(self.config.timeout, self.client.wait_registered())
            .await
            .context("等待注册超时")??;
        Ok(identity)
    }

    /// 后端恢复在线并放行挂起的注册
    pub fn go_online(&self) {
        self.backend.set_offline(false);
        self.backend.release_registrations();
    }

    pub fn release_registration(&self) {
        self.backend.release_registrations();
    }
}
