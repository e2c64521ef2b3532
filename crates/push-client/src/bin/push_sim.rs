//! 推送 SDK 模拟器
//!
//! 用内存后端（或真实 HTTP 后端）与模拟平台跑一遍完整会话：
//! 离线打标签 → 注册 → 批量提交 → 接收通知 → 点击按钮 → 读取标签。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use push_client::test_utils::{FakePlatform, InMemoryBackend};
use push_client::{
    AppState, Notification, NotificationResult, PushBackend, PushClient, ReceiveDecision,
    UserInteraction,
};
use push_shared::config::SdkConfig;
use push_shared::observability;
use serde_json::json;
use tracing::info;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// 进程内模拟后端
    Memory,
    /// 按配置访问真实推送服务
    Http,
}

/// 推送 SDK 模拟器
#[derive(Parser, Debug)]
#[command(name = "push-sim")]
#[command(version, about = "推送通知 SDK 会话模拟")]
struct Cli {
    /// 应用 ID
    #[arg(long, default_value = "demo-app")]
    app_id: String,

    #[arg(long, value_enum, default_value = "memory")]
    backend: BackendKind,

    /// 注册前保持离线的时长（毫秒），仅内存后端
    #[arg(long, default_value = "200")]
    offline_ms: u64,

    /// 模拟收到的通知数量
    #[arg(short, long, default_value = "3")]
    notifications: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SdkConfig::load(&cli.app_id).context("加载配置失败")?;
    config.api.retry.initial_delay_ms = config.api.retry.initial_delay_ms.min(100);
    let _guard = observability::init(&config.observability)?;

    let memory = Arc::new(InMemoryBackend::new());
    let backend: Arc<dyn PushBackend> = match cli.backend {
        BackendKind::Memory => {
            memory.set_offline(true);
            memory.clone()
        }
        BackendKind::Http => Arc::new(push_client::HttpBackend::new(&config)?),
    };
    let platform = Arc::new(FakePlatform::new().with_token("sim-token-0001"));

    let client = PushClient::builder(config)
        .platform(platform.clone())
        .backend(backend)
        .on_received(Arc::new(|n: &Notification| {
            info!(notification_id = n.id(), title = ?n.payload().title(), "收到通知");
            ReceiveDecision::Display
        }))
        .on_action(Arc::new(|r: NotificationResult| {
            info!(
                notification_id = r.notification().id(),
                action = %r.action().action_type(),
                action_id = ?r.action().action_id(),
                "用户交互"
            );
        }))
        .initialize()?;

    client.ids_available(|user_id, token| {
        info!(user_id, push_token = ?token, "ids available");
    });

    // 注册前的标签进入队列
    let level = client.send_tag("level", "5")?;
    let _ = client.send_tag("color", "red")?;
    let color = client.delete_tag("color")?;
    info!(pending = client.pending_tags(), "标签已入队");

    if cli.backend == BackendKind::Memory {
        tokio::time::sleep(Duration::from_millis(cli.offline_ms)).await;
        memory.set_offline(false);
        client.register_for_push_notifications();
    }

    let identity = tokio::time::timeout(Duration::from_secs(30), client.wait_registered())
        .await
        .context("等待注册超时")??;
    info!(user_id = %identity.user_id, "设备已注册");

    info!(result = ?level.await?, "sendTag(level) 完成");
    info!(result = ?color.await?, "deleteTag(color) 完成");

    let events = client.events();
    for i in 0..cli.notifications {
        let id = format!("sim-{i}");
        let raw = json!({
            "aps": { "alert": { "title": format!("通知 {i}"), "body": "模拟消息" }, "badge": i },
            "custom": {
                "i": id,
                "a": { "actionButtons": [{ "id": "accept", "text": "接受" }] }
            }
        });
        events.push_received(&raw, AppState::Background)?;
        // 重复投递会被忽略
        events.push_received(&raw, AppState::Background)?;
        events.user_interaction(UserInteraction::button(&id, "accept", AppState::Active));
    }

    client.sync_hashed_email("Demo.User@Example.com")?;

    let tags = client.get_tags().await?;
    info!(?tags, "后端标签");

    tokio::time::sleep(Duration::from_millis(100)).await;
    info!(
        displayed = platform.displayed().len(),
        opened = memory.opened_reports().len(),
        "模拟结束"
    );
    Ok(())
}
