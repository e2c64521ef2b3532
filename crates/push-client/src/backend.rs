//! 推送后端传输层
//!
//! 通过 `PushBackend` trait 抽象与推送服务的交互，`HttpBackend` 是基于 reqwest 的
//! JSON/REST 实现。状态码映射：2xx 成功；4xx 为后端拒绝（不可重试）；
//! 5xx、超时与连接错误为网络故障（可重试）。

use std::collections::BTreeMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use push_shared::config::SdkConfig;
use push_shared::error::{PushError, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::platform::Location;

/// 一批标签变更：键 → 新值（None 表示删除），保持提交顺序
pub type TagChanges = IndexMap<String, Option<String>>;

/// 后端确认的标签集合
pub type TagMap = BTreeMap<String, String>;

/// 设备注册请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRegistration {
    pub app_id: String,
    pub device_type: String,
    #[serde(rename = "identifier", skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub subscribed: bool,
    #[serde(rename = "sdk")]
    pub sdk_version: String,
}

/// 设备信息更新，只发送有值的字段
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceUpdate {
    #[serde(rename = "identifier", skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribed: Option<bool>,
}

/// 邮箱哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailHashes {
    #[serde(rename = "em_m")]
    pub md5: String,
    #[serde(rename = "em_s")]
    pub sha1: String,
}

/// 推送后端接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// 注册设备，返回后端分配的用户 ID
    async fn register_device(&self, registration: &DeviceRegistration) -> Result<String>;

    async fn update_device(&self, player_id: &str, update: &DeviceUpdate) -> Result<()>;

    /// 提交一批标签变更
    async fn update_tags(&self, player_id: &str, changes: &TagChanges) -> Result<()>;

    async fn get_tags(&self, player_id: &str) -> Result<TagMap>;

    async fn post_notification(&self, payload: &Value) -> Result<Value>;

    /// 上报通知被打开（互动回执）
    async fn report_opened(&self, player_id: &str, notification_id: &str) -> Result<()>;

    async fn sync_hashed_email(&self, player_id: &str, hashes: &EmailHashes) -> Result<()>;

    async fn update_location(&self, player_id: &str, location: &Location) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// 基于 HTTP/JSON 的后端实现
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    app_id: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: String,
}

#[derive(Deserialize)]
struct PlayerResponse {
    #[serde(default)]
    tags: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct TagsBody<'a> {
    app_id: &'a str,
    tags: IndexMap<&'a str, &'a str>,
}

impl HttpBackend {
    pub fn new(config: &SdkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.api.timeout())
            .build()
            .map_err(|e| PushError::network_with_cause("创建 HTTP 客户端失败", e))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 发送请求并按状态码映射错误
    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_client_error() {
            return Err(PushError::rejected(status.as_u16(), error_message(&body)));
        }
        if !status.is_success() {
            return Err(PushError::network(format!(
                "后端返回 {status}: {}",
                error_message(&body)
            )));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| PushError::malformed_with_cause("无法解析后端响应", e))
    }

    async fn put_player(&self, player_id: &str, body: &Value) -> Result<()> {
        let request = self.client.put(self.url(&format!("players/{player_id}"))).json(body);
        self.execute(request).await.map(|_| ())
    }
}

#[async_trait]
impl PushBackend for HttpBackend {
    #[instrument(skip(self, registration), fields(app_id = %registration.app_id))]
    async fn register_device(&self, registration: &DeviceRegistration) -> Result<String> {
        let request = self.client.post(self.url("players")).json(registration);
        let value = self.execute(request).await?;
        let response: RegisterResponse = serde_json::from_value(value)
            .map_err(|e| PushError::malformed_with_cause("注册响应缺少 id", e))?;
        debug!(player_id = %response.id, "设备注册成功");
        Ok(response.id)
    }

    #[instrument(skip(self, update))]
    async fn update_device(&self, player_id: &str, update: &DeviceUpdate) -> Result<()> {
        let mut body = serde_json::to_value(update)
            .map_err(|e| PushError::malformed_with_cause("无法序列化设备信息", e))?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("app_id".to_string(), Value::String(self.app_id.clone()));
        }
        self.put_player(player_id, &body).await
    }

    #[instrument(skip(self, changes), fields(keys = changes.len()))]
    async fn update_tags(&self, player_id: &str, changes: &TagChanges) -> Result<()> {
        // 空字符串表示删除
        let body = TagsBody {
            app_id: &self.app_id,
            tags: changes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_deref().unwrap_or("")))
                .collect(),
        };
        let request = self
            .client
            .put(self.url(&format!("players/{player_id}")))
            .json(&body);
        self.execute(request).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn get_tags(&self, player_id: &str) -> Result<TagMap> {
        let request = self
            .client
            .get(self.url(&format!("players/{player_id}")))
            .query(&[("app_id", self.app_id.as_str())]);
        let value = self.execute(request).await?;
        let player: PlayerResponse = serde_json::from_value(value)
            .map_err(|e| PushError::malformed_with_cause("无法解析标签响应", e))?;

        Ok(player
            .tags
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }

    #[instrument(skip(self, payload))]
    async fn post_notification(&self, payload: &Value) -> Result<Value> {
        let mut body = payload.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.entry("app_id")
                .or_insert_with(|| Value::String(self.app_id.clone()));
        }
        let request = self.client.post(self.url("notifications")).json(&body);
        self.execute(request).await
    }

    #[instrument(skip(self))]
    async fn report_opened(&self, player_id: &str, notification_id: &str) -> Result<()> {
        let body = json!({
            "app_id": self.app_id,
            "player_id": player_id,
            "opened": true,
        });
        let request = self
            .client
            .put(self.url(&format!("notifications/{notification_id}")))
            .json(&body);
        self.execute(request).await.map(|_| ())
    }

    #[instrument(skip(self, hashes))]
    async fn sync_hashed_email(&self, player_id: &str, hashes: &EmailHashes) -> Result<()> {
        let body = json!({
            "app_id": self.app_id,
            "em_m": hashes.md5,
            "em_s": hashes.sha1,
        });
        self.put_player(player_id, &body).await
    }

    #[instrument(skip(self, location))]
    async fn update_location(&self, player_id: &str, location: &Location) -> Result<()> {
        let body = json!({
            "app_id": self.app_id,
            "lat": location.latitude,
            "long": location.longitude,
        });
        self.put_player(player_id, &body).await
    }
}

fn transport_error(err: reqwest::Error) -> PushError {
    if err.is_timeout() {
        PushError::network_with_cause("请求超时", err)
    } else if err.is_connect() {
        PushError::network_with_cause("无法连接推送服务", err)
    } else {
        PushError::network_with_cause("请求推送服务失败", err)
    }
}

/// 从错误响应中提取可读信息
///
/// 支持 `{"errors": [..]}` 与 `{"error": ".."}` 两种格式，其余情况截断原文。
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .collect();
            return messages.join("; ");
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return error.to_string();
        }
    }
    body.chars().take(200).collect()
}
