//! 配置管理模块
//!
//! 支持配置文件加载、环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::observability::LogLevel;
use crate::retry::RetryPolicy;

/// 后端接口配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 重试配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

/// 初始化选项
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InitSettings {
    /// 初始化时直接弹出推送权限请求
    pub auto_prompt: bool,
    /// 应用在前台时使用应用内弹窗展示通知
    pub in_app_alerts: bool,
    /// 注册完成后的默认订阅状态
    pub subscribed_by_default: bool,
}

impl Default for InitSettings {
    fn default() -> Self {
        Self {
            auto_prompt: true,
            in_app_alerts: true,
            subscribed_by_default: true,
        }
    }
}

/// 通知路由配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// 去重集合最多记录的通知 ID 数量
    pub dedup_capacity: usize,
    /// 重复投递的判定窗口
    pub dedup_window_secs: u64,
    /// 等待交互的通知最多保留的数量，与时间无关
    pub tracked_notifications: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: 128,
            dedup_window_secs: 300,
            tracked_notifications: 1024,
        }
    }
}

impl RouterConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

/// 本地存储配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// 待提交标签的持久化文件；为空时仅保存在内存中
    pub pending_tags_path: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: LogLevel,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// SDK 配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SdkConfig {
    pub app_id: String,
    pub environment: String,
    pub api: ApiConfig,
    pub settings: InitSettings,
    pub router: RouterConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

impl SdkConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（PUSH_ 前缀，如 PUSH_API__BASE_URL -> api.base_url）
    pub fn load(app_id: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("PUSH_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("PUSH_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), app_id, &env)
    }

    /// 从指定目录加载配置，便于测试时使用临时目录
    pub fn load_from(config_dir: &Path, app_id: &str, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("app_id", app_id)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{env}.toml"))).required(false))
            // 双下划线分隔层级，避免与字段名内的下划线冲突
            .add_source(
                Environment::with_prefix("PUSH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;

        if config.app_id.trim().is_empty() {
            return Err(ConfigError::Message("app_id 不能为空".to_string()));
        }

        Ok(config)
    }

    /// 以默认值构造，仅指定 app_id
    pub fn with_app_id(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            environment: "development".to_string(),
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.api.retry)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
