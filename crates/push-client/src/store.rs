//! 待提交标签的持久化
//!
//! 进程重启后恢复尚未提交的标签变更。恢复出的条目没有等待中的调用方，
//! 提交结果只记录日志。

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use push_shared::error::{PushError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 标签变更操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOp {
    Set(String),
    Delete,
}

impl TagOp {
    /// 提交到后端时的值，None 表示删除
    pub fn submitted_value(&self) -> Option<String> {
        match self {
            Self::Set(value) => Some(value.clone()),
            Self::Delete => None,
        }
    }
}

/// 一条待提交的标签变更，`value` 为 null 表示删除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub key: String,
    pub value: Option<String>,
}

impl PendingMutation {
    pub fn new(key: impl Into<String>, op: &TagOp) -> Self {
        Self {
            key: key.into(),
            value: op.submitted_value(),
        }
    }

    pub fn op(&self) -> TagOp {
        match &self.value {
            Some(value) => TagOp::Set(value.clone()),
            None => TagOp::Delete,
        }
    }
}

/// 标签队列存储接口
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn load(&self) -> Result<Vec<PendingMutation>>;

    /// 用当前快照覆盖已保存的内容
    async fn save(&self, pending: &[PendingMutation]) -> Result<()>;
}

/// 内存存储，进程退出即丢失
#[derive(Default)]
pub struct MemoryTagStore {
    entries: Mutex<Vec<PendingMutation>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<PendingMutation>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn snapshot(&self) -> Vec<PendingMutation> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn load(&self) -> Result<Vec<PendingMutation>> {
        Ok(self.snapshot())
    }

    async fn save(&self, pending: &[PendingMutation]) -> Result<()> {
        *self.entries.lock() = pending.to_vec();
        Ok(())
    }
}

/// JSON 文件存储
///
/// 先写临时文件再重命名，避免进程中途退出留下半个文件。
pub struct JsonFileTagStore {
    path: PathBuf,
}

impl JsonFileTagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl TagStore for JsonFileTagStore {
    async fn load(&self) -> Result<Vec<PendingMutation>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PushError::malformed_with_cause("待提交标签文件已损坏", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PushError::InternalInconsistency(format!(
                "读取待提交标签失败: {e}"
            ))),
        }
    }

    async fn save(&self, pending: &[PendingMutation]) -> Result<()> {
        let bytes = serde_json::to_vec(pending)
            .map_err(|e| PushError::InternalInconsistency(format!("序列化待提交标签失败: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    PushError::InternalInconsistency(format!("创建存储目录失败: {e}"))
                })?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| PushError::InternalInconsistency(format!("写入待提交标签失败: {e}")))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| PushError::InternalInconsistency(format!("替换待提交标签文件失败: {e}")))?;

        debug!(path = %self.path.display(), entries = pending.len(), "待提交标签已保存");
        Ok(())
    }
}
