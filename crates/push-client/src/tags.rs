//! 标签变更队列
//!
//! 标签操作在任何注册状态下都会被接受，先进入按键合并的待提交队列：
//! 同一个键的后一次变更覆盖前一次尚未提交的变更（后写者胜），
//! 键保持首次入队时的位置。设备注册完成后整队按 FIFO 顺序批量提交，
//! 同一时刻最多只有一个批次在途，保证同一键的变更按提交顺序到达后端。
//!
//! 每个调用方请求持有一个 `Completion`，批次结束后恰好回报一次；
//! 回报内容是该请求涉及的每个键实际提交的值（被覆盖的请求看到的是最终值）。
//!
//! 网络故障在重试耗尽后仍向调用方回报失败，但变更会放回队列并持久化，
//! 下一次提交时重放；后端明确拒绝的批次直接丢弃。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use push_shared::error::PushError;
use push_shared::observability::metrics::record_tag_flush;
use push_shared::retry::{RetryPolicy, retry_with_policy};
use tracing::{debug, error, info, warn};

use crate::backend::{PushBackend, TagChanges};
use crate::completion::Completion;
use crate::store::{PendingMutation, TagOp, TagStore};

/// 标签操作的成功结果：键 → 实际提交的值（None 表示已删除）
pub type TagResult = IndexMap<String, Option<String>>;

type RequestId = u64;

struct PendingTag {
    op: TagOp,
    waiters: Vec<RequestId>,
}

struct TagRequest {
    keys: Vec<String>,
    completion: Completion<TagResult>,
}

#[derive(Default)]
struct QueueState {
    pending: IndexMap<String, PendingTag>,
    requests: HashMap<RequestId, TagRequest>,
    next_request_id: RequestId,
}

/// 一次批量提交的结果摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub keys: usize,
    pub requests: usize,
    pub succeeded: bool,
}

/// 待提交标签队列
pub struct TagQueue {
    state: Mutex<QueueState>,
    /// 保证同一时刻只有一个批次在途
    flush_lock: tokio::sync::Mutex<()>,
    /// 串行化持久化写入，最后一次写入总是最新快照
    persist_lock: tokio::sync::Mutex<()>,
    /// 恢复完成前不写存储，避免覆盖上次进程遗留的内容
    restored: AtomicBool,
    store: Arc<dyn TagStore>,
}

impl TagQueue {
    /// 存储中没有需要恢复的内容，立即可以持久化
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self::with_restored(store, true)
    }

    /// 存储中可能有上次进程遗留的变更；`restore` 完成前 `persist` 不写入
    pub fn restoring(store: Arc<dyn TagStore>) -> Self {
        Self::with_restored(store, false)
    }

    fn with_restored(store: Arc<dyn TagStore>, restored: bool) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            flush_lock: tokio::sync::Mutex::new(()),
            persist_lock: tokio::sync::Mutex::new(()),
            restored: AtomicBool::new(restored),
            store,
        }
    }

    /// 入队一个调用方请求
    ///
    /// 同步执行，调用顺序即入队顺序。空请求立即以空结果回报。
    pub fn enqueue(&self, changes: Vec<(String, TagOp)>, completion: Completion<TagResult>) {
        if changes.is_empty() {
            completion.succeed(TagResult::new());
            return;
        }

        let mut state = self.state.lock();
        let request_id = state.next_request_id;
        state.next_request_id += 1;

        let mut keys = Vec::with_capacity(changes.len());
        for (key, op) in changes {
            match state.pending.get_mut(&key) {
                Some(entry) => {
                    debug!(key = %key, "覆盖尚未提交的标签变更");
                    entry.op = op;
                    if !entry.waiters.contains(&request_id) {
                        entry.waiters.push(request_id);
                    }
                }
                None => {
                    state.pending.insert(
                        key.clone(),
                        PendingTag {
                            op,
                            waiters: vec![request_id],
                        },
                    );
                }
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        debug!(
            request_id,
            keys = ?keys,
            operation = completion.operation(),
            pending = state.pending.len(),
            "标签变更已入队"
        );
        state
            .requests
            .insert(request_id, TagRequest { keys, completion });
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// 当前待提交内容，按提交顺序
    pub fn snapshot(&self) -> Vec<PendingMutation> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|(key, entry)| PendingMutation::new(key.clone(), &entry.op))
            .collect()
    }

    /// 从存储恢复上次进程遗留的变更，然后写回合并后的快照
    ///
    /// 已在队列中的键以新变更为准；恢复的条目排在新变更之前。
    pub async fn restore(&self) {
        match self.store.load().await {
            Ok(restored) if !restored.is_empty() => {
                let added = self.requeue(
                    restored
                        .into_iter()
                        .map(|mutation| (mutation.key.clone(), mutation.op())),
                );
                info!(restored = added, "已恢复待提交标签");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "恢复待提交标签失败"),
        }

        let enqueued_meanwhile = self.pending_len() > 0;
        self.restored.store(true, Ordering::SeqCst);
        if enqueued_meanwhile {
            self.persist().await;
        }
    }

    /// 把当前快照写入存储；恢复完成前跳过
    pub async fn persist(&self) {
        if !self.restored.load(Ordering::SeqCst) {
            debug!("待提交标签尚未恢复，暂不写入存储");
            return;
        }
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, entries = snapshot.len(), "保存待提交标签失败");
        }
    }

    /// 提交所有待提交变更
    ///
    /// 在途期间新入队的变更会在本批结束后继续提交，直到队列为空；
    /// 网络故障时本批放回队列并停止，等待下一次触发。
    pub async fn flush(
        &self,
        backend: &dyn PushBackend,
        player_id: &str,
        policy: &RetryPolicy,
    ) -> Vec<FlushReport> {
        let _guard = self.flush_lock.lock().await;
        let mut reports = Vec::new();

        loop {
            let (changes, requests) = self.drain();
            if changes.is_empty() {
                break;
            }

            let outcome = retry_with_policy(policy, "update_tags", || {
                backend.update_tags(player_id, &changes)
            })
            .await;

            let report = FlushReport {
                keys: changes.len(),
                requests: requests.len(),
                succeeded: outcome.is_ok(),
            };
            let mut requeued = false;
            match &outcome {
                Ok(()) => {
                    record_tag_flush("success", changes.len());
                    info!(
                        player_id,
                        keys = changes.len(),
                        requests = requests.len(),
                        "标签批量提交成功"
                    );
                }
                Err(e) if e.is_retryable() => {
                    record_tag_flush("requeued", changes.len());
                    let restored = self.requeue(
                        changes
                            .iter()
                            .map(|(key, value)| (key.clone(), op_from_submitted(value))),
                    );
                    warn!(
                        player_id,
                        keys = changes.len(),
                        requeued = restored,
                        error = %e,
                        "标签提交网络故障，变更已放回队列"
                    );
                    requeued = true;
                }
                Err(e) => {
                    record_tag_flush("failed", changes.len());
                    error!(
                        player_id,
                        keys = changes.len(),
                        requests = requests.len(),
                        error = %e,
                        "标签批量提交被拒绝，本批变更已丢弃"
                    );
                }
            }

            resolve_requests(requests, &changes, outcome);
            reports.push(report);
            self.persist().await;
            if requeued {
                break;
            }
        }

        reports
    }

    /// 把没有调用方的变更放回队列前部，保持它们之间的相对顺序
    ///
    /// 队列中已有的键是更新的变更，保留不动。返回实际放回的条目数。
    fn requeue(&self, mutations: impl IntoIterator<Item = (String, TagOp)>) -> usize {
        let mut state = self.state.lock();
        let mut position = 0usize;
        for (key, op) in mutations {
            if state.pending.contains_key(&key) {
                continue;
            }
            state.pending.shift_insert(
                position,
                key,
                PendingTag {
                    op,
                    waiters: Vec::new(),
                },
            );
            position += 1;
        }
        position
    }

    /// 取出整个待提交队列及其关联的请求
    fn drain(&self) -> (TagChanges, Vec<TagRequest>) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);

        let mut changes = TagChanges::with_capacity(pending.len());
        let mut request_ids: Vec<RequestId> = Vec::new();
        for (key, entry) in pending {
            changes.insert(key, entry.op.submitted_value());
            for id in entry.waiters {
                if !request_ids.contains(&id) {
                    request_ids.push(id);
                }
            }
        }

        let requests = request_ids
            .into_iter()
            .filter_map(|id| state.requests.remove(&id))
            .collect();
        (changes, requests)
    }
}

fn op_from_submitted(value: &Option<String>) -> TagOp {
    match value {
        Some(value) => TagOp::Set(value.clone()),
        None => TagOp::Delete,
    }
}

fn resolve_requests(
    requests: Vec<TagRequest>,
    changes: &TagChanges,
    outcome: Result<(), PushError>,
) {
    for request in requests {
        match &outcome {
            Ok(()) => {
                let result: TagResult = request
                    .keys
                    .iter()
                    .map(|key| (key.clone(), changes.get(key).cloned().flatten()))
                    .collect();
                request.completion.succeed(result);
            }
            Err(e) => request.completion.fail(e.clone()),
        }
    }
}
