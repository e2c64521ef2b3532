//! 异步操作的结果回报
//!
//! 每个异步公开操作持有一个 `Completion`，它只能被消费一次，
//! 因此成功或失败恰好回报一次。回报目标可以是一对回调、一个 `Ticket`
//! （oneshot 通道，可 `.await`），或者在调用方不关心时仅记录日志。
//! `Ticket` 被丢弃不会取消后台请求。

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use push_shared::error::{PushError, Result};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

pub type SuccessCallback<T> = Box<dyn FnOnce(T) + Send + 'static>;
pub type FailureCallback = Box<dyn FnOnce(PushError) + Send + 'static>;

enum Sink<T> {
    Callbacks {
        on_success: Option<SuccessCallback<T>>,
        on_failure: Option<FailureCallback>,
    },
    Channel(oneshot::Sender<Result<T>>),
}

/// 单次完成通知
pub struct Completion<T> {
    operation: &'static str,
    sink: Option<Sink<T>>,
}

impl<T> Completion<T> {
    /// 以回调对作为回报目标，两个回调都可以省略
    pub fn callbacks(
        operation: &'static str,
        on_success: Option<SuccessCallback<T>>,
        on_failure: Option<FailureCallback>,
    ) -> Self {
        Self {
            operation,
            sink: Some(Sink::Callbacks {
                on_success,
                on_failure,
            }),
        }
    }

    /// 调用方不关心结果，只记录日志
    pub fn discard(operation: &'static str) -> Self {
        Self::callbacks(operation, None, None)
    }

    /// 以 oneshot 通道作为回报目标
    pub fn channel(operation: &'static str) -> (Self, Ticket<T>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            operation,
            sink: Some(Sink::Channel(tx)),
        };
        (completion, Ticket { operation, rx })
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// 回报结果，消费自身
    pub fn resolve(mut self, result: Result<T>) {
        if let Some(sink) = self.sink.take() {
            deliver(self.operation, sink, result);
        }
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, err: PushError) {
        self.resolve(Err(err));
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        // 未回报就被丢弃（如运行时关闭）时仍回报一次失败
        if let Some(sink) = self.sink.take() {
            error!(operation = self.operation, "操作在回报结果前被中止");
            deliver(
                self.operation,
                sink,
                Err(PushError::InternalInconsistency(format!(
                    "{} 在完成前被中止",
                    self.operation
                ))),
            );
        }
    }
}

fn deliver<T>(operation: &'static str, sink: Sink<T>, result: Result<T>) {
    match sink {
        Sink::Channel(tx) => {
            if tx.send(result).is_err() {
                debug!(operation, "调用方已不再等待结果");
            }
        }
        Sink::Callbacks {
            on_success,
            on_failure,
        } => match result {
            Ok(value) => match on_success {
                Some(callback) => callback(value),
                None => debug!(operation, "操作成功，结果已丢弃"),
            },
            Err(err) => match on_failure {
                Some(callback) => callback(err),
                None => warn!(operation, error = %err, "操作失败，未注册失败回调"),
            },
        },
    }
}

/// 等待异步操作结果的句柄
pub struct Ticket<T> {
    operation: &'static str,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Ticket<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation;
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(PushError::InternalInconsistency(format!(
                    "{operation} 的结果通道已关闭"
                )))
            })
        })
    }
}
