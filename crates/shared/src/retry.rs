//! 后端请求的退避重试
//!
//! 只重试 `PushError::is_retryable` 为真的错误（网络故障），
//! 后端拒绝与输入错误原样返回。

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PushError;

/// 指数退避参数
///
/// 第 n 次重试前等待 `initial_delay * multiplier^n`，上限 `max_delay`。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次请求之外的最多重试次数
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 依次产出每次重试前的等待时间，共 `max_retries` 个
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            next: self.initial_delay,
            remaining: self.max_retries,
        }
    }
}

/// `RetryPolicy::backoff` 返回的等待时间序列
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    next: Duration,
    remaining: u32,
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next.min(self.policy.max_delay);
        self.next = self
            .next
            .mul_f64(self.policy.multiplier.max(1.0))
            .min(self.policy.max_delay);
        Some(current)
    }
}

/// 按策略执行 `operation`，返回首个成功结果或最后一个错误
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, PushError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PushError>>,
{
    let mut delays = policy.backoff();
    let mut retries = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(operation = operation_name, retries, "重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        let Some(delay) = delays.next() else {
            warn!(
                operation = operation_name,
                retries,
                error = %err,
                "重试次数耗尽"
            );
            return Err(err);
        };

        warn!(
            operation = operation_name,
            retry = retries + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "请求失败，退避后重试"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}
