//! 异步等待辅助

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// 轮询直到条件成立
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            bail!("等待条件成立超时 ({timeout:?})");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}

/// 带超时地等待一个结果句柄
pub async fn within<F, T>(timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .context("等待结果超时")
}
