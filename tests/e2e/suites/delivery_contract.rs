//! 结果回报测试套件
//!
//! 每个异步操作在成功、网络故障与后端拒绝下都恰好回报一次。

use crate::helpers::*;
use crate::setup::TestEnvironment;
use parking_lot::Mutex;
use push_client::{Completion, ErrorKind, PushError, TagResult};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// 记录回调次数的 Completion
fn counting<T: Send + 'static>(
    operation: &'static str,
    log: &Arc<Mutex<Vec<Result<(), ErrorKind>>>>,
) -> Completion<T> {
    let ok = log.clone();
    let err = log.clone();
    Completion::callbacks(
        operation,
        Some(Box::new(move |_: T| ok.lock().push(Ok(())))),
        Some(Box::new(move |e: PushError| err.lock().push(Err(e.kind())))),
    )
}

#[cfg(test)]
mod network_failure_tests {
    use super::*;

    /// 后端离线时标签、读取、发送通知都以可重试错误回报一次
    #[tokio::test]
    async fn test_every_operation_reports_once_when_offline() {
        let env = TestEnvironment::setup().unwrap();
        env.wait_registered().await.unwrap();
        env.backend.set_offline(true);

        let log = Arc::new(Mutex::new(Vec::new()));
        env.client
            .send_tags_with([("a", "1")], counting::<TagResult>("send_tags", &log));
        env.client
            .delete_tags_with(["b"], counting::<TagResult>("delete_tags", &log));
        env.client.get_tags_with(counting("get_tags", &log));
        env.client
            .post_notification_with(json!({ "contents": {} }), counting("post_notification", &log));

        wait_until(env.config.timeout, || log.lock().len() == 4)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let log = log.lock().clone();
        assert_eq!(log.len(), 4, "每个操作恰好回报一次");
        assert!(log.iter().all(|r| *r == Err(ErrorKind::NetworkFailure)));
    }

    /// 网络故障的错误可重试，恢复后新的请求成功
    #[tokio::test]
    async fn test_failure_then_recovery() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        env.backend.set_offline(true);
        let err = within(env.config.timeout, env.client.send_tag("k", "v").unwrap())
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(env.client.pending_tags(), 1, "网络故障的变更放回队列");

        // 恢复后由下一次提交重放
        env.backend.set_offline(false);
        within(env.config.timeout, env.client.send_tag("next", "1").unwrap())
            .await
            .unwrap()
            .unwrap();
        crate::assert_backend_tag!(env.backend, &identity.user_id, "k", "v");
        crate::assert_backend_tag!(env.backend, &identity.user_id, "next", "1");
        assert_eq!(env.client.pending_tags(), 0);
    }

    /// 瞬时故障在重试预算内恢复
    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        env.backend.fail_next(PushError::network("503 Service Unavailable"));
        let result = within(env.config.timeout, env.client.send_tag("retry", "ok").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.get("retry"), Some(&Some("ok".to_string())));
        crate::assert_backend_tag!(env.backend, &identity.user_id, "retry", "ok");
    }
}

#[cfg(test)]
mod rejection_tests {
    use super::*;

    /// 后端拒绝不重试，直接以不可重试错误回报
    #[tokio::test]
    async fn test_backend_rejection_is_terminal() {
        let env = TestEnvironment::setup().unwrap();
        env.wait_registered().await.unwrap();

        env.backend.fail_next(PushError::rejected(400, "invalid payload"));
        let err = within(
            env.config.timeout,
            env.client.post_notification(json!({ "contents": {} })).unwrap(),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, PushError::BackendRejected { status: 400, .. }));
        assert!(!err.is_retryable());
        assert_eq!(env.backend.posted_notifications().len(), 0);
    }

    /// 注册前读取标签失败为 NotRegistered
    #[tokio::test]
    async fn test_get_tags_before_registration() {
        let env = TestEnvironment::setup_with(crate::setup::TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let err = within(env.config.timeout, env.client.get_tags())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotRegistered);
        env.release_registration();
    }
}

#[cfg(test)]
mod detached_tests {
    use super::*;

    /// 调用方丢弃结果句柄不会取消后台请求
    #[tokio::test]
    async fn test_dropped_ticket_does_not_cancel() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        drop(env.client.send_tag("detached", "yes").unwrap());

        wait_until(env.config.timeout, || {
            env.backend.tags(&identity.user_id).contains_key("detached")
        })
        .await
        .unwrap();
    }
}
