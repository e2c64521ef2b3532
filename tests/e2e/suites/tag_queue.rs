//! 标签队列测试套件
//!
//! 注册前的标签变更进入队列，注册完成后按提交顺序批量提交。

use crate::helpers::*;
use crate::setup::{TestEnvConfig, TestEnvironment};
use push_client::RegistrationState;

#[cfg(test)]
mod offline_queue_tests {
    use super::*;

    /// 初始化时注册挂起，标签先入队，注册完成后提交
    #[tokio::test]
    async fn test_send_tag_before_registration_is_flushed_after() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let ticket = env.client.send_tag("level", "5").unwrap();
        assert_eq!(env.client.pending_tags(), 1);
        assert!(env.backend.tag_calls().is_empty(), "注册前不应提交标签");

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();

        let result = within(env.config.timeout, ticket).await.unwrap().unwrap();
        assert_eq!(result.get("level"), Some(&Some("5".to_string())));
        crate::assert_backend_tag!(env.backend, &identity.user_id, "level", "5");
        assert_eq!(env.client.pending_tags(), 0);
    }

    /// 后端离线导致注册失败，恢复在线后重新注册并提交
    #[tokio::test]
    async fn test_offline_initialize_then_recover() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            start_offline: true,
            ..Default::default()
        })
        .unwrap();

        let ticket = env.client.send_tag("level", "5").unwrap();

        let mut updates = env.client.state_updates();
        within(
            env.config.timeout,
            updates.wait_for(|s| {
                *s == RegistrationState::Unregistered && env.backend.registration_attempts() > 0
            }),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(env.client.pending_tags(), 1, "注册失败后标签仍在队列中");

        env.go_online();
        env.client.register_for_push_notifications();
        let identity = env.wait_registered().await.unwrap();

        let result = within(env.config.timeout, ticket).await.unwrap().unwrap();
        assert_eq!(result.get("level"), Some(&Some("5".to_string())));
        crate::assert_backend_tag!(env.backend, &identity.user_id, "level", "5");
    }
}

#[cfg(test)]
mod coalescing_tests {
    use super::*;

    /// 同一个键的后一次变更覆盖前一次
    #[tokio::test]
    async fn test_last_writer_wins() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let first = env.client.send_tag("a", "1").unwrap();
        let second = env.client.send_tag("a", "2").unwrap();
        assert_eq!(env.client.pending_tags(), 1);

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();

        // 两个请求共享同一次提交的结果
        let first = within(env.config.timeout, first).await.unwrap().unwrap();
        let second = within(env.config.timeout, second).await.unwrap().unwrap();
        assert_eq!(first.get("a"), Some(&Some("2".to_string())));
        assert_eq!(second.get("a"), Some(&Some("2".to_string())));

        crate::assert_backend_tag!(env.backend, &identity.user_id, "a", "2");
        let calls = env.backend.tag_calls();
        assert_eq!(calls.len(), 1, "合并后只提交一次");
        assert_eq!(calls[0].1.get("a"), Some(&Some("2".to_string())));
    }

    /// 先设置再删除，提交后键不存在
    #[tokio::test]
    async fn test_send_then_delete_leaves_key_absent() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let set = env.client.send_tag("k", "a").unwrap();
        let delete = env.client.delete_tag("k").unwrap();

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();

        let set = within(env.config.timeout, set).await.unwrap().unwrap();
        let delete = within(env.config.timeout, delete).await.unwrap().unwrap();
        assert_eq!(set.get("k"), Some(&None), "被覆盖的请求报告实际提交的删除");
        assert_eq!(delete.get("k"), Some(&None));

        crate::assert_backend_tag_absent!(env.backend, &identity.user_id, "k");
    }

    /// 不同键按首次提交的顺序出现在同一批次中
    #[tokio::test]
    async fn test_batch_preserves_first_submission_order() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let _ = env.client.send_tag("x", "1").unwrap();
        let _ = env.client.send_tags([("y", "2"), ("z", "3")]).unwrap();
        let last = env.client.send_tag("x", "4").unwrap();

        env.release_registration();
        env.wait_registered().await.unwrap();
        within(env.config.timeout, last).await.unwrap().unwrap();

        let calls = env.backend.tag_calls();
        assert_eq!(calls.len(), 1);
        let keys: Vec<&str> = calls[0].1.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x", "y", "z"]);
        assert_eq!(calls[0].1.get("x"), Some(&Some("4".to_string())));
    }
}

#[cfg(test)]
mod registered_tests {
    use super::*;

    /// 注册后的标签变更直接提交，getTags 读取后端确认的状态
    #[tokio::test]
    async fn test_tags_round_trip_through_backend() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        within(env.config.timeout, env.client.send_tags([("plan", "pro"), ("seats", "3")]).unwrap())
            .await
            .unwrap()
            .unwrap();
        within(env.config.timeout, env.client.delete_tags(["seats"]).unwrap())
            .await
            .unwrap()
            .unwrap();

        let tags = within(env.config.timeout, env.client.get_tags())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tags.get("plan").map(String::as_str), Some("pro"));
        assert!(!tags.contains_key("seats"));
        assert_eq!(tags, env.backend.tags(&identity.user_id));
    }

    /// JSON 字符串形式的标签操作
    #[tokio::test]
    async fn test_json_tag_operations() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        within(env.config.timeout, env.client.send_tags_json(r#"{"a": "1", "b": 2}"#).unwrap())
            .await
            .unwrap()
            .unwrap();
        within(env.config.timeout, env.client.delete_tags_json(r#"["a"]"#).unwrap())
            .await
            .unwrap()
            .unwrap();

        crate::assert_backend_tag_absent!(env.backend, &identity.user_id, "a");
        crate::assert_backend_tag!(env.backend, &identity.user_id, "b", "2");
    }
}
