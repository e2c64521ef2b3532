//! 设备注册测试套件
//!
//! 覆盖注册状态机、订阅状态、ids 回调与注册后的附加同步。

use crate::helpers::*;
use crate::setup::{TestEnvConfig, TestEnvironment};
use parking_lot::Mutex;
use push_client::{Location, PushError, RegistrationState};
use std::sync::Arc;

#[cfg(test)]
mod registration_flow_tests {
    use super::*;

    /// 自动弹出权限请求并完成注册
    #[tokio::test]
    async fn test_auto_prompt_registers_with_token() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();

        assert_eq!(identity.push_token.as_deref(), Some("e2e-token"));
        assert_eq!(env.platform.permission_requests(), 1);
        assert_eq!(
            env.client.state(),
            RegistrationState::Registered { subscribed: true }
        );

        let player = env.backend.player(&identity.user_id).expect("后端应有设备记录");
        assert_eq!(player.push_token.as_deref(), Some("e2e-token"));
        assert!(player.subscribed);
    }

    /// 关闭自动弹窗时不请求权限，之后由应用主动请求
    #[tokio::test]
    async fn test_manual_prompt() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            auto_prompt: false,
            ..Default::default()
        })
        .unwrap();
        env.wait_registered().await.unwrap();
        assert_eq!(env.platform.permission_requests(), 0);

        env.client.register_for_push_notifications();
        wait_until(env.config.timeout, || env.platform.permission_requests() == 1)
            .await
            .unwrap();
        // 已注册，重复请求不会产生新设备
        assert_eq!(env.backend.player_ids().len(), 1);
    }

    /// 用户拒绝权限时仍注册，但没有推送令牌
    #[tokio::test]
    async fn test_denied_permission_registers_without_token() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();
        env.platform.set_permission(false);
        env.release_registration();

        let identity = env.wait_registered().await.unwrap();
        assert!(identity.push_token.is_none());
        let player = env.backend.player(&identity.user_id).unwrap();
        assert!(player.push_token.is_none());
    }
}

#[cfg(test)]
mod subscription_tests {
    use super::*;

    /// 注册前设置的订阅状态在注册后生效并同步到后端
    #[tokio::test]
    async fn test_subscription_set_before_registration() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();
        env.client.set_subscription(false);

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();
        assert_eq!(
            env.client.state(),
            RegistrationState::Registered { subscribed: false }
        );

        wait_until(env.config.timeout, || {
            env.backend
                .player(&identity.user_id)
                .is_some_and(|p| !p.subscribed)
        })
        .await
        .unwrap();
    }

    /// 重复设置相同的订阅状态不会重复请求后端
    #[tokio::test]
    async fn test_set_subscription_is_idempotent() {
        let env = TestEnvironment::setup().unwrap();
        env.wait_registered().await.unwrap();

        env.client.set_subscription(true);
        env.client.set_subscription(false);
        env.client.set_subscription(false);

        wait_until(env.config.timeout, || env.backend.device_updates() == 1)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(env.backend.device_updates(), 1);
    }
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    /// ids 回调在注册时触发，令牌变化时再次触发
    #[tokio::test]
    async fn test_ids_available_on_registration_and_token_change() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        env.client.ids_available(move |user_id, token| {
            sink.lock()
                .push((user_id.to_string(), token.map(str::to_string)));
        });
        assert!(seen.lock().is_empty(), "注册前不应回调");

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();
        wait_until(env.config.timeout, || seen.lock().len() == 1)
            .await
            .unwrap();

        env.platform.set_token(Some("rotated-token"));
        env.client.events().token_refreshed();
        wait_until(env.config.timeout, || seen.lock().len() == 2)
            .await
            .unwrap();

        let seen = seen.lock().clone();
        assert_eq!(seen[0], (identity.user_id.clone(), Some("e2e-token".to_string())));
        assert_eq!(seen[1], (identity.user_id.clone(), Some("rotated-token".to_string())));
        assert_eq!(
            env.backend
                .player(&identity.user_id)
                .and_then(|p| p.push_token)
                .as_deref(),
            Some("rotated-token")
        );
    }

    /// 邮箱哈希在注册后上传，不包含原文
    #[tokio::test]
    async fn test_hashed_email_is_uploaded_after_registration() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            hold_registration: true,
            ..Default::default()
        })
        .unwrap();
        env.client.sync_hashed_email("  Test@Example.com ").unwrap();
        assert!(matches!(
            env.client.sync_hashed_email("invalid"),
            Err(PushError::MalformedPayload { .. })
        ));

        env.release_registration();
        let identity = env.wait_registered().await.unwrap();
        wait_until(env.config.timeout, || {
            env.backend
                .player(&identity.user_id)
                .is_some_and(|p| p.email.is_some())
        })
        .await
        .unwrap();

        let email = env.backend.player(&identity.user_id).and_then(|p| p.email).unwrap();
        assert_eq!(email.md5, "55502f40dc8b7c769880b10874abc9d0");
        assert_eq!(email.sha1, "567159d622ffbb50b11b0efd307be358624a26ee");
    }

    /// 定位能力可用时上传位置
    #[tokio::test]
    async fn test_prompt_location_uploads_coordinates() {
        let location = Location {
            latitude: 31.23,
            longitude: 121.47,
        };
        let env = TestEnvironment::setup_with(TestEnvConfig {
            location: Some(location),
            ..Default::default()
        })
        .unwrap();
        let identity = env.wait_registered().await.unwrap();

        env.client.prompt_location().unwrap();
        wait_until(env.config.timeout, || {
            env.backend
                .player(&identity.user_id)
                .is_some_and(|p| p.location == Some(location))
        })
        .await
        .unwrap();
    }
}
