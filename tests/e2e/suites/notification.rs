//! 通知测试套件
//!
//! 覆盖推送接收、展示策略与用户交互的路由。

use crate::data::*;
use crate::helpers::*;
use crate::setup::{TestEnvConfig, TestEnvironment};
use push_client::{AppState, PushError, UserInteraction};
use std::time::Duration;

#[cfg(test)]
mod display_tests {
    use super::*;

    /// 后台收到的普通推送以原生通知展示
    #[tokio::test]
    async fn test_background_push_is_displayed() {
        let env = TestEnvironment::setup().unwrap();
        env.client
            .events()
            .push_received(&alert_push("bg-1"), AppState::Background)
            .unwrap();

        wait_until(env.config.timeout, || env.platform.displayed().len() == 1)
            .await
            .unwrap();
        assert_eq!(*env.received.lock(), vec!["bg-1".to_string()]);
    }

    /// 静默推送只回调不展示
    #[tokio::test]
    async fn test_silent_push_is_never_displayed() {
        let env = TestEnvironment::setup().unwrap();
        let events = env.client.events();
        events
            .push_received(&silent_push("silent-1"), AppState::Background)
            .unwrap();
        events
            .push_received(&silent_push("silent-2"), AppState::Active)
            .unwrap();

        wait_until(env.config.timeout, || env.received.lock().len() == 2)
            .await
            .unwrap();
        assert!(env.platform.displayed().is_empty());
    }

    /// 前台且关闭应用内弹窗时不展示
    #[tokio::test]
    async fn test_foreground_without_in_app_alerts() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            in_app_alerts: false,
            ..Default::default()
        })
        .unwrap();
        let events = env.client.events();
        events
            .push_received(&alert_push("fg-1"), AppState::Active)
            .unwrap();
        events
            .push_received(&alert_push("bg-2"), AppState::Background)
            .unwrap();

        wait_until(env.config.timeout, || env.received.lock().len() == 2)
            .await
            .unwrap();
        assert_eq!(env.platform.displayed(), vec!["bg-2".to_string()]);
    }

    /// 接收回调可以否决展示
    #[tokio::test]
    async fn test_received_handler_can_suppress() {
        let env = TestEnvironment::setup_with(TestEnvConfig {
            suppress_display: true,
            ..Default::default()
        })
        .unwrap();
        env.client
            .events()
            .push_received(&alert_push("muted"), AppState::Background)
            .unwrap();

        wait_until(env.config.timeout, || env.received.lock().len() == 1)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(env.platform.displayed().is_empty());
    }

    /// 格式错误的推送同步报错，不触发回调
    #[tokio::test]
    async fn test_malformed_push_is_rejected() {
        let env = TestEnvironment::setup().unwrap();
        let err = env
            .client
            .events()
            .push_received(&malformed_push(), AppState::Background)
            .unwrap_err();
        assert!(matches!(err, PushError::MalformedPayload { .. }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(env.received.lock().is_empty());
    }
}

#[cfg(test)]
mod interaction_tests {
    use super::*;

    /// 点击按钮：交互回调带按钮 ID，并上报打开事件
    #[tokio::test]
    async fn test_button_tap_routes_action_and_reports_opened() {
        let env = TestEnvironment::setup().unwrap();
        let identity = env.wait_registered().await.unwrap();
        let events = env.client.events();

        events
            .push_received(&alert_push("tap-1"), AppState::Background)
            .unwrap();
        events.user_interaction(UserInteraction::button("tap-1", "view", AppState::Active));

        wait_until(env.config.timeout, || !env.backend.opened_reports().is_empty())
            .await
            .unwrap();
        assert_eq!(
            *env.actions.lock(),
            vec![("tap-1".to_string(), Some("view".to_string()))]
        );
        assert_eq!(
            env.backend.opened_reports(),
            vec![(identity.user_id, "tap-1".to_string())]
        );
    }

    /// 同一条通知只路由一次交互
    #[tokio::test]
    async fn test_second_interaction_is_ignored() {
        let env = TestEnvironment::setup().unwrap();
        let events = env.client.events();

        events
            .push_received(&alert_push("once"), AppState::Background)
            .unwrap();
        events.user_interaction(UserInteraction::opened("once", AppState::Active));
        events.user_interaction(UserInteraction::button("once", "later", AppState::Active));

        wait_until(env.config.timeout, || env.actions.lock().len() == 1)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*env.actions.lock(), vec![("once".to_string(), None)]);
    }

    /// 未知通知的交互被丢弃
    #[tokio::test]
    async fn test_interaction_for_unknown_notification_is_dropped() {
        let env = TestEnvironment::setup().unwrap();
        env.client
            .events()
            .user_interaction(UserInteraction::opened("ghost", AppState::Active));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(env.actions.lock().is_empty());
        assert!(env.received.lock().is_empty());
    }

    /// 重复投递在窗口内只回调一次
    #[tokio::test]
    async fn test_duplicate_delivery_within_window() {
        let env = TestEnvironment::setup().unwrap();
        let events = env.client.events();
        for _ in 0..3 {
            events
                .push_received(&alert_push("dup"), AppState::Background)
                .unwrap();
        }

        wait_until(env.config.timeout, || env.received.lock().len() == 1)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(env.received.lock().len(), 1);
        assert_eq!(env.platform.displayed().len(), 1);
    }
}
