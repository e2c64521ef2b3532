//! SDK 指标
//!
//! 基于 metrics facade 记录通知路由与标签同步的计数。
//! 未安装 recorder 时所有调用都是空操作。

/// 注册指标描述
pub fn describe() {
    metrics::describe_counter!(
        "push_notifications_received_total",
        "Total number of inbound notifications, by outcome"
    );
    metrics::describe_counter!(
        "push_notification_actions_total",
        "Total number of notification interactions, by outcome"
    );
    metrics::describe_counter!(
        "push_tag_flushes_total",
        "Total number of tag batch submissions, by status"
    );
    metrics::describe_histogram!(
        "push_tag_flush_size",
        "Number of distinct tag keys per submitted batch"
    );
    metrics::describe_counter!(
        "push_registrations_total",
        "Total number of device registration attempts, by status"
    );
}

/// 记录一次通知接收
///
/// outcome: delivered / duplicate / malformed
pub fn record_notification_received(outcome: &str) {
    metrics::counter!(
        "push_notifications_received_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次用户交互
///
/// outcome: dispatched / no_handler / duplicate / orphaned
pub fn record_notification_action(action: &str, outcome: &str) {
    metrics::counter!(
        "push_notification_actions_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次标签批量提交
pub fn record_tag_flush(status: &str, keys: usize) {
    metrics::counter!("push_tag_flushes_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("push_tag_flush_size").record(keys as f64);
}

/// 记录一次设备注册
pub fn record_registration(status: &str) {
    metrics::counter!("push_registrations_total", "status" => status.to_string()).increment(1);
}
