//! 推送消息样例

use serde_json::{Value, json};

/// 带标题、正文和按钮的普通推送
pub fn alert_push(id: &str) -> Value {
    json!({
        "aps": {
            "alert": { "title": "订单更新", "body": format!("通知 {id}") },
            "badge": 1,
            "sound": "default"
        },
        "custom": {
            "i": id,
            "u": "https://example.com/orders",
            "a": {
                "order_id": 42,
                "actionButtons": [
                    { "id": "view", "text": "查看" },
                    { "id": "later", "text": "稍后" }
                ]
            }
        }
    })
}

/// 只有 content-available 的静默推送
pub fn silent_push(id: &str) -> Value {
    json!({
        "aps": { "content-available": 1 },
        "custom": { "i": id, "a": { "sync": true } }
    })
}

/// 缺少通知 ID 的推送
pub fn malformed_push() -> Value {
    json!({ "aps": { "alert": "无 ID" }, "custom": {} })
}
