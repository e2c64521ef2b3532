//! 自定义断言宏
//!
//! 针对内存后端状态的断言。

/// 断言后端中设备的某个标签值
#[macro_export]
macro_rules! assert_backend_tag {
    ($backend:expr, $player:expr, $key:expr, $value:expr) => {
        let tags = $backend.tags($player);
        assert_eq!(
            tags.get($key).map(String::as_str),
            Some($value),
            "设备 {} 的标签 {} 应为 {}，实际标签: {:?}",
            $player,
            $key,
            $value,
            tags
        );
    };
}

/// 断言后端中设备不存在某个标签
#[macro_export]
macro_rules! assert_backend_tag_absent {
    ($backend:expr, $player:expr, $key:expr) => {
        let tags = $backend.tags($player);
        assert!(
            !tags.contains_key($key),
            "设备 {} 不应有标签 {}，实际标签: {:?}",
            $player,
            $key,
            tags
        );
    };
}
