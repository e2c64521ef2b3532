//! 测试辅助

pub mod assertions;
pub mod waiting;

pub use waiting::*;
