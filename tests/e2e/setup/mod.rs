//! 测试环境

mod environment;

pub use environment::{TestEnvConfig, TestEnvironment};
