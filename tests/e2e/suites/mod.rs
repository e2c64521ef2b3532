//! 测试套件模块
//!
//! 按功能组织的测试用例集合。

pub mod delivery_contract;
pub mod notification;
pub mod registration;
pub mod tag_queue;
