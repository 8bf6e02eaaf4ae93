//! 测试替身与样例数据
//!
//! 供单元测试、集成测试和基准测试共用，不访问任何外部服务。

pub mod fakes;
pub mod fixtures;

pub use fakes::{RecordingSynthesizer, ScriptedCompletion};
