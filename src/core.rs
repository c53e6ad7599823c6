//! # Core Module / 核心模块
//!
//! This module contains the core functionality of the runner: the request and
//! result models, configuration, environment resolution and test item execution.
//!
//! 此模块包含运行器的核心功能：请求与结果模型、配置、环境解析以及测试项执行。

pub mod config;
pub mod environment;
pub mod execution;
pub mod models;

// Re-exports
pub use config::RunnerConfig;
pub use environment::{resolve, Environment};
pub use execution::run_test_item;
pub use models::{ExecutionOutcome, TestItemRequest, TestserverResult};
