//! # Test Item Runner Library / 测试项运行器库
//!
//! This library provides the core functionality of `testitem-runner`, a short-lived
//! worker that runs a single annotated test item in an isolated namespace and
//! reports a structured result with exact source locations.
//!
//! 此库为 `testitem-runner` 提供核心功能。它是一个短生命周期的工作进程，
//! 在隔离的命名空间中运行单个测试项，并报告带有精确源码位置的结构化结果。
//!
//! ## Modules / 模块
//!
//! - `core` - Request models, configuration, environment resolution and execution
//! - `script` - The embedded language test items are written in
//! - `infra` - URI mapping, file system operations and logging
//! - `reporting` - JSON result encoding and the console summary
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 请求模型、配置、环境解析和执行
//! - `script` - 编写测试项所用的嵌入式语言
//! - `infra` - URI 映射、文件系统操作和日志
//! - `reporting` - JSON 结果编码和控制台摘要
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;
pub mod script;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
