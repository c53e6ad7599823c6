//! # Data Models Module / 数据模型模块
//!
//! This module defines the data structures that cross the process boundary: the
//! decoded request, the outcome produced by the executor and the wire-level result
//! written to stdout.
//!
//! 此模块定义跨越进程边界的数据结构：解码后的请求、执行器产生的结果，
//! 以及写入 stdout 的线路级结果。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One unit of work: a single test item extracted from a source file.
/// Every field is required; a missing or mistyped one fails the whole decode.
///
/// 一个工作单元：从源文件中提取的单个测试项。
/// 所有字段均为必填；任何字段缺失或类型错误都会导致整个解码失败。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItemRequest {
    /// `file://` URI of the source file containing the test item.
    pub uri: String,
    /// Display name of the test item / 测试项的显示名称
    pub name: String,
    /// Package under test; empty means no package import.
    /// 被测试的包；为空表示不导入包。
    #[serde(rename = "packageName")]
    pub package_name: String,
    #[serde(rename = "useDefaultUsings")]
    pub use_default_usings: bool,
    /// Zero-based line where the body starts in the original file.
    pub line: u32,
    /// Zero-based column where the body starts in the original file.
    pub column: u32,
    pub code: String,
    /// Project to activate; empty means a temporary environment.
    pub project_path: String,
    /// Package directory, used only with a temporary environment.
    pub package_path: String,
}

impl TestItemRequest {
    /// Decodes a request from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to decode test item request")
    }
}

/// Zero-based line/character position / 从 0 开始的行/字符位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    /// A zero-width location at the start of `line`.
    pub fn at_line(uri: impl Into<String>, line: u32) -> Self {
        let position = Position { line, character: 0 };
        Self {
            uri: uri.into(),
            range: Range {
                start: position,
                end: position,
            },
        }
    }
}

/// One diagnostic: a rendered message and the source line it belongs to.
/// 一条诊断信息：渲染后的消息及其所属的源代码行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub message: String,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Errored,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// The outcome of running one test item.
///
/// 运行单个测试项的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Every assertion in the collection held.
    /// 集合中的所有断言均成立。
    Passed { duration: Duration },
    /// The body ran to completion but one or more assertions failed.
    /// 测试体运行完成，但有一个或多个断言失败。
    Failed {
        items: Vec<FailureRecord>,
        duration: Duration,
    },
    /// An error aborted the run. `duration` is `None` when it happened before timing began.
    /// 错误中止了运行。若错误发生在计时开始之前，`duration` 为 `None`。
    Errored {
        items: Vec<FailureRecord>,
        duration: Option<Duration>,
    },
}

impl ExecutionOutcome {
    pub fn status(&self) -> TestStatus {
        match self {
            ExecutionOutcome::Passed { .. } => TestStatus::Passed,
            ExecutionOutcome::Failed { .. } => TestStatus::Failed,
            ExecutionOutcome::Errored { .. } => TestStatus::Errored,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            ExecutionOutcome::Passed { duration } | ExecutionOutcome::Failed { duration, .. } => {
                Some(*duration)
            }
            ExecutionOutcome::Errored { duration, .. } => *duration,
        }
    }

    pub fn items(&self) -> &[FailureRecord] {
        match self {
            ExecutionOutcome::Passed { .. } => &[],
            ExecutionOutcome::Failed { items, .. } | ExecutionOutcome::Errored { items, .. } => items,
        }
    }
}

/// The wire-level response written to stdout.
///
/// 写入 stdout 的线路级响应。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestserverResult {
    pub status: TestStatus,
    #[serde(rename = "message")]
    pub messages: Option<Vec<FailureRecord>>,
    /// Milliseconds, fractional / 毫秒（可含小数）
    #[serde(rename = "duration")]
    pub duration_ms: Option<f64>,
}
