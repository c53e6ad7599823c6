//! # Console Reporting Module / 控制台报告模块
//!
//! The optional human-readable summary printed to stderr after the JSON result.
//!
//! 在 JSON 结果之后打印到 stderr 的可选人类可读摘要。

use colored::*;
use std::io::Write;

use crate::core::models::{TestStatus, TestserverResult};

/// Formats a duration the way editor annotations show it: `(12ms)` below 100 ms,
/// `(1.23s)` otherwise.
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 100.0 {
        format!("({}ms)", duration_ms.round() as u64)
    } else {
        format!("({:.2}s)", duration_ms / 1000.0)
    }
}

/// Prints a formatted summary of one test item result.
///
/// 打印单个测试项结果的格式化摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Test Item ---
///   - failed   | adds numbers (3ms)
///     [1] file:///src/test.ti:6
///         Test Failed at /src/test.ti:6
///           Expression: 1 == 2
/// ```
pub fn print_summary(out: &mut dyn Write, name: &str, result: &TestserverResult) -> std::io::Result<()> {
    writeln!(out, "\n{}", "--- Test Item ---".bold())?;
    let status = result.status.to_string();
    let status_colored = match result.status {
        TestStatus::Passed => status.green(),
        TestStatus::Failed => status.red(),
        TestStatus::Errored => status.yellow(),
    };
    let duration = result
        .duration_ms
        .map(format_duration)
        .unwrap_or_else(|| "(N/A)".to_string());
    writeln!(out, "  - {:<8} | {} {}", status_colored, name.cyan(), duration.dimmed())?;

    let messages = result.messages.as_deref().unwrap_or_default();
    for (i, record) in messages.iter().enumerate() {
        let location = &record.location;
        let uri = if location.uri.is_empty() {
            "<unknown>"
        } else {
            location.uri.as_str()
        };
        writeln!(out, "    [{}] {}:{}", i + 1, uri, location.range.start.line + 1)?;
        for line in record.message.lines() {
            writeln!(out, "        {line}")?;
        }
    }
    Ok(())
}
