//! # Result Encoding / 结果编码
//!
//! Maps an [`ExecutionOutcome`] onto the wire-level [`TestserverResult`] and writes
//! it as a single JSON document.
//!
//! 将 [`ExecutionOutcome`] 映射为线路级的 [`TestserverResult`]，并将其写为单个 JSON 文档。

use anyhow::{Context, Result};
use std::io::Write;

use crate::core::models::{ExecutionOutcome, TestserverResult};

/// Pure mapping from an outcome to the wire result. A passed outcome carries no messages.
///
/// 从结果到线路结果的纯映射。通过的结果不携带消息。
pub fn translate(outcome: &ExecutionOutcome) -> TestserverResult {
    let messages = match outcome {
        ExecutionOutcome::Passed { .. } => None,
        ExecutionOutcome::Failed { items, .. } | ExecutionOutcome::Errored { items, .. } => {
            Some(items.clone())
        }
    };
    TestserverResult {
        status: outcome.status(),
        messages,
        duration_ms: outcome.duration().map(|d| d.as_secs_f64() * 1000.0),
    }
}

/// Serializes `result` to `writer` followed by a newline, then flushes.
pub fn write_result(writer: &mut dyn Write, result: &TestserverResult) -> Result<()> {
    let json = serde_json::to_string(result).context("Failed to encode test result")?;
    writeln!(writer, "{json}").context("Failed to write test result")?;
    writer.flush().context("Failed to flush test result")?;
    Ok(())
}
