//! # Test Collections / 测试集合
//!
//! The base testing facility: a collection gathers the outcome of every `@test`
//! evaluated while it is the active target, and `finish` turns any failures into a
//! single aggregate error.
//!
//! 基础测试设施：集合在作为活动目标期间收集每个 `@test` 的结果，
//! `finish` 会将所有失败汇总为单个聚合错误。

use std::fmt;
use std::path::PathBuf;

/// Whether an assertion evaluated to `false` or threw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    Fail,
    Error,
}

/// A failed assertion as recorded by the collection. `line` is 1-based.
/// 集合记录的失败断言。`line` 从 1 开始。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAssertion {
    pub kind: AssertionKind,
    pub description: String,
    pub file: Option<PathBuf>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestRecord {
    Pass,
    Failed(FailedAssertion),
    Nested(TestCollection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCollection {
    pub name: String,
    records: Vec<TestRecord>,
}

/// Counts for a collection that finished without failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSummary {
    pub name: String,
    pub passed: usize,
}

/// The aggregate error raised when a finished collection contains failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSetFailures {
    pub name: String,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Depth-first, in evaluation order.
    pub failures: Vec<FailedAssertion>,
}

impl fmt::Display for TestSetFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Some tests did not pass: {} passed, {} failed, {} errored.",
            self.name, self.passed, self.failed, self.errored
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinishError {
    #[error("{0}")]
    Failures(TestSetFailures),
    #[error("cannot finish test collection `{expected}`: the active collection is {found}")]
    Unbalanced { expected: String, found: String },
}

impl TestCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, record: TestRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn passed(&self) -> usize {
        self.records
            .iter()
            .map(|r| match r {
                TestRecord::Pass => 1,
                TestRecord::Nested(child) => child.passed(),
                TestRecord::Failed(_) => 0,
            })
            .sum()
    }

    /// All failed and errored assertions, depth-first.
    pub fn failures(&self) -> Vec<FailedAssertion> {
        let mut out = Vec::new();
        self.collect_failures(&mut out);
        out
    }

    fn collect_failures(&self, out: &mut Vec<FailedAssertion>) {
        for record in &self.records {
            match record {
                TestRecord::Pass => {}
                TestRecord::Failed(f) => out.push(f.clone()),
                TestRecord::Nested(child) => child.collect_failures(out),
            }
        }
    }

    /// Finalizes the collection. Any failure anywhere in the tree yields `FinishError::Failures`.
    pub fn finish(self) -> Result<TestSummary, FinishError> {
        let failures = self.failures();
        let passed = self.passed();
        if failures.is_empty() {
            return Ok(TestSummary {
                name: self.name,
                passed,
            });
        }
        let errored = failures
            .iter()
            .filter(|f| f.kind == AssertionKind::Error)
            .count();
        Err(FinishError::Failures(TestSetFailures {
            name: self.name,
            passed,
            failed: failures.len() - errored,
            errored,
            failures,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: AssertionKind, line: u32) -> FailedAssertion {
        FailedAssertion {
            kind,
            description: format!("failure at {line}"),
            file: None,
            line,
        }
    }

    #[test]
    fn finish_without_failures_reports_passes() {
        let mut set = TestCollection::new("outer");
        set.record(TestRecord::Pass);
        set.record(TestRecord::Pass);
        assert_eq!(
            set.finish(),
            Ok(TestSummary {
                name: "outer".to_string(),
                passed: 2
            })
        );
    }

    #[test]
    fn finish_aggregates_nested_failures_in_order() {
        let mut inner = TestCollection::new("inner");
        inner.record(TestRecord::Failed(failure(AssertionKind::Error, 4)));
        inner.record(TestRecord::Pass);

        let mut outer = TestCollection::new("outer");
        outer.record(TestRecord::Failed(failure(AssertionKind::Fail, 2)));
        outer.record(TestRecord::Nested(inner));
        outer.record(TestRecord::Failed(failure(AssertionKind::Fail, 9)));

        match outer.finish() {
            Err(FinishError::Failures(agg)) => {
                assert_eq!(agg.passed, 1);
                assert_eq!(agg.failed, 2);
                assert_eq!(agg.errored, 1);
                let lines: Vec<u32> = agg.failures.iter().map(|f| f.line).collect();
                assert_eq!(lines, vec![2, 4, 9]);
            }
            other => panic!("expected failures, got {other:?}"),
        }
    }
}
