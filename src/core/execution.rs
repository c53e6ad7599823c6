//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! Runs one test item in a freshly created namespace and turns whatever happens
//! (a clean finish, collected assertion failures, or a thrown error) into an
//! [`ExecutionOutcome`] whose every diagnostic points at a line of the original file.
//!
//! 在新建的命名空间中运行单个测试项，并将所发生的一切（正常结束、收集到的断言失败
//! 或抛出的错误）转换为 [`ExecutionOutcome`]，其中每条诊断信息都指向原始文件中的某一行。

use anyhow::{Context, Result};
use std::io::Write;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::models::{ExecutionOutcome, FailureRecord, Location, TestItemRequest};
use crate::infra::uri::{path_to_uri_lenient, uri_to_path};
use crate::script::error::{ErrorIntrospection, ScriptError};
use crate::script::interp::Interpreter;
use crate::script::loader::{BuiltinModule, PackageLoader};
use crate::script::testing::{FailedAssertion, FinishError};

/// The entry point for running a single test item.
///
/// # Arguments
/// * `request` - The decoded test item
/// * `loader` - Resolves package names; normally the active [`Environment`](crate::core::environment::Environment)
/// * `output` - Where the test body's `print`/`println` output goes
///
/// # Returns
/// The outcome, or an error for failures that have no structured report
/// (an unusable URI, an unbalanced test collection)
pub fn run_test_item(
    request: &TestItemRequest,
    loader: Rc<dyn PackageLoader>,
    output: Box<dyn Write>,
) -> Result<ExecutionOutcome> {
    let mut interp = Interpreter::new(loader, output);
    execute(&mut interp, request)
}

/// Runs `request` on an existing interpreter. Each call gets its own namespace, so
/// consecutive items never see each other's bindings.
pub fn execute(interp: &mut Interpreter, request: &TestItemRequest) -> Result<ExecutionOutcome> {
    let module = interp.fresh_namespace();
    debug!(item = %request.name, namespace = module.name(), "created namespace");

    if request.use_default_usings {
        let test = BuiltinModule::Test.name();
        if let Err(err) = interp.import(&module, test, true) {
            warn!(item = %request.name, error = %err, "test dependency unavailable");
            let message = format!(
                "Package {test} is not available in the active environment. \
                 Add it to the project's dependencies or to the package's test target \
                 to use the default `using {test}`.\n{}",
                err.render()
            );
            return Ok(errored_at_start(request, message));
        }
        if !request.package_name.is_empty() {
            if let Err(err) = interp.import(&module, &request.package_name, true) {
                warn!(item = %request.name, package = %request.package_name, "package import failed");
                return Ok(errored_at_start(request, err.render()));
            }
        }
    }

    let path = uri_to_path(&request.uri)
        .with_context(|| format!("Cannot run test item `{}`", request.name))?;
    let code = offset_code(&request.code, request.line, request.column);

    interp.push_collection(request.name.clone());
    let start = Instant::now();
    let result = {
        let mut scoped = interp.scoped_source_path(Some(path));
        scoped.eval_string(&module, &code)
    };
    let duration = start.elapsed();

    let outcome = match result {
        Ok(_) => match interp.finish_collection(&request.name) {
            Ok(summary) => {
                debug!(passed = summary.passed, "collection finished");
                ExecutionOutcome::Passed { duration }
            }
            Err(FinishError::Failures(failures)) => ExecutionOutcome::Failed {
                items: failures.failures.iter().map(assertion_record).collect(),
                duration,
            },
            Err(other) => {
                return Err(other)
                    .with_context(|| format!("Test item `{}` left the test state inconsistent", request.name));
            }
        },
        Err(err) => {
            interp.discard_collection();
            errored_from(&err, duration)
        }
    };
    info!(
        item = %request.name,
        status = %outcome.status(),
        duration_ms = duration.as_secs_f64() * 1000.0,
        "test item finished"
    );
    Ok(outcome)
}

/// Prepends `line` newlines and `column` spaces so positions reported while
/// evaluating `code` equal positions in the original file.
pub fn offset_code(code: &str, line: u32, column: u32) -> String {
    let mut out = String::with_capacity(code.len() + line as usize + column as usize);
    out.extend(std::iter::repeat_n('\n', line as usize));
    out.extend(std::iter::repeat_n(' ', column as usize));
    out.push_str(code);
    out
}

fn errored_at_start(request: &TestItemRequest, message: String) -> ExecutionOutcome {
    ExecutionOutcome::Errored {
        items: vec![FailureRecord {
            message,
            location: Location::at_line(request.uri.clone(), request.line),
        }],
        duration: None,
    }
}

fn assertion_record(failure: &FailedAssertion) -> FailureRecord {
    let file = failure
        .file
        .as_ref()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    FailureRecord {
        message: failure.description.clone(),
        location: Location::at_line(path_to_uri_lenient(&file), failure.line.saturating_sub(1)),
    }
}

fn errored_from(err: &ScriptError, duration: Duration) -> ExecutionOutcome {
    let origin = err.origin();
    ExecutionOutcome::Errored {
        items: vec![FailureRecord {
            message: err.render(),
            location: Location::at_line(path_to_uri_lenient(&origin.file), origin.line.saturating_sub(1)),
        }],
        duration: Some(duration),
    }
}
