//! # Run Command Module / 运行命令模块
//!
//! This module implements the runner's single command: decode one request, resolve
//! its environment, execute the test item and write the JSON result to stdout.
//!
//! 此模块实现运行器唯一的命令：解码一个请求、解析其环境、执行测试项，
//! 并将 JSON 结果写入 stdout。

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

use crate::{
    core::{
        config::RunnerConfig,
        environment,
        execution::run_test_item,
        models::{TestItemRequest, TestserverResult},
    },
    infra::{fs::read_text, logging::init_logging},
    reporting::{console::print_summary, json::{translate, write_result}},
};

/// Options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The request JSON, `-` for stdin, or `@path` for a file.
    pub request: String,
    pub config: Option<PathBuf>,
    pub report: bool,
    pub verbose: bool,
}

/// Executes the run command with the provided options.
///
/// # Returns
/// `Ok` once the result has been written; any error means no result was produced
pub fn execute(options: RunOptions) -> Result<()> {
    let config = RunnerConfig::resolve(options.config.as_deref())?;
    init_logging(&config.log_filter);
    if !config.color {
        colored::control::set_override(false);
    }

    let text = read_request_text(&options.request)?;
    let request = TestItemRequest::from_json(&text)?;
    info!(item = %request.name, uri = %request.uri, "decoded request");

    let result = run_request(&request, &config, options.verbose)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_result(&mut handle, &result)?;

    if options.report {
        print_summary(&mut io::stderr(), &request.name, &result)
            .context("Failed to print the test report")?;
    }
    Ok(())
}

/// Resolves the environment for `request`, runs it and translates the outcome.
/// Environment progress goes to stderr when `verbose`, otherwise it is discarded.
/// Output printed by the test body always goes to stderr.
pub fn run_request(
    request: &TestItemRequest,
    config: &RunnerConfig,
    verbose: bool,
) -> Result<TestserverResult> {
    let mut progress: Box<dyn Write> = if verbose {
        Box::new(io::stderr())
    } else {
        Box::new(io::sink())
    };
    let env = environment::resolve(request, config, progress.as_mut())
        .with_context(|| format!("Failed to resolve the environment for `{}`", request.name))?;
    drop(progress);

    let env = Rc::new(env);
    let outcome = run_test_item(request, env, Box::new(io::stderr()))?;
    debug!(status = %outcome.status(), failures = outcome.items().len(), "translating outcome");
    Ok(translate(&outcome))
}

/// Reads the request text: inline JSON, `-` for stdin, or `@path` for a file.
pub fn read_request_text(arg: &str) -> Result<String> {
    if arg == "-" {
        return io::read_to_string(io::stdin()).context("Failed to read request from stdin");
    }
    if let Some(path) = arg.strip_prefix('@') {
        return read_text(Path::new(path));
    }
    Ok(arg.to_string())
}
