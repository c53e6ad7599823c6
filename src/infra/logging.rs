//! # Logging / 日志
//!
//! Installs the `tracing` subscriber. Everything goes to stderr because stdout
//! carries the JSON result and nothing else.
//!
//! 安装 `tracing` 订阅者。所有日志都写入 stderr，因为 stdout 只承载 JSON 结果。

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `testitem_runner=debug`.
pub const LOG_ENV_VAR: &str = "TESTITEM_RUNNER_LOG";

/// Initializes logging once per process. `default_filter` applies when
/// [`LOG_ENV_VAR`] is unset or invalid. Later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
