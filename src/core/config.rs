//! # Runner Configuration / 运行器配置
//!
//! The optional TOML file that tunes logging, colors and the environment layout.
//!
//! 可选的 TOML 配置文件，用于调整日志、颜色和环境布局。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::fs::read_text;

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "TESTITEM_RUNNER_CONFIG";

/// Settings loaded from the runner's TOML configuration file.
/// Every field is optional; unknown keys are rejected.
///
/// 从运行器的 TOML 配置文件加载的设置。
/// 所有字段均为可选；未知键会被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// `EnvFilter` directive used when `TESTITEM_RUNNER_LOG` is unset.
    /// 未设置 `TESTITEM_RUNNER_LOG` 时使用的 `EnvFilter` 指令。
    pub log_filter: String,
    /// `false` disables colors in the human-readable report.
    /// 为 `false` 时禁用人类可读报告中的颜色。
    pub color: bool,
    /// File name of project and package manifests.
    /// 项目与包清单的文件名。
    pub manifest_name: String,
    /// Extension of package entry files, without the dot.
    /// 包入口文件的扩展名（不含点）。
    pub source_extension: String,
    /// Name prefix of temporary environment directories.
    /// 临时环境目录的名称前缀。
    pub temp_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            color: true,
            manifest_name: "Project.toml".to_string(),
            source_extension: "ti".to_string(),
            temp_prefix: "testitem_env_".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse runner configuration")
    }

    /// Loads the configuration from `path`, expanding `~` and environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let expanded = expand_path(path)?;
        let text = read_text(&expanded)?;
        Self::from_toml(&text)
            .with_context(|| format!("Invalid configuration file: {}", expanded.display()))
    }

    /// Resolves the configuration source: the explicit path, then `TESTITEM_RUNNER_CONFIG`,
    /// then the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(value) if !value.is_empty() => Self::load(Path::new(&value)),
            _ => Ok(Self::default()),
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand configuration path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
