//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the runner,
//! including URI/path mapping, file system operations and logging setup.
//!
//! 此模块为运行器提供基础设施服务，
//! 包括 URI/路径映射、文件系统操作和日志初始化。

pub mod fs;
pub mod logging;
pub mod uri;

pub use uri::{path_to_uri, path_to_uri_lenient, uri_to_path, PathStyle, UriError};
