//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations, such as creating the
//! temporary environment directory and resolving absolute paths.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如创建临时环境目录和解析绝对路径。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a unique, temporary directory for a throwaway dependency environment.
///
/// # Arguments
/// * `prefix` - Prefix of the directory name, taken from the runner configuration
///
/// # Returns
/// The `TempDir` handle; the directory is removed when the handle is dropped
pub fn create_env_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .with_context(|| "Failed to create temporary environment directory".to_string())
}

/// Checks if a path exists and is a directory.
pub fn is_directory(path: &Path) -> bool {
    path.exists() && path.is_dir()
}

/// Gets the absolute path from a potentially relative path.
///
/// Uses `dunce` so that Windows paths come back without the `\\?\` verbatim prefix,
/// which would otherwise leak into package locators and URIs.
///
/// # Arguments
/// * `path` - Path to canonicalize
///
/// # Returns
/// Canonicalized absolute path, or an error if the path doesn't exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}

/// Reads a whole text file, naming the file in the error.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Writes a whole text file, naming the file in the error.
pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write file: {}", path.display()))
}
