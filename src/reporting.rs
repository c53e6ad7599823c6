//! # Reporting Module / 报告模块
//!
//! This module turns an execution outcome into the JSON result on stdout and,
//! on request, a colored summary on stderr.
//!
//! 此模块将执行结果转换为 stdout 上的 JSON 结果，并可按需在 stderr 上输出彩色摘要。

pub mod console;
pub mod json;

pub use console::print_summary;
pub use json::{translate, write_result};
