//! # Script Errors / 脚本错误
//!
//! Errors raised while loading or evaluating test-item code, together with the
//! backtrace and load-site metadata the executor uses to attribute a failure to
//! an exact source line.
//!
//! 加载或执行测试项代码时抛出的错误，以及执行器用来将失败归因到确切源代码行的
//! 回溯信息和加载位置元数据。

use std::fmt::{self, Write as _};
use std::path::PathBuf;

/// Name of the frame that represents code evaluated at the top level of a namespace.
pub const TOP_LEVEL_FRAME: &str = "top-level scope";

/// The category and message of a script error.
/// 脚本错误的类别和消息。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("syntax: {0}")]
    Syntax(String),
    #[error("UndefVarError: `{0}` not defined")]
    UndefVar(String),
    #[error("UndefVarError: `{name}` not defined in `{module}`")]
    UndefMember { module: String, name: String },
    #[error("MethodError: {0}")]
    Method(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("BoundsError: attempt to access {len}-element {container} at index [{index}]")]
    Bounds {
        container: &'static str,
        len: u128,
        index: i64,
    },
    #[error("OverflowError: {0}")]
    Overflow(String),
    #[error("OutOfMemoryError: {0}")]
    OutOfMemory(String),
    #[error("DivideError: integer division error")]
    DivideByZero,
    #[error("ArgumentError: Package {0} not found in current path.")]
    PackageNotFound(String),
    #[error("SystemError: opening file \"{path}\": {reason}")]
    Io { path: String, reason: String },
    #[error("StackOverflowError: call depth exceeded {0}")]
    StackOverflow(usize),
    #[error("{0}")]
    User(String),
    #[error("{0}")]
    TestFailed(String),
    #[error("LoadError: {inner}\nin expression starting at {file}:{line}")]
    Load {
        inner: Box<ErrorKind>,
        file: String,
        line: u32,
    },
}

/// One entry of a script backtrace. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: u32,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: Option<PathBuf>, line: u32) -> Self {
        Self {
            function: function.into(),
            file,
            line,
        }
    }
}

/// A file/line pair reported by error introspection. Lines are 1-based; `file` may
/// be empty when the origin is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
}

/// An error thrown by the script engine.
///
/// `load_site` is set only for load-time failures (syntax errors, unreadable files),
/// where the error's own location is more precise than whatever frame was active.
///
/// 脚本引擎抛出的错误。
/// `load_site` 仅在加载期失败（语法错误、无法读取的文件）时设置。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub load_site: Option<SourcePos>,
    /// Innermost frame first.
    pub backtrace: Vec<Frame>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, backtrace: Vec<Frame>) -> Self {
        Self {
            kind,
            load_site: None,
            backtrace,
        }
    }

    pub fn load_time(kind: ErrorKind, file: Option<PathBuf>, line: u32) -> Self {
        let file = file.map(|f| f.display().to_string()).unwrap_or_default();
        Self {
            kind,
            load_site: Some(SourcePos { file, line }),
            backtrace: Vec::new(),
        }
    }

    /// Wraps an error raised while loading a package source file.
    pub fn into_load_error(self, file: Option<PathBuf>, line: u32) -> Self {
        let file = file.map(|f| f.display().to_string()).unwrap_or_default();
        let site = self.load_site.clone().unwrap_or(SourcePos {
            file: file.clone(),
            line,
        });
        Self {
            kind: ErrorKind::Load {
                inner: Box::new(self.kind),
                file,
                line,
            },
            load_site: Some(site),
            backtrace: self.backtrace,
        }
    }
}

/// Host-specific error introspection: rendering and best-effort origin lookup.
/// 特定于宿主的错误内省：渲染以及尽力而为的来源查找。
pub trait ErrorIntrospection {
    /// The full diagnostic text, message followed by the rendered backtrace.
    fn render(&self) -> String;
    /// The error's own location, for load-time failures.
    fn load_site(&self) -> Option<SourcePos>;
    /// The innermost backtrace frame.
    fn first_frame(&self) -> Option<SourcePos>;

    /// Load site first, then the first frame, then an empty location.
    fn origin(&self) -> SourcePos {
        self.load_site()
            .or_else(|| self.first_frame())
            .unwrap_or(SourcePos {
                file: String::new(),
                line: 0,
            })
    }
}

impl ErrorIntrospection for ScriptError {
    fn render(&self) -> String {
        let mut out = self.kind.to_string();
        if !self.backtrace.is_empty() {
            out.push_str("\nStacktrace:");
            for (i, frame) in self.backtrace.iter().enumerate() {
                let file = frame
                    .file
                    .as_ref()
                    .map(|f| f.display().to_string())
                    .unwrap_or_else(|| "none".to_string());
                let _ = write!(out, "\n [{}] {}\n   @ {}:{}", i + 1, frame.function, file, frame.line);
            }
        }
        out
    }

    fn load_site(&self) -> Option<SourcePos> {
        self.load_site.clone()
    }

    fn first_frame(&self) -> Option<SourcePos> {
        self.backtrace.first().map(|frame| SourcePos {
            file: frame
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_default(),
            line: frame.line,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} at {}:{}", self.function, file.display(), self.line),
            None => write!(f, "{} at none:{}", self.function, self.line),
        }
    }
}
