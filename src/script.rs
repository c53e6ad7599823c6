//! # Script Engine / 脚本引擎
//!
//! The embedded language test items and packages are written in: lexer, parser,
//! tree-walking interpreter, namespaces, the base testing facility (`Test`) and the
//! error-introspection capability the executor relies on.
//!
//! 测试项和包所使用的嵌入式语言：词法分析器、语法分析器、树遍历解释器、
//! 命名空间、基础测试设施（`Test`）以及执行器依赖的错误内省能力。

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod loader;
pub mod namespace;
pub mod parser;
pub mod stack;
pub mod testing;
pub mod value;

pub use error::{ErrorIntrospection, ErrorKind, Frame, ScriptError, SourcePos};
pub use interp::Interpreter;
pub use loader::{BuiltinModule, BuiltinsOnly, PackageLoader, PackageSource};
pub use namespace::Namespace;
pub use testing::{FailedAssertion, FinishError, TestCollection, TestSetFailures};
pub use value::Value;
