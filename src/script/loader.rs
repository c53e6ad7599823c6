//! # Package Loading / 包加载
//!
//! Resolution of `using`/`import` targets to built-in modules or package sources
//! found through the active environment.
//!
//! 将 `using`/`import` 目标解析为内置模块，或解析为通过当前环境找到的包源文件。

use std::path::PathBuf;

/// Modules implemented by the engine itself rather than loaded from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModule {
    Test,
}

impl BuiltinModule {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Test" => Some(BuiltinModule::Test),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinModule::Test => "Test",
        }
    }
}

/// Where the code for a package named in `using`/`import` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Builtin(BuiltinModule),
    /// The package's entry source file.
    File(PathBuf),
}

/// Resolves package names to their sources. The active dependency environment
/// implements this; the interpreter consults it on every first `using` of a name.
///
/// 将包名解析为其来源。活动依赖环境实现此 trait；
/// 解释器在首次 `using` 某个名称时查询它。
pub trait PackageLoader {
    fn locate(&self, name: &str) -> Option<PackageSource>;
}

/// A loader that only knows the built-in modules. Useful when no environment is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinsOnly;

impl PackageLoader for BuiltinsOnly {
    fn locate(&self, name: &str) -> Option<PackageSource> {
        BuiltinModule::from_name(name).map(PackageSource::Builtin)
    }
}
