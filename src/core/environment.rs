//! # Environment Resolution / 环境解析
//!
//! Establishes which packages are visible to a test item before it runs: a throwaway
//! environment that develops the package by path, an explicit project, or either of
//! those with the package's test-only dependencies layered on top. The resulting
//! [`Environment`] is what the interpreter asks when it meets `using Name`.
//!
//! 在测试项运行之前确定哪些包可见：通过路径开发包的临时环境、显式指定的项目，
//! 或在二者之上叠加包的仅测试依赖。生成的 [`Environment`] 会在解释器遇到
//! `using Name` 时被查询。

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::core::config::RunnerConfig;
use crate::core::models::TestItemRequest;
use crate::infra::fs::{absolute_path, create_env_dir, is_directory, write_text};
use crate::script::loader::{BuiltinModule, PackageLoader, PackageSource};

/// Locator value for modules that ship with the engine.
pub const STDLIB_LOCATOR: &str = "@stdlib";

/// Where a dependency lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A package directory containing a manifest and `src/`.
    Path(PathBuf),
    /// A module provided by the engine itself.
    Stdlib,
}

impl Locator {
    fn parse(raw: &str, base: &Path) -> Self {
        if raw == STDLIB_LOCATOR {
            Locator::Stdlib
        } else {
            Locator::Path(base.join(raw))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("manifest {path}: test target `{name}` is listed in neither [deps] nor [extras]")]
    UnknownTarget { path: PathBuf, name: String },
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    deps: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extras: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    targets: BTreeMap<String, Vec<String>>,
}

/// A parsed `Project.toml`. Path locators are already resolved against `dir`.
/// 已解析的 `Project.toml`。路径定位符已相对于 `dir` 解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: Option<String>,
    pub dir: PathBuf,
    pub deps: BTreeMap<String, Locator>,
    pub extras: BTreeMap<String, Locator>,
    /// Names listed under `targets.test`.
    pub test_targets: Vec<String>,
}

impl Manifest {
    /// Parses manifest text whose relative locators are based at `dir`.
    pub fn parse(text: &str, dir: &Path, manifest_path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(text).map_err(|source| ManifestError::Parse {
            path: manifest_path.to_path_buf(),
            source,
        })?;
        let resolve = |table: BTreeMap<String, String>| -> BTreeMap<String, Locator> {
            table
                .into_iter()
                .map(|(name, raw)| {
                    let locator = Locator::parse(&raw, dir);
                    (name, locator)
                })
                .collect()
        };
        let deps = resolve(raw.deps);
        let extras = resolve(raw.extras);
        let test_targets = raw.targets.get("test").cloned().unwrap_or_default();
        if let Some(name) = test_targets
            .iter()
            .find(|n| !deps.contains_key(*n) && !extras.contains_key(*n))
        {
            return Err(ManifestError::UnknownTarget {
                path: manifest_path.to_path_buf(),
                name: name.clone(),
            });
        }
        Ok(Self {
            name: raw.name,
            dir: dir.to_path_buf(),
            deps,
            extras,
            test_targets,
        })
    }

    /// Reads `<dir>/<manifest_name>`.
    pub fn load(dir: &Path, manifest_name: &str) -> Result<Self, ManifestError> {
        let path = dir.join(manifest_name);
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text, dir, &path)
    }

    /// `[deps]` plus the `[extras]` named in `targets.test`, deps first.
    pub fn test_dependencies(&self) -> Vec<(String, Locator)> {
        let mut out: Vec<(String, Locator)> = self
            .deps
            .iter()
            .map(|(n, l)| (n.clone(), l.clone()))
            .collect();
        for name in &self.test_targets {
            if let Some(locator) = self.extras.get(name) {
                out.push((name.clone(), locator.clone()));
            }
        }
        out
    }
}

/// The set of packages visible to the interpreter during one run.
///
/// 一次运行期间解释器可见的包集合。
#[derive(Debug)]
pub struct Environment {
    packages: BTreeMap<String, Locator>,
    active_project: PathBuf,
    manifest_name: String,
    source_extension: String,
    /// Keeps a throwaway environment directory alive for the lifetime of the environment.
    temp_dir: Option<TempDir>,
}

impl Environment {
    /// Activates the project at `dir`: its `[deps]` become visible, plus the project
    /// itself when it is a named package with an entry file.
    pub fn activate(dir: &Path, config: &RunnerConfig, progress: &mut dyn Write) -> Result<Self> {
        if !is_directory(dir) {
            bail!("Project directory does not exist: {}", dir.display());
        }
        let dir = absolute_path(dir)?;
        writeln!(progress, "  Activating project at `{}`", dir.display())?;
        let manifest = Manifest::load(&dir, &config.manifest_name)?;

        let mut packages = manifest.deps.clone();
        if let Some(name) = &manifest.name {
            if entry_file(&dir, name, &config.source_extension).is_file() {
                packages
                    .entry(name.clone())
                    .or_insert_with(|| Locator::Path(dir.clone()));
            }
        }
        debug!(project = %dir.display(), packages = packages.len(), "activated project");
        Ok(Self {
            packages,
            active_project: dir,
            manifest_name: config.manifest_name.clone(),
            source_extension: config.source_extension.clone(),
            temp_dir: None,
        })
    }

    /// Creates a throwaway environment that develops the package at `package_path`.
    /// Returns the environment and the developed package's name.
    pub fn temporary(
        package_path: &Path,
        config: &RunnerConfig,
        progress: &mut dyn Write,
    ) -> Result<(Self, String)> {
        if package_path.as_os_str().is_empty() {
            bail!("A temporary environment needs a package path, but `package_path` is empty");
        }
        if !is_directory(package_path) {
            bail!("Package directory does not exist: {}", package_path.display());
        }
        let package_dir = absolute_path(package_path)?;
        let package = Manifest::load(&package_dir, &config.manifest_name)?;
        let Some(name) = package.name else {
            bail!(
                "Package manifest in {} does not declare a `name`",
                package_dir.display()
            );
        };

        let temp_dir = create_env_dir(&config.temp_prefix)?;
        writeln!(progress, "   Developing {name} at `{}`", package_dir.display())?;
        let mut manifest = RawManifest::default();
        manifest
            .deps
            .insert(name.clone(), package_dir.to_string_lossy().into_owned());
        let text = toml::to_string(&manifest).context("Failed to encode temporary manifest")?;
        write_text(&temp_dir.path().join(&config.manifest_name), &text)?;

        let mut env = Self::activate(temp_dir.path(), config, progress)?;
        env.temp_dir = Some(temp_dir);
        Ok((env, name))
    }

    /// Makes the test-only dependencies of `package` visible. Entries that are already
    /// visible keep their current locator. A package the environment cannot see is
    /// skipped; importing it later reports the error against the test item.
    pub fn layer_test_dependencies(&mut self, package: &str, progress: &mut dyn Write) -> Result<()> {
        writeln!(progress, "    Layering test dependencies of {package}")?;
        let dir = match self.packages.get(package) {
            Some(Locator::Path(dir)) => dir.clone(),
            Some(Locator::Stdlib) => return Ok(()),
            None => {
                warn!(
                    package,
                    project = %self.active_project.display(),
                    "package not in environment; skipping test dependencies"
                );
                return Ok(());
            }
        };
        let manifest = Manifest::load(&dir, &self.manifest_name)
            .with_context(|| format!("Failed to read test dependencies of {package}"))?;
        for (name, locator) in manifest.test_dependencies() {
            self.packages.entry(name).or_insert(locator);
        }
        Ok(())
    }

    pub fn active_project(&self) -> &Path {
        &self.active_project
    }

    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }

    /// Names of all visible packages, sorted.
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }

    pub fn locator(&self, name: &str) -> Option<&Locator> {
        self.packages.get(name)
    }
}

impl PackageLoader for Environment {
    fn locate(&self, name: &str) -> Option<PackageSource> {
        match self.packages.get(name)? {
            Locator::Stdlib => BuiltinModule::from_name(name).map(PackageSource::Builtin),
            Locator::Path(dir) => Some(PackageSource::File(entry_file(
                dir,
                name,
                &self.source_extension,
            ))),
        }
    }
}

/// `<dir>/src/<name>.<extension>`
pub fn entry_file(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join("src").join(format!("{name}.{extension}"))
}

/// Resolves the environment a request runs in:
/// 1. no project: a temporary environment developing `package_path`, plus test deps;
/// 2. project and package: the project, plus the package's test deps;
/// 3. project only: the project as-is.
///
/// Progress lines go to `progress`; callers pass a sink to keep stdout clean.
pub fn resolve(
    request: &TestItemRequest,
    config: &RunnerConfig,
    progress: &mut dyn Write,
) -> Result<Environment> {
    let env = if request.project_path.is_empty() {
        let (mut env, developed) =
            Environment::temporary(Path::new(&request.package_path), config, progress)?;
        let package = if request.package_name.is_empty() {
            developed
        } else {
            request.package_name.clone()
        };
        env.layer_test_dependencies(&package, progress)?;
        env
    } else if !request.package_name.is_empty() {
        let mut env = Environment::activate(Path::new(&request.project_path), config, progress)?;
        env.layer_test_dependencies(&request.package_name, progress)?;
        env
    } else {
        Environment::activate(Path::new(&request.project_path), config, progress)?
    };
    info!(
        project = %env.active_project().display(),
        temporary = env.is_temporary(),
        packages = ?env.package_names(),
        "environment resolved"
    );
    Ok(env)
}
