use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_SOURCE_SUFFIX: &str = "src/main/java";
const DEFAULT_BUILD_SUFFIX: &str = "build/classes/java/main";

/// Settings shared by the class model builder and the directory walker.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ModelConfig {
    /// Root of the `.java` tree; package directories live below it.
    pub(crate) source_root: PathBuf,
    /// Root of the `.class` tree. Derived from `source_root` when unset.
    pub(crate) build_root: Option<PathBuf>,
    pub(crate) source_suffix: String,
    pub(crate) build_suffix: String,
    /// Treat a missing companion source file as a build failure.
    pub(crate) require_sources: bool,
    /// Record per-file failures and keep scanning instead of aborting.
    pub(crate) isolate_failures: bool,
    pub(crate) include_javadoc: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from(DEFAULT_SOURCE_SUFFIX),
            build_root: None,
            source_suffix: DEFAULT_SOURCE_SUFFIX.to_string(),
            build_suffix: DEFAULT_BUILD_SUFFIX.to_string(),
            require_sources: true,
            isolate_failures: true,
            include_javadoc: true,
        }
    }
}

impl ModelConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub(crate) fn from_json(text: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let config: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            anyhow::anyhow!("invalid config value at `{}`: {}", err.path(), err.inner())
        })?;
        deserializer.end().context("trailing characters after config")?;
        Ok(config)
    }

    /// Explicit build root, or the source root with its source suffix swapped for the build suffix.
    pub(crate) fn build_root(&self) -> PathBuf {
        if let Some(root) = &self.build_root {
            return root.clone();
        }
        let source = self.source_root.to_string_lossy();
        PathBuf::from(source.replacen(&self.source_suffix, &self.build_suffix, 1))
    }

    /// Resolve the build root and check that it is a directory.
    pub(crate) fn validate(&self) -> Result<PathBuf> {
        let root = self.build_root();
        if !root.is_dir() {
            anyhow::bail!("build root {} is not a directory", root.display());
        }
        Ok(root)
    }

    /// `source_root/<package>/<file_name>`
    pub(crate) fn source_path(&self, package: &str, file_name: &str) -> PathBuf {
        let mut path = self.source_root.clone();
        if !package.is_empty() {
            path.push(package);
        }
        path.push(file_name);
        path
    }

    /// Expected location of the compiled class `descriptor` under the build root.
    pub(crate) fn class_path(&self, descriptor: &str) -> PathBuf {
        self.build_root().join(format!("{descriptor}.class"))
    }
}
