use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::builder::ClassModelBuilder;
use crate::config::ModelConfig;
use crate::model::ClassModel;

/// Snapshot of built class models and per-file failures for a scan.
#[derive(Debug)]
pub(crate) struct ScanOutput {
    pub(crate) classes: Vec<ClassModel>,
    pub(crate) failures: Vec<ScanFailure>,
    /// Models built, nested classes included.
    pub(crate) class_count: usize,
}

/// Class file that could not be turned into a model.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ScanFailure {
    pub(crate) path: PathBuf,
    pub(crate) error: String,
}

enum Outcome {
    Built(ClassModel),
    Failed(ScanFailure),
}

/// Build a model for every top-level class file below `root`.
///
/// Subdirectories and files are processed in parallel; results keep the sorted
/// directory order. Nested class files are reached through their outer class.
pub(crate) fn scan_classes(root: &Path, config: &ModelConfig) -> Result<ScanOutput> {
    let started_at = Instant::now();
    let builder = ClassModelBuilder::new(config);
    let outcomes = scan_dir(root, &builder, config.isolate_failures)?;

    let mut classes = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Built(model) => classes.push(model),
            Outcome::Failed(failure) => failures.push(failure),
        }
    }
    let class_count = classes.iter().map(|class| class.flatten().len()).sum();

    info!(
        classes = class_count,
        failures = failures.len(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "scan finished"
    );
    Ok(ScanOutput {
        classes,
        failures,
        class_count,
    })
}

fn scan_dir(dir: &Path, builder: &ClassModelBuilder<'_>, isolate: bool) -> Result<Vec<Outcome>> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", dir.display()))?;
        entries.push(entry.path());
    }
    entries.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    let nested = entries
        .par_iter()
        .map(|entry| {
            if entry.is_dir() {
                scan_dir(entry, builder, isolate)
            } else if is_top_level_class(entry) {
                build_one(entry, builder, isolate).map(|outcome| vec![outcome])
            } else {
                Ok(Vec::new())
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(nested.into_iter().flatten().collect())
}

fn build_one(path: &Path, builder: &ClassModelBuilder<'_>, isolate: bool) -> Result<Outcome> {
    match builder.build_file(path) {
        Ok(model) => Ok(Outcome::Built(model)),
        Err(err) if isolate => {
            let error = format!("{err:#}");
            warn!(path = %path.display(), error = %error, "class build failed");
            Ok(Outcome::Failed(ScanFailure {
                path: path.to_path_buf(),
                error,
            }))
        }
        Err(err) => Err(err),
    }
}

/// `Outer$Inner.class` is nested; `module-info.class` and `package-info.class` declare no class.
fn is_top_level_class(path: &Path) -> bool {
    if path.extension().and_then(|ext| ext.to_str()) != Some("class") {
        return false;
    }
    let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("");
    !stem.is_empty() && !stem.contains('$') && !stem.contains('-')
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
