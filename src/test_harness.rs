use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::config::ModelConfig;
use crate::scan::{ScanOutput, scan_classes};

/// Source file definition for compilation, relative to the source root.
pub(crate) struct SourceFile {
    pub(crate) path: String,
    pub(crate) contents: String,
}

/// Compiled project laid out as `src/main/java` and `build/classes/java/main`.
pub(crate) struct CompileOutput {
    #[allow(dead_code)]
    temp_dir: TempDir,
    source_root: PathBuf,
    build_root: PathBuf,
}

impl CompileOutput {
    pub(crate) fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Config whose derived build root is this project's class directory.
    pub(crate) fn config(&self) -> ModelConfig {
        ModelConfig {
            source_root: self.source_root.clone(),
            ..ModelConfig::default()
        }
    }
}

/// Test harness that compiles Java sources with debug info and builds class models.
pub(crate) struct JvmTestHarness {
    javac: PathBuf,
}

impl JvmTestHarness {
    pub(crate) fn new() -> Result<Self> {
        let javac = javac_path()?;
        Ok(Self { javac })
    }

    pub(crate) fn compile(&self, sources: &[SourceFile]) -> Result<CompileOutput> {
        let temp_dir = tempfile::tempdir().context("create temp dir")?;
        let source_root = temp_dir.path().join("src/main/java");
        let build_root = temp_dir.path().join("build/classes/java/main");
        fs::create_dir_all(&source_root).context("create source root")?;
        fs::create_dir_all(&build_root).context("create build root")?;

        let mut source_paths = Vec::new();
        for source in sources {
            let path = source_root.join(&source.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("create source parent dir")?;
            }
            fs::write(&path, source.contents.as_bytes()).context("write source file")?;
            source_paths.push(path);
        }

        let mut command = Command::new(&self.javac);
        command.arg("-g").arg("-d").arg(&build_root);
        command.args(&source_paths);
        run_command(command, "javac")?;

        Ok(CompileOutput {
            temp_dir,
            source_root,
            build_root,
        })
    }

    pub(crate) fn compile_and_build(&self, sources: &[SourceFile]) -> Result<ScanOutput> {
        let output = self.compile(sources)?;
        scan_classes(output.build_root(), &output.config()).context("build class models")
    }
}

fn javac_path() -> Result<PathBuf> {
    let java_home = std::env::var("JAVA_HOME").context("JAVA_HOME not set")?;
    let mut path = PathBuf::from(java_home);
    path.push("bin");
    path.push("javac");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    if !path.exists() {
        anyhow::bail!("javac not found at {}", path.display());
    }
    Ok(path)
}

fn run_command(mut command: Command, label: &str) -> Result<()> {
    let output = command.output().with_context(|| format!("run {label}"))?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{label} failed: stdout={stdout} stderr={stderr}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::ConstantValue;
    use crate::model::{ClassKind, Scope};

    const POINT: &str = r#"package com.example;

import java.util.List;

/** A point. */
public final class Point {
    /** Origin label. */
    public static final String ORIGIN = "origin";

    /** The x coordinate. */
    public final int x;

    /**
     * Creates a point.
     * @param x the x coordinate
     */
    public Point(int x) {
        this.x = x;
    }

    /** Scales the point. */
    public Point scale(long factor, double ratio, String label) {
        int local = label.length();
        return new Point((int) (x * factor * ratio) + local);
    }

    static int count(List<String> names) {
        return names.size();
    }

    /** Axis names. */
    public enum Axis { X, Y }
}
"#;

    fn point_source() -> Vec<SourceFile> {
        vec![SourceFile {
            path: "com/example/Point.java".to_string(),
            contents: POINT.to_string(),
        }]
    }

    #[test]
    fn compiled_point_matches_declarations() {
        let Ok(harness) = JvmTestHarness::new() else {
            return;
        };
        let output = harness.compile_and_build(&point_source()).expect("build models");
        assert!(output.failures.is_empty());
        assert_eq!(output.classes.len(), 1);
        assert_eq!(output.class_count, 2);

        let point = &output.classes[0];
        assert_eq!(point.descriptor, "com/example/Point");
        assert_eq!(point.kind, ClassKind::Final);
        assert_eq!(point.javadoc, "A point.");

        let origin = point
            .fields
            .iter()
            .find(|field| field.element.name == "ORIGIN")
            .expect("ORIGIN field");
        assert_eq!(
            origin.constant_value,
            Some(ConstantValue::String("origin".to_string()))
        );
        assert_eq!(origin.element.javadoc, "Origin label.");

        let x = point
            .fields
            .iter()
            .find(|field| field.element.name == "x")
            .expect("x field");
        assert_eq!(x.constant_value, None);
        assert_eq!(x.element.javadoc, "The x coordinate.");

        let init = point
            .methods
            .iter()
            .find(|method| method.is_constructor())
            .expect("constructor");
        let names: Vec<&str> = init.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x"]);
        assert_eq!(init.element.javadoc, "Creates a point.\n@param x the x coordinate");
        assert!(init.start_line.is_some());
    }

    #[test]
    fn compiled_parameters_use_local_variable_slots() {
        let Ok(harness) = JvmTestHarness::new() else {
            return;
        };
        let output = harness.compile_and_build(&point_source()).expect("build models");
        let point = &output.classes[0];

        let scale = point
            .methods
            .iter()
            .find(|method| method.element.name == "scale")
            .expect("scale");
        let names: Vec<&str> = scale.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["factor", "ratio", "label"]);
        assert_eq!(scale.pretty_signature(), "scale(long, double, String)=>Point");
        assert_eq!(scale.element.javadoc, "Scales the point.");

        let count = point
            .methods
            .iter()
            .find(|method| method.element.name == "count")
            .expect("count");
        assert!(count.element.is_static);
        assert_eq!(count.params[0].name, "names");
        assert_eq!(count.element.scope, Scope::Default);
    }

    #[test]
    fn compiled_nested_enum_is_owned_by_outer_class() {
        let Ok(harness) = JvmTestHarness::new() else {
            return;
        };
        let output = harness.compile_and_build(&point_source()).expect("build models");
        let point = &output.classes[0];

        assert_eq!(point.inner_classes.len(), 1);
        let axis = &point.inner_classes[0];
        assert_eq!(axis.descriptor, "com/example/Point$Axis");
        assert_eq!(axis.kind, ClassKind::Enum);
        assert_eq!(axis.scope, Scope::Public);
        assert_eq!(axis.outer_class.as_deref(), Some("com/example/Point"));
        assert_eq!(axis.declaration(), "public enum Axis");
        assert_eq!(axis.javadoc, "Axis names.");
    }
}
