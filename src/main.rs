mod attributes;
mod builder;
mod classfile;
mod config;
mod constant_pool;
mod descriptor;
mod index;
mod javadoc;
mod model;
mod params;
mod reader;
mod scan;
mod telemetry;
#[cfg(test)]
mod test_harness;
#[cfg(test)]
mod test_support;

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::config::ModelConfig;
use crate::index::ClassIndex;
use crate::model::ClassModel;
use crate::scan::{ScanFailure, scan_classes};
use crate::telemetry::init_logging;

/// CLI arguments for classmodel execution.
#[derive(Parser, Debug)]
#[command(
    name = "classmodel",
    about = "Build class, field, method and javadoc models from compiled JVM class files.",
    version
)]
struct Cli {
    /// Root of the Java source tree.
    #[arg(long, value_name = "DIR")]
    source: Option<PathBuf>,
    /// Root of the class file tree; derived from --source when omitted.
    #[arg(long, value_name = "DIR")]
    build: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Only report direct subclasses of this slash separated class name.
    #[arg(long, value_name = "DESCRIPTOR")]
    extends: Option<String>,
    #[arg(long)]
    allow_missing_sources: bool,
    #[arg(long)]
    fail_fast: bool,
    #[arg(long)]
    no_javadoc: bool,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    /// Declarations with field constants and method signatures.
    Text,
    /// Java-like declarations with modifiers and parameter names.
    Outline,
}

/// Serialized scan result.
#[derive(Debug, Serialize)]
struct Report<'a> {
    classes: Vec<&'a ClassModel>,
    failures: &'a [ScanFailure],
    class_count: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let build_root = config.validate()?;

    let started_at = Instant::now();
    let scan_started_at = Instant::now();
    let scan = scan_classes(&build_root, &config)?;
    let scan_duration_ms = scan_started_at.elapsed().as_millis();

    let index = ClassIndex::build(&scan.classes)?;
    let (classes, class_count) = match &cli.extends {
        Some(super_descriptor) => {
            let classes = index.without_nested(index.subclasses_of(super_descriptor));
            let count: usize = classes.iter().map(|class| class.flatten().len()).sum();
            (classes, count)
        }
        None => (scan.classes.iter().collect(), scan.class_count),
    };
    let report = Report {
        classes,
        failures: &scan.failures,
        class_count,
    };

    let mut writer = output_writer(cli.output.as_deref())?;
    match cli.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &report)
                .context("failed to serialize report")?;
            writer.write_all(b"\n").context("failed to write report")?;
        }
        OutputFormat::Text | OutputFormat::Outline => {
            writer
                .write_all(render_text(&report, cli.format).as_bytes())
                .context("failed to write report")?;
        }
    }
    writer.flush().context("failed to flush report")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} scan_ms={} classes={} failures={}",
            started_at.elapsed().as_millis(),
            scan_duration_ms,
            index.len(),
            scan.failures.len()
        );
    }

    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn resolve_config(cli: &Cli) -> Result<ModelConfig> {
    let mut config = match &cli.config {
        Some(path) => ModelConfig::load(path)?,
        None => ModelConfig::default(),
    };
    if let Some(source) = &cli.source {
        config.source_root = source.clone();
    }
    if let Some(build) = &cli.build {
        config.build_root = Some(build.clone());
    }
    if cli.allow_missing_sources {
        config.require_sources = false;
    }
    if cli.fail_fast {
        config.isolate_failures = false;
    }
    if cli.no_javadoc {
        config.include_javadoc = false;
    }
    Ok(config)
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

fn render_text(report: &Report<'_>, format: OutputFormat) -> String {
    let mut out = String::new();
    for class in &report.classes {
        render_class(&mut out, class, 0, format);
    }
    if !report.failures.is_empty() {
        out.push_str("failures:\n");
        for failure in report.failures {
            let _ = writeln!(out, "  {}: {}", failure.path.display(), failure.error);
        }
    }
    out
}

fn render_class(out: &mut String, class: &ClassModel, depth: usize, format: OutputFormat) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}{}", class.declaration());
    for member in class.members() {
        let line = match format {
            OutputFormat::Outline => member.declaration(),
            OutputFormat::Json | OutputFormat::Text => member.pretty_name(),
        };
        let _ = writeln!(out, "{indent}  {line}");
    }
    for inner in &class.inner_classes {
        render_class(out, inner, depth + 1, format);
    }
}
