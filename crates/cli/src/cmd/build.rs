//! Implementation of the `cbuild build` command.
//!
//! Builds each named configuration in turn. The first failure stops the run;
//! a toolchain failure's exit code becomes the process exit code.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use cbuild_lib::execute::{BuildOptions, BuildReport, Builder, CommandToolchain};

use super::load_registry;
use crate::output::{OutputFormat, display_path, format_duration, print_info, print_json, print_success, symbols};

pub fn cmd_build(config: &Path, names: &[String], dry_run: bool, format: OutputFormat) -> Result<()> {
  let registry = load_registry(config)?;

  let mut toolchain = CommandToolchain::new(registry.compiler());
  if let Some(root) = registry.root() {
    toolchain = toolchain.current_dir(root);
  }
  let builder = Builder::new(&registry, toolchain).with_options(BuildOptions { dry_run });

  // Builds are strictly sequential; a single-threaded runtime is enough.
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  let mut reports = Vec::with_capacity(names.len());
  for name in names {
    debug!(configuration = %name, dry_run, "starting build");
    let started = Instant::now();
    let report = rt
      .block_on(builder.build(name))
      .with_context(|| format!("Build of '{}' failed", name))?;

    if !format.is_json() {
      print_report(&report, started.elapsed());
    }
    reports.push(report);
  }

  if format.is_json() {
    print_json(&reports)?;
  }

  Ok(())
}

fn print_report(report: &BuildReport, elapsed: std::time::Duration) {
  let verb = if report.dry_run { "Would compile" } else { "Compiled" };
  for step in &report.compiled {
    println!(
      "  {} {} {} {}",
      symbols::PLUS,
      display_path(&step.source),
      symbols::ARROW,
      display_path(&step.object)
    );
  }

  if let Some(linked) = &report.linked {
    let verb = if report.dry_run { "Would link" } else { "Linked" };
    print_info(&format!("{} {}", verb, display_path(linked)));
  }

  let target = match &report.artifact {
    Some(artifact) => display_path(artifact),
    None => report.configuration.clone(),
  };

  if report.is_up_to_date() {
    print_success(&format!("{} is up to date", target));
  } else {
    print_success(&format!(
      "{} {} file(s) for {} in {}",
      verb,
      report.compiled.len(),
      target,
      format_duration(elapsed)
    ));
  }
}
