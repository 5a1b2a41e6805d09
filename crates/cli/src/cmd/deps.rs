//! Implementation of the `cbuild deps` command.
//!
//! Prints every header reachable from a source file through quoted includes,
//! using the include directories of the given configuration.

use std::path::Path;

use anyhow::{Context, Result};

use cbuild_lib::deps::include_closure;
use cbuild_lib::execute::BuildError;

use super::load_registry;
use crate::output::{OutputFormat, display_path, print_json};

pub fn cmd_deps(config: &Path, name: &str, source: &Path, format: OutputFormat) -> Result<()> {
  let registry = load_registry(config)?;
  let configuration = registry.get(name).map_err(BuildError::from)?;

  // Relative paths that do not exist from here are taken relative to the project.
  let source = match registry.root() {
    Some(root) if source.is_relative() && !source.exists() => root.join(source),
    _ => source.to_path_buf(),
  };
  let closure = include_closure(&source, &configuration.include_dirs)
    .map_err(BuildError::from)
    .with_context(|| format!("Failed to resolve includes of {}", source.display()))?;

  if format.is_json() {
    return print_json(&closure);
  }

  for header in &closure {
    println!("{}", display_path(header));
  }
  Ok(())
}

