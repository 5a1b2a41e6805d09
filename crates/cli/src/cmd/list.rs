//! Implementation of the `cbuild list` command.

use std::path::Path;

use anyhow::Result;

use super::load_registry;
use crate::output::{OutputFormat, display_path, print_json, print_stat, symbols};

pub fn cmd_list(config: &Path, format: OutputFormat) -> Result<()> {
  let registry = load_registry(config)?;

  if format.is_json() {
    let configs: Vec<_> = registry.configurations().collect();
    return print_json(&configs);
  }

  for name in registry.names() {
    let config = registry.get(name)?;
    println!("{} {}", symbols::INFO, name);
    match &config.entry {
      Some(entry) => print_stat("Entry", &display_path(entry)),
      None => print_stat("Entry", "none (compile only)"),
    }
    print_stat("Sources", &config.sources.len().to_string());
    let deps = registry.dependencies_of(name)?;
    if !deps.is_empty() {
      print_stat("Depends on", &deps.join(", "));
    }
  }

  Ok(())
}
