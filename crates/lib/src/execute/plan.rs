//! Object/link planning across the configuration graph.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use super::types::BuildError;
use crate::config::{BuildConfiguration, ConfigRegistry};
use crate::source::has_entry_point;

/// Sources of `config` that do not define an entry point.
///
/// Entry-point sources are compiled separately as the configuration's single
/// entry object, so they never appear among its library objects.
pub fn library_sources(config: &BuildConfiguration) -> Result<Vec<&PathBuf>, BuildError> {
  let mut sources = Vec::with_capacity(config.sources.len());
  for source in &config.sources {
    if !has_entry_point(source).map_err(BuildError::io(source))? {
      sources.push(source);
    }
  }
  Ok(sources)
}

/// Objects to link for configuration `name`.
///
/// Contains the configuration's entry object (when `include_entry` is set and
/// it declares one), the objects of its non-entry sources, and the non-entry
/// objects of every configuration it transitively depends on. Dependencies
/// are libraries: their entry objects are never included.
pub fn plan_objects(registry: &ConfigRegistry, name: &str, include_entry: bool) -> Result<BTreeSet<PathBuf>, BuildError> {
  let root = registry.get(name)?;
  let mut objects = BTreeSet::new();

  if include_entry && let Some(entry) = &root.entry {
    objects.insert(root.object_path(entry));
  }

  let mut visited: HashSet<&str> = HashSet::new();
  let mut pending = vec![root];
  while let Some(config) = pending.pop() {
    if !visited.insert(config.name.as_str()) {
      continue;
    }

    for source in library_sources(config)? {
      objects.insert(config.object_path(source));
    }

    for dep in &config.depends_on {
      pending.push(registry.get(dep)?);
    }
  }

  Ok(objects)
}
