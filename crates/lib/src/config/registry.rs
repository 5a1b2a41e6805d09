//! The immutable configuration graph.
//!
//! A registry is built once per process, either from resolved
//! [`BuildConfiguration`]s or from a project file, and validated on
//! construction: names are unique, every dependency exists, and the
//! dependency graph is acyclic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;
use tracing::debug;

use super::types::{BuildConfiguration, ConfigFile, ConfigRecord};
use crate::consts::{COMPILER_ENV, CONFIG_VERSION, DEFAULT_COMPILER, DEFAULT_OUT_DIR};
use crate::scan::{self, ScanError};

#[derive(Debug, Error)]
pub enum ConfigError {
  /// A configuration name that is not in the registry.
  #[error("unknown configuration '{0}'")]
  UnknownConfiguration(String),

  #[error("configuration '{referenced_by}' depends on unknown configuration '{name}'")]
  UnknownDependency { name: String, referenced_by: String },

  #[error("configuration '{0}' is defined more than once")]
  Duplicate(String),

  #[error("configuration dependency cycle through '{0}'")]
  Cycle(String),

  #[error("entry point of '{name}' not found: {}", .path.display())]
  MissingEntry { name: String, path: PathBuf },

  #[error("failed to read project file {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse project file {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported project file version {0}, expected {CONFIG_VERSION}")]
  UnsupportedVersion(u32),

  #[error(transparent)]
  Scan(#[from] ScanError),
}

#[derive(Debug, Clone)]
pub struct ConfigRegistry {
  configs: BTreeMap<String, BuildConfiguration>,
  compiler: String,
  root: Option<PathBuf>,
}

impl ConfigRegistry {
  /// Build a registry from resolved configurations.
  pub fn new<I>(configs: I) -> Result<Self, ConfigError>
  where
    I: IntoIterator<Item = BuildConfiguration>,
  {
    let mut map = BTreeMap::new();
    for config in configs {
      if map.contains_key(&config.name) {
        return Err(ConfigError::Duplicate(config.name));
      }
      map.insert(config.name.clone(), config);
    }

    validate(&map)?;

    Ok(Self {
      configs: map,
      compiler: DEFAULT_COMPILER.to_string(),
      root: None,
    })
  }

  /// Load and resolve a project file.
  ///
  /// The compiler named in the file can be overridden with `CBUILD_CC`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: ConfigFile = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    if file.version != CONFIG_VERSION {
      return Err(ConfigError::UnsupportedVersion(file.version));
    }

    let base = path.parent().map(absolute).unwrap_or_else(|| absolute(Path::new(".")));
    let default_out = resolve_path(&base, file.out_dir.as_deref().unwrap_or(Path::new(DEFAULT_OUT_DIR)));

    let mut configs = Vec::with_capacity(file.configurations.len());
    for (name, record) in &file.configurations {
      configs.push(resolve_record(name, record, &file, &base, &default_out)?);
    }

    let compiler = std::env::var(COMPILER_ENV)
      .ok()
      .filter(|cc| !cc.is_empty())
      .or(file.compiler)
      .unwrap_or_else(|| DEFAULT_COMPILER.to_string());

    debug!(path = %path.display(), configurations = configs.len(), compiler = %compiler, "loaded project file");

    Ok(Self {
      compiler,
      root: Some(base),
      ..Self::new(configs)?
    })
  }

  pub fn get(&self, name: &str) -> Result<&BuildConfiguration, ConfigError> {
    self
      .configs
      .get(name)
      .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))
  }

  /// Configuration names, sorted.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.configs.keys().map(String::as_str)
  }

  pub fn configurations(&self) -> impl Iterator<Item = &BuildConfiguration> {
    self.configs.values()
  }

  /// `name` and everything it transitively depends on, dependencies first.
  ///
  /// Each configuration appears once, however many paths lead to it.
  pub fn build_order(&self, name: &str) -> Result<Vec<&str>, ConfigError> {
    let mut order = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![(self.get(name)?, false)];

    while let Some((config, expanded)) = stack.pop() {
      if expanded {
        order.push(config.name.as_str());
        continue;
      }
      if !visited.insert(config.name.as_str()) {
        continue;
      }

      stack.push((config, true));
      for dep in config.depends_on.iter().rev() {
        stack.push((self.get(dep)?, false));
      }
    }

    Ok(order)
  }

  /// Direct dependencies of `name`.
  pub fn dependencies_of(&self, name: &str) -> Result<&[String], ConfigError> {
    Ok(&self.get(name)?.depends_on)
  }

  pub fn compiler(&self) -> &str {
    &self.compiler
  }

  /// Directory of the project file, when loaded from one.
  pub fn root(&self) -> Option<&Path> {
    self.root.as_deref()
  }
}

/// Check that every dependency exists and that the dependency graph is acyclic.
fn validate(configs: &BTreeMap<String, BuildConfiguration>) -> Result<(), ConfigError> {
  let mut graph: DiGraph<&str, ()> = DiGraph::new();
  let nodes: HashMap<&str, _> = configs
    .keys()
    .map(|name| (name.as_str(), graph.add_node(name.as_str())))
    .collect();

  for (name, config) in configs {
    for dep in &config.depends_on {
      let Some(&dep_idx) = nodes.get(dep.as_str()) else {
        return Err(ConfigError::UnknownDependency {
          name: dep.clone(),
          referenced_by: name.clone(),
        });
      };
      // Edge from dependency to dependent
      graph.add_edge(dep_idx, nodes[name.as_str()], ());
    }
  }

  toposort(&graph, None).map_err(|cycle| ConfigError::Cycle(graph[cycle.node_id()].to_string()))?;
  Ok(())
}

fn resolve_record(
  name: &str,
  record: &ConfigRecord,
  file: &ConfigFile,
  base: &Path,
  default_out: &Path,
) -> Result<BuildConfiguration, ConfigError> {
  let resolve_all = |paths: &[PathBuf]| paths.iter().map(|p| resolve_path(base, p)).collect::<Vec<_>>();

  let entry = record.entry.as_deref().map(|p| resolve_path(base, p));
  if let Some(ref entry) = entry
    && !entry.is_file()
  {
    return Err(ConfigError::MissingEntry {
      name: name.to_string(),
      path: entry.clone(),
    });
  }

  let mut sources = resolve_all(&record.sources);
  sources.extend(scan::c_files(&resolve_all(&record.source_dirs))?);

  Ok(BuildConfiguration {
    name: name.to_string(),
    output_name: record.name.clone().unwrap_or_else(|| name.to_string()),
    entry,
    sources,
    compile_flags: record
      .compile_flags
      .clone()
      .unwrap_or_else(|| file.defaults.compile_flags.clone()),
    link_flags: record
      .link_flags
      .clone()
      .unwrap_or_else(|| file.defaults.link_flags.clone()),
    include_dirs: resolve_all(&record.include_dirs),
    depends_on: record.depends_on.clone(),
    out_dir: record
      .out_dir
      .as_deref()
      .map(|p| resolve_path(base, p))
      .unwrap_or_else(|| default_out.to_path_buf()),
  })
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
  let joined = if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  };
  dunce::canonicalize(&joined).unwrap_or(joined)
}

fn absolute(path: &Path) -> PathBuf {
  let path = if path.as_os_str().is_empty() { Path::new(".") } else { path };
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
