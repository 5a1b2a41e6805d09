//! Project file format and resolved build configurations.
//!
//! # Project File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "outDir": "bin",
//!   "compiler": "gcc",
//!   "defaults": { "compileFlags": ["-std=gnu99", "-Wall", "-O3"], "linkFlags": ["-lm"] },
//!   "configurations": {
//!     "modules": { "sourceDirs": ["modules"], "includeDirs": ["src"] },
//!     "release": {
//!       "name": "modelgen-release",
//!       "entry": "src/modelgen.c",
//!       "sourceDirs": ["src"],
//!       "includeDirs": ["src"],
//!       "dependsOn": ["modules"]
//!     }
//!   }
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the project file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::executable_suffix;
use crate::source;

/// The on-disk project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
  /// Project file format version.
  pub version: u32,

  /// Output tree; objects and artifacts land below it. Defaults to `bin`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub out_dir: Option<PathBuf>,

  /// Compiler driver used for both compiling and linking. Defaults to `gcc`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compiler: Option<String>,

  /// Flags for configurations that do not declare their own.
  #[serde(default)]
  pub defaults: FlagDefaults,

  /// Named configurations, keyed by registry name.
  pub configurations: BTreeMap<String, ConfigRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlagDefaults {
  #[serde(default)]
  pub compile_flags: Vec<String>,
  #[serde(default)]
  pub link_flags: Vec<String>,
}

/// A single configuration as written in the project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigRecord {
  /// Artifact and object-directory name. Defaults to the registry key.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entry: Option<PathBuf>,

  #[serde(default)]
  pub sources: Vec<PathBuf>,

  /// Directories scanned for `.c` files, appended after `sources`.
  #[serde(default)]
  pub source_dirs: Vec<PathBuf>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compile_flags: Option<Vec<String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub link_flags: Option<Vec<String>>,

  #[serde(default)]
  pub include_dirs: Vec<PathBuf>,

  #[serde(default)]
  pub depends_on: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub out_dir: Option<PathBuf>,
}

/// A fully resolved configuration: absolute paths, concrete flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfiguration {
  /// Registry key.
  pub name: String,
  pub output_name: String,
  pub entry: Option<PathBuf>,
  pub sources: Vec<PathBuf>,
  pub compile_flags: Vec<String>,
  pub link_flags: Vec<String>,
  pub include_dirs: Vec<PathBuf>,
  pub depends_on: Vec<String>,
  pub out_dir: PathBuf,
}

impl BuildConfiguration {
  /// A configuration with no sources, flags or dependencies.
  pub fn new(name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
    let name = name.into();
    Self {
      output_name: name.clone(),
      name,
      entry: None,
      sources: Vec::new(),
      compile_flags: Vec::new(),
      link_flags: Vec::new(),
      include_dirs: Vec::new(),
      depends_on: Vec::new(),
      out_dir: out_dir.into(),
    }
  }

  pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
    self.entry = Some(entry.into());
    self
  }

  pub fn with_sources<I, P>(mut self, sources: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.sources.extend(sources.into_iter().map(Into::into));
    self
  }

  pub fn with_include_dirs<I, P>(mut self, dirs: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.include_dirs.extend(dirs.into_iter().map(Into::into));
    self
  }

  pub fn depends_on<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends_on.extend(names.into_iter().map(Into::into));
    self
  }

  /// Object file for `source` within this configuration's namespace.
  pub fn object_path(&self, source: &Path) -> PathBuf {
    source::object_path(source, &self.out_dir, &self.output_name)
  }

  /// The linked executable, platform-suffixed.
  pub fn artifact_path(&self) -> PathBuf {
    self
      .out_dir
      .join(format!("{}{}", self.output_name, executable_suffix()))
  }
}
