//! Error and result types for configuration builds.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::toolchain::ToolchainError;
use crate::config::ConfigError;
use crate::deps::{ResolveError, StalenessError};

/// Why a build stopped.
///
/// Nothing is retried or rolled back: objects written before the failure stay
/// on disk and are reused by the next run's staleness check.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A quoted include matched no directory on its search path.
  #[error(transparent)]
  Resolution(#[from] ResolveError),

  /// The compiler or linker failed.
  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  /// An unknown or invalid configuration was referenced.
  #[error(transparent)]
  Configuration(#[from] ConfigError),

  #[error("failed to access {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> BuildError {
    let path = path.into();
    move |source| BuildError::Io { path, source }
  }

  /// Process exit code for this failure.
  ///
  /// Toolchain failures forward the tool's own exit code; everything else is 1.
  pub fn exit_code(&self) -> i32 {
    match self {
      BuildError::Toolchain(e) => e.exit_code(),
      _ => 1,
    }
  }
}

impl From<StalenessError> for BuildError {
  fn from(err: StalenessError) -> Self {
    match err {
      StalenessError::Resolve(e) => BuildError::Resolution(e),
      StalenessError::Stat { path, source } => BuildError::Io { path, source },
    }
  }
}

/// Options for a build run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
  /// Decide what to compile and link without invoking the toolchain.
  pub dry_run: bool,
}

/// One translation unit compiled during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileStep {
  pub configuration: String,
  pub source: PathBuf,
  pub object: PathBuf,
}

/// What a build of one configuration (and its dependencies) did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
  pub configuration: String,

  /// Compilations in the order they ran.
  pub compiled: Vec<CompileStep>,

  /// The artifact, if it was (re)linked.
  pub linked: Option<PathBuf>,

  /// The configuration's artifact, `None` for compile-only configurations.
  pub artifact: Option<PathBuf>,

  pub dry_run: bool,
}

impl BuildReport {
  pub fn new(configuration: impl Into<String>, dry_run: bool) -> Self {
    Self {
      configuration: configuration.into(),
      compiled: Vec::new(),
      linked: None,
      artifact: None,
      dry_run,
    }
  }

  /// Number of compiler and linker invocations.
  pub fn invocations(&self) -> usize {
    self.compiled.len() + self.linked.iter().count()
  }

  pub fn is_up_to_date(&self) -> bool {
    self.invocations() == 0
  }

  pub(crate) fn compiled_object(&self, object: &std::path::Path) -> bool {
    self.compiled.iter().any(|step| step.object == object)
  }
}
