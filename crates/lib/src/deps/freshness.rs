//! Freshness oracles decide whether an input invalidates a derived artifact.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Source of the timestamps (or other stamps) staleness is computed from.
pub trait FreshnessOracle {
  type Stamp;

  /// Stamp of an artifact, or `None` when it does not exist.
  fn stamp(&self, path: &Path) -> io::Result<Option<Self::Stamp>>;

  /// Whether `input` invalidates an artifact stamped `reference`.
  fn is_stale(&self, input: &Path, reference: &Self::Stamp) -> io::Result<bool>;
}

/// Filesystem modification times.
///
/// An input whose mtime equals the artifact's counts as stale, since coarse
/// filesystem timestamps cannot order writes within one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtimeOracle;

impl FreshnessOracle for MtimeOracle {
  type Stamp = SystemTime;

  fn stamp(&self, path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
      Ok(meta) => Ok(Some(meta.modified()?)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  fn is_stale(&self, input: &Path, reference: &SystemTime) -> io::Result<bool> {
    Ok(fs::metadata(input)?.modified()? >= *reference)
  }
}
