//! Transitive staleness of object files.
//!
//! An object must be rebuilt when it is missing, when its source is not older
//! than it, or when any header in the source's quoted-include closure is not
//! older than it. Each header is inspected at most once per call, so mutually
//! including headers terminate; a header seen again is treated as fresh since
//! its first visit already accounted for it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::freshness::FreshnessOracle;
use super::include::{ResolveError, walk_closure};

#[derive(Debug, Error)]
pub enum StalenessError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("failed to stat {}: {source}", .path.display())]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Decide whether `object` has to be regenerated from `source`.
///
/// `include_dirs` are searched, in order, after the including file's own
/// directory when resolving quoted includes.
pub fn needs_rebuild<O: FreshnessOracle>(
  oracle: &O,
  source: &Path,
  object: Option<&Path>,
  include_dirs: &[PathBuf],
) -> Result<bool, StalenessError> {
  let Some(object) = object else {
    return Ok(true);
  };

  let Some(reference) = oracle.stamp(object).map_err(stat_err(object))? else {
    debug!(object = %object.display(), "object missing");
    return Ok(true);
  };

  if oracle.is_stale(source, &reference).map_err(stat_err(source))? {
    debug!(source = %source.display(), "source newer than object");
    return Ok(true);
  }

  let stale = walk_closure::<StalenessError, _>(source, include_dirs, |header| {
    let stale = oracle.is_stale(header, &reference).map_err(stat_err(header))?;
    if stale {
      debug!(source = %source.display(), header = %header.display(), "header newer than object");
    }
    Ok(stale)
  })?;

  Ok(stale)
}

fn stat_err(path: &Path) -> impl FnOnce(io::Error) -> StalenessError + use<> {
  let path = path.to_path_buf();
  move |source| StalenessError::Stat { path, source }
}
