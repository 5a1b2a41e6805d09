//! Deterministic source tree scanning.
//!
//! Directory walks are sorted by file name so that every run sees the same
//! file order, independent of the order the filesystem hands entries back.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;
use walkdir::WalkDir;

use crate::consts::SOURCE_EXTENSION;

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },
}

/// Recursively collect every file under `dir` whose extension is `ext`.
///
/// Within a directory, files come before the contents of subdirectories, and
/// both are visited in lexicographic order.
pub fn scan_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, ScanError> {
  let walker = WalkDir::new(dir)
    .sort_by(|a, b| {
      b.file_type()
        .is_file()
        .cmp(&a.file_type().is_file())
        .then_with(|| a.file_name().cmp(b.file_name()))
    })
    .into_iter();

  let mut files = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|source| ScanError::Walk {
      path: dir.to_path_buf(),
      source,
    })?;

    if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == ext) {
      trace!(path = %entry.path().display(), "scanned");
      files.push(entry.into_path());
    }
  }

  Ok(files)
}

/// All C translation units under the given directories, in directory order.
pub fn c_files<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<PathBuf>, ScanError> {
  let mut files = Vec::new();
  for dir in dirs {
    files.extend(scan_files(dir.as_ref(), SOURCE_EXTENSION)?);
  }
  Ok(files)
}
