//! Quoted-include extraction and resolution.
//!
//! Only `#include "..."` directives are tracked. Angle-bracket includes name
//! system headers, which are treated as stable and never invalidate an object.
//!
//! # Search order
//!
//! A literal found in file `f` is looked up in `f`'s own directory first, then
//! in each directory of the search path that located `f`, ending with the
//! configured include directories. The first existing file wins.

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::source::read_text;

#[derive(Debug, Error)]
pub enum ResolveError {
  /// No directory on the search path contains the included file.
  #[error("cannot resolve include \"{literal}\" from {}", .from.display())]
  NotFound {
    literal: String,
    from: PathBuf,
    searched: Vec<PathBuf>,
  },

  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Extract the distinct quoted-include literals of a file, sorted.
pub fn parse_includes(text: &str) -> Vec<String> {
  let literals: BTreeSet<String> = text.lines().filter_map(parse_include_line).collect();
  literals.into_iter().collect()
}

/// Match `[ \t]*#[ \t]*include[ \t]*"([^"]+)"[ \t]*` against a single line.
fn parse_include_line(line: &str) -> Option<String> {
  const BLANK: [char; 2] = [' ', '\t'];

  let rest = line.trim_end().trim_start_matches(BLANK).strip_prefix('#')?;
  let rest = rest.trim_start_matches(BLANK).strip_prefix("include")?;
  let rest = rest.trim_start_matches(BLANK).strip_prefix('"')?;
  let (literal, tail) = rest.split_once('"')?;

  if literal.is_empty() || !tail.trim_start_matches(BLANK).is_empty() {
    return None;
  }
  Some(literal.to_string())
}

/// Find the first directory in `search_path` that contains `literal`.
pub fn resolve_include(literal: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
  search_path.iter().map(|dir| dir.join(literal)).find(|candidate| candidate.is_file())
}

/// Resolve every quoted include of `source`.
///
/// The source's own directory is searched before `extra_dirs`. Resolved paths
/// are canonical, sorted and de-duplicated.
pub fn resolve_includes(source: &Path, extra_dirs: &[PathBuf]) -> Result<Vec<PathBuf>, ResolveError> {
  resolve_with(source, &search_path_for(source, extra_dirs))
}

/// The complete set of headers reachable from `source` through quoted includes.
///
/// The source itself is not part of the result.
pub fn include_closure(source: &Path, include_dirs: &[PathBuf]) -> Result<Vec<PathBuf>, ResolveError> {
  let mut closure = BTreeSet::new();
  walk_closure::<ResolveError, _>(source, include_dirs, |header| {
    closure.insert(header.to_path_buf());
    Ok(false)
  })?;
  Ok(closure.into_iter().collect())
}

/// Depth-first pre-order walk over the include graph of `source`.
///
/// `visit` is called once per reachable header. Returning `Ok(true)` stops the
/// walk and makes the whole call return `Ok(true)`. A header reached a second
/// time (through a diamond or a cycle) is skipped.
pub fn walk_closure<E, F>(source: &Path, include_dirs: &[PathBuf], mut visit: F) -> Result<bool, E>
where
  E: From<ResolveError>,
  F: FnMut(&Path) -> Result<bool, E>,
{
  let source = canonical(source);
  let mut visited: HashSet<PathBuf> = HashSet::new();
  visited.insert(source.clone());

  let root_path: Rc<Vec<PathBuf>> = Rc::new(search_path_for(&source, include_dirs));
  let mut stack: Vec<(PathBuf, Rc<Vec<PathBuf>>)> = Vec::new();
  push_children(&mut stack, resolve_with(&source, &root_path)?, &root_path);

  while let Some((file, parent_path)) = stack.pop() {
    if !visited.insert(file.clone()) {
      continue;
    }

    if visit(&file)? {
      return Ok(true);
    }

    let own_path = Rc::new(search_path_for(&file, &parent_path));
    push_children(&mut stack, resolve_with(&file, &own_path)?, &own_path);
  }

  Ok(false)
}

fn push_children(stack: &mut Vec<(PathBuf, Rc<Vec<PathBuf>>)>, children: Vec<PathBuf>, path: &Rc<Vec<PathBuf>>) {
  // Reversed so the first include is popped first.
  stack.extend(children.into_iter().rev().map(|child| (child, Rc::clone(path))));
}

/// `file`'s directory followed by `dirs`, without repeats.
fn search_path_for(file: &Path, dirs: &[PathBuf]) -> Vec<PathBuf> {
  let own = file.parent().map(Path::to_path_buf).unwrap_or_default();
  let mut path = Vec::with_capacity(dirs.len() + 1);
  for dir in std::iter::once(&own).chain(dirs) {
    if !path.contains(dir) {
      path.push(dir.clone());
    }
  }
  path
}

fn resolve_with(file: &Path, search_path: &[PathBuf]) -> Result<Vec<PathBuf>, ResolveError> {
  let text = read_text(file).map_err(|source| ResolveError::Read {
    path: file.to_path_buf(),
    source,
  })?;

  let mut resolved = BTreeSet::new();
  for literal in parse_includes(&text) {
    let Some(found) = resolve_include(&literal, search_path) else {
      return Err(ResolveError::NotFound {
        literal,
        from: file.to_path_buf(),
        searched: search_path.to_vec(),
      });
    };
    trace!(from = %file.display(), literal = %literal, to = %found.display(), "resolved include");
    resolved.insert(canonical(&found));
  }

  Ok(resolved.into_iter().collect())
}

fn canonical(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
