//! Translation units and the object files derived from them.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::consts::OBJECT_EXTENSION;

/// Read a source or header as text.
///
/// Bytes that are not UTF-8 (a Latin-1 comment, say) are replaced rather than
/// rejected. Every pattern matched against the text is ASCII.
pub fn read_text(path: &Path) -> io::Result<String> {
  let bytes = fs::read(path)?;
  Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Check whether the file at `path` declares a process entry point.
pub fn has_entry_point(path: &Path) -> io::Result<bool> {
  Ok(text_has_entry_point(&read_text(path)?))
}

/// Line-oriented match for `[ \t]*(void|int)[ \t]+main[ \t]*\(`.
pub fn text_has_entry_point(text: &str) -> bool {
  text.lines().any(|line| {
    let rest = line.trim_start_matches([' ', '\t']);
    let Some(rest) = rest.strip_prefix("int").or_else(|| rest.strip_prefix("void")) else {
      return false;
    };
    let after_type = rest.trim_start_matches([' ', '\t']);
    if after_type.len() == rest.len() {
      return false;
    }
    after_type
      .strip_prefix("main")
      .is_some_and(|r| r.trim_start_matches([' ', '\t']).starts_with('('))
  })
}

/// Derive the object path for `source` within configuration `config_name`.
///
/// The object mirrors the source's location relative to the deepest directory
/// shared by the source and `out_dir`, rooted under `<out_dir>/.<config_name>/`,
/// with the extension replaced by `.o`.
pub fn object_path(source: &Path, out_dir: &Path, config_name: &str) -> PathBuf {
  let common = common_ancestor(source, out_dir);
  let relative = source.strip_prefix(&common).unwrap_or(source);
  let relative: PathBuf = relative
    .components()
    .filter(|c| matches!(c, Component::Normal(_)))
    .collect();

  let mut object = out_dir.join(format!(".{}", config_name)).join(relative);
  object.set_extension(OBJECT_EXTENSION);
  object
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
  a.components()
    .zip(b.components())
    .take_while(|(x, y)| x == y)
    .map(|(x, _)| x)
    .collect()
}
