//! External compiler/linker invocation.
//!
//! The toolchain is opaque: it is handed flags and paths and either succeeds or
//! fails with an exit code. Its stdout and stderr are inherited so compiler
//! diagnostics reach the user unchanged.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ToolchainError {
  /// The compiler or linker exited unsuccessfully.
  #[error("{program} failed with exit code {code:?}")]
  Failed { program: String, code: Option<i32> },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to create {}: {source}", .path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ToolchainError {
  /// The process exit code to forward, `1` when the tool was killed or never ran.
  pub fn exit_code(&self) -> i32 {
    match self {
      ToolchainError::Failed { code: Some(code), .. } => *code,
      _ => 1,
    }
  }
}

/// The two operations a build needs from a C toolchain.
#[allow(async_fn_in_trait)]
pub trait Toolchain {
  /// Compile one translation unit into `object`.
  async fn compile(
    &self,
    source: &Path,
    object: &Path,
    flags: &[String],
    include_dirs: &[PathBuf],
  ) -> Result<(), ToolchainError>;

  /// Link `objects` into the executable `output`.
  async fn link(&self, objects: &[PathBuf], flags: &[String], output: &Path) -> Result<(), ToolchainError>;
}

/// A compiler driver (`gcc`, `clang`, `cc`) run as a child process.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
  program: String,
  cwd: Option<PathBuf>,
}

impl CommandToolchain {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      cwd: None,
    }
  }

  /// Run the driver from `cwd` instead of the current directory.
  pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  async fn run(&self, args: Vec<OsString>) -> Result<(), ToolchainError> {
    let mut command = Command::new(&self.program);
    command
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit());
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    debug!(program = %self.program, args = ?args, "spawning toolchain");

    let status = command.status().await.map_err(|source| ToolchainError::Spawn {
      program: self.program.clone(),
      source,
    })?;

    if !status.success() {
      error!(program = %self.program, code = ?status.code(), "toolchain failed");
      return Err(ToolchainError::Failed {
        program: self.program.clone(),
        code: status.code(),
      });
    }

    Ok(())
  }
}

impl Toolchain for CommandToolchain {
  async fn compile(
    &self,
    source: &Path,
    object: &Path,
    flags: &[String],
    include_dirs: &[PathBuf],
  ) -> Result<(), ToolchainError> {
    create_parent(object).await?;
    self.run(compile_args(source, object, flags, include_dirs)).await
  }

  async fn link(&self, objects: &[PathBuf], flags: &[String], output: &Path) -> Result<(), ToolchainError> {
    create_parent(output).await?;
    self.run(link_args(objects, flags, output)).await
  }
}

/// `flags... -I<dir>... -c <source> -o <object>`
pub fn compile_args(source: &Path, object: &Path, flags: &[String], include_dirs: &[PathBuf]) -> Vec<OsString> {
  let mut args: Vec<OsString> = flags.iter().map(OsString::from).collect();
  for dir in include_dirs {
    let mut arg = OsString::from("-I");
    arg.push(dir);
    args.push(arg);
  }
  args.push("-c".into());
  args.push(source.into());
  args.push("-o".into());
  args.push(object.into());
  args
}

/// `objects... flags... -o <output>`
pub fn link_args(objects: &[PathBuf], flags: &[String], output: &Path) -> Vec<OsString> {
  let mut args: Vec<OsString> = objects.iter().map(OsString::from).collect();
  args.extend(flags.iter().map(OsString::from));
  args.push("-o".into());
  args.push(output.into());
  args
}

async fn create_parent(path: &Path) -> Result<(), ToolchainError> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|source| ToolchainError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
  }
  Ok(())
}
