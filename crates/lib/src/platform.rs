//! Platform detection for artifact naming.

/// Operating system families the build distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  Other,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Self {
    match std::env::consts::OS {
      "linux" => Self::Linux,
      "macos" => Self::MacOs,
      "windows" => Self::Windows,
      _ => Self::Other,
    }
  }

  /// Suffix appended to linked executables.
  pub fn executable_suffix(&self) -> &'static str {
    match self {
      Self::Windows => ".exe",
      Self::Linux | Self::MacOs | Self::Other => "",
    }
  }
}

/// Executable suffix for the platform this binary runs on.
pub fn executable_suffix() -> &'static str {
  Os::current().executable_suffix()
}
