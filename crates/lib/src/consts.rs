/// Default project file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "cbuild.json";

/// Current project file format version.
pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_COMPILER: &str = "gcc";

pub const DEFAULT_OUT_DIR: &str = "bin";

/// Environment variable that overrides the configured compiler.
pub const COMPILER_ENV: &str = "CBUILD_CC";

pub const OBJECT_EXTENSION: &str = "o";
pub const SOURCE_EXTENSION: &str = "c";
