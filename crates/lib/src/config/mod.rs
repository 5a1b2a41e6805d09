//! Build configurations and the registry that holds them.

pub mod registry;
pub mod types;

pub use registry::{ConfigError, ConfigRegistry};
pub use types::{BuildConfiguration, ConfigFile, ConfigRecord, FlagDefaults};
