mod build;
mod deps;
mod list;

use std::path::Path;

use anyhow::{Context, Result};

use cbuild_lib::config::ConfigRegistry;

pub use build::cmd_build;
pub use deps::cmd_deps;
pub use list::cmd_list;

fn load_registry(config: &Path) -> Result<ConfigRegistry> {
  ConfigRegistry::load(config).with_context(|| format!("Failed to load project file: {}", config.display()))
}
