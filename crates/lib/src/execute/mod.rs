//! Configuration build execution.
//!
//! This module ties the pieces together:
//! - [`plan`]: which objects a configuration links
//! - [`toolchain`]: the external compiler/linker
//! - [`driver`]: the sequential build of one configuration and its dependencies

pub mod driver;
pub mod plan;
pub mod toolchain;
pub mod types;

pub use driver::Builder;
pub use plan::{library_sources, plan_objects};
pub use toolchain::{CommandToolchain, Toolchain, ToolchainError};
pub use types::{BuildError, BuildOptions, BuildReport, CompileStep};
