//! cbuild-lib: incremental builds for multi-configuration C projects
//!
//! This crate provides:
//! - `config`: the immutable registry of named build configurations
//! - `deps`: quoted-include resolution and transitive staleness
//! - `execute`: object planning, toolchain invocation and the build driver
//! - `scan`: deterministic source tree walks

pub mod config;
pub mod consts;
pub mod deps;
pub mod execute;
pub mod platform;
pub mod scan;
pub mod source;
