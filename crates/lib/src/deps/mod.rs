//! Dependency tracking between sources, headers and objects.

pub mod freshness;
pub mod include;
pub mod staleness;

pub use freshness::{FreshnessOracle, MtimeOracle};
pub use include::{ResolveError, include_closure, parse_includes, resolve_include, resolve_includes};
pub use staleness::{StalenessError, needs_rebuild};
