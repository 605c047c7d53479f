//! Engine configuration.
//!
//! Every struct has a `Default` and a `from_env()` constructor reading
//! `RAPTOR_*` variables. [`EngineConfig`] aggregates them and can also be
//! loaded from a TOML file when the `toml-config` feature is enabled.

pub mod compiler;
pub mod engine;

pub use crate::compiler::{CompilerOptions, GenerationMode};
pub use crate::engine::{CacheConfig, EngineConfig, RuntimeConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a boolean flag the way the `RAPTOR_*` variables accept it:
/// `true`/`false` as well as `1`/`0`.
pub(crate) fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim() {
        "1" => true,
        "0" => false,
        other => other.parse().unwrap_or(default),
    }
}
