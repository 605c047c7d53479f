//! Raptor: a small script compiler whose compiled units live in a weakly
//! owning cache and can be saved to, and restored from, persisted modules.

pub mod engine;
pub mod error;
pub mod script_compiler;

pub use engine::ScriptEngine;
pub use error::{EngineError, LoadError, SaveError};
pub use script_compiler::{ScriptCompiler, load_module_with_cache};

pub use raptorc_codegen::{CompiledUnitCache, PersistedModule, ScriptSource};
pub use raptorc_config::{CompilerOptions, EngineConfig};
pub use raptorc_runtime::{Runtime, Value};
