//! Code generation: turns function and script bodies into registered
//! compiled units, and builds the persistable module that Save writes.

pub mod error;
pub mod generator;
pub mod hints;
pub mod module;
pub mod source;

pub use error::{CodegenError, ModuleError};
pub use generator::{GenerationTarget, GeneratorKind, MethodGenerator};
pub use hints::OptimizationHints;
pub use module::{
    ExportedType, GLOBAL_METHOD_NAME, ModuleBuilder, PersistedModule, RESTORE_ROUTINE_NAME,
    RestoreRoutine,
};
pub use source::ScriptSource;

use raptorc_cache::UnitCache;
use raptorc_runtime::CompiledUnit;

/// The cache every generated unit is registered in.
pub type CompiledUnitCache = UnitCache<CompiledUnit>;
