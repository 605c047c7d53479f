use raptorc_cache::{CacheError, UnitId};
use raptorc_codegen::{CodegenError, ModuleError};
use raptorc_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CodegenError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no sources were queued for saving")]
    NoSources,

    #[error("failed to compile {document}")]
    Compile {
        document: String,
        #[source]
        source: CodegenError,
    },

    #[error(transparent)]
    Module(#[from] ModuleError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("export {export} does not expose both an id and a dependency-id accessor")]
    MissingAccessor { export: String },

    #[error("module is unresolvable: units {ids:?} depend on missing or cyclic units")]
    Unresolvable { ids: Vec<UnitId> },

    #[error("unit id {id} is declared by more than one export")]
    IdCollision { id: UnitId },

    #[error(transparent)]
    Cache(CacheError),

    #[error("module has no restore routine")]
    MissingRestore,

    #[error("restore routine names unknown initializer {name}")]
    UnknownInitializer { name: String },

    #[error("initializer failed: {0}")]
    Initializer(#[source] RuntimeError),
}

impl From<CacheError> for LoadError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::IdCollision(id) => LoadError::IdCollision { id },
            other => LoadError::Cache(other),
        }
    }
}
