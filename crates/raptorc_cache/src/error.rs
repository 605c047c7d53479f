use thiserror::Error;

use crate::unit_cache::UnitId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no live unit registered under id {0}")]
    NotFound(UnitId),

    #[error("id {0} is already held by a live unit")]
    IdCollision(UnitId),

    #[error("dependency #{position} is not registered in this cache")]
    UnregisteredDependency { position: usize },
}
