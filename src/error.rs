//! Error kinds this crate can produce.
//!
//! Recoverable kinds (asset, script, physics, invalid-entity-on-mutation) are never
//! surfaced as `Err` — callers log and continue, matching the original engine's
//! "recoverable errors are logged and localized" policy. Only structural failures that a
//! caller might reasonably want to handle (missing component on a checked access,
//! invalid hierarchy) are modeled as `Result`.

use crate::entity::EntityId;

/// Structural errors a caller can meaningfully recover from.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    /// `EntityStore::try_get::<T>` on an entity that does not have `T`.
    #[error("entity {0:?} has no component of the requested type")]
    MissingComponent(EntityId),

    /// An operation addressed an id that was never issued or has since been destroyed.
    #[error("entity {0:?} is not alive")]
    InvalidEntity(EntityId),

    /// `Hierarchy::attach_child` would create a cycle; the call is rejected.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    InvalidHierarchy { parent: EntityId, child: EntityId },
}

pub type EngineResult<T> = Result<T, EngineError>;
