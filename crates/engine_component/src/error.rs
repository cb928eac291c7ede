//! Error types for pool, entity and component operations.
//!
//! Every variant describes caller misuse (a stale id, a double activation, a
//! duplicate attach) or exhaustion of the id space. None of them are meant to
//! be retried: the offending operation is aborted at the call site.

use crate::component::ComponentId;
use crate::entity::EntityId;

/// Errors raised by the ECS core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// A raw slot id is out of range or currently on the free list.
    #[error("slot {0} is not occupied")]
    SlotNotFound(u32),

    /// A slot was destroyed twice.
    #[error("slot {0} is already free")]
    DoubleDestroy(u32),

    /// The pool has issued every id representable as `u32`.
    #[error("pool capacity exhausted after {0} slots")]
    CapacityExhausted(usize),

    /// The entity id does not name a live entity.
    #[error("invalid entity {0}")]
    InvalidEntity(EntityId),

    /// The component id does not name a live component.
    #[error("invalid component {0}")]
    InvalidComponent(ComponentId),

    /// A generational handle outlived the slot it was issued for.
    #[error("stale handle to slot {id} (handle generation {held}, slot generation {current})")]
    StaleHandle {
        /// Raw slot id of the handle.
        id: u32,
        /// Generation captured by the handle.
        held: u32,
        /// Generation currently stored in the slot.
        current: u32,
    },

    /// A handle was resolved against a pool that did not issue it.
    #[error("handle to slot {0} belongs to another pool")]
    ForeignHandle(u32),

    /// `activate` on an entity that is already activated.
    #[error("entity {0} is already activated")]
    AlreadyActivated(EntityId),

    /// `activate` on an entity already queued for activation.
    #[error("entity {0} is already pending activation")]
    AlreadyPendingActivation(EntityId),

    /// `destroy` on an entity already queued for destruction.
    #[error("entity {0} is already pending destruction")]
    AlreadyPendingDestruction(EntityId),

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has component of type '{type_name}'")]
    DuplicateComponent {
        /// Owning entity.
        entity: EntityId,
        /// Component type name.
        type_name: &'static str,
    },

    /// The entity does not own a component of this type.
    #[error("entity {entity} does not have component of type '{type_name}'")]
    MissingComponent {
        /// Owning entity.
        entity: EntityId,
        /// Component type name.
        type_name: String,
    },

    /// No component pool is registered for the named type.
    #[error("component type '{0}' is not registered")]
    UnsupportedComponentType(String),

    /// The prospective child already has a parent.
    #[error("entity {0} already has a parent")]
    AlreadyHasParent(EntityId),

    /// `remove_child` on an entity that is not a child of the given parent.
    #[error("entity {child} is not a child of entity {parent}")]
    NotAChild {
        /// The supposed parent.
        parent: EntityId,
        /// The supposed child.
        child: EntityId,
    },

    /// Attaching the child would make an entity its own ancestor.
    #[error("attaching entity {child} under {parent} would create a cycle")]
    HierarchyCycle {
        /// The prospective parent.
        parent: EntityId,
        /// The prospective child.
        child: EntityId,
    },
}

/// Convenience alias used throughout the crate.
pub type EcsResult<T> = Result<T, EcsError>;

/// Failure to turn a serialised component body into a stored component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentBodyError {
    /// The body does not deserialise into the component type.
    #[error("malformed component body: {0}")]
    Json(#[from] serde_json::Error),

    /// The decoded component could not be attached.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}
