//! Entity identifiers and the per-entity record.
//!
//! An [`EntityId`] is a plain `u32` slot index into the
//! [`EntityPool`](crate::EntityPool). The [`Entity`] record stored in that
//! slot owns no component data. It holds the activation state, the list of
//! attached component types and the parent/child topology.

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;

/// Identifier of an entity slot.
///
/// Ids are recycled after destruction; see [`IdMode`](crate::IdMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create an entity id from a raw slot index.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw slot index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Where an entity is in the activation/destruction transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Created but never activated.
    Inactive,
    /// Queued for activation at the next refresh.
    PendingActivation,
    /// Visible to systems and iteration.
    Activated,
    /// Queued for destruction at the next refresh.
    PendingDestruction,
}

/// The record stored in each occupied entity slot.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: Option<String>,
    serializable: bool,
    activated: bool,
    pending_activation: bool,
    pending_destruction: bool,
    components: Vec<ComponentTypeId>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            serializable: true,
            activated: false,
            pending_activation: false,
            pending_destruction: false,
            components: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// The id of the slot holding this record.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Optional human-readable name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set or clear the entity's name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Whether the entity is written out by scene snapshots.
    #[must_use]
    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Include or exclude the entity (and its subtree) from snapshots.
    pub fn set_serializable(&mut self, serializable: bool) {
        self.serializable = serializable;
    }

    /// The entity's transaction state. Pending destruction takes precedence
    /// over being activated.
    #[must_use]
    pub fn state(&self) -> EntityState {
        if self.pending_destruction {
            EntityState::PendingDestruction
        } else if self.activated {
            EntityState::Activated
        } else if self.pending_activation {
            EntityState::PendingActivation
        } else {
            EntityState::Inactive
        }
    }

    /// Returns `true` once activation has been committed.
    ///
    /// An entity pending destruction stays activated until the refresh that
    /// frees it.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    #[must_use]
    pub fn is_pending_activation(&self) -> bool {
        self.pending_activation
    }

    #[must_use]
    pub fn is_pending_destruction(&self) -> bool {
        self.pending_destruction
    }

    /// The parent entity, if any.
    #[must_use]
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities in attach order.
    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Component types attached to this entity, in attach order.
    #[must_use]
    pub fn component_types(&self) -> &[ComponentTypeId] {
        &self.components
    }

    #[must_use]
    pub fn has_component_type(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains(&type_id)
    }

    pub(crate) fn set_pending_activation(&mut self, pending: bool) {
        self.pending_activation = pending;
    }

    pub(crate) fn set_pending_destruction(&mut self, pending: bool) {
        self.pending_destruction = pending;
    }

    pub(crate) fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }

    pub(crate) fn attach(&mut self, type_id: ComponentTypeId) {
        if !self.components.contains(&type_id) {
            self.components.push(type_id);
        }
    }

    pub(crate) fn detach(&mut self, type_id: ComponentTypeId) {
        self.components.retain(|t| *t != type_id);
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    pub(crate) fn push_child(&mut self, child: EntityId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child_id(&mut self, child: EntityId) {
        self.children.retain(|c| *c != child);
    }

    pub(crate) fn take_children(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_defaults() {
        let entity = Entity::new(EntityId(3));
        assert_eq!(entity.id(), EntityId(3));
        assert_eq!(entity.state(), EntityState::Inactive);
        assert!(entity.is_serializable());
        assert!(entity.parent().is_none());
        assert!(entity.children().is_empty());
        assert!(entity.component_types().is_empty());
    }

    #[test]
    fn test_state_precedence() {
        let mut entity = Entity::new(EntityId(0));
        entity.set_pending_activation(true);
        assert_eq!(entity.state(), EntityState::PendingActivation);
        entity.set_pending_activation(false);
        entity.set_activated(true);
        assert_eq!(entity.state(), EntityState::Activated);
        entity.set_pending_destruction(true);
        assert_eq!(entity.state(), EntityState::PendingDestruction);
        assert!(entity.is_activated());
    }

    #[test]
    fn test_attach_is_idempotent_and_ordered() {
        let mut entity = Entity::new(EntityId(0));
        let a = ComponentTypeId::from_name("A");
        let b = ComponentTypeId::from_name("B");
        entity.attach(b);
        entity.attach(a);
        entity.attach(b);
        assert_eq!(entity.component_types(), &[b, a]);
        entity.detach(b);
        assert_eq!(entity.component_types(), &[a]);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId(7).to_string(), "Entity(7)");
    }
}
