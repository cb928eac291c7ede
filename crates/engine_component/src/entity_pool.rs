//! Entity storage, transaction flags and the parent/child tree.
//!
//! The pool specialises [`SlotPool`] for [`Entity`] records. Besides create
//! and lookup it validates the activation/destruction requests that the scene
//! queues, and it keeps parent/child links consistent. Links are
//! [`EntityId`] back-references; the pool owns every record.

use crate::entity::{Entity, EntityId};
use crate::error::{EcsError, EcsResult};
use crate::handle::EntityHandle;
use crate::iter::{EntityIter, EntityIterator};
use crate::slot_pool::{IdMode, PoolToken, SlotPool};

/// Pooled storage for entity records.
#[derive(Debug, Default)]
pub struct EntityPool {
    slots: SlotPool<Entity>,
}

impl EntityPool {
    /// Create an empty pool in [`IdMode::Reuse`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(IdMode::Reuse)
    }

    /// Create an empty pool with the given id mode.
    #[must_use]
    pub fn with_mode(mode: IdMode) -> Self {
        Self::with_capacity(mode, 0)
    }

    /// Create an empty pool with preallocated room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(mode: IdMode, capacity: usize) -> Self {
        Self {
            slots: SlotPool::with_capacity(mode, capacity),
        }
    }

    #[must_use]
    pub fn token(&self) -> PoolToken {
        self.slots.token()
    }

    #[must_use]
    pub fn mode(&self) -> IdMode {
        self.slots.mode()
    }

    /// Create an inactive, parentless, serializable entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExhausted`] if the id space is used up.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        // The record needs its own id, which is only known once a slot is
        // picked; insert a placeholder and patch it.
        let raw = self.slots.create(Entity::new(EntityId(0)))?;
        let id = EntityId(raw);
        *self.slots.get_mut(raw)? = Entity::new(id);
        Ok(id)
    }

    /// Free an entity slot, returning its record.
    ///
    /// The entity is unlinked from its parent and any remaining children are
    /// orphaned, so no live record points at the freed id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn destroy(&mut self, id: EntityId) -> EcsResult<Entity> {
        let (parent, children) = {
            let entity = self.entity_with_id_mut(id)?;
            (entity.parent(), entity.take_children())
        };
        if let Some(parent) = parent
            && let Ok(parent) = self.entity_with_id_mut(parent)
        {
            parent.remove_child_id(id);
        }
        for child in children {
            if let Ok(child) = self.entity_with_id_mut(child) {
                child.set_parent(None);
            }
        }
        self.slots
            .destroy(id.raw())
            .map_err(|_| EcsError::InvalidEntity(id))
    }

    /// Look up a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn entity_with_id(&self, id: EntityId) -> EcsResult<&Entity> {
        self.slots
            .get(id.raw())
            .map_err(|_| EcsError::InvalidEntity(id))
    }

    /// Look up a live entity mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn entity_with_id_mut(&mut self, id: EntityId) -> EcsResult<&mut Entity> {
        self.slots
            .get_mut(id.raw())
            .map_err(|_| EcsError::InvalidEntity(id))
    }

    #[must_use]
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.slots.is_valid(id.raw())
    }

    /// Returns `true` if `id` is live and activated.
    #[must_use]
    pub fn is_activated(&self, id: EntityId) -> bool {
        self.slots.get(id.raw()).is_ok_and(Entity::is_activated)
    }

    /// Exclusive upper bound of every id issued so far.
    #[must_use]
    pub fn max_id(&self) -> EntityId {
        EntityId(self.slots.max_id())
    }

    /// Number of live entities, activated or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Create a copyable handle to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn handle(&self, id: EntityId) -> EcsResult<EntityHandle> {
        if !self.is_valid(id) {
            return Err(EcsError::InvalidEntity(id));
        }
        let generation = self.slots.generation(id.raw()).unwrap_or_default();
        Ok(EntityHandle::new(self.token(), id, generation))
    }

    pub(crate) fn validate_handle(&self, handle: &EntityHandle) -> EcsResult<()> {
        self.slots
            .validate(handle.token(), handle.id().raw(), handle.generation())
    }

    /// A cursor positioned on the first activated entity.
    #[must_use]
    pub fn begin(&self) -> EntityIterator {
        EntityIterator::begin(self)
    }

    /// Iterate activated entities in ascending id order.
    #[must_use]
    pub fn iter(&self) -> EntityIter<'_> {
        EntityIter::new(self)
    }

    /// Iterate every live entity, activated or not, in ascending id order.
    pub fn iter_all(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().map(|(_, entity)| entity)
    }

    /// The first activated entity matching `predicate`.
    pub fn find_first(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Option<EntityId> {
        self.iter()
            .find(|(_, entity)| predicate(entity))
            .map(|(id, _)| id)
    }

    /// Every activated entity matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Vec<EntityId> {
        self.iter()
            .filter(|(_, entity)| predicate(entity))
            .map(|(id, _)| id)
            .collect()
    }

    // -- Transaction flags --

    /// Validate and flag an activation request.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid, already activated or already pending
    /// activation.
    pub fn request_activation(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self.entity_with_id_mut(id)?;
        if entity.is_activated() {
            return Err(EcsError::AlreadyActivated(id));
        }
        if entity.is_pending_activation() {
            return Err(EcsError::AlreadyPendingActivation(id));
        }
        entity.set_pending_activation(true);
        Ok(())
    }

    /// Validate and flag a destruction request.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already pending destruction.
    pub fn request_destruction(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self.entity_with_id_mut(id)?;
        if entity.is_pending_destruction() {
            return Err(EcsError::AlreadyPendingDestruction(id));
        }
        entity.set_pending_destruction(true);
        Ok(())
    }

    /// Mark a pending entity as activated.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already activated.
    pub fn commit_activation(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self.entity_with_id_mut(id)?;
        if entity.is_activated() {
            return Err(EcsError::AlreadyActivated(id));
        }
        entity.set_pending_activation(false);
        entity.set_activated(true);
        Ok(())
    }

    // -- Hierarchy --

    /// Attach `child` under `parent`.
    ///
    /// # Errors
    ///
    /// Fails if either entity is invalid, the child already has a parent, or
    /// the link would make an entity its own ancestor.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        self.entity_with_id(parent)?;
        if self.entity_with_id(child)?.parent().is_some() {
            return Err(EcsError::AlreadyHasParent(child));
        }
        if parent == child || self.is_ancestor_of(child, parent)? {
            return Err(EcsError::HierarchyCycle { parent, child });
        }
        self.entity_with_id_mut(child)?.set_parent(Some(parent));
        self.entity_with_id_mut(parent)?.push_child(child);
        Ok(())
    }

    /// Detach `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Fails if either entity is invalid or `child` is not a child of
    /// `parent`.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        self.entity_with_id(parent)?;
        if self.entity_with_id(child)?.parent() != Some(parent) {
            return Err(EcsError::NotAChild { parent, child });
        }
        self.entity_with_id_mut(child)?.set_parent(None);
        self.entity_with_id_mut(parent)?.remove_child_id(child);
        Ok(())
    }

    /// The parent of `id`, if any.
    ///
    /// # Errors
    ///
    /// Fails if `id` or its recorded parent is invalid.
    pub fn parent(&self, id: EntityId) -> EcsResult<Option<EntityId>> {
        match self.entity_with_id(id)?.parent() {
            Some(parent) => {
                self.entity_with_id(parent)?;
                Ok(Some(parent))
            }
            None => Ok(None),
        }
    }

    /// The children of `id`, in attach order.
    ///
    /// # Errors
    ///
    /// Fails if `id` is invalid.
    pub fn children(&self, id: EntityId) -> EcsResult<&[EntityId]> {
        Ok(self.entity_with_id(id)?.children())
    }

    /// The topmost ancestor of `id` (or `id` itself if it has no parent).
    ///
    /// # Errors
    ///
    /// Fails if `id` or any ancestor is invalid.
    pub fn root(&self, id: EntityId) -> EcsResult<EntityId> {
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            current = parent;
        }
        Ok(current)
    }

    fn is_ancestor_of(&self, ancestor: EntityId, id: EntityId) -> EcsResult<bool> {
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            if parent == ancestor {
                return Ok(true);
            }
            current = parent;
        }
        Ok(false)
    }

    /// The first direct child of `id` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Fails if `id` or one of its children is invalid.
    pub fn find_first_child(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Option<EntityId>> {
        for &child in self.children(id)? {
            if predicate(self.entity_with_id(child)?) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Every direct child of `id` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Fails if `id` or one of its children is invalid.
    pub fn find_children(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Vec<EntityId>> {
        let mut found = Vec::new();
        for &child in self.children(id)? {
            if predicate(self.entity_with_id(child)?) {
                found.push(child);
            }
        }
        Ok(found)
    }

    /// The first descendant of `id`, in depth-first pre-order, matching
    /// `predicate`.
    ///
    /// # Errors
    ///
    /// Fails if `id` or a descendant is invalid.
    pub fn find_first_descendant(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Option<EntityId>> {
        let mut stack: Vec<EntityId> = self.children(id)?.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let entity = self.entity_with_id(current)?;
            if predicate(entity) {
                return Ok(Some(current));
            }
            stack.extend(entity.children().iter().rev().copied());
        }
        Ok(None)
    }

    /// Every descendant of `id`, in depth-first pre-order, matching
    /// `predicate`.
    ///
    /// # Errors
    ///
    /// Fails if `id` or a descendant is invalid.
    pub fn find_descendants(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Vec<EntityId>> {
        let mut found = Vec::new();
        let mut stack: Vec<EntityId> = self.children(id)?.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let entity = self.entity_with_id(current)?;
            if predicate(entity) {
                found.push(current);
            }
            stack.extend(entity.children().iter().rev().copied());
        }
        Ok(found)
    }

    /// The nearest ancestor of `id` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Fails if `id` or an ancestor is invalid.
    pub fn find_first_ancestor(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Option<EntityId>> {
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            if predicate(self.entity_with_id(parent)?) {
                return Ok(Some(parent));
            }
            current = parent;
        }
        Ok(None)
    }

    /// Every ancestor of `id` matching `predicate`, nearest first.
    ///
    /// # Errors
    ///
    /// Fails if `id` or an ancestor is invalid.
    pub fn find_ancestors(
        &self,
        id: EntityId,
        mut predicate: impl FnMut(&Entity) -> bool,
    ) -> EcsResult<Vec<EntityId>> {
        let mut found = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            if predicate(self.entity_with_id(parent)?) {
                found.push(parent);
            }
            current = parent;
        }
        Ok(found)
    }
}
