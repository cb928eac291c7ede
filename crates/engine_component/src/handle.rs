//! Copyable, non-owning references to entities and components.
//!
//! A handle is a `(pool token, id, generation)` triple. Copying a handle
//! never copies the record it names; every dereference resolves through the
//! pool at the time of use. What "still valid" means depends on the pool's
//! [`IdMode`](crate::IdMode):
//!
//! - in `Reuse` mode a handle stays resolvable as long as *some* value sits
//!   in its slot, so after destroy + create it aliases the new occupant;
//! - in `Generational` mode the same handle fails with
//!   [`EcsError::StaleHandle`].

use std::marker::PhantomData;

use crate::component::{Component, ComponentId};
use crate::component_pool::ComponentPool;
use crate::entity::{Entity, EntityId};
use crate::entity_pool::EntityPool;
use crate::error::{EcsError, EcsResult};
use crate::slot_pool::PoolToken;

/// A lightweight reference to an entity in a specific [`EntityPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    token: PoolToken,
    id: EntityId,
    generation: u32,
}

impl EntityHandle {
    pub(crate) fn new(token: PoolToken, id: EntityId, generation: u32) -> Self {
        Self {
            token,
            id,
            generation,
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn token(&self) -> PoolToken {
        self.token
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns `true` if the handle currently resolves in `pool`.
    #[must_use]
    pub fn is_valid(&self, pool: &EntityPool) -> bool {
        pool.validate_handle(self).is_ok()
    }

    /// Resolve the entity record.
    ///
    /// # Errors
    ///
    /// Fails if the handle belongs to another pool, its slot is free, or (in
    /// generational mode) the slot has been recycled.
    pub fn entity<'a>(&self, pool: &'a EntityPool) -> EcsResult<&'a Entity> {
        pool.validate_handle(self)?;
        pool.entity_with_id(self.id)
    }

    /// Resolve the entity record mutably.
    ///
    /// # Errors
    ///
    /// See [`EntityHandle::entity`].
    pub fn entity_mut<'a>(&self, pool: &'a mut EntityPool) -> EcsResult<&'a mut Entity> {
        pool.validate_handle(self)?;
        pool.entity_with_id_mut(self.id)
    }

    /// Resolve this entity's component of type `T`.
    ///
    /// # Errors
    ///
    /// Fails if the handle does not resolve or the entity has no `T`.
    pub fn component<'a, T: Component>(
        &self,
        pool: &EntityPool,
        components: &'a ComponentPool<T>,
    ) -> EcsResult<&'a T> {
        pool.validate_handle(self)?;
        components.for_entity(self.id)
    }
}

/// A lightweight reference to one component slot in a [`ComponentPool`].
#[derive(Debug)]
pub struct ComponentHandle<T> {
    token: PoolToken,
    id: ComponentId,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls: a handle is copyable regardless of `T`.
impl<T> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentHandle<T> {}

impl<T> PartialEq for ComponentHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.id == other.id && self.generation == other.generation
    }
}

impl<T> Eq for ComponentHandle<T> {}

impl<T: Component> ComponentHandle<T> {
    pub(crate) fn new(token: PoolToken, id: ComponentId, generation: u32) -> Self {
        Self {
            token,
            id,
            generation,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub(crate) fn token(&self) -> PoolToken {
        self.token
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn is_valid(&self, pool: &ComponentPool<T>) -> bool {
        pool.validate_handle(self).is_ok()
    }

    /// Resolve the component value.
    ///
    /// # Errors
    ///
    /// Fails if the handle does not resolve in `pool`.
    pub fn get<'a>(&self, pool: &'a ComponentPool<T>) -> EcsResult<&'a T> {
        pool.validate_handle(self)?;
        pool.with_id(self.id)
    }

    /// Resolve the component value mutably.
    ///
    /// # Errors
    ///
    /// Fails if the handle does not resolve in `pool`.
    pub fn get_mut<'a>(&self, pool: &'a mut ComponentPool<T>) -> EcsResult<&'a mut T> {
        pool.validate_handle(self)?;
        pool.with_id_mut(self.id)
    }

    /// The entity currently owning the referenced component.
    ///
    /// # Errors
    ///
    /// Fails if the handle does not resolve in `pool`.
    pub fn entity(&self, pool: &ComponentPool<T>) -> EcsResult<EntityId> {
        pool.validate_handle(self)?;
        pool.entity_of(self.id)
            .ok_or(EcsError::InvalidComponent(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot_pool::IdMode;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Tag(u32);

    impl Component for Tag {
        fn type_name() -> &'static str {
            "Tag"
        }
    }

    #[test]
    fn test_copies_resolve_to_same_record() {
        let mut pool = EntityPool::new();
        let id = pool.create().unwrap();
        let handle = pool.handle(id).unwrap();
        let copy = handle;
        copy.entity_mut(&mut pool)
            .unwrap()
            .set_name(Some("shared".into()));
        assert_eq!(handle.entity(&pool).unwrap().name(), Some("shared"));
    }

    #[test]
    fn test_reuse_mode_handle_aliases_new_entity() {
        let mut pool = EntityPool::with_mode(IdMode::Reuse);
        let a = pool.create().unwrap();
        let handle_a = pool.handle(a).unwrap();
        pool.destroy(a).unwrap();
        assert!(handle_a.entity(&pool).is_err());

        let b = pool.create().unwrap();
        pool.entity_with_id_mut(b)
            .unwrap()
            .set_name(Some("b".into()));
        assert_eq!(a, b);
        // The stale handle silently resolves to the new occupant.
        let resolved = handle_a.entity(&pool).unwrap();
        assert_eq!(resolved.id(), b);
        assert_eq!(resolved.name(), Some("b"));
    }

    #[test]
    fn test_generational_mode_handle_goes_stale() {
        let mut pool = EntityPool::with_mode(IdMode::Generational);
        let a = pool.create().unwrap();
        let handle_a = pool.handle(a).unwrap();
        pool.destroy(a).unwrap();
        let _b = pool.create().unwrap();
        assert!(matches!(
            handle_a.entity(&pool),
            Err(EcsError::StaleHandle { .. })
        ));
        assert!(!handle_a.is_valid(&pool));
    }

    #[test]
    fn test_handle_from_other_pool_rejected() {
        let mut first = EntityPool::new();
        let mut second = EntityPool::new();
        let a = first.create().unwrap();
        second.create().unwrap();
        let handle = first.handle(a).unwrap();
        assert_eq!(
            handle.entity(&second).unwrap_err(),
            EcsError::ForeignHandle(a.raw())
        );
    }

    #[test]
    fn test_entity_handle_component_lookup() {
        let mut entities = EntityPool::new();
        let mut tags = ComponentPool::<Tag>::new();
        let id = entities.create().unwrap();
        let handle = entities.handle(id).unwrap();
        assert!(handle.component(&entities, &tags).is_err());
        tags.add(&mut entities, id, Tag(9)).unwrap();
        assert_eq!(handle.component(&entities, &tags).unwrap(), &Tag(9));
    }

    #[test]
    fn test_component_handle_resolves_and_invalidates() {
        let mut entities = EntityPool::new();
        let mut tags = ComponentPool::<Tag>::with_mode(IdMode::Generational);
        let id = entities.create().unwrap();
        let component = tags.add(&mut entities, id, Tag(1)).unwrap();
        let handle = tags.handle(component).unwrap();
        handle.get_mut(&mut tags).unwrap().0 = 2;
        assert_eq!(handle.get(&tags).unwrap(), &Tag(2));
        assert_eq!(handle.entity(&tags).unwrap(), id);

        tags.remove(&mut entities, id).unwrap();
        assert!(!handle.is_valid(&tags));
        tags.add(&mut entities, id, Tag(3)).unwrap();
        assert!(handle.get(&tags).is_err());
    }
}
