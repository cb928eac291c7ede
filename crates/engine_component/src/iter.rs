//! Index cursors over entities and components.
//!
//! [`EntityIterator`] and [`ComponentIterator`] hold nothing but an id, so a
//! cursor can be kept across calls that create or destroy entities. Every
//! query takes the pool again and re-validates the current position.
//!
//! A cursor is either *valid* (it names a live record owned by an activated
//! entity), *invalid* (its record was destroyed or deactivated since it was
//! positioned) or at the *end* (`id >= max_id`). Invalid is not end: callers
//! treat it as the end of that element and [`advance`](EntityIterator::advance)
//! to continue with the next one.
//!
//! [`EntityIter`] and [`ComponentIter`] are the borrowing [`Iterator`]
//! adaptors built on the cursors.

use std::marker::PhantomData;

use crate::component::{Component, ComponentId};
use crate::component_pool::ComponentPool;
use crate::entity::{Entity, EntityId};
use crate::entity_pool::EntityPool;

/// A restartable cursor over activated entities in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityIterator {
    id: u32,
}

impl EntityIterator {
    /// Position on the first activated entity at or after id 0.
    #[must_use]
    pub fn begin(pool: &EntityPool) -> Self {
        Self::at(pool, EntityId(0))
    }

    /// Position on the first activated entity at or after `start`.
    #[must_use]
    pub fn at(pool: &EntityPool, start: EntityId) -> Self {
        let mut cursor = Self { id: start.raw() };
        if !cursor.is_valid(pool) {
            cursor.advance(pool);
        }
        cursor
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        EntityId(self.id)
    }

    /// Returns `true` if the cursor names a live, activated entity.
    #[must_use]
    pub fn is_valid(&self, pool: &EntityPool) -> bool {
        pool.is_activated(EntityId(self.id))
    }

    /// Returns `true` once the cursor has passed every issued id.
    #[must_use]
    pub fn is_end(&self, pool: &EntityPool) -> bool {
        self.id >= pool.max_id().raw()
    }

    /// Move to the next activated entity. Returns `false` at the end.
    pub fn advance(&mut self, pool: &EntityPool) -> bool {
        let max = pool.max_id().raw();
        while self.id < max {
            self.id += 1;
            if self.is_valid(pool) {
                return true;
            }
        }
        false
    }

    /// The entity under the cursor, if the cursor is valid.
    #[must_use]
    pub fn get<'a>(&self, pool: &'a EntityPool) -> Option<&'a Entity> {
        pool.entity_with_id(EntityId(self.id))
            .ok()
            .filter(|entity| entity.is_activated())
    }
}

/// Borrowing iterator over activated entities, yielding `(id, record)`.
#[derive(Debug)]
pub struct EntityIter<'a> {
    pool: &'a EntityPool,
    cursor: EntityIterator,
}

impl<'a> EntityIter<'a> {
    pub(crate) fn new(pool: &'a EntityPool) -> Self {
        Self {
            pool,
            cursor: EntityIterator::begin(pool),
        }
    }
}

impl<'a> Iterator for EntityIter<'a> {
    type Item = (EntityId, &'a Entity);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.cursor.is_end(self.pool) {
            let current = self.cursor;
            self.cursor.advance(self.pool);
            if let Some(entity) = current.get(self.pool) {
                return Some((current.id(), entity));
            }
        }
        None
    }
}

/// A restartable cursor over the components of activated entities.
#[derive(Debug)]
pub struct ComponentIterator<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentIterator<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentIterator<T> {}

impl<T: Component> ComponentIterator<T> {
    #[must_use]
    pub fn begin(pool: &ComponentPool<T>, entities: &EntityPool) -> Self {
        Self::at(pool, entities, ComponentId(0))
    }

    /// Position on the first valid component at or after `start`.
    #[must_use]
    pub fn at(pool: &ComponentPool<T>, entities: &EntityPool, start: ComponentId) -> Self {
        let mut cursor = Self {
            id: start.raw(),
            _marker: PhantomData,
        };
        if !cursor.is_valid(pool, entities) {
            cursor.advance(pool, entities);
        }
        cursor
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        ComponentId(self.id)
    }

    /// Returns `true` if the cursor names a live component whose owner is
    /// activated.
    #[must_use]
    pub fn is_valid(&self, pool: &ComponentPool<T>, entities: &EntityPool) -> bool {
        pool.stored(ComponentId(self.id))
            .is_some_and(|stored| entities.is_activated(stored.entity))
    }

    #[must_use]
    pub fn is_end(&self, pool: &ComponentPool<T>) -> bool {
        self.id >= pool.max_id().raw()
    }

    /// Move to the next valid component. Returns `false` at the end.
    pub fn advance(&mut self, pool: &ComponentPool<T>, entities: &EntityPool) -> bool {
        let max = pool.max_id().raw();
        while self.id < max {
            self.id += 1;
            if self.is_valid(pool, entities) {
                return true;
            }
        }
        false
    }

    /// The owning entity and value under the cursor, if valid.
    #[must_use]
    pub fn get<'a>(
        &self,
        pool: &'a ComponentPool<T>,
        entities: &EntityPool,
    ) -> Option<(EntityId, &'a T)> {
        pool.stored(ComponentId(self.id))
            .filter(|stored| entities.is_activated(stored.entity))
            .map(|stored| (stored.entity, &stored.value))
    }
}

/// Borrowing iterator over components of activated entities, yielding
/// `(component id, owner, value)`.
#[derive(Debug)]
pub struct ComponentIter<'a, T: Component> {
    pool: &'a ComponentPool<T>,
    entities: &'a EntityPool,
    cursor: ComponentIterator<T>,
}

impl<'a, T: Component> ComponentIter<'a, T> {
    pub(crate) fn new(pool: &'a ComponentPool<T>, entities: &'a EntityPool) -> Self {
        Self {
            pool,
            entities,
            cursor: ComponentIterator::begin(pool, entities),
        }
    }
}

impl<'a, T: Component> Iterator for ComponentIter<'a, T> {
    type Item = (ComponentId, EntityId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.cursor.is_end(self.pool) {
            let current = self.cursor;
            self.cursor.advance(self.pool, self.entities);
            if let Some((entity, value)) = current.get(self.pool, self.entities) {
                return Some((current.id(), entity, value));
            }
        }
        None
    }
}
