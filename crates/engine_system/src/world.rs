//! Entity and component storage for one scene.
//!
//! The [`World`] owns the [`EntityPool`], one [`ComponentPool`] per component
//! type, and the two transition queues filled by [`World::activate`] and
//! [`World::destroy`]. The queues are drained by
//! [`Scene::refresh`](crate::Scene::refresh); nothing here notifies systems.
//!
//! Component pools are created on first use. A pool is found by the
//! [`ComponentTypeId`] hashed from the type's registered name, which is also
//! how snapshot bodies are routed back to their pool.

use std::collections::HashMap;

use engine_component::{
    Component, ComponentBodyError, ComponentId, ComponentPool, ComponentStore, ComponentTypeId,
    EcsError, EcsResult, Entity, EntityHandle, EntityId, EntityPool,
};
use tracing::trace;

use crate::config::WorldConfig;

/// Entities, component pools and pending transitions.
pub struct World {
    config: WorldConfig,
    entities: EntityPool,
    stores: HashMap<ComponentTypeId, Box<dyn ComponentStore>>,
    /// Store registration order, for deterministic whole-world passes.
    order: Vec<ComponentTypeId>,
    pending_activation: Vec<EntityId>,
    pending_destruction: Vec<EntityId>,
    active_count: usize,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<&'static str> = self
            .order
            .iter()
            .filter_map(|ty| self.stores.get(ty).map(|store| store.type_name()))
            .collect();
        f.debug_struct("World")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("active", &self.active_count)
            .field("component_types", &types)
            .field("pending_activation", &self.pending_activation)
            .field("pending_destruction", &self.pending_destruction)
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new empty world with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            entities: EntityPool::with_capacity(config.id_mode, config.initial_capacity),
            stores: HashMap::new(),
            order: Vec::new(),
            pending_activation: Vec::new(),
            pending_destruction: Vec::new(),
            active_count: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn entities(&self) -> &EntityPool {
        &self.entities
    }

    /// Number of entities whose activation has been committed and that have
    /// not yet been freed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    // -- Component pools --

    /// Create the pool for `T` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnsupportedComponentType`] if another Rust type is
    /// already registered under `T`'s name.
    pub fn register<T: Component>(&mut self) -> EcsResult<()> {
        let ty = T::component_type_id();
        match self.stores.get(&ty) {
            Some(store) if store.as_any().is::<ComponentPool<T>>() => Ok(()),
            Some(_) => Err(EcsError::UnsupportedComponentType(T::type_name().to_owned())),
            None => {
                let pool = ComponentPool::<T>::with_mode(self.config.id_mode);
                self.stores.insert(ty, Box::new(pool));
                self.order.push(ty);
                trace!(component = T::type_name(), "registered component pool");
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.stores
            .contains_key(&ComponentTypeId::from_name(type_name))
    }

    /// The pool for `T`, if one has been created.
    #[must_use]
    pub fn components<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.stores
            .get(&T::component_type_id())
            .and_then(|store| store.as_any().downcast_ref())
    }

    /// The pool for `T`, created on first use.
    ///
    /// # Errors
    ///
    /// See [`World::register`].
    pub fn components_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentPool<T>> {
        self.split_mut::<T>().map(|(_, pool)| pool)
    }

    /// Borrow the entity pool and the pool for `T` at the same time.
    ///
    /// The entity pool never leaves the crate mutably: slots are freed only
    /// by [`Scene::refresh`](crate::Scene::refresh), after their components.
    ///
    /// # Errors
    ///
    /// See [`World::register`].
    pub(crate) fn split_mut<T: Component>(
        &mut self,
    ) -> EcsResult<(&mut EntityPool, &mut ComponentPool<T>)> {
        self.register::<T>()?;
        let pool = self
            .stores
            .get_mut(&T::component_type_id())
            .and_then(|store| store.as_any_mut().downcast_mut())
            .ok_or_else(|| EcsError::UnsupportedComponentType(T::type_name().to_owned()))?;
        Ok((&mut self.entities, pool))
    }

    // -- Entities --

    /// Create an inactive entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExhausted`] if the id space is used up.
    pub fn create_entity(&mut self) -> EcsResult<EntityId> {
        let id = self.entities.create()?;
        trace!(entity = %id, "entity created");
        Ok(id)
    }

    /// Look up a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn entity(&self, id: EntityId) -> EcsResult<&Entity> {
        self.entities.entity_with_id(id)
    }

    /// Look up a live entity mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn entity_mut(&mut self, id: EntityId) -> EcsResult<&mut Entity> {
        self.entities.entity_with_id_mut(id)
    }

    /// Create a handle to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] if `id` is not live.
    pub fn handle(&self, id: EntityId) -> EcsResult<EntityHandle> {
        self.entities.handle(id)
    }

    /// Resolve a handle's `T` component.
    ///
    /// # Errors
    ///
    /// Fails if the handle does not resolve or the entity has no `T`.
    pub fn handle_component<T: Component>(&self, handle: &EntityHandle) -> EcsResult<&T> {
        match self.components::<T>() {
            Some(pool) => handle.component(&self.entities, pool),
            None => {
                handle.entity(&self.entities)?;
                Err(missing::<T>(handle.id()))
            }
        }
    }

    /// Queue an entity and its inactive descendants for activation at the
    /// next refresh.
    ///
    /// Descendants are queued depth first, each after its parent. Those
    /// already activated or pending activation are left alone but still
    /// searched; a subtree pending destruction is skipped.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid, already activated or already pending
    /// activation.
    pub fn activate(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.request_activation(id)?;
        self.pending_activation.push(id);
        trace!(entity = %id, "activation queued");

        let mut stack: Vec<EntityId> =
            self.entities.children(id)?.iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            let entity = self.entities.entity_with_id(child)?;
            if entity.is_pending_destruction() {
                continue;
            }
            stack.extend(entity.children().iter().rev().copied());
            if entity.is_activated() || entity.is_pending_activation() {
                continue;
            }
            self.entities.request_activation(child)?;
            self.pending_activation.push(child);
            trace!(entity = %child, parent = %id, "activation queued with ancestor");
        }
        Ok(())
    }

    /// Queue an entity for destruction at the next refresh.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already pending destruction.
    pub fn destroy(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.request_destruction(id)?;
        self.pending_destruction.push(id);
        trace!(entity = %id, "destruction queued");
        Ok(())
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending_activation.is_empty() || !self.pending_destruction.is_empty()
    }

    /// Duplicate an entity as a new inactive entity: name, serializable
    /// flag, a clone of every component and, recursively, every child.
    ///
    /// # Errors
    ///
    /// Fails if `id` or one of its descendants is invalid.
    pub fn clone_entity(&mut self, id: EntityId) -> EcsResult<EntityId> {
        let (name, serializable, types, children) = {
            let source = self.entities.entity_with_id(id)?;
            (
                source.name().map(str::to_owned),
                source.is_serializable(),
                source.component_types().to_vec(),
                source.children().to_vec(),
            )
        };
        let clone = self.entities.create()?;
        {
            let record = self.entities.entity_with_id_mut(clone)?;
            record.set_name(name);
            record.set_serializable(serializable);
        }
        for ty in types {
            if let Some(store) = self.stores.get_mut(&ty) {
                store.clone_into(&mut self.entities, id, clone)?;
            }
        }
        for child in children {
            let child_clone = self.clone_entity(child)?;
            self.entities.add_child(clone, child_clone)?;
        }
        trace!(source = %id, clone = %clone, "entity cloned");
        Ok(clone)
    }

    // -- Components --

    /// Attach a component. Creates `T`'s pool on first use.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already has a `T`.
    pub fn add_component<T: Component>(
        &mut self,
        id: EntityId,
        value: T,
    ) -> EcsResult<ComponentId> {
        let (entities, pool) = self.split_mut::<T>()?;
        pool.add(entities, id, value)
    }

    /// Detach and return a component.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or has no `T`.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<T> {
        if self.components::<T>().is_none() {
            self.entities.entity_with_id(id)?;
            return Err(missing::<T>(id));
        }
        let (entities, pool) = self.split_mut::<T>()?;
        pool.remove(entities, id)
    }

    /// Swap a component's value, returning the previous one.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or has no `T`.
    pub fn replace_component<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<T> {
        if self.components::<T>().is_none() {
            self.entities.entity_with_id(id)?;
            return Err(missing::<T>(id));
        }
        let (entities, pool) = self.split_mut::<T>()?;
        pool.replace(entities, id, value)
    }

    /// The entity's `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn component<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        self.components::<T>()
            .ok_or_else(|| missing::<T>(id))?
            .for_entity(id)
    }

    /// The entity's `T`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        if self.components::<T>().is_none() {
            return Err(missing::<T>(id));
        }
        self.components_mut::<T>()?.for_entity_mut(id)
    }

    /// The entity's `T`, or `None`.
    #[must_use]
    pub fn try_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.components::<T>()?.try_for_entity(id)
    }

    /// A copy of the entity's `T`, or `T::default()`.
    #[must_use]
    pub fn component_or_default<T: Component + Default>(&self, id: EntityId) -> T {
        self.components::<T>()
            .map(|pool| pool.component_or_default(id))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.components::<T>().is_some_and(|pool| pool.has(id))
    }

    /// Encode every component of `id` as `(type name, JSON body)`, in attach
    /// order.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or a body fails to serialise.
    pub fn encode_components(
        &self,
        id: EntityId,
    ) -> Result<Vec<(String, serde_json::Value)>, ComponentBodyError> {
        let mut bodies = Vec::new();
        for ty in self.entities.entity_with_id(id)?.component_types() {
            let Some(store) = self.stores.get(ty) else {
                continue;
            };
            if let Some(body) = store.encode(id) {
                bodies.push((store.type_name().to_owned(), body?));
            }
        }
        Ok(bodies)
    }

    /// Decode a JSON body into the pool registered under `type_name` and
    /// attach it to `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`EcsError::UnsupportedComponentType`] if no pool is
    /// registered under that name, or if the body or attach fails.
    pub fn decode_component(
        &mut self,
        id: EntityId,
        type_name: &str,
        body: serde_json::Value,
    ) -> Result<(), ComponentBodyError> {
        let store = self
            .stores
            .get_mut(&ComponentTypeId::from_name(type_name))
            .ok_or_else(|| EcsError::UnsupportedComponentType(type_name.to_owned()))?;
        store.decode_into(&mut self.entities, id, body)
    }

    // -- Hierarchy --

    /// See [`EntityPool::add_child`].
    ///
    /// # Errors
    ///
    /// Fails on invalid entities, an existing parent or a cycle.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        self.entities.add_child(parent, child)
    }

    /// See [`EntityPool::remove_child`].
    ///
    /// # Errors
    ///
    /// Fails on invalid entities or if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        self.entities.remove_child(parent, child)
    }

    // -- Refresh internals --

    pub(crate) fn take_pending(&mut self) -> (Vec<EntityId>, Vec<EntityId>) {
        (
            std::mem::take(&mut self.pending_activation),
            std::mem::take(&mut self.pending_destruction),
        )
    }

    /// Put uncommitted transitions back at the front of the queues, ahead of
    /// anything queued since they were taken.
    pub(crate) fn requeue(&mut self, activations: &[EntityId], destructions: &[EntityId]) {
        self.pending_activation
            .splice(0..0, activations.iter().copied());
        self.pending_destruction
            .splice(0..0, destructions.iter().copied());
    }

    /// Mark a pending entity activated and emit `Add` for every component it
    /// carries.
    pub(crate) fn commit_activation(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.commit_activation(id)?;
        let types = self.entities.entity_with_id(id)?.component_types().to_vec();
        for ty in types {
            if let Some(store) = self.stores.get_mut(&ty) {
                store.notify_activated(id);
            }
        }
        self.active_count += 1;
        Ok(())
    }

    /// Remove every component of `id` (with notifications) and free its
    /// slot. Parent and children links are cut by the entity pool.
    pub(crate) fn release(&mut self, id: EntityId) -> EcsResult<()> {
        let (types, was_active) = {
            let entity = self.entities.entity_with_id(id)?;
            (entity.component_types().to_vec(), entity.is_activated())
        };
        for ty in types {
            if let Some(store) = self.stores.get_mut(&ty) {
                store.remove_from(&mut self.entities, id)?;
            }
        }
        self.entities.destroy(id)?;
        if was_active {
            self.active_count -= 1;
        }
        Ok(())
    }
}

fn missing<T: Component>(entity: EntityId) -> EcsError {
    EcsError::MissingComponent {
        entity,
        type_name: T::type_name().to_owned(),
    }
}
