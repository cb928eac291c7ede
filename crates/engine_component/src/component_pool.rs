//! Per-type component storage with add/remove notifications.
//!
//! A [`ComponentPool<T>`] stores every `T` in a [`SlotPool`], addressed by
//! [`ComponentId`], and keeps an entity-indexed table mapping each owner to
//! its component. Operations that change what an entity carries take the
//! [`EntityPool`] as well, so the entity's type markers stay in sync and
//! listeners are only told about entities that are activated.
//!
//! ## Events
//!
//! Listeners registered with [`ComponentPool::add_listener`] are invoked
//! synchronously:
//!
//! - `Add` after a component is attached to an activated entity, and for every
//!   carried component when an entity's activation is committed;
//! - `Remove` *before* the component is freed, so the listener still sees the
//!   value.
//!
//! Each listener therefore observes exactly one `Add` and at most one
//! `Remove` per activated component lifetime.
//!
//! [`ComponentStore`] is the object-safe view of a pool used by the world to
//! handle every registered type uniformly.

use std::any::Any;

use crate::component::{Component, ComponentId, ComponentTypeId};
use crate::entity::EntityId;
use crate::entity_pool::EntityPool;
use crate::error::{ComponentBodyError, EcsError, EcsResult};
use crate::handle::ComponentHandle;
use crate::iter::{ComponentIter, ComponentIterator};
use crate::slot_pool::{IdMode, PoolToken, SlotPool};

/// What happened to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentEventKind {
    Add,
    Remove,
}

/// A notification delivered to component listeners.
#[derive(Debug)]
pub struct ComponentEvent<'a, T> {
    pub kind: ComponentEventKind,
    pub entity: EntityId,
    pub component_id: ComponentId,
    pub component: &'a T,
}

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&ComponentEvent<'_, T>) + Send>;

#[derive(Debug, Clone)]
pub(crate) struct Stored<T> {
    pub(crate) value: T,
    pub(crate) entity: EntityId,
}

/// Storage for every component of type `T`.
pub struct ComponentPool<T: Component> {
    slots: SlotPool<Stored<T>>,
    by_entity: Vec<Option<ComponentId>>,
    listeners: Vec<(ListenerId, Listener<T>)>,
    next_listener: u64,
}

impl<T: Component> std::fmt::Debug for ComponentPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPool")
            .field("type_name", &T::type_name())
            .field("len", &self.slots.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T: Component> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(IdMode::Reuse)
    }

    #[must_use]
    pub fn with_mode(mode: IdMode) -> Self {
        Self::with_capacity(mode, 0)
    }

    #[must_use]
    pub fn with_capacity(mode: IdMode, capacity: usize) -> Self {
        Self {
            slots: SlotPool::with_capacity(mode, capacity),
            by_entity: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    #[must_use]
    pub fn token(&self) -> PoolToken {
        self.slots.token()
    }

    /// Attach `value` to `entity`.
    ///
    /// Listeners are notified with `Add` only if the entity is activated;
    /// otherwise the notification is deferred to activation commit.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already has a `T`.
    pub fn add(
        &mut self,
        entities: &mut EntityPool,
        entity: EntityId,
        value: T,
    ) -> EcsResult<ComponentId> {
        let record = entities.entity_with_id_mut(entity)?;
        if self.component_id(entity).is_some() {
            return Err(EcsError::DuplicateComponent {
                entity,
                type_name: T::type_name(),
            });
        }
        let id = ComponentId(self.slots.create(Stored { value, entity })?);
        record.attach(T::component_type_id());
        let activated = record.is_activated();

        let index = entity.index();
        if self.by_entity.len() <= index {
            self.by_entity.resize(index + 1, None);
        }
        self.by_entity[index] = Some(id);

        if activated {
            self.dispatch(ComponentEventKind::Add, id);
        }
        Ok(id)
    }

    /// Detach and return `entity`'s `T`.
    ///
    /// Listeners see the `Remove` notification while the value is still
    /// stored.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or has no `T`.
    pub fn remove(&mut self, entities: &mut EntityPool, entity: EntityId) -> EcsResult<T> {
        let activated = entities.entity_with_id(entity)?.is_activated();
        let id = self.component_id(entity).ok_or_else(|| self.missing(entity))?;

        if activated {
            self.dispatch(ComponentEventKind::Remove, id);
        }

        let stored = self.slots.destroy(id.raw())?;
        self.by_entity[entity.index()] = None;
        entities
            .entity_with_id_mut(entity)?
            .detach(T::component_type_id());
        Ok(stored.value)
    }

    /// Swap `entity`'s `T` for `value`, returning the previous value.
    ///
    /// The component keeps its id. Activated entities produce a `Remove` for
    /// the old value followed by an `Add` for the new one.
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or has no `T`.
    pub fn replace(
        &mut self,
        entities: &EntityPool,
        entity: EntityId,
        value: T,
    ) -> EcsResult<T> {
        let activated = entities.entity_with_id(entity)?.is_activated();
        let id = self.component_id(entity).ok_or_else(|| self.missing(entity))?;
        if activated {
            self.dispatch(ComponentEventKind::Remove, id);
        }
        let old = std::mem::replace(&mut self.slots.get_mut(id.raw())?.value, value);
        if activated {
            self.dispatch(ComponentEventKind::Add, id);
        }
        Ok(old)
    }

    /// Look up a component by id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] if `id` is not live.
    pub fn with_id(&self, id: ComponentId) -> EcsResult<&T> {
        self.slots
            .get(id.raw())
            .map(|stored| &stored.value)
            .map_err(|_| EcsError::InvalidComponent(id))
    }

    /// Look up a component by id, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] if `id` is not live.
    pub fn with_id_mut(&mut self, id: ComponentId) -> EcsResult<&mut T> {
        self.slots
            .get_mut(id.raw())
            .map(|stored| &mut stored.value)
            .map_err(|_| EcsError::InvalidComponent(id))
    }

    /// The component owned by `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn for_entity(&self, entity: EntityId) -> EcsResult<&T> {
        let id = self.component_id(entity).ok_or_else(|| self.missing(entity))?;
        self.with_id(id)
    }

    /// The component owned by `entity`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn for_entity_mut(&mut self, entity: EntityId) -> EcsResult<&mut T> {
        let id = self.component_id(entity).ok_or_else(|| self.missing(entity))?;
        self.with_id_mut(id)
    }

    /// The component owned by `entity`, or `None`.
    #[must_use]
    pub fn try_for_entity(&self, entity: EntityId) -> Option<&T> {
        self.component_id(entity)
            .and_then(|id| self.with_id(id).ok())
    }

    /// A copy of `entity`'s component, or `T::default()` if it has none.
    ///
    /// Unlike the structural operations this read never fails.
    #[must_use]
    pub fn component_or_default(&self, entity: EntityId) -> T
    where
        T: Default,
    {
        self.try_for_entity(entity).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn has(&self, entity: EntityId) -> bool {
        self.component_id(entity).is_some()
    }

    /// The id of `entity`'s component, if it has one.
    #[must_use]
    pub fn component_id(&self, entity: EntityId) -> Option<ComponentId> {
        self.by_entity.get(entity.index()).copied().flatten()
    }

    /// The entity owning component `id`.
    #[must_use]
    pub fn entity_of(&self, id: ComponentId) -> Option<EntityId> {
        self.slots.get(id.raw()).ok().map(|stored| stored.entity)
    }

    #[must_use]
    pub fn is_valid(&self, id: ComponentId) -> bool {
        self.slots.is_valid(id.raw())
    }

    /// Exclusive upper bound of every component id issued so far.
    #[must_use]
    pub fn max_id(&self) -> ComponentId {
        ComponentId(self.slots.max_id())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Create a copyable handle to a live component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidComponent`] if `id` is not live.
    pub fn handle(&self, id: ComponentId) -> EcsResult<ComponentHandle<T>> {
        if !self.is_valid(id) {
            return Err(EcsError::InvalidComponent(id));
        }
        let generation = self.slots.generation(id.raw()).unwrap_or_default();
        Ok(ComponentHandle::new(self.token(), id, generation))
    }

    pub(crate) fn validate_handle(&self, handle: &ComponentHandle<T>) -> EcsResult<()> {
        self.slots
            .validate(handle.token(), handle.id().raw(), handle.generation())
    }

    /// Register a listener for add/remove notifications.
    pub fn add_listener(
        &mut self,
        listener: impl FnMut(&ComponentEvent<'_, T>) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Emit `Add` for `entity`'s component, if it has one.
    ///
    /// Called when the entity's activation is committed.
    pub fn notify_activated(&mut self, entity: EntityId) {
        if let Some(id) = self.component_id(entity) {
            self.dispatch(ComponentEventKind::Add, id);
        }
    }

    /// A cursor on the first component whose owner is activated.
    #[must_use]
    pub fn begin(&self, entities: &EntityPool) -> ComponentIterator<T> {
        ComponentIterator::begin(self, entities)
    }

    /// Iterate components of activated entities in ascending id order.
    #[must_use]
    pub fn iter<'a>(&'a self, entities: &'a EntityPool) -> ComponentIter<'a, T> {
        ComponentIter::new(self, entities)
    }

    pub(crate) fn stored(&self, id: ComponentId) -> Option<&Stored<T>> {
        self.slots.get(id.raw()).ok()
    }

    fn dispatch(&mut self, kind: ComponentEventKind, id: ComponentId) {
        let Ok(stored) = self.slots.get(id.raw()) else {
            return;
        };
        let event = ComponentEvent {
            kind,
            entity: stored.entity,
            component_id: id,
            component: &stored.value,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    fn missing(&self, entity: EntityId) -> EcsError {
        EcsError::MissingComponent {
            entity,
            type_name: T::type_name().to_owned(),
        }
    }
}

/// Object-safe view of a [`ComponentPool`], used where the component type is
/// only known at runtime.
pub trait ComponentStore: Send {
    fn component_type_id(&self) -> ComponentTypeId;

    fn type_name(&self) -> &'static str;

    fn has(&self, entity: EntityId) -> bool;

    /// Remove `entity`'s component, with notification.
    ///
    /// # Errors
    ///
    /// See [`ComponentPool::remove`].
    fn remove_from(&mut self, entities: &mut EntityPool, entity: EntityId) -> EcsResult<()>;

    /// See [`ComponentPool::notify_activated`].
    fn notify_activated(&mut self, entity: EntityId);

    /// Attach a clone of `source`'s component to `target`. Does nothing if
    /// `source` has none.
    ///
    /// # Errors
    ///
    /// See [`ComponentPool::add`].
    fn clone_into(
        &mut self,
        entities: &mut EntityPool,
        source: EntityId,
        target: EntityId,
    ) -> EcsResult<()>;

    /// Encode `entity`'s component as a JSON body, or `None` if it has none.
    fn encode(&self, entity: EntityId) -> Option<Result<serde_json::Value, serde_json::Error>>;

    /// Decode a JSON body and attach it to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if the body does not deserialise or the attach fails.
    fn decode_into(
        &mut self,
        entities: &mut EntityPool,
        entity: EntityId,
        body: serde_json::Value,
    ) -> Result<(), ComponentBodyError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentStore for ComponentPool<T> {
    fn component_type_id(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn has(&self, entity: EntityId) -> bool {
        ComponentPool::has(self, entity)
    }

    fn remove_from(&mut self, entities: &mut EntityPool, entity: EntityId) -> EcsResult<()> {
        self.remove(entities, entity).map(drop)
    }

    fn notify_activated(&mut self, entity: EntityId) {
        ComponentPool::notify_activated(self, entity);
    }

    fn clone_into(
        &mut self,
        entities: &mut EntityPool,
        source: EntityId,
        target: EntityId,
    ) -> EcsResult<()> {
        match self.try_for_entity(source).cloned() {
            Some(value) => self.add(entities, target, value).map(drop),
            None => Ok(()),
        }
    }

    fn encode(&self, entity: EntityId) -> Option<Result<serde_json::Value, serde_json::Error>> {
        self.try_for_entity(entity).map(serde_json::to_value)
    }

    fn decode_into(
        &mut self,
        entities: &mut EntityPool,
        entity: EntityId,
        body: serde_json::Value,
    ) -> Result<(), ComponentBodyError> {
        let value: T = serde_json::from_value(body)?;
        self.add(entities, entity, value)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    type Log = Arc<Mutex<Vec<(ComponentEventKind, EntityId, f32)>>>;

    fn recorder(pool: &mut ComponentPool<Health>) -> Log {
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        pool.add_listener(move |event| {
            sink.lock()
                .unwrap()
                .push((event.kind, event.entity, event.component.current));
        });
        log
    }

    fn activated(entities: &mut EntityPool) -> EntityId {
        let id = entities.create().unwrap();
        entities.request_activation(id).unwrap();
        entities.commit_activation(id).unwrap();
        id
    }

    #[test]
    fn test_add_remove_add_succeeds() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let e = entities.create().unwrap();

        pool.add(&mut entities, e, Health { current: 1.0 }).unwrap();
        assert!(pool.has(e));
        assert!(entities
            .entity_with_id(e)
            .unwrap()
            .has_component_type(Health::component_type_id()));
        assert_eq!(pool.remove(&mut entities, e).unwrap().current, 1.0);
        assert!(!pool.has(e));
        assert!(entities
            .entity_with_id(e)
            .unwrap()
            .component_types()
            .is_empty());
        pool.add(&mut entities, e, Health { current: 2.0 }).unwrap();
        assert_eq!(pool.for_entity(e).unwrap().current, 2.0);
    }

    #[test]
    fn test_double_add_fails_every_time() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let e = entities.create().unwrap();
        pool.add(&mut entities, e, Health::default()).unwrap();
        for _ in 0..2 {
            assert_eq!(
                pool.add(&mut entities, e, Health::default()),
                Err(EcsError::DuplicateComponent {
                    entity: e,
                    type_name: "Health",
                })
            );
        }
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_missing_fails() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let e = entities.create().unwrap();
        assert!(matches!(
            pool.remove(&mut entities, e),
            Err(EcsError::MissingComponent { .. })
        ));
        assert!(matches!(
            pool.add(&mut entities, EntityId(42), Health::default()),
            Err(EcsError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_inactive_entities_do_not_notify() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let log = recorder(&mut pool);
        let e = entities.create().unwrap();
        pool.add(&mut entities, e, Health { current: 3.0 }).unwrap();
        assert!(log.lock().unwrap().is_empty());

        entities.request_activation(e).unwrap();
        entities.commit_activation(e).unwrap();
        pool.notify_activated(e);
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[(ComponentEventKind::Add, e, 3.0)]
        );
    }

    #[test]
    fn test_remove_notifies_before_free() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let log = recorder(&mut pool);
        let e = activated(&mut entities);
        pool.add(&mut entities, e, Health { current: 5.0 }).unwrap();
        pool.remove(&mut entities, e).unwrap();
        // The Remove event carried the value that was about to be freed.
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[
                (ComponentEventKind::Add, e, 5.0),
                (ComponentEventKind::Remove, e, 5.0),
            ]
        );
    }

    #[test]
    fn test_replace_keeps_id_and_notifies() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let e = activated(&mut entities);
        let id = pool.add(&mut entities, e, Health { current: 1.0 }).unwrap();
        let log = recorder(&mut pool);
        let old = pool.replace(&entities, e, Health { current: 2.0 }).unwrap();
        assert_eq!(old.current, 1.0);
        assert_eq!(pool.component_id(e), Some(id));
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[
                (ComponentEventKind::Remove, e, 1.0),
                (ComponentEventKind::Add, e, 2.0),
            ]
        );
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let listener = pool.add_listener(move |_| *sink.lock().unwrap() += 1);
        let e = activated(&mut entities);
        pool.add(&mut entities, e, Health::default()).unwrap();
        assert!(pool.remove_listener(listener));
        assert!(!pool.remove_listener(listener));
        pool.remove(&mut entities, e).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_lookup_policies() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let with = entities.create().unwrap();
        let without = entities.create().unwrap();
        let id = pool
            .add(&mut entities, with, Health { current: 4.0 })
            .unwrap();

        assert_eq!(pool.entity_of(id), Some(with));
        assert_eq!(pool.with_id(id).unwrap().current, 4.0);
        assert!(pool.for_entity(without).is_err());
        assert!(pool.try_for_entity(without).is_none());
        assert_eq!(pool.component_or_default(without), Health::default());
        assert_eq!(pool.component_or_default(with).current, 4.0);
        assert_eq!(
            pool.with_id(ComponentId(9)),
            Err(EcsError::InvalidComponent(ComponentId(9)))
        );
    }

    #[test]
    fn test_store_encode_decode_and_clone() {
        let mut entities = EntityPool::new();
        let mut pool = ComponentPool::<Health>::new();
        let a = entities.create().unwrap();
        let b = entities.create().unwrap();
        let c = entities.create().unwrap();
        pool.add(&mut entities, a, Health { current: 7.5 }).unwrap();

        let store: &mut dyn ComponentStore = &mut pool;
        let body = store.encode(a).unwrap().unwrap();
        assert_eq!(body, serde_json::json!({ "current": 7.5 }));
        assert!(store.encode(b).is_none());

        store.decode_into(&mut entities, b, body).unwrap();
        store.clone_into(&mut entities, a, c).unwrap();
        assert!(matches!(
            store.decode_into(&mut entities, c, serde_json::json!({ "current": 1.0 })),
            Err(ComponentBodyError::Ecs(EcsError::DuplicateComponent { .. }))
        ));
        assert!(matches!(
            store.decode_into(&mut entities, a, serde_json::json!("nope")),
            Err(ComponentBodyError::Json(_))
        ));

        let pool = store
            .as_any()
            .downcast_ref::<ComponentPool<Health>>()
            .unwrap();
        assert_eq!(pool.for_entity(b).unwrap().current, 7.5);
        assert_eq!(pool.for_entity(c).unwrap().current, 7.5);
    }
}
