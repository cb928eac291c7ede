//! The scene: a [`World`] plus an ordered list of [`System`]s.
//!
//! Entity state changes are requested on the world and committed in one
//! batch by [`Scene::refresh`]:
//!
//! ```text
//! Inactive --activate--> PendingActivation --refresh--> Activated
//! Activated --destroy--> PendingDestruction --refresh--> freed (id reusable)
//! ```
//!
//! Refresh first initializes systems added since the previous refresh, then
//! commits every queued activation followed by every queued destruction, in
//! enqueue order. Systems may queue further transitions from their
//! callbacks; refresh repeats until both queues stay empty.
//!
//! Committing a destruction tells every system holding the entity to drop
//! it, destroys its children depth first, removes its components and only
//! then frees the slot. A failing transition aborts the rest of the refresh;
//! transitions already committed stay committed and the rest go back on the
//! queues.

use std::collections::BTreeSet;

use engine_component::{EcsResult, EntityId};
use tracing::{debug, info, trace};

use crate::config::WorldConfig;
use crate::context::TickContext;
use crate::system::{AsAny, System};
use crate::world::World;

struct SystemEntry {
    system: Box<dyn System>,
    members: BTreeSet<EntityId>,
    initialized: bool,
}

/// A world together with the systems that run over it.
pub struct Scene {
    world: World,
    systems: Vec<SystemEntry>,
    tick_id: u64,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let systems: Vec<&str> = self
            .systems
            .iter()
            .map(|entry| entry.system.config().name.as_str())
            .collect();
        f.debug_struct("Scene")
            .field("world", &self.world)
            .field("systems", &systems)
            .field("tick_id", &self.tick_id)
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            world: World::with_config(config),
            systems: Vec::new(),
            tick_id: 0,
        }
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Create an inactive entity.
    ///
    /// # Errors
    ///
    /// See [`World::create_entity`].
    pub fn create_entity(&mut self) -> EcsResult<EntityId> {
        self.world.create_entity()
    }

    /// Queue an entity for activation. See [`World::activate`].
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid, activated or already pending.
    pub fn activate(&mut self, id: EntityId) -> EcsResult<()> {
        self.world.activate(id)
    }

    /// Queue an entity for destruction. See [`World::destroy`].
    ///
    /// # Errors
    ///
    /// Fails if the entity is invalid or already pending destruction.
    pub fn destroy(&mut self, id: EntityId) -> EcsResult<()> {
        self.world.destroy(id)
    }

    // -- Systems --

    /// Register a system after the existing ones.
    ///
    /// Every activated entity matching the system's query becomes a member
    /// immediately; no refresh is needed. `initialize` runs at the next
    /// refresh.
    pub fn add_system<S: System>(&mut self, system: S) {
        let mut entry = SystemEntry {
            system: Box::new(system),
            members: BTreeSet::new(),
            initialized: false,
        };
        let matching: Vec<EntityId> = self
            .world
            .entities()
            .iter()
            .filter(|(_, entity)| entry.system.config().query.matches(entity))
            .map(|(id, _)| id)
            .collect();
        for id in matching {
            entry.members.insert(id);
            entry.system.on_entity_added(&mut self.world, id);
        }
        info!(
            system = entry.system.config().name,
            members = entry.members.len(),
            "system added"
        );
        self.systems.push(entry);
    }

    /// Unregister the first system named `name`, evicting all its members.
    pub fn remove_system(&mut self, name: &str) -> Option<Box<dyn System>> {
        let index = self
            .systems
            .iter()
            .position(|entry| entry.system.config().name == name)?;
        let mut entry = self.systems.remove(index);
        let members = std::mem::take(&mut entry.members);
        for &id in &members {
            entry.system.on_entity_removed(&mut self.world, id);
        }
        info!(system = name, evicted = members.len(), "system removed");
        Some(entry.system)
    }

    /// The first registered system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|entry| (*entry.system).as_any().downcast_ref())
    }

    /// The first registered system of type `S`, mutably.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|entry| (*entry.system).as_any_mut().downcast_mut())
    }

    /// Run `f` with the first system of type `S` and the world.
    pub fn with_system<S: System, R>(
        &mut self,
        f: impl FnOnce(&mut S, &mut World) -> R,
    ) -> Option<R> {
        let system = self
            .systems
            .iter_mut()
            .find_map(|entry| (*entry.system).as_any_mut().downcast_mut::<S>())?;
        Some(f(system, &mut self.world))
    }

    /// Entities currently held by the system named `name`.
    #[must_use]
    pub fn members(&self, name: &str) -> Option<&BTreeSet<EntityId>> {
        self.systems
            .iter()
            .find(|entry| entry.system.config().name == name)
            .map(|entry| &entry.members)
    }

    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // -- Transaction --

    /// Commit every queued activation and destruction.
    ///
    /// # Errors
    ///
    /// The first failing system initialization or transition aborts the
    /// refresh and is returned. Earlier commits are kept; the failing
    /// transition and those after it stay queued for the next refresh.
    pub fn refresh(&mut self) -> EcsResult<()> {
        for entry in &mut self.systems {
            if !entry.initialized {
                entry.system.initialize(&mut self.world)?;
                entry.initialized = true;
                debug!(system = entry.system.config().name, "system initialized");
            }
        }

        while self.world.has_pending() {
            let (activations, destructions) = self.world.take_pending();
            debug!(
                activations = activations.len(),
                destructions = destructions.len(),
                "committing entity transitions"
            );
            for (index, &id) in activations.iter().enumerate() {
                if let Err(err) = self.commit_activation(id) {
                    self.world.requeue(&activations[index..], &destructions);
                    return Err(err);
                }
            }
            for (index, &id) in destructions.iter().enumerate() {
                if let Err(err) = self.commit_destruction(id) {
                    self.world.requeue(&[], &destructions[index..]);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn commit_activation(&mut self, id: EntityId) -> EcsResult<()> {
        // Destroyed and possibly recycled since it was queued.
        if !self
            .world
            .entities()
            .entity_with_id(id)
            .is_ok_and(|entity| entity.is_pending_activation())
        {
            trace!(entity = %id, "skipping stale activation");
            return Ok(());
        }

        self.world.commit_activation(id)?;
        for entry in &mut self.systems {
            if entry.system.config().query.matches(self.world.entity(id)?) {
                entry.members.insert(id);
                entry.system.on_entity_added(&mut self.world, id);
            }
        }
        trace!(entity = %id, "entity activated");
        Ok(())
    }

    fn commit_destruction(&mut self, id: EntityId) -> EcsResult<()> {
        // Already freed by a cascade from its parent.
        if !self
            .world
            .entities()
            .entity_with_id(id)
            .is_ok_and(|entity| entity.is_pending_destruction())
        {
            trace!(entity = %id, "skipping stale destruction");
            return Ok(());
        }
        self.destroy_now(id)
    }

    /// Tear down `id` and its subtree immediately.
    fn destroy_now(&mut self, id: EntityId) -> EcsResult<()> {
        for entry in &mut self.systems {
            if entry.members.remove(&id) {
                entry.system.on_entity_removed(&mut self.world, id);
            }
        }

        let children = self.world.entity(id)?.children().to_vec();
        for child in children {
            self.destroy_now(child)?;
        }

        self.world.release(id)?;
        trace!(entity = %id, "entity destroyed");
        Ok(())
    }

    // -- Ticking --

    /// Refresh, then tick every system in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first refresh or system error; later systems do not run.
    pub fn tick(&mut self, dt: f64) -> EcsResult<()> {
        self.refresh()?;
        self.tick_id += 1;
        for entry in &mut self.systems {
            let ctx = TickContext::new(self.tick_id, dt, &entry.members);
            entry.system.tick(&mut self.world, &ctx)?;
        }
        Ok(())
    }
}
