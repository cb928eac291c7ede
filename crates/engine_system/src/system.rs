//! The [`System`] trait.
//!
//! A system owns no entities. The scene decides membership from the system's
//! [`SystemConfig::query`] when an entity's activation is committed (or when
//! the system is added), and tells the system through
//! [`on_entity_added`](System::on_entity_added) and
//! [`on_entity_removed`](System::on_entity_removed). Removal always happens
//! before any of the entity's components are detached.

use std::any::Any;

use engine_component::{EcsResult, EntityId};

use crate::config::SystemConfig;
use crate::context::TickContext;
use crate::world::World;

/// Upcast to [`Any`] so registered systems can be looked up by type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of per-tick behaviour registered with a [`Scene`](crate::Scene).
pub trait System: AsAny + Send {
    /// Name and membership query.
    fn config(&self) -> &SystemConfig;

    /// Called once, at the first refresh after the system was added.
    ///
    /// # Errors
    ///
    /// An error aborts that refresh.
    fn initialize(&mut self, _world: &mut World) -> EcsResult<()> {
        Ok(())
    }

    /// The entity became a member. Its components are attached and it is
    /// activated.
    fn on_entity_added(&mut self, _world: &mut World, _entity: EntityId) {}

    /// The entity stopped being a member. Its components are still attached.
    fn on_entity_removed(&mut self, _world: &mut World, _entity: EntityId) {}

    /// Advance the system by one tick.
    ///
    /// # Errors
    ///
    /// An error aborts the remaining systems for this tick.
    fn tick(&mut self, world: &mut World, ctx: &TickContext<'_>) -> EcsResult<()>;
}
