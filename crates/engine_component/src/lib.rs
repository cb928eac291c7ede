//! # engine_component
//!
//! Pooled ECS storage: what an entity is, how components are stored, and
//! how both are referenced and iterated.
//!
//! This crate provides:
//!
//! - [`SlotPool`]: dense slot storage with LIFO id reuse and optional
//!   generation checks ([`IdMode`]).
//! - [`EntityPool`] / [`Entity`]: entity records, transaction flags and the
//!   parent/child tree.
//! - [`Component`] trait and [`ComponentPool`]: per-type storage with
//!   add/remove listeners; [`ComponentStore`] is its type-erased view.
//! - [`EntityHandle`] / [`ComponentHandle`]: copyable references resolved at
//!   use time.
//! - [`EntityIterator`] / [`ComponentIterator`]: id cursors that survive
//!   pool mutation.
//! - [`QueryDescriptor`]: declarative membership requirements for systems.

pub mod component;
pub mod component_pool;
pub mod entity;
pub mod entity_pool;
pub mod error;
pub mod handle;
pub mod iter;
pub mod query;
pub mod slot_pool;

pub use component::{Component, ComponentId, ComponentTypeId};
pub use component_pool::{
    ComponentEvent, ComponentEventKind, ComponentPool, ComponentStore, ListenerId,
};
pub use entity::{Entity, EntityId, EntityState};
pub use entity_pool::EntityPool;
pub use error::{ComponentBodyError, EcsError, EcsResult};
pub use handle::{ComponentHandle, EntityHandle};
pub use iter::{ComponentIter, ComponentIterator, EntityIter, EntityIterator};
pub use query::{QueryDescriptor, QueryFilter};
pub use slot_pool::{IdMode, PoolToken, SlotPool};
