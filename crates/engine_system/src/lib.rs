//! # engine_system
//!
//! Scene runtime for the ECS engine.
//!
//! A [`Scene`] owns a [`World`] (entity pool, component pools, pending
//! transitions) and an ordered list of [`System`]s. Client code creates
//! entities, attaches components and queues activation or destruction; one
//! [`Scene::refresh`] per step commits the queued transitions and keeps system
//! membership in sync. [`TransformSystem`] propagates parent transforms to
//! children, and [`SceneSnapshot`] saves and loads scenes.
//!
//! ## Usage
//!
//! ```rust
//! use engine_math::{Transform, Vec3};
//! use engine_system::{Scene, TransformSystem};
//!
//! let mut scene = Scene::new();
//! scene.add_system(TransformSystem::new());
//!
//! let parent = scene.create_entity().unwrap();
//! let child = scene.create_entity().unwrap();
//! let world = scene.world_mut();
//! world.add_component(parent, Transform::from_position(Vec3::X)).unwrap();
//! world.add_component(child, Transform::from_position(Vec3::Y)).unwrap();
//! world.add_child(parent, child).unwrap();
//! // Activating the parent also activates the child.
//! scene.activate(parent).unwrap();
//!
//! scene.tick(1.0 / 60.0).unwrap();
//! let global = scene.world().component::<Transform>(child).unwrap().global_position;
//! assert_eq!(global, Vec3::new(1.0, 1.0, 0.0));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod scene;
pub mod snapshot;
pub mod system;
pub mod transform;
pub mod world;

pub use config::{SystemConfig, WorldConfig};
pub use context::TickContext;
pub use error::SnapshotError;
pub use scene::Scene;
pub use snapshot::{ComponentSnapshot, EntitySnapshot, SceneSnapshot, SnapshotFormat};
pub use system::{AsAny, System};
pub use transform::{TRANSFORM_SYSTEM, TransformSystem};
pub use world::World;
