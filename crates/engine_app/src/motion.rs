//! Velocity integration off the scene thread.
//!
//! The scene is only ever mutated on the tick thread. Motion is computed
//! elsewhere from a copy: [`MotionStep::capture`] samples every activated
//! entity that has both a [`Velocity`] and a [`Transform`], the samples are
//! integrated on a blocking task, and the resulting [`MotionUpdate`]s are
//! applied back with [`MotionStep::apply`] on the next tick. Each update
//! carries an [`EntityHandle`], so writes to entities destroyed in the
//! meantime are dropped. A slot reused before the update lands is only
//! detected under [`IdMode::Generational`](engine_component::IdMode); in
//! `Reuse` mode the new occupant receives the stale pose.

use engine_component::{Component, EcsResult, EntityHandle};
use engine_math::{Quat, Transform, Vec3};
use engine_system::{Scene, TransformSystem};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Linear and angular velocity, in units and radians per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Velocity {
    pub linear: Vec3,
    /// Rotation axis scaled by angular speed.
    pub angular: Vec3,
}

impl Velocity {
    #[must_use]
    pub fn from_linear(linear: Vec3) -> Self {
        Self {
            linear,
            angular: Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn with_angular(mut self, angular: Vec3) -> Self {
        self.angular = angular;
        self
    }
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// One entity's motion state as seen when the step was captured.
#[derive(Debug, Clone, Copy)]
pub struct MotionSample {
    pub handle: EntityHandle,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Velocity,
}

/// Integrated local pose for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionUpdate {
    pub handle: EntityHandle,
    pub position: Vec3,
    pub rotation: Quat,
}

/// A detached batch of motion samples and the step length to integrate.
#[derive(Debug, Clone, Default)]
pub struct MotionStep {
    pub dt: f32,
    pub samples: Vec<MotionSample>,
}

impl MotionStep {
    /// Sample every activated entity with a velocity and a transform.
    ///
    /// # Errors
    ///
    /// Propagates lookup errors from the world.
    pub fn capture(scene: &Scene, dt: f32) -> EcsResult<Self> {
        let world = scene.world();
        let Some(velocities) = world.components::<Velocity>() else {
            return Ok(Self {
                dt,
                samples: Vec::new(),
            });
        };
        let mut samples = Vec::with_capacity(velocities.len());
        for (_, entity, velocity) in velocities.iter(world.entities()) {
            let Some(transform) = world.try_component::<Transform>(entity) else {
                continue;
            };
            samples.push(MotionSample {
                handle: world.handle(entity)?,
                position: transform.local_position,
                rotation: transform.local_rotation,
                velocity: *velocity,
            });
        }
        Ok(Self { dt, samples })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Integrate every sample over `dt` (explicit Euler).
    #[must_use]
    pub fn integrate(&self) -> Vec<MotionUpdate> {
        self.samples
            .iter()
            .map(|sample| {
                let spin = Quat::from_scaled_axis(sample.velocity.angular * self.dt);
                MotionUpdate {
                    handle: sample.handle,
                    position: sample.position + sample.velocity.linear * self.dt,
                    rotation: (spin * sample.rotation).normalize(),
                }
            })
            .collect()
    }

    /// Write `updates` into the scene and queue the moved transforms for
    /// propagation. Updates for entities that are no longer valid, no longer
    /// activated, or have lost their transform are skipped.
    ///
    /// Returns the number of updates applied.
    ///
    /// # Errors
    ///
    /// Propagates errors from marking transforms dirty.
    pub fn apply(scene: &mut Scene, updates: &[MotionUpdate]) -> EcsResult<usize> {
        let mut applied = Vec::with_capacity(updates.len());
        {
            let world = scene.world_mut();
            for update in updates {
                let id = update.handle.id();
                if !update.handle.is_valid(world.entities()) || !world.entities().is_activated(id) {
                    trace!(entity = %id, "motion update dropped for stale entity");
                    continue;
                }
                let Ok(transform) = world.component_mut::<Transform>(id) else {
                    continue;
                };
                transform.local_position = update.position;
                transform.local_rotation = update.rotation;
                applied.push(id);
            }
        }

        scene
            .with_system::<TransformSystem, _>(|system, world| {
                applied
                    .iter()
                    .try_for_each(|&id| system.mark_dirty(world, id))
            })
            .transpose()?;
        Ok(applied.len())
    }
}
