//! Hierarchical transform propagation.
//!
//! [`TransformSystem`] keeps a queue of dirty [`Transform`] component ids.
//! Newly activated transforms are queued automatically; after editing a
//! local transform, call [`TransformSystem::mark_dirty`].
//!
//! Each tick drains the queue as it stood when the tick began. For every
//! dirty transform the system walks up to the topmost ancestor that is
//! activated and carries a transform, then recomputes globals top-down from
//! there, depth first, so a child is always composed with its parent's
//! finished global transform. Every root is recomputed at most once per
//! tick. An inactive parent, or one without a transform, ends the walk: the
//! child is treated as a root.

use std::collections::{HashSet, VecDeque};

use engine_component::{
    Component, ComponentId, ComponentPool, EcsError, EcsResult, EntityId, EntityPool,
    QueryDescriptor,
};
use engine_math::Transform;
use tracing::trace;

use crate::config::SystemConfig;
use crate::context::TickContext;
use crate::system::System;
use crate::world::World;

/// Name the transform system registers under.
pub const TRANSFORM_SYSTEM: &str = "transform";

/// Propagates local transforms down the entity hierarchy.
#[derive(Debug)]
pub struct TransformSystem {
    config: SystemConfig,
    dirty: VecDeque<ComponentId>,
}

impl Default for TransformSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SystemConfig::new(
                TRANSFORM_SYSTEM,
                QueryDescriptor::new().write(Transform::component_type_id()),
            ),
            dirty: VecDeque::new(),
        }
    }

    /// Queue `entity`'s transform for recomputation on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no transform.
    pub fn mark_dirty(&mut self, world: &World, entity: EntityId) -> EcsResult<()> {
        let id = world
            .components::<Transform>()
            .and_then(|pool| pool.component_id(entity))
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                type_name: Transform::type_name().to_owned(),
            })?;
        self.mark_component_dirty(id);
        Ok(())
    }

    /// Queue a transform by component id.
    pub fn mark_component_dirty(&mut self, id: ComponentId) {
        self.dirty.push_back(id);
    }

    /// Number of queued transforms.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.dirty.len()
    }
}

impl System for TransformSystem {
    fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn on_entity_added(&mut self, world: &mut World, entity: EntityId) {
        if let Some(id) = world
            .components::<Transform>()
            .and_then(|pool| pool.component_id(entity))
        {
            self.dirty.push_back(id);
        }
    }

    fn tick(&mut self, world: &mut World, ctx: &TickContext<'_>) -> EcsResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let batch: Vec<ComponentId> = self.dirty.drain(..).collect();
        let (entities, transforms) = world.split_mut::<Transform>()?;

        let mut updated: HashSet<EntityId> = HashSet::new();
        for id in batch {
            // Removed since it was queued.
            let Some(entity) = transforms.entity_of(id) else {
                continue;
            };
            if !entities.is_activated(entity) {
                continue;
            }
            let root = propagation_root(entities, transforms, entity)?;
            if updated.insert(root) {
                propagate_from(entities, transforms, root)?;
            }
        }
        trace!(tick_id = ctx.tick_id, roots = updated.len(), "transforms propagated");
        Ok(())
    }
}

/// Whether `id` takes part in propagation as a parent.
fn is_transform_parent(
    entities: &EntityPool,
    transforms: &ComponentPool<Transform>,
    id: EntityId,
) -> bool {
    entities.is_activated(id) && transforms.has(id)
}

fn propagation_root(
    entities: &EntityPool,
    transforms: &ComponentPool<Transform>,
    entity: EntityId,
) -> EcsResult<EntityId> {
    let mut current = entity;
    while let Some(parent) = entities.parent(current)? {
        if !is_transform_parent(entities, transforms, parent) {
            break;
        }
        current = parent;
    }
    Ok(current)
}

fn propagate_from(
    entities: &EntityPool,
    transforms: &mut ComponentPool<Transform>,
    root: EntityId,
) -> EcsResult<()> {
    let root_transform = {
        let transform = transforms.for_entity_mut(root)?;
        transform.propagate(None);
        *transform
    };

    let mut stack: Vec<(EntityId, Transform)> = entities
        .children(root)?
        .iter()
        .rev()
        .map(|&child| (child, root_transform))
        .collect();

    while let Some((id, parent)) = stack.pop() {
        if !entities.is_activated(id) {
            continue;
        }
        let Ok(transform) = transforms.for_entity_mut(id) else {
            // Transform-less entities break the chain; their subtree
            // propagates from its own roots.
            continue;
        };
        transform.propagate(Some(&parent));
        let finished = *transform;
        stack.extend(
            entities
                .children(id)?
                .iter()
                .rev()
                .map(|&child| (child, finished)),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine_math::{Quat, Vec3};

    use super::*;
    use crate::scene::Scene;

    fn spawn(scene: &mut Scene, position: Vec3) -> EntityId {
        let id = scene.create_entity().unwrap();
        scene
            .world_mut()
            .add_component(id, Transform::from_position(position))
            .unwrap();
        scene.activate(id).unwrap();
        id
    }

    fn global_position(scene: &Scene, id: EntityId) -> Vec3 {
        scene
            .world()
            .component::<Transform>(id)
            .unwrap()
            .global_position
    }

    fn mark_dirty(scene: &mut Scene, id: EntityId) {
        scene
            .with_system::<TransformSystem, _>(|system, world| system.mark_dirty(world, id))
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_three_level_chain_then_reparent() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let grandparent = spawn(&mut scene, Vec3::new(1.0, 0.0, 0.0));
        let parent = spawn(&mut scene, Vec3::new(0.0, 1.0, 0.0));
        let child = spawn(&mut scene, Vec3::new(0.0, 0.0, 1.0));
        scene.world_mut().add_child(grandparent, parent).unwrap();
        scene.world_mut().add_child(parent, child).unwrap();

        scene.tick(1.0 / 60.0).unwrap();
        assert!(global_position(&scene, child).abs_diff_eq(Vec3::new(1.0, 1.0, 1.0), 1e-6));
        assert!(global_position(&scene, parent).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));

        scene.world_mut().remove_child(parent, child).unwrap();
        scene.world_mut().add_child(grandparent, child).unwrap();
        mark_dirty(&mut scene, child);
        scene.tick(1.0 / 60.0).unwrap();
        assert!(global_position(&scene, child).abs_diff_eq(Vec3::new(1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_rotation_and_scale_compose() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let parent = scene.create_entity().unwrap();
        scene
            .world_mut()
            .add_component(
                parent,
                Transform::from_position_rotation(
                    Vec3::new(5.0, 0.0, 0.0),
                    Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                )
                .scaled(2.0),
            )
            .unwrap();
        scene.activate(parent).unwrap();
        let child = spawn(&mut scene, Vec3::X);
        scene.world_mut().add_child(parent, child).unwrap();
        scene.tick(0.0).unwrap();

        let transform = scene.world().component::<Transform>(child).unwrap();
        assert!(transform.global_position.abs_diff_eq(Vec3::new(5.0, 1.0, 0.0), 1e-5));
        assert!(transform.global_scale.abs_diff_eq(Vec3::splat(2.0), 1e-6));
        assert!(transform
            .global_rotation
            .abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), 1e-5));
    }

    #[test]
    fn test_inactive_parent_is_treated_as_absent() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let parent = scene.create_entity().unwrap();
        scene
            .world_mut()
            .add_component(parent, Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        let child = spawn(&mut scene, Vec3::Y);
        scene.world_mut().add_child(parent, child).unwrap();
        scene.tick(0.0).unwrap();
        assert!(global_position(&scene, child).abs_diff_eq(Vec3::Y, 1e-6));

        // Activating the parent queues it, which recomputes its subtree.
        scene.activate(parent).unwrap();
        scene.tick(0.0).unwrap();
        assert!(global_position(&scene, child).abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_marks_during_tick_wait_for_next_tick() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let e = spawn(&mut scene, Vec3::ZERO);
        scene.tick(0.0).unwrap();
        assert_eq!(scene.system::<TransformSystem>().unwrap().pending(), 0);

        scene
            .world_mut()
            .component_mut::<Transform>(e)
            .unwrap()
            .local_position = Vec3::Z;
        // Not marked: the global part is left alone.
        scene.tick(0.0).unwrap();
        assert!(global_position(&scene, e).abs_diff_eq(Vec3::ZERO, 1e-6));

        mark_dirty(&mut scene, e);
        mark_dirty(&mut scene, e);
        assert_eq!(scene.system::<TransformSystem>().unwrap().pending(), 2);
        scene.tick(0.0).unwrap();
        assert!(global_position(&scene, e).abs_diff_eq(Vec3::Z, 1e-6));
        assert_eq!(scene.system::<TransformSystem>().unwrap().pending(), 0);
    }

    #[test]
    fn test_destroyed_transform_in_queue_is_skipped() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let e = spawn(&mut scene, Vec3::ONE);
        scene.refresh().unwrap();
        scene.destroy(e).unwrap();
        // Refresh inside tick frees `e` before the queued id is processed.
        scene.tick(0.0).unwrap();
        assert!(!scene.world().entities().is_valid(e));
    }

    #[test]
    fn test_mark_dirty_without_transform_fails() {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let e = scene.create_entity().unwrap();
        let result = scene
            .with_system::<TransformSystem, _>(|system, world| system.mark_dirty(world, e))
            .unwrap();
        assert!(matches!(result, Err(EcsError::MissingComponent { .. })));
    }
}
