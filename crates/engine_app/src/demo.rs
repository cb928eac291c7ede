//! Built-in scene used when no snapshot is given: a spinning hub with a ring
//! of satellites, plus a drifting marker that is not saved.

use anyhow::Result;
use engine_component::EntityId;
use engine_math::{Transform, Vec3};
use engine_system::{Scene, TransformSystem, WorldConfig};
use tracing::info;

use crate::motion::Velocity;

pub const SATELLITES: usize = 6;

/// Scene with the engine's systems and component pools set up, but no
/// entities.
///
/// # Errors
///
/// Fails only if a component name is already taken by another type.
pub fn empty_scene(config: WorldConfig) -> Result<Scene> {
    let mut scene = Scene::with_config(config);
    scene.world_mut().register::<Transform>()?;
    scene.world_mut().register::<Velocity>()?;
    scene.add_system(TransformSystem::new());
    Ok(scene)
}

/// Populate `scene` with the demo entities and commit them.
///
/// Returns the hub entity.
///
/// # Errors
///
/// Propagates entity and component errors.
pub fn populate(scene: &mut Scene) -> Result<EntityId> {
    let world = scene.world_mut();

    let hub = world.create_entity()?;
    world.entity_mut(hub)?.set_name(Some("hub".into()));
    world.add_component(hub, Transform::IDENTITY)?;
    world.add_component(
        hub,
        Velocity::default().with_angular(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2)),
    )?;

    for index in 0..SATELLITES {
        let angle = index as f32 * std::f32::consts::TAU / SATELLITES as f32;
        let satellite = world.create_entity()?;
        world
            .entity_mut(satellite)?
            .set_name(Some(format!("satellite-{index}")));
        world.add_component(
            satellite,
            Transform::from_position(Vec3::new(angle.cos(), angle.sin(), 0.0) * 4.0).scaled(0.5),
        )?;
        world.add_child(hub, satellite)?;
    }

    let marker = world.create_entity()?;
    world.entity_mut(marker)?.set_serializable(false);
    world.add_component(marker, Transform::IDENTITY)?;
    world.add_component(marker, Velocity::from_linear(Vec3::new(0.0, 0.0, 1.0)))?;

    // Activating the hub brings its satellites with it.
    scene.activate(hub)?;
    scene.activate(marker)?;
    scene.refresh()?;
    info!(entities = scene.world().active_count(), "demo scene ready");
    Ok(hub)
}
