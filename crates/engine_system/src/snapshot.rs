//! Scene snapshots.
//!
//! A [`SceneSnapshot`] is the serialisable form of a scene: a list of root
//! entities, each with an optional name, its components as
//! `(type name, JSON body)` pairs in attach order, and its children nested
//! recursively. Only activated, serializable entities are captured, and a
//! non-serializable entity drops its whole subtree. An entity under an
//! inactive parent is captured as a root.
//!
//! Snapshots are encoded as JSON (`serde_json`) or MessagePack
//! (`rmp-serde`). Loading goes through the normal transaction: entities are
//! created, linked, given their components and activated, then the scene is
//! refreshed. If a component body fails to decode nothing is activated and
//! the partially built entities are torn down again.

use engine_component::{ComponentBodyError, EcsError, EntityId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::scene::Scene;
use crate::world::World;

/// Wire format of an encoded snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    #[default]
    Json,
    MessagePack,
}

impl SnapshotFormat {
    /// Pick a format from a file extension (`json`, `msgpack` or `mp`).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "msgpack" | "mp" => Some(Self::MessagePack),
            _ => None,
        }
    }
}

/// One component as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    #[serde(rename = "type")]
    pub type_name: String,
    pub body: serde_json::Value,
}

/// One entity and its serializable descendants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSnapshot>,
    #[serde(default)]
    pub children: Vec<EntitySnapshot>,
}

impl EntitySnapshot {
    /// Total number of entities in this subtree.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

/// Root entities of a scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub entities: Vec<EntitySnapshot>,
}

impl SceneSnapshot {
    /// Capture every activated, serializable entity of `world` whose parent
    /// is absent or not activated, each with its serializable subtree.
    ///
    /// # Errors
    ///
    /// Fails if a component body cannot be serialised.
    pub fn capture(world: &World) -> Result<Self, SnapshotError> {
        let entities = world.entities();
        let roots: Vec<EntityId> = entities
            .iter()
            .filter(|(_, entity)| {
                entity.is_serializable()
                    && entity
                        .parent()
                        .is_none_or(|parent| !entities.is_activated(parent))
            })
            .map(|(id, _)| id)
            .collect();
        let entities = roots
            .into_iter()
            .map(|id| capture_entity(world, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entities })
    }

    /// Total number of entities in the snapshot.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entities.iter().map(EntitySnapshot::count).sum()
    }

    /// Encode in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] or [`SnapshotError::Encode`].
    pub fn encode(&self, format: SnapshotFormat) -> Result<Vec<u8>, SnapshotError> {
        match format {
            SnapshotFormat::Json => Ok(serde_json::to_vec_pretty(self)?),
            SnapshotFormat::MessagePack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    /// Decode from the given format.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] or [`SnapshotError::Decode`].
    pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Self, SnapshotError> {
        match format {
            SnapshotFormat::Json => Ok(serde_json::from_slice(bytes)?),
            SnapshotFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

fn capture_entity(world: &World, id: EntityId) -> Result<EntitySnapshot, SnapshotError> {
    let entity = world.entity(id)?;
    let components = world
        .encode_components(id)
        .map_err(|err| match err {
            ComponentBodyError::Json(err) => SnapshotError::Json(err),
            ComponentBodyError::Ecs(err) => SnapshotError::Ecs(err),
        })?
        .into_iter()
        .map(|(type_name, body)| ComponentSnapshot { type_name, body })
        .collect();

    let mut children = Vec::new();
    for &child in entity.children() {
        let record = world.entity(child)?;
        if record.is_activated() && record.is_serializable() {
            children.push(capture_entity(world, child)?);
        }
    }

    Ok(EntitySnapshot {
        name: entity.name().map(str::to_owned),
        components,
        children,
    })
}

impl Scene {
    /// Capture and encode the scene.
    ///
    /// # Errors
    ///
    /// See [`SceneSnapshot::capture`] and [`SceneSnapshot::encode`].
    pub fn save(&self, format: SnapshotFormat) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = SceneSnapshot::capture(self.world())?;
        let bytes = snapshot.encode(format)?;
        info!(
            entities = snapshot.count(),
            bytes = bytes.len(),
            ?format,
            "scene saved"
        );
        Ok(bytes)
    }

    /// Decode a snapshot and add its entities to the scene.
    ///
    /// Returns the ids of the restored root entities.
    ///
    /// # Errors
    ///
    /// See [`Scene::restore`].
    pub fn load(
        &mut self,
        bytes: &[u8],
        format: SnapshotFormat,
    ) -> Result<Vec<EntityId>, SnapshotError> {
        let snapshot = SceneSnapshot::decode(bytes, format)?;
        let roots = self.restore(&snapshot)?;
        info!(entities = snapshot.count(), ?format, "scene loaded");
        Ok(roots)
    }

    /// Build the snapshot's entities, activate them and refresh.
    ///
    /// Component types must already be registered with the world.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnknownComponentType`] for an unregistered
    /// type name and [`SnapshotError::Component`] for a bad body; in both
    /// cases the scene is left as it was. Errors from the final refresh are
    /// returned as [`SnapshotError::Ecs`].
    pub fn restore(&mut self, snapshot: &SceneSnapshot) -> Result<Vec<EntityId>, SnapshotError> {
        let mut roots = Vec::with_capacity(snapshot.entities.len());
        let mut built = Vec::new();
        for entity in &snapshot.entities {
            match build_entity(self.world_mut(), entity, &mut built) {
                Ok(id) => roots.push(id),
                Err(err) => {
                    for &root in &roots {
                        discard_subtree(self.world_mut(), root);
                    }
                    return Err(err);
                }
            }
        }

        for &id in &roots {
            self.activate(id)?;
        }
        debug!(roots = roots.len(), entities = built.len(), "snapshot entities queued");
        self.refresh()?;
        Ok(roots)
    }
}

/// Create `snapshot` and its subtree as inactive entities. On error, the
/// partially built subtree is freed before returning.
fn build_entity(
    world: &mut World,
    snapshot: &EntitySnapshot,
    built: &mut Vec<EntityId>,
) -> Result<EntityId, SnapshotError> {
    let id = world.create_entity()?;
    let start = built.len();
    built.push(id);
    if let Err(err) = fill_entity(world, id, snapshot, built) {
        discard_subtree(world, id);
        built.truncate(start);
        return Err(err);
    }
    Ok(id)
}

fn fill_entity(
    world: &mut World,
    id: EntityId,
    snapshot: &EntitySnapshot,
    built: &mut Vec<EntityId>,
) -> Result<(), SnapshotError> {
    world.entity_mut(id)?.set_name(snapshot.name.clone());
    for component in &snapshot.components {
        if !world.is_registered(&component.type_name) {
            return Err(SnapshotError::UnknownComponentType(
                component.type_name.clone(),
            ));
        }
        world
            .decode_component(id, &component.type_name, component.body.clone())
            .map_err(|source| component_error(&component.type_name, source))?;
    }
    for child in &snapshot.children {
        let child_id = build_entity(world, child, built)?;
        world.add_child(id, child_id)?;
    }
    Ok(())
}

/// Free an inactive subtree without going through the transaction.
fn discard_subtree(world: &mut World, id: EntityId) {
    let children = world
        .entity(id)
        .map(|entity| entity.children().to_vec())
        .unwrap_or_default();
    for child in children {
        discard_subtree(world, child);
    }
    if let Err(err) = world.release(id) {
        warn!(entity = %id, error = %err, "failed to discard restored entity");
    }
}

fn component_error(type_name: &str, source: ComponentBodyError) -> SnapshotError {
    match source {
        ComponentBodyError::Ecs(EcsError::UnsupportedComponentType(name)) => {
            SnapshotError::UnknownComponentType(name)
        }
        source => SnapshotError::Component {
            type_name: type_name.to_owned(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Component;
    use engine_math::{Transform, Vec3};

    use super::*;
    use crate::transform::TransformSystem;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    fn populated_scene() -> (Scene, EntityId) {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        let world = scene.world_mut();
        let root = world.create_entity().unwrap();
        world.entity_mut(root).unwrap().set_name(Some("root".into()));
        world
            .add_component(root, Transform::from_position(Vec3::X))
            .unwrap();
        world.add_component(root, Health { current: 3.0 }).unwrap();

        let child = world.create_entity().unwrap();
        world
            .add_component(child, Transform::from_position(Vec3::Y))
            .unwrap();
        world.add_child(root, child).unwrap();

        let transient = world.create_entity().unwrap();
        world.entity_mut(transient).unwrap().set_serializable(false);
        world.add_child(root, transient).unwrap();

        let inactive = world.create_entity().unwrap();
        world.entity_mut(inactive).unwrap().set_name(Some("draft".into()));

        scene.activate(root).unwrap();
        scene.tick(0.0).unwrap();
        (scene, root)
    }

    fn fresh_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_system(TransformSystem::new());
        scene.world_mut().register::<Transform>().unwrap();
        scene.world_mut().register::<Health>().unwrap();
        scene
    }

    #[test]
    fn test_capture_skips_transient_and_inactive() {
        let (scene, _) = populated_scene();
        let snapshot = SceneSnapshot::capture(scene.world()).unwrap();
        assert_eq!(snapshot.entities.len(), 1);
        let root = &snapshot.entities[0];
        assert_eq!(root.name.as_deref(), Some("root"));
        let types: Vec<&str> = root
            .components
            .iter()
            .map(|c| c.type_name.as_str())
            .collect();
        assert_eq!(types, vec!["Transform", "Health"]);
        assert_eq!(root.children.len(), 1);
        assert_eq!(snapshot.count(), 2);
    }

    #[test]
    fn test_capture_roots_entity_under_inactive_parent() {
        let mut scene = Scene::new();
        let world = scene.world_mut();
        let parent = world.create_entity().unwrap();
        let child = world.create_entity().unwrap();
        world.entity_mut(child).unwrap().set_name(Some("stray".into()));
        world.add_component(child, Health { current: 5.0 }).unwrap();
        world.add_child(parent, child).unwrap();
        scene.activate(child).unwrap();
        scene.refresh().unwrap();
        assert!(!scene.world().entities().is_activated(parent));

        let snapshot = SceneSnapshot::capture(scene.world()).unwrap();
        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.entities[0].name.as_deref(), Some("stray"));
        assert_eq!(snapshot.entities[0].components[0].type_name, "Health");
    }

    #[test]
    fn test_json_roundtrip_restores_hierarchy() {
        let (scene, _) = populated_scene();
        let bytes = scene.save(SnapshotFormat::Json).unwrap();

        let mut restored = fresh_scene();
        let roots = restored.load(&bytes, SnapshotFormat::Json).unwrap();
        assert_eq!(roots.len(), 1);

        let world = restored.world();
        let root = roots[0];
        assert!(world.entities().is_activated(root));
        assert_eq!(world.entity(root).unwrap().name(), Some("root"));
        assert_eq!(world.component::<Health>(root).unwrap().current, 3.0);
        let children = world.entity(root).unwrap().children().to_vec();
        assert_eq!(children.len(), 1);
        assert!(world.entities().is_activated(children[0]));
        assert_eq!(world.active_count(), 2);

        restored.tick(0.0).unwrap();
        let child = restored
            .world()
            .component::<Transform>(children[0])
            .unwrap();
        assert!(child.global_position.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_msgpack_roundtrip_matches_capture() {
        let (scene, _) = populated_scene();
        let snapshot = SceneSnapshot::capture(scene.world()).unwrap();
        let bytes = snapshot.encode(SnapshotFormat::MessagePack).unwrap();
        let decoded = SceneSnapshot::decode(&bytes, SnapshotFormat::MessagePack).unwrap();

        let mut restored = fresh_scene();
        restored.restore(&decoded).unwrap();
        let again = SceneSnapshot::capture(restored.world()).unwrap();
        assert_eq!(again.count(), snapshot.count());
        assert_eq!(again.entities[0].name, snapshot.entities[0].name);
        assert_eq!(
            again.entities[0].components.len(),
            snapshot.entities[0].components.len()
        );
    }

    #[test]
    fn test_unknown_component_type_leaves_scene_untouched() {
        let snapshot = SceneSnapshot {
            entities: vec![EntitySnapshot {
                name: Some("a".into()),
                components: vec![],
                children: vec![EntitySnapshot {
                    name: None,
                    components: vec![ComponentSnapshot {
                        type_name: "Mana".into(),
                        body: serde_json::json!(1),
                    }],
                    children: vec![],
                }],
            }],
        };
        let mut scene = fresh_scene();
        let err = scene.restore(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownComponentType(ref name) if name == "Mana"));
        assert_eq!(scene.world().entities().len(), 0);
        assert!(!scene.world().has_pending());
    }

    #[test]
    fn test_bad_body_reports_component() {
        let snapshot = SceneSnapshot {
            entities: vec![
                EntitySnapshot::default(),
                EntitySnapshot {
                    name: None,
                    components: vec![ComponentSnapshot {
                        type_name: "Health".into(),
                        body: serde_json::json!("full"),
                    }],
                    children: vec![],
                },
            ],
        };
        let mut scene = fresh_scene();
        let err = scene.restore(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Component { ref type_name, .. } if type_name == "Health"
        ));
        assert_eq!(scene.world().entities().len(), 0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SceneSnapshot::decode(b"{", SnapshotFormat::Json),
            Err(SnapshotError::Json(_))
        ));
        assert!(matches!(
            SceneSnapshot::decode(&[0xc1], SnapshotFormat::MessagePack),
            Err(SnapshotError::Decode(_))
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SnapshotFormat::from_extension("JSON"), Some(SnapshotFormat::Json));
        assert_eq!(
            SnapshotFormat::from_extension("msgpack"),
            Some(SnapshotFormat::MessagePack)
        );
        assert_eq!(SnapshotFormat::from_extension("txt"), None);
    }
}
