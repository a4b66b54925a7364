//! One rendered group per model descriptor.
//!
//! Each instance is an outer group carrying position and scale, an inner
//! spin group carrying the auto-rotation, and, once its asset arrives, a
//! private clone of the cached asset template.

use crate::assets::AssetPrototype;
use crate::preferences::Theme;
use crate::render::graph::{GeometryId, MaterialId, NodeId, NodeKind, SceneGraph, Transform};
use crate::render::pick::{raycast_subtree, PickHit, PickKey, PickKind, Ray};
use crate::scene::registry::ModelRegistry;
use crate::scene::{ModelSettings, ModelStore};
use crate::wireframe::{WireframeParams, WireframeProjector};
use glam::{Quat, Vec3};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum InstanceStatus {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ModelInstance {
    pub id: String,
    pub index: u32,
    pub path: String,
    pub group: NodeId,
    pub spin: NodeId,
    pub content: Option<NodeId>,
    pub meshes: Vec<NodeId>,
    pub spin_angle: f32,
    pub status: InstanceStatus,
}

/// A loaded asset instantiated once, detached, and cloned per instance.
struct Template {
    root: NodeId,
    geometries: Vec<GeometryId>,
    materials: Vec<MaterialId>,
}

pub struct SceneComposer {
    instances: Vec<ModelInstance>,
    templates: HashMap<String, Template>,
    projector: WireframeProjector,
    theme: Theme,
    theme_dirty: bool,
}

impl SceneComposer {
    pub fn compose(
        graph: &mut SceneGraph,
        registry: &ModelRegistry,
        store: &ModelStore,
        theme: Theme,
        projector: WireframeProjector,
    ) -> Self {
        let root = graph.root();
        let instances = registry
            .descriptors()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let settings = store.get(&descriptor.id);
                let group = graph.add_node(
                    Some(root),
                    descriptor.name.clone(),
                    NodeKind::Group,
                    group_transform(settings),
                );
                let spin = graph.add_node(
                    Some(group),
                    format!("{} spin", descriptor.name),
                    NodeKind::Group,
                    Transform::IDENTITY,
                );
                ModelInstance {
                    id: descriptor.id.clone(),
                    index: index as u32,
                    path: descriptor.path.clone(),
                    group,
                    spin,
                    content: None,
                    meshes: Vec::new(),
                    spin_angle: 0.0,
                    status: InstanceStatus::Loading,
                }
            })
            .collect();
        Self {
            instances,
            templates: HashMap::new(),
            projector,
            theme,
            theme_dirty: false,
        }
    }

    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn instance(&self, id: &str) -> Option<&ModelInstance> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    pub fn projector(&self) -> &WireframeProjector {
        &self.projector
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Distinct asset paths in registry order.
    pub fn asset_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for instance in &self.instances {
            if !paths.contains(&instance.path) {
                paths.push(instance.path.clone());
            }
        }
        paths
    }

    pub fn is_loading(&self) -> bool {
        self.instances
            .iter()
            .any(|instance| instance.status == InstanceStatus::Loading)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ModelInstance, &str)> {
        self.instances.iter().filter_map(|instance| match &instance.status {
            InstanceStatus::Failed(error) => Some((instance, error.as_str())),
            _ => None,
        })
    }

    /// The group exists for every registered model from compose on.
    pub fn group_available(&self, graph: &SceneGraph, id: &str) -> bool {
        self.instance(id)
            .is_some_and(|instance| graph.contains(instance.group))
    }

    /// Fills every still-empty instance of `path` with its own clone.
    pub fn on_asset_loaded(
        &mut self,
        graph: &mut SceneGraph,
        store: &ModelStore,
        path: &str,
        prototype: &AssetPrototype,
    ) {
        let template_root = match self.templates.get(path) {
            Some(template) => template.root,
            None => {
                let template = instantiate_template(graph, prototype);
                let root = template.root;
                self.templates.insert(path.to_string(), template);
                root
            }
        };

        let theme = self.theme;
        for instance in &mut self.instances {
            if instance.path != path || instance.content.is_some() {
                continue;
            }
            let Some(content) = graph.clone_subtree(template_root, Some(instance.spin)) else {
                continue;
            };
            instance.content = Some(content);
            instance.meshes = graph.meshes_under(content);
            instance.status = InstanceStatus::Ready;
            let params = wireframe_params(store.get(&instance.id), theme);
            for mesh in &instance.meshes {
                self.projector.apply(graph, *mesh, &params);
            }
            log::debug!(
                "model `{}` ready with {} meshes",
                instance.id,
                instance.meshes.len()
            );
        }
    }

    pub fn on_asset_failed(&mut self, path: &str, error: &str) {
        for instance in &mut self.instances {
            if instance.path == path && instance.content.is_none() {
                instance.status = InstanceStatus::Failed(error.to_string());
            }
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if theme != self.theme {
            self.theme = theme;
            self.theme_dirty = true;
        }
    }

    /// Projects dirty store records onto the graph: transforms for moved
    /// models, outlines for models whose mesh fields changed, and outlines
    /// of every model after a theme change.
    pub fn sync(&mut self, graph: &mut SceneGraph, store: &mut ModelStore) {
        let theme_changed = std::mem::take(&mut self.theme_dirty);
        for (id, dirty) in store.take_dirty() {
            let Some(position) = self.instances.iter().position(|i| i.id == id) else {
                continue;
            };
            let settings = store.get(&id);
            if dirty.transform {
                graph.set_transform(self.instances[position].group, group_transform(settings));
            }
            if dirty.appearance && !theme_changed {
                self.apply_appearance(graph, position, settings);
            }
        }
        if theme_changed {
            for position in 0..self.instances.len() {
                let settings = store.get(&self.instances[position].id);
                self.apply_appearance(graph, position, settings);
            }
        }
    }

    fn apply_appearance(&mut self, graph: &mut SceneGraph, position: usize, settings: &ModelSettings) {
        let params = wireframe_params(settings, self.theme);
        for mesh in &self.instances[position].meshes {
            self.projector.apply(graph, *mesh, &params);
        }
    }

    /// Advances auto-rotation by one redraw tick.
    pub fn tick(&mut self, graph: &mut SceneGraph, store: &ModelStore) {
        for instance in &mut self.instances {
            let settings = store.get(&instance.id);
            if !settings.auto_rotate {
                continue;
            }
            instance.spin_angle =
                (instance.spin_angle + settings.rotation_speed).rem_euclid(std::f32::consts::TAU);
            graph.set_transform(
                instance.spin,
                Transform {
                    rotation: Quat::from_rotation_y(instance.spin_angle),
                    ..Transform::IDENTITY
                },
            );
        }
    }

    /// Nearest model hit by `ray`.
    pub fn pick(&self, graph: &SceneGraph, ray: &Ray) -> Option<PickHit> {
        self.instances
            .iter()
            .filter_map(|instance| {
                let content = instance.content?;
                let distance = raycast_subtree(graph, content, ray)?;
                Some(PickHit {
                    key: PickKey::scene_mesh(instance.index),
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Model id for a scene-mesh hit. A `Some` result consumes the gesture.
    pub fn pointer_down(&self, hit: &PickHit) -> Option<String> {
        if hit.key.kind != PickKind::SceneMesh {
            return None;
        }
        self.instances
            .get(hit.key.object_id as usize)
            .map(|instance| instance.id.clone())
    }

    /// The group the gizmo binds to: the selected model's, when unlocked.
    pub fn gizmo_target(&self, graph: &SceneGraph, store: &ModelStore) -> Option<NodeId> {
        if store.selected().is_locked {
            return None;
        }
        self.instance(store.selected_id())
            .map(|instance| instance.group)
            .filter(|group| graph.contains(*group))
    }

    /// Releases outlines, groups and templates. Geometry and material counts
    /// return to what they were before compose.
    pub fn teardown(&mut self, graph: &mut SceneGraph) {
        self.projector.teardown(graph);
        for instance in self.instances.drain(..) {
            graph.remove_subtree(instance.group);
        }
        for (_, template) in self.templates.drain() {
            graph.remove_subtree(template.root);
            for geometry in template.geometries {
                graph.dispose_geometry(geometry);
            }
            for material in template.materials {
                graph.dispose_material(material);
            }
        }
    }
}

fn group_transform(settings: &ModelSettings) -> Transform {
    Transform {
        translation: Vec3::from_array(settings.position),
        rotation: Quat::IDENTITY,
        scale: Vec3::splat(settings.scale),
    }
}

fn wireframe_params(settings: &ModelSettings, theme: Theme) -> WireframeParams {
    WireframeParams {
        mesh_mode: settings.mesh_mode,
        opacity: settings.mesh_opacity,
        line_density: settings.mesh_line_density,
        theme,
    }
}

fn instantiate_template(graph: &mut SceneGraph, prototype: &AssetPrototype) -> Template {
    let root = prototype.instantiate(graph);
    let mut geometries = Vec::new();
    let mut materials = Vec::new();
    for mesh in graph.meshes_under(root) {
        if let Some(NodeKind::Mesh { geometry, material }) = graph.node(mesh).map(|n| n.kind) {
            geometries.push(geometry);
            materials.push(material);
        }
    }
    Template {
        root,
        geometries,
        materials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::tetrahedron;
    use crate::scene::registry::ModelDescriptor;
    use crate::scene::SettingChange;

    fn registry() -> ModelRegistry {
        let descriptor = |id: &str, path: &str, x: f32| ModelDescriptor {
            id: id.to_string(),
            name: id.to_uppercase(),
            path: path.to_string(),
            defaults: ModelSettings {
                position: [x, 0.0, 0.0],
                ..ModelSettings::default()
            },
        };
        ModelRegistry::new(vec![
            descriptor("a", "ship.glb", 0.0),
            descriptor("b", "ship.glb", 4.0),
            descriptor("c", "other.glb", -4.0),
        ])
        .unwrap()
    }

    fn setup() -> (SceneGraph, ModelStore, SceneComposer) {
        let registry = registry();
        let mut graph = SceneGraph::new();
        let mut store = ModelStore::new(&registry);
        let mut composer = SceneComposer::compose(
            &mut graph,
            &registry,
            &store,
            Theme::Dark,
            WireframeProjector::default(),
        );
        composer.sync(&mut graph, &mut store);
        (graph, store, composer)
    }

    fn load_all(graph: &mut SceneGraph, store: &ModelStore, composer: &mut SceneComposer) {
        composer.on_asset_loaded(graph, store, "ship.glb", &tetrahedron("ship"));
        composer.on_asset_loaded(graph, store, "other.glb", &tetrahedron("other"));
    }

    #[test]
    fn one_group_per_descriptor_at_its_position() {
        let (graph, _, composer) = setup();
        assert_eq!(composer.instances().len(), 3);
        let b = composer.instance("b").unwrap();
        let origin = graph.world_matrix(b.group).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-6);
        assert!(composer.is_loading());
        assert_eq!(composer.asset_paths(), vec!["ship.glb", "other.glb"]);
    }

    #[test]
    fn instances_of_one_asset_never_share_nodes() {
        let (mut graph, store, mut composer) = setup();
        load_all(&mut graph, &store, &mut composer);
        let a = composer.instance("a").unwrap();
        let b = composer.instance("b").unwrap();
        assert_eq!(a.meshes.len(), 1);
        assert_ne!(a.meshes, b.meshes);
        assert_ne!(a.content, b.content);
        assert!(!composer.is_loading());
        // One template per path.
        assert_eq!(graph.live_geometry_count(), 2);
    }

    #[test]
    fn failed_asset_marks_only_its_instances() {
        let (_, _, mut composer) = setup();
        composer.on_asset_failed("other.glb", "boom");
        assert_eq!(composer.failures().count(), 1);
        assert_eq!(composer.instance("a").unwrap().status, InstanceStatus::Loading);
    }

    #[test]
    fn sync_moves_only_dirty_group() {
        let (mut graph, mut store, mut composer) = setup();
        store.update("a", SettingChange::Position([1.0, 2.0, 3.0]));
        store.update("a", SettingChange::Scale(2.0));
        composer.sync(&mut graph, &mut store);
        let a = composer.instance("a").unwrap();
        let node = graph.node(a.group).unwrap();
        assert_eq!(node.transform.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(node.transform.scale, Vec3::splat(2.0));
        let b = composer.instance("b").unwrap();
        assert_eq!(graph.node(b.group).unwrap().transform.translation, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn mesh_mode_goes_through_projector() {
        let (mut graph, mut store, mut composer) = setup();
        load_all(&mut graph, &store, &mut composer);
        store.update("a", SettingChange::MeshMode(true));
        composer.sync(&mut graph, &mut store);
        let a_mesh = composer.instance("a").unwrap().meshes[0];
        let b_mesh = composer.instance("b").unwrap().meshes[0];
        assert!(composer.projector().artifact(a_mesh).is_some());
        assert!(composer.projector().artifact(b_mesh).is_none());
        assert!(!graph.node(a_mesh).unwrap().visible);
    }

    #[test]
    fn theme_change_recolors_outlines() {
        let (mut graph, mut store, mut composer) = setup();
        load_all(&mut graph, &store, &mut composer);
        store.update("c", SettingChange::MeshMode(true));
        composer.sync(&mut graph, &mut store);
        composer.set_theme(Theme::Light);
        composer.sync(&mut graph, &mut store);
        let c_mesh = composer.instance("c").unwrap().meshes[0];
        let artifact = composer.projector().artifact(c_mesh).unwrap();
        assert!(matches!(
            graph.material(artifact.material),
            Some(crate::render::graph::Material::Line { color, .. }) if *color == Theme::Light.outline_color()
        ));
    }

    #[test]
    fn late_asset_respects_existing_mesh_mode() {
        let (mut graph, mut store, mut composer) = setup();
        store.update("c", SettingChange::MeshMode(true));
        composer.sync(&mut graph, &mut store);
        load_all(&mut graph, &store, &mut composer);
        let c_mesh = composer.instance("c").unwrap().meshes[0];
        assert!(composer.projector().artifact(c_mesh).is_some());
    }

    #[test]
    fn tick_spins_only_auto_rotating_models() {
        let (mut graph, mut store, mut composer) = setup();
        store.update("b", SettingChange::AutoRotate(true));
        store.update("b", SettingChange::RotationSpeed(0.5));
        composer.tick(&mut graph, &store);
        composer.tick(&mut graph, &store);
        let b = composer.instance("b").unwrap();
        assert!((b.spin_angle - 1.0).abs() < 1e-6);
        assert_eq!(composer.instance("a").unwrap().spin_angle, 0.0);
        let rotation = graph.node(b.spin).unwrap().transform.rotation;
        assert!(rotation.angle_between(Quat::from_rotation_y(1.0)) < 1e-5);
    }

    #[test]
    fn pick_selects_nearest_model() {
        let (mut graph, store, mut composer) = setup();
        load_all(&mut graph, &store, &mut composer);
        let ray = Ray::new(Vec3::new(4.2, 1.2, 8.0), Vec3::NEG_Z);
        let hit = composer.pick(&graph, &ray).unwrap();
        assert_eq!(composer.pointer_down(&hit), Some("b".to_string()));
        let miss = Ray::new(Vec3::new(40.0, 0.0, 8.0), Vec3::NEG_Z);
        assert!(composer.pick(&graph, &miss).is_none());
    }

    #[test]
    fn gizmo_target_requires_unlocked_selection() {
        let (graph, mut store, composer) = setup();
        let a_group = composer.instance("a").unwrap().group;
        assert_eq!(composer.gizmo_target(&graph, &store), Some(a_group));
        store.update("a", SettingChange::Locked(true));
        assert_eq!(composer.gizmo_target(&graph, &store), None);
    }

    #[test]
    fn teardown_with_mesh_mode_returns_to_baseline() {
        let (mut graph, mut store, mut composer) = setup();
        let baseline = (
            graph.live_geometry_count(),
            graph.live_material_count(),
            graph.node_count(),
        );
        load_all(&mut graph, &store, &mut composer);
        store.update("c", SettingChange::MeshMode(true));
        composer.sync(&mut graph, &mut store);
        assert!(graph.live_geometry_count() > baseline.0);

        composer.teardown(&mut graph);
        assert_eq!(graph.live_geometry_count(), baseline.0);
        assert_eq!(graph.live_material_count(), baseline.1);
        assert_eq!(composer.projector().artifact_count(), 0);
        // Only the root survives.
        assert_eq!(graph.node_count(), 1);
        assert!(baseline.2 > 1);
    }
}
