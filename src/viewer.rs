//! Window-independent viewer state.
//!
//! Owns the registry, the store, the scene graph and everything projected
//! from them. The app shell feeds it UI commands, pointer gestures and frame
//! ticks; tests drive it the same way without a window.

use crate::assets::{AssetEvent, AssetManager};
use crate::config::{ControlsConfig, ViewerConfig};
use crate::preferences::Theme;
use crate::render::camera::OrbitCamera;
use crate::render::gizmo::{self, GizmoHandle, GizmoParams, HandleShape};
use crate::render::graph::SceneGraph;
use crate::scene::composer::SceneComposer;
use crate::scene::manipulation::GizmoBridge;
use crate::scene::registry::{ModelDescriptor, ModelRegistry};
use crate::scene::{ModelSettings, ModelStore, SettingChange};
use crate::ui::UiCommand;
use crate::wireframe::WireframeProjector;
use glam::{Vec2, Vec3};

const ORBIT_RADIANS_PER_PX: f32 = 0.005;
const ZOOM_PER_LINE: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Which controller a pointer press went to.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    GizmoDrag(GizmoHandle),
    Selected(String),
    Orbit,
    Pan,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraDrag {
    Orbit { last: Vec2 },
    Pan { last: Vec2 },
}

pub struct Viewer {
    registry: ModelRegistry,
    store: ModelStore,
    graph: SceneGraph,
    composer: SceneComposer,
    bridge: GizmoBridge,
    camera: OrbitCamera,
    assets: AssetManager,
    controls: ControlsConfig,
    theme: Theme,
    camera_drag: Option<CameraDrag>,
    torn_down: bool,
}

impl Viewer {
    pub fn new(
        registry: ModelRegistry,
        config: &ViewerConfig,
        theme: Theme,
        assets: AssetManager,
    ) -> Self {
        let mut graph = SceneGraph::new();
        let store = ModelStore::new(&registry);
        let composer = SceneComposer::compose(
            &mut graph,
            &registry,
            &store,
            theme,
            WireframeProjector::new(config.wireframe_threshold_deg),
        );
        let camera = OrbitCamera::new(
            Vec3::from_array(config.camera.position),
            Vec3::from_array(config.camera.target),
            config.camera.fov_deg,
        )
        .with_distance_limits(config.camera.min_distance, config.camera.max_distance);
        Self {
            registry,
            store,
            graph,
            composer,
            bridge: GizmoBridge::new(),
            camera,
            assets,
            controls: config.controls.clone(),
            theme,
            camera_drag: None,
            torn_down: false,
        }
    }

    /// Requests every distinct asset once.
    pub fn start_loading(&mut self) {
        for path in self.composer.asset_paths() {
            self.assets.request(&path);
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn composer(&self) -> &SceneComposer {
        &self.composer
    }

    pub fn bridge(&self) -> &GizmoBridge {
        &self.bridge
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn controls(&self) -> &ControlsConfig {
        &self.controls
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn selected_descriptor(&self) -> Option<&ModelDescriptor> {
        self.registry.get(self.store.selected_id())
    }

    pub fn selected_settings(&self) -> &ModelSettings {
        self.store.selected()
    }

    /// Applies a UI command. Returns `false` for commands that only concern
    /// the UI shell (landing page, contact form).
    pub fn apply(&mut self, command: &UiCommand) -> bool {
        if self.torn_down {
            return false;
        }
        let id = self.store.selected_id().to_string();
        let current = self.store.get(&id).clone();
        match command {
            UiCommand::SelectModel(target) => {
                if let Err(err) = self.bridge.select(&mut self.store, target) {
                    log::warn!("{err}");
                }
            }
            UiCommand::NudgePosition(delta) => {
                let position = (Vec3::from_array(current.position) + Vec3::from_array(*delta))
                    .to_array();
                self.store.update(&id, SettingChange::Position(position));
            }
            UiCommand::NudgeScale(delta) => {
                let [min, max] = self.controls.scale_range;
                let scale = (current.scale + delta).clamp(min, max);
                self.store.update(&id, SettingChange::Scale(scale));
            }
            UiCommand::ToggleAutoRotate => {
                self.store
                    .update(&id, SettingChange::AutoRotate(!current.auto_rotate));
            }
            UiCommand::SetRotationSpeed(speed) => {
                let [min, max] = self.controls.rotation_speed_range;
                self.store
                    .update(&id, SettingChange::RotationSpeed(speed.clamp(min, max)));
            }
            UiCommand::ToggleMeshMode => {
                self.store
                    .update(&id, SettingChange::MeshMode(!current.mesh_mode));
            }
            UiCommand::SetMeshOpacity(opacity) => {
                self.store
                    .update(&id, SettingChange::MeshOpacity(opacity.clamp(0.0, 1.0)));
            }
            UiCommand::SetLineDensity(density) => {
                let [min, max] = self.controls.line_density_range;
                self.store
                    .update(&id, SettingChange::MeshLineDensity(density.clamp(min, max)));
            }
            UiCommand::ToggleLock => {
                self.bridge
                    .set_locked(&mut self.store, &id, !current.is_locked);
            }
            UiCommand::ToggleTheme => self.set_theme(self.theme.toggled()),
            UiCommand::ResetCamera => self.camera.reset(),
            UiCommand::ToggleLanding | UiCommand::ToggleContact => return false,
        }
        true
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.composer.set_theme(theme);
    }

    /// Gizmo placement for the current selection, hidden when the gizmo is
    /// not active.
    pub fn gizmo_params(&self, viewport: Vec2) -> GizmoParams {
        if self.torn_down {
            return GizmoParams::hidden();
        }
        match self.composer.gizmo_target(&self.graph, &self.store) {
            Some(group) => {
                let origin = self.graph.world_matrix(group).transform_point3(Vec3::ZERO);
                GizmoParams::at(origin, &self.camera, viewport)
            }
            None => GizmoParams::hidden(),
        }
    }

    pub fn gizmo_shapes(&self, viewport: Vec2) -> Vec<HandleShape> {
        gizmo::layout(&self.gizmo_params(viewport), &self.camera, viewport)
    }

    /// Routes a press: gizmo handles first, then model selection, then the
    /// camera. A selection consumes the press so the camera does not start.
    pub fn pointer_down(
        &mut self,
        pixel: Vec2,
        viewport: Vec2,
        button: PointerButton,
    ) -> PointerOutcome {
        if self.torn_down {
            return PointerOutcome::Ignored;
        }
        if button == PointerButton::Secondary {
            if !self.bridge.orbit_enabled() {
                return PointerOutcome::Ignored;
            }
            self.camera_drag = Some(CameraDrag::Pan { last: pixel });
            return PointerOutcome::Pan;
        }

        let ray = self.camera.screen_ray(pixel, viewport);
        let shapes = self.gizmo_shapes(viewport);
        if let Some(handle) =
            gizmo::hit_test(&shapes, pixel).and_then(|hit| GizmoHandle::from_pick_key(hit.key))
        {
            let origin = Vec3::from_array(self.store.selected().position);
            let group_available = self
                .composer
                .group_available(&self.graph, self.store.selected_id());
            if let Some(grab) = gizmo::constrained_point(handle, origin, &ray) {
                if self
                    .bridge
                    .begin_drag(&self.store, group_available, handle, grab)
                {
                    self.camera_drag = None;
                    return PointerOutcome::GizmoDrag(handle);
                }
            }
        }

        if let Some(id) = self
            .composer
            .pick(&self.graph, &ray)
            .and_then(|hit| self.composer.pointer_down(&hit))
        {
            if let Err(err) = self.bridge.select(&mut self.store, &id) {
                log::warn!("{err}");
            }
            return PointerOutcome::Selected(id);
        }

        if self.bridge.orbit_enabled() {
            self.camera_drag = Some(CameraDrag::Orbit { last: pixel });
            PointerOutcome::Orbit
        } else {
            PointerOutcome::Ignored
        }
    }

    pub fn pointer_move(&mut self, pixel: Vec2, viewport: Vec2) {
        if let Some(session) = self.bridge.session() {
            let origin = Vec3::from_array(session.start);
            let handle = session.handle;
            let ray = self.camera.screen_ray(pixel, viewport);
            if let Some(point) = gizmo::constrained_point(handle, origin, &ray) {
                self.bridge.drag_to(&mut self.store, point);
            }
            return;
        }
        match &mut self.camera_drag {
            Some(CameraDrag::Orbit { last }) => {
                let delta = pixel - *last;
                *last = pixel;
                self.camera.orbit(
                    -delta.x * ORBIT_RADIANS_PER_PX,
                    delta.y * ORBIT_RADIANS_PER_PX,
                );
            }
            Some(CameraDrag::Pan { last }) => {
                let delta = pixel - *last;
                *last = pixel;
                self.camera.pan(delta, viewport.y);
            }
            None => {}
        }
    }

    pub fn pointer_up(&mut self) {
        self.bridge.end_drag();
        self.camera_drag = None;
    }

    /// Positive `lines` zooms in.
    pub fn scroll(&mut self, lines: f32) {
        if self.bridge.orbit_enabled() {
            self.camera.zoom(ZOOM_PER_LINE.powf(lines));
        }
    }

    /// Mean completion of the asset loads still in flight.
    pub fn loading_progress(&self) -> Option<f32> {
        self.assets.progress()
    }

    /// One redraw tick: asset arrivals, auto-rotation, then the store's
    /// pending changes, so the frame drawn next sees every earlier mutation.
    pub fn frame(&mut self) {
        if self.torn_down {
            return;
        }
        for event in self.assets.poll() {
            match event {
                AssetEvent::Loaded { path, prototype } => {
                    self.composer
                        .on_asset_loaded(&mut self.graph, &self.store, &path, &prototype);
                }
                AssetEvent::Failed { path, error } => self.composer.on_asset_failed(&path, &error),
            }
        }
        self.composer.tick(&mut self.graph, &self.store);
        self.composer.sync(&mut self.graph, &mut self.store);
    }

    /// Cancels any drag, releases every scene resource and stops listening
    /// for loads still in flight.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.bridge.cancel(&mut self.store);
        self.camera_drag = None;
        self.composer.teardown(&mut self.graph);
        self.assets.shutdown();
        self.torn_down = true;
        log::info!(
            "viewer torn down ({} geometries, {} materials live)",
            self.graph.live_geometry_count(),
            self.graph.live_material_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{tetrahedron, wait_for};
    use crate::assets::{AssetError, AssetPrototype, LoadFn, LoadProgress};
    use crate::scene::composer::InstanceStatus;
    use std::path::Path;
    use std::sync::Arc;

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    type LoadResult = Result<AssetPrototype, AssetError>;

    fn descriptor(id: &str, x: f32) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: id.to_uppercase(),
            path: format!("{id}.glb"),
            defaults: ModelSettings {
                position: [x, 0.0, 0.0],
                ..ModelSettings::default()
            },
        }
    }

    fn viewer_with(loader: Arc<LoadFn>) -> Viewer {
        let registry = ModelRegistry::new(vec![
            descriptor("a", 0.0),
            descriptor("b", 3.0),
            descriptor("c", -3.0),
        ])
        .unwrap();
        let assets = AssetManager::with_loader("assets", loader);
        Viewer::new(registry, &ViewerConfig::default(), Theme::Dark, assets)
    }

    fn loaded_viewer() -> Viewer {
        let mut viewer = viewer_with(Arc::new(|path: &Path, _: &LoadProgress| -> LoadResult {
            Ok(tetrahedron(&path.display().to_string()))
        }));
        viewer.start_loading();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while viewer.composer().is_loading() {
            assert!(std::time::Instant::now() < deadline, "assets never arrived");
            viewer.frame();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        viewer
    }

    /// Pixel where `world` lands on screen.
    fn screen_of(viewer: &Viewer, world: Vec3) -> Vec2 {
        viewer.camera().project(world, VIEWPORT).unwrap().truncate()
    }

    #[test]
    fn commands_map_to_single_store_updates() {
        let mut viewer = loaded_viewer();
        viewer.apply(&UiCommand::NudgePosition([1.0, 0.0, 0.0]));
        viewer.apply(&UiCommand::NudgeScale(10.0));
        viewer.apply(&UiCommand::SetMeshOpacity(3.0));
        viewer.apply(&UiCommand::SetLineDensity(0.0));
        let settings = viewer.store().get("a");
        assert_eq!(settings.position, [1.0, 0.0, 0.0]);
        assert_eq!(settings.scale, 3.0);
        assert_eq!(settings.mesh_opacity, 1.0);
        assert_eq!(settings.mesh_line_density, 0.25);
        assert_eq!(viewer.store().get("b"), &descriptor("b", 3.0).defaults);
        assert!(!viewer.apply(&UiCommand::ToggleLanding));
    }

    #[test]
    fn clicking_a_model_selects_it_without_orbiting() {
        let mut viewer = loaded_viewer();
        // Tetrahedron face sits one unit up from each model origin.
        let pixel = screen_of(&viewer, Vec3::new(3.2, 1.2, 0.2));
        let outcome = viewer.pointer_down(pixel, VIEWPORT, PointerButton::Primary);
        assert_eq!(outcome, PointerOutcome::Selected("b".to_string()));
        assert_eq!(viewer.store().selected_id(), "b");

        let yaw = viewer.camera().yaw;
        viewer.pointer_move(pixel + Vec2::new(50.0, 0.0), VIEWPORT);
        assert_eq!(viewer.camera().yaw, yaw);
        viewer.pointer_up();
    }

    #[test]
    fn empty_space_orbits_the_camera() {
        let mut viewer = loaded_viewer();
        let outcome = viewer.pointer_down(Vec2::new(20.0, 20.0), VIEWPORT, PointerButton::Primary);
        assert_eq!(outcome, PointerOutcome::Orbit);
        viewer.pointer_move(Vec2::new(80.0, 20.0), VIEWPORT);
        assert!(viewer.camera().yaw != 0.0);
        viewer.apply(&UiCommand::ResetCamera);
        assert_eq!(viewer.camera().yaw, 0.0);
    }

    #[test]
    fn gizmo_drag_writes_position_and_blocks_orbit() {
        let mut viewer = loaded_viewer();
        let tip = screen_of(&viewer, Vec3::ZERO) + Vec2::new(60.0, 0.0);
        let outcome = viewer.pointer_down(tip, VIEWPORT, PointerButton::Primary);
        assert_eq!(outcome, PointerOutcome::GizmoDrag(GizmoHandle::AxisX));
        assert!(!viewer.bridge().orbit_enabled());

        let yaw = viewer.camera().yaw;
        let two_right = screen_of(&viewer, Vec3::new(2.0, 0.0, 0.0)) + Vec2::new(60.0, 0.0);
        viewer.pointer_move(two_right, VIEWPORT);
        let position = viewer.store().get("a").position;
        assert!((position[0] - 2.0).abs() < 1e-3, "{position:?}");
        assert!(position[1].abs() < 1e-5 && position[2].abs() < 1e-5);
        assert_eq!(viewer.camera().yaw, yaw);

        viewer.pointer_up();
        assert!(viewer.bridge().orbit_enabled());
        viewer.frame();
        let group = viewer.composer().instance("a").unwrap().group;
        let origin = viewer.graph().world_matrix(group).transform_point3(Vec3::ZERO);
        assert!((origin.x - position[0]).abs() < 1e-6);
    }

    #[test]
    fn locked_model_has_no_gizmo() {
        let mut viewer = loaded_viewer();
        viewer.apply(&UiCommand::ToggleLock);
        assert!(!viewer.gizmo_params(VIEWPORT).visible);
        let tip = screen_of(&viewer, Vec3::ZERO) + Vec2::new(60.0, 0.0);
        assert_ne!(
            viewer.pointer_down(tip, VIEWPORT, PointerButton::Primary),
            PointerOutcome::GizmoDrag(GizmoHandle::AxisX)
        );
        assert_eq!(viewer.store().get("a").position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn select_command_during_drag_cancels_it() {
        let mut viewer = loaded_viewer();
        let tip = screen_of(&viewer, Vec3::ZERO) + Vec2::new(60.0, 0.0);
        viewer.pointer_down(tip, VIEWPORT, PointerButton::Primary);
        viewer.pointer_move(tip + Vec2::new(40.0, 0.0), VIEWPORT);
        assert_ne!(viewer.store().get("a").position, [0.0, 0.0, 0.0]);

        viewer.apply(&UiCommand::SelectModel("b".to_string()));
        assert_eq!(viewer.store().selected_id(), "b");
        assert_eq!(viewer.store().get("a").position, [0.0, 0.0, 0.0]);
        assert_eq!(viewer.store().get("b").position, [3.0, 0.0, 0.0]);
        assert!(viewer.bridge().orbit_enabled());
    }

    #[test]
    fn theme_toggle_recolors_on_next_frame() {
        let mut viewer = loaded_viewer();
        viewer.apply(&UiCommand::ToggleMeshMode);
        viewer.frame();
        viewer.apply(&UiCommand::ToggleTheme);
        assert_eq!(viewer.theme(), Theme::Light);
        viewer.frame();
        let mesh = viewer.composer().instance("a").unwrap().meshes[0];
        let artifact = viewer.composer().projector().artifact(mesh).unwrap();
        assert!(matches!(
            viewer.graph().material(artifact.material),
            Some(crate::render::graph::Material::Line { color, .. }) if *color == Theme::Light.outline_color()
        ));
    }

    #[test]
    fn teardown_releases_everything_and_ignores_late_loads() {
        let mut viewer = loaded_viewer();
        viewer.apply(&UiCommand::SelectModel("c".to_string()));
        viewer.apply(&UiCommand::ToggleMeshMode);
        viewer.frame();
        assert_eq!(viewer.composer().projector().artifact_count(), 1);

        viewer.teardown();
        assert_eq!(viewer.graph().live_geometry_count(), 0);
        assert_eq!(viewer.graph().live_material_count(), 0);
        assert_eq!(viewer.graph().node_count(), 1);
        assert!(!viewer.apply(&UiCommand::ToggleMeshMode));
        assert_eq!(
            viewer.pointer_down(Vec2::ZERO, VIEWPORT, PointerButton::Primary),
            PointerOutcome::Ignored
        );
    }

    #[test]
    fn load_resolving_after_teardown_is_dropped() {
        let gate = Arc::new(std::sync::Mutex::new(()));
        let held = gate.lock().unwrap();
        let loader_gate = Arc::clone(&gate);
        let mut viewer = viewer_with(Arc::new(move |_path: &Path, _: &LoadProgress| -> LoadResult {
            let _open = loader_gate.lock();
            Ok(tetrahedron("late"))
        }));
        viewer.start_loading();
        viewer.teardown();
        drop(held);

        let mut assets = std::mem::replace(&mut viewer.assets, AssetManager::new("unused"));
        wait_for(&mut assets, |m| {
            m.poll();
            m.discarded_count() == 3
        });
        viewer.frame();
        assert_eq!(viewer.graph().node_count(), 1);
        assert_eq!(viewer.graph().live_geometry_count(), 0);
    }

    #[test]
    fn failed_load_marks_model() {
        let mut viewer = viewer_with(Arc::new(|path: &Path, _: &LoadProgress| -> LoadResult {
            if path.ends_with("b.glb") {
                Err(AssetError::NoTriangles {
                    path: path.display().to_string(),
                })
            } else {
                Ok(tetrahedron("ok"))
            }
        }));
        viewer.start_loading();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while viewer.composer().is_loading() {
            assert!(std::time::Instant::now() < deadline);
            viewer.frame();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let b = viewer.composer().instance("b").unwrap();
        assert!(matches!(b.status, InstanceStatus::Failed(_)));
        assert!(b.content.is_none());
    }

    #[test]
    fn loading_progress_follows_the_loaders() {
        let gate = Arc::new(std::sync::Mutex::new(()));
        let held = gate.lock().unwrap();
        let loader_gate = Arc::clone(&gate);
        let mut viewer = viewer_with(Arc::new(
            move |path: &Path, progress: &LoadProgress| -> LoadResult {
                progress.report(0.25);
                let _open = loader_gate.lock();
                Ok(tetrahedron(&path.display().to_string()))
            },
        ));
        assert_eq!(viewer.loading_progress(), None);
        viewer.start_loading();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while viewer.loading_progress() != Some(0.25) {
            assert!(std::time::Instant::now() < deadline, "progress never reported");
            viewer.frame();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(viewer.composer().is_loading());
        drop(held);

        while viewer.composer().is_loading() {
            assert!(std::time::Instant::now() < deadline, "assets never arrived");
            viewer.frame();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(viewer.loading_progress(), None);
    }
}
