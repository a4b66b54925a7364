//! hangar: a desktop viewer for spaceship GLB models.
//!
//! Models are placed side by side in one scene. The selected model can be
//! moved with a translate gizmo, scaled, spun and switched to an edge-outline
//! "mesh mode". The window shell is winit + egui, presented through wgpu.

mod app;
mod assets;
mod config;
mod preferences;
mod render;
mod scene;
mod ui;
mod viewer;
mod wireframe;

fn main() {
    if let Err(err) = app::run() {
        log::error!("hangar exited with an error: {err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
