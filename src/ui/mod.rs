pub mod contact;

use crate::preferences::Theme;
use crate::viewer::Viewer;
use contact::ContactForm;
use egui::{Align2, Color32, RichText};
use std::time::Instant;

/// Discrete user intents produced by the panels and keyboard shortcuts.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    SelectModel(String),
    NudgePosition([f32; 3]),
    NudgeScale(f32),
    ToggleAutoRotate,
    SetRotationSpeed(f32),
    ToggleMeshMode,
    SetMeshOpacity(f32),
    SetLineDensity(f32),
    ToggleLock,
    ToggleTheme,
    ResetCamera,
    ToggleLanding,
    ToggleContact,
}

pub struct UiState {
    show_landing: bool,
    show_contact: bool,
    contact: ContactForm,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            show_landing: true,
            show_contact: false,
            contact: ContactForm::default(),
        }
    }

    #[cfg(test)]
    pub fn show_landing(&self) -> bool {
        self.show_landing
    }

    #[cfg(test)]
    pub fn show_contact(&self) -> bool {
        self.show_contact
    }

    /// Handles the commands that only affect the UI shell.
    pub fn handle(&mut self, command: &UiCommand) {
        match command {
            UiCommand::ToggleLanding => self.show_landing = !self.show_landing,
            UiCommand::ToggleContact => self.show_contact = !self.show_contact,
            _ => {}
        }
    }

    pub fn draw(&mut self, ctx: &egui::Context, viewer: &Viewer, now: Instant) -> Vec<UiCommand> {
        let mut commands = Vec::new();
        ctx.set_visuals(match viewer.theme() {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        });
        self.contact.poll(now);

        header_panel(ctx, viewer, &mut commands);
        model_panel(ctx, viewer, &mut commands);
        model_label(ctx, viewer);
        status_overlay(ctx, viewer);
        if self.show_landing {
            landing_overlay(ctx, viewer.theme());
        }
        if self.show_contact {
            let mut open = true;
            contact_window(ctx, &mut self.contact, &mut open, now);
            if !open {
                commands.push(UiCommand::ToggleContact);
            }
        }
        if self.contact.is_sending() {
            ctx.request_repaint();
        }
        commands
    }
}

fn header_panel(ctx: &egui::Context, viewer: &Viewer, commands: &mut Vec<UiCommand>) {
    egui::Window::new("GLB Model Viewer")
        .anchor(Align2::LEFT_TOP, [12.0, 12.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Reset Camera").clicked() {
                    commands.push(UiCommand::ResetCamera);
                }
                let theme_label = match viewer.theme() {
                    Theme::Dark => "Light Theme",
                    Theme::Light => "Dark Theme",
                };
                if ui.button(theme_label).clicked() {
                    commands.push(UiCommand::ToggleTheme);
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Landing Page").clicked() {
                    commands.push(UiCommand::ToggleLanding);
                }
                if ui.button("Contact").clicked() {
                    commands.push(UiCommand::ToggleContact);
                }
            });
        });
}

fn model_panel(ctx: &egui::Context, viewer: &Viewer, commands: &mut Vec<UiCommand>) {
    let controls = viewer.controls();
    let selected_id = viewer.store().selected_id();
    let settings = viewer.selected_settings();

    egui::Window::new("Model Controls")
        .anchor(Align2::RIGHT_TOP, [-12.0, 12.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            let selected_name = viewer
                .selected_descriptor()
                .map(|descriptor| descriptor.name.as_str())
                .unwrap_or(selected_id);
            egui::ComboBox::from_label("Model")
                .selected_text(selected_name)
                .show_ui(ui, |ui| {
                    for descriptor in viewer.registry().descriptors() {
                        let is_selected = descriptor.id == selected_id;
                        if ui.selectable_label(is_selected, &descriptor.name).clicked()
                            && !is_selected
                        {
                            commands.push(UiCommand::SelectModel(descriptor.id.clone()));
                        }
                    }
                });
            ui.separator();

            if ui
                .selectable_label(settings.auto_rotate, "Rotate Model")
                .clicked()
            {
                commands.push(UiCommand::ToggleAutoRotate);
            }
            let mut speed = settings.rotation_speed;
            let [speed_min, speed_max] = controls.rotation_speed_range;
            if ui
                .add(egui::Slider::new(&mut speed, speed_min..=speed_max).text("Speed"))
                .changed()
            {
                commands.push(UiCommand::SetRotationSpeed(speed));
            }

            ui.horizontal(|ui| {
                ui.label("Position");
                if ui.button("←").clicked() {
                    commands.push(UiCommand::NudgePosition([-controls.position_step, 0.0, 0.0]));
                }
                if ui.button("→").clicked() {
                    commands.push(UiCommand::NudgePosition([controls.position_step, 0.0, 0.0]));
                }
                let [x, y, z] = settings.position;
                ui.weak(format!("{x:.2}, {y:.2}, {z:.2}"));
            });
            ui.horizontal(|ui| {
                ui.label("Scale");
                if ui.button("-").clicked() {
                    commands.push(UiCommand::NudgeScale(-controls.scale_step));
                }
                if ui.button("+").clicked() {
                    commands.push(UiCommand::NudgeScale(controls.scale_step));
                }
                ui.weak(format!("{:.2}", settings.scale));
            });
            ui.separator();

            if ui
                .selectable_label(settings.mesh_mode, "Mesh Mode")
                .clicked()
            {
                commands.push(UiCommand::ToggleMeshMode);
            }
            ui.add_enabled_ui(settings.mesh_mode, |ui| {
                let mut opacity = settings.mesh_opacity;
                if ui
                    .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
                    .changed()
                {
                    commands.push(UiCommand::SetMeshOpacity(opacity));
                }
                let mut density = settings.mesh_line_density;
                let [density_min, density_max] = controls.line_density_range;
                if ui
                    .add(
                        egui::Slider::new(&mut density, density_min..=density_max)
                            .text("Line Density"),
                    )
                    .changed()
                {
                    commands.push(UiCommand::SetLineDensity(density));
                }
            });
            ui.separator();

            let lock_label = if settings.is_locked { "Unlock" } else { "Lock" };
            if ui.selectable_label(settings.is_locked, lock_label).clicked() {
                commands.push(UiCommand::ToggleLock);
            }
        });
}

fn text_color(theme: Theme) -> Color32 {
    match theme {
        Theme::Dark => Color32::WHITE,
        Theme::Light => Color32::BLACK,
    }
}

fn model_label(ctx: &egui::Context, viewer: &Viewer) {
    let Some(descriptor) = viewer.selected_descriptor() else {
        return;
    };
    egui::Area::new(egui::Id::new("model_label"))
        .anchor(Align2::LEFT_BOTTOM, [12.0, -12.0])
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::new()
                .fill(Color32::from_black_alpha(128))
                .inner_margin(egui::Margin::symmetric(8, 4))
                .corner_radius(4.0)
                .show(ui, |ui| {
                    ui.label(RichText::new(&descriptor.name).color(Color32::WHITE).strong());
                });
        });
}

fn status_overlay(ctx: &egui::Context, viewer: &Viewer) {
    let composer = viewer.composer();
    let failed: Vec<&str> = composer
        .failures()
        .map(|(instance, _)| instance.id.as_str())
        .collect();
    if !composer.is_loading() && failed.is_empty() {
        return;
    }
    egui::Area::new(egui::Id::new("status_overlay"))
        .anchor(Align2::CENTER_BOTTOM, [0.0, -48.0])
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::new()
                .fill(Color32::from_black_alpha(200))
                .inner_margin(egui::Margin::same(12))
                .corner_radius(6.0)
                .show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        if composer.is_loading() {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(
                                    RichText::new(loading_label(viewer.loading_progress()))
                                        .color(Color32::WHITE),
                                );
                            });
                        }
                        if !failed.is_empty() {
                            ui.label(
                                RichText::new("⚠ Unable to load 3D model")
                                    .color(Color32::WHITE)
                                    .strong(),
                            );
                            ui.label(
                                RichText::new(format!(
                                    "{} (check the log for details)",
                                    failed.join(", ")
                                ))
                                .color(Color32::LIGHT_GRAY)
                                .small(),
                            );
                        }
                    });
                });
        });
}

fn loading_label(progress: Option<f32>) -> String {
    match progress {
        Some(fraction) => format!("Loading Spaceship... {:.0}%", fraction * 100.0),
        None => "Loading Spaceship...".to_string(),
    }
}

fn landing_overlay(ctx: &egui::Context, theme: Theme) {
    let color = text_color(theme);
    let screen = ctx.screen_rect();
    if theme == Theme::Light {
        ctx.layer_painter(egui::LayerId::new(
            egui::Order::Background,
            egui::Id::new("landing_tint"),
        ))
        .rect_filled(screen, 0.0, Color32::from_white_alpha(77));
    }
    egui::Area::new(egui::Id::new("landing"))
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.set_max_width(screen.width().min(900.0));
            ui.label(RichText::new("Hi, i am Yash").size(56.0).strong().color(color));
            ui.add_space(24.0);
            ui.label(RichText::new("About").size(30.0).strong().color(color));
            ui.add_space(8.0);
            for line in [
                "tldr; learnt by hacking around on the internet.",
                "i like technology and deep science. they make a dent in the universe.",
                "i deeply study art, history, football and great books.",
            ] {
                ui.label(RichText::new(line).size(18.0).color(color));
            }
            ui.add_space(24.0);
            ui.label(RichText::new("Projects").size(30.0).strong().color(color));
        });
}

fn contact_window(ctx: &egui::Context, form: &mut ContactForm, open: &mut bool, now: Instant) {
    egui::Window::new("Contact")
        .open(open)
        .anchor(Align2::RIGHT_BOTTOM, [-12.0, -12.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            let sending = form.is_sending();
            ui.add_enabled_ui(!sending, |ui| {
                ui.label("Email");
                ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("you@example.com"));
                ui.label("Message");
                ui.add(egui::TextEdit::multiline(&mut form.message).desired_rows(4));
            });
            if ui
                .add_enabled(!sending, egui::Button::new(form.button_label()))
                .clicked()
            {
                form.submit(now);
            }
            if let Some(notice) = form.notice() {
                ui.label(notice);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_starts_visible_and_toggles() {
        let mut ui = UiState::new();
        assert!(ui.show_landing());
        ui.handle(&UiCommand::ToggleLanding);
        assert!(!ui.show_landing());
        ui.handle(&UiCommand::ToggleContact);
        assert!(ui.show_contact());
        ui.handle(&UiCommand::ToggleTheme);
        assert!(ui.show_contact());
    }

    #[test]
    fn loading_label_shows_percentage() {
        assert_eq!(loading_label(Some(0.426)), "Loading Spaceship... 43%");
        assert_eq!(loading_label(Some(1.0)), "Loading Spaceship... 100%");
        assert_eq!(loading_label(None), "Loading Spaceship...");
    }
}
