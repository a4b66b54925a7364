use crate::ui::UiCommand;
use winit::keyboard::{KeyCode, PhysicalKey};

const ORBIT_RADIANS_PER_SEC: f32 = 1.5;
const KEY_ZOOM_LINES: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    None,
    Quit,
    Zoom(f32),
    Command(UiCommand),
}

/// Held arrow keys orbit the camera; everything else fires once per press,
/// ignoring key repeat.
#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub aim_left: bool,
    pub aim_right: bool,
    pub aim_up: bool,
    pub aim_down: bool,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool, repeat: bool) -> InputAction {
        let PhysicalKey::Code(code) = key else {
            return InputAction::None;
        };
        match code {
            KeyCode::ArrowLeft => self.aim_left = pressed,
            KeyCode::ArrowRight => self.aim_right = pressed,
            KeyCode::ArrowUp => self.aim_up = pressed,
            KeyCode::ArrowDown => self.aim_down = pressed,
            _ if pressed && !repeat => return action_for_key(code),
            _ => {}
        }
        InputAction::None
    }

    /// Yaw and pitch to apply for a frame lasting `dt` seconds.
    pub fn orbit_delta(&self, dt: f32) -> Option<(f32, f32)> {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        let yaw = axis(self.aim_right, self.aim_left);
        let pitch = axis(self.aim_down, self.aim_up);
        if yaw == 0.0 && pitch == 0.0 {
            return None;
        }
        let step = ORBIT_RADIANS_PER_SEC * dt;
        Some((yaw * step, pitch * step))
    }

    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}

fn action_for_key(code: KeyCode) -> InputAction {
    match code {
        KeyCode::Escape => InputAction::Quit,
        KeyCode::KeyT => InputAction::Command(UiCommand::ToggleTheme),
        KeyCode::KeyL => InputAction::Command(UiCommand::ToggleLanding),
        KeyCode::KeyM => InputAction::Command(UiCommand::ToggleMeshMode),
        KeyCode::KeyR => InputAction::Command(UiCommand::ResetCamera),
        KeyCode::KeyK => InputAction::Command(UiCommand::ToggleLock),
        KeyCode::Space => InputAction::Command(UiCommand::ToggleAutoRotate),
        KeyCode::Equal | KeyCode::NumpadAdd => InputAction::Zoom(KEY_ZOOM_LINES),
        KeyCode::Minus | KeyCode::NumpadSubtract => InputAction::Zoom(-KEY_ZOOM_LINES),
        _ => InputAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_map_to_commands_on_press_only() {
        let mut input = InputState::default();
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::KeyT), true, false),
            InputAction::Command(UiCommand::ToggleTheme)
        );
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::KeyT), false, false),
            InputAction::None
        );
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::Escape), true, false),
            InputAction::Quit
        );
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::Minus), true, false),
            InputAction::Zoom(-1.0)
        );
    }

    #[test]
    fn held_arrows_orbit_until_released() {
        let mut input = InputState::default();
        assert_eq!(input.orbit_delta(0.1), None);

        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), true, false);
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowUp), true, false);
        let (yaw, pitch) = input.orbit_delta(1.0).unwrap();
        assert!(yaw > 0.0 && pitch > 0.0);

        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), false, false);
        let (yaw, _) = input.orbit_delta(1.0).unwrap();
        assert_eq!(yaw, 0.0);

        input.release_all();
        assert_eq!(input.orbit_delta(1.0), None);
    }

    #[test]
    fn repeated_presses_fire_once() {
        let mut input = InputState::default();
        let theme = PhysicalKey::Code(KeyCode::KeyT);
        assert_eq!(
            input.handle_key(theme, true, false),
            InputAction::Command(UiCommand::ToggleTheme)
        );
        assert_eq!(input.handle_key(theme, true, true), InputAction::None);
        assert_eq!(input.handle_key(theme, true, true), InputAction::None);
        assert_eq!(
            input.handle_key(PhysicalKey::Code(KeyCode::Equal), true, true),
            InputAction::None
        );

        input.handle_key(PhysicalKey::Code(KeyCode::ArrowRight), true, false);
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowRight), true, true);
        let (yaw, _) = input.orbit_delta(1.0).unwrap();
        assert!(yaw < 0.0);
    }
}
