//! Input state sampled from platform events.

use crate::camera::Camera;
use crate::platform::MouseButton;
use glam::{Vec2, Vec3};

const ROTATION_SPEED: f32 = 1.0;
const ZOOM_SPEED: f32 = 1.0;
/// Wheel units per notch
pub const WHEEL_DELTA: f32 = 120.0;

/// Mouse button booleans.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

/// Left and right analog sticks.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GamepadState {
    pub axis_left: Vec2,
    pub axis_right: Vec2,
}

impl GamepadState {
    pub fn is_active(&self) -> bool {
        self.axis_left != Vec2::ZERO || self.axis_right != Vec2::ZERO
    }
}

/// Tracks the current state of mouse and gamepad input.
///
/// Mutated only by event handling in the frame loop.
#[derive(Debug, Default)]
pub struct InputState {
    pub mouse_buttons: MouseButtons,
    /// Last cursor position, the origin for drag deltas
    pub mouse_position: Vec2,
    pub gamepad: GamepadState,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.mouse_buttons.left = pressed,
            MouseButton::Right => self.mouse_buttons.right = pressed,
            MouseButton::Middle => self.mouse_buttons.middle = pressed,
        }
    }

    /// Record a new cursor position and return the drag delta
    /// (`previous - current`).
    pub fn cursor_moved(&mut self, position: Vec2) -> Vec2 {
        let delta = self.mouse_position - position;
        self.mouse_position = position;
        delta
    }

    /// Apply a drag delta to the camera according to the held buttons.
    pub fn drag_camera(&self, camera: &mut dyn Camera, delta: Vec2) {
        if self.mouse_buttons.left {
            camera.rotate(Vec3::new(
                delta.y * ROTATION_SPEED,
                -delta.x * ROTATION_SPEED,
                0.0,
            ));
        }
        if self.mouse_buttons.right {
            camera.translate(Vec3::new(0.0, 0.0, delta.y * 0.005 * ZOOM_SPEED));
        }
        if self.mouse_buttons.middle {
            camera.translate(Vec3::new(-delta.x * 0.01, -delta.y * 0.01, 0.0));
        }
    }

    /// Zoom by a wheel delta in wheel units.
    pub fn scroll_camera(&self, camera: &mut dyn Camera, wheel: f32) {
        camera.translate(Vec3::new(0.0, 0.0, wheel * 0.005 * ZOOM_SPEED));
    }
}
