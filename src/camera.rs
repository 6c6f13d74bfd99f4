//! Camera collaborator seam.
//!
//! The camera math lives with each demo; the frame loop only feeds it frame
//! time and input.

use glam::{Vec2, Vec3};

/// Movement keys a first-person camera reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Forward,
    Back,
    Left,
    Right,
}

pub trait Camera {
    /// Integrate movement over `delta_time` seconds.
    fn update(&mut self, delta_time: f32);

    fn rotate(&mut self, delta: Vec3);

    fn translate(&mut self, delta: Vec3);

    fn set_movement(&mut self, movement: Movement, active: bool);

    /// Gamepad-driven update. Returns true if the view changed.
    fn update_pad(&mut self, _axis_left: Vec2, _axis_right: Vec2, _delta_time: f32) -> bool {
        false
    }
}
