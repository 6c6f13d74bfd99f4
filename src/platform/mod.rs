// Platform module - windowing capability consumed by the frame loop
//
// The core never branches on OS. `WinitPlatform` covers every desktop target
// winit supports; tests drive the loop with scripted implementations.

pub mod window;

pub use window::WinitPlatform;

use anyhow::Result;
use ash::vk;
use glam::Vec2;
use std::path::PathBuf;
use std::time::Duration;

/// Keys the core and demos react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    W,
    A,
    S,
    D,
    P,
    B,
    F,
    L,
    N,
    O,
    T,
    Space,
    KeypadAdd,
    KeypadSubtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Window-system events delivered into the frame loop
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    Resized(vk::Extent2D),
    CloseRequested,
    Key { key: Key, pressed: bool },
    MouseButton { button: MouseButton, pressed: bool },
    CursorMoved(Vec2),
    /// Wheel movement in wheel units (120 per notch)
    MouseWheel(f32),
    Gamepad { axis_left: Vec2, axis_right: Vec2 },
    FileDropped(PathBuf),
}

/// Windowing capability set
pub trait Platform {
    /// Append every pending event to `events`, waiting at most `timeout`
    /// for the first one.
    fn poll_events(&mut self, events: &mut Vec<PlatformEvent>, timeout: Duration) -> Result<()>;

    /// Current drawable size in pixels; zero while minimized.
    fn framebuffer_extent(&self) -> vk::Extent2D;

    fn request_close(&mut self);

    fn close_requested(&self) -> bool;

    fn set_title(&mut self, title: &str);
}

/// A minimized window reports a zero-sized drawable.
pub fn is_degenerate(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}
