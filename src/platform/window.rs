// winit-backed platform
//
// Events are pulled with `pump_app_events` so the frame loop owns the
// iteration instead of living inside `EventLoop::run_app`.

use super::{Key, MouseButton, Platform, PlatformEvent};
use crate::config::WindowConfig;
use anyhow::{Context, Result};
use ash::vk;
use glam::Vec2;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

/// How many pump rounds to wait for the OS to hand us a window
const WINDOW_CREATION_ROUNDS: u32 = 100;

pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    handler: EventCollector,
    window: Arc<Window>,
    close_requested: bool,
}

impl WinitPlatform {
    /// Create the window described by `config` and wait until it exists.
    pub fn create_window(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;

        let mut attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height));
        if config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut handler = EventCollector {
            attributes: Some(attributes),
            window: None,
            failure: None,
            events: Vec::new(),
        };

        for _ in 0..WINDOW_CREATION_ROUNDS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut handler)
            {
                anyhow::bail!("Event loop exited with code {} before the window opened", code);
            }
            if let Some(error) = handler.failure.take() {
                anyhow::bail!("Failed to create window: {}", error);
            }
            if handler.window.is_some() {
                break;
            }
        }

        let window = handler
            .window
            .clone()
            .context("Window system never delivered a window")?;

        log::info!(
            "Window: {}x{} ({})",
            config.width,
            config.height,
            if config.fullscreen { "fullscreen" } else { "windowed" }
        );

        Ok(Self {
            event_loop,
            handler,
            window,
            close_requested: false,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }

    pub fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }
}

impl Platform for WinitPlatform {
    fn poll_events(&mut self, events: &mut Vec<PlatformEvent>, timeout: Duration) -> Result<()> {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.handler)
        {
            log::info!("Event loop exited with code {}", code);
            self.close_requested = true;
        }
        events.append(&mut self.handler.events);
        Ok(())
    }

    fn framebuffer_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn close_requested(&self) -> bool {
        self.close_requested
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}

/// Collects translated events between pumps and creates the window once the
/// event loop is ready for it.
struct EventCollector {
    attributes: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    failure: Option<winit::error::OsError>,
    events: Vec<PlatformEvent>,
}

impl ApplicationHandler for EventCollector {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Some(attributes) = self.attributes.take() {
            match event_loop.create_window(attributes) {
                Ok(window) => self.window = Some(Arc::new(window)),
                Err(e) => self.failure = Some(e),
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(event) = translate_event(event) {
            self.events.push(event);
        }
    }
}

fn translate_event(event: WindowEvent) -> Option<PlatformEvent> {
    match event {
        WindowEvent::Resized(size) => Some(PlatformEvent::Resized(vk::Extent2D {
            width: size.width,
            height: size.height,
        })),
        WindowEvent::CloseRequested => Some(PlatformEvent::CloseRequested),
        WindowEvent::KeyboardInput { event, .. } => {
            if event.repeat {
                return None;
            }
            let PhysicalKey::Code(code) = event.physical_key else {
                return None;
            };
            map_key(code).map(|key| PlatformEvent::Key {
                key,
                pressed: event.state == ElementState::Pressed,
            })
        }
        WindowEvent::MouseInput { state, button, .. } => {
            map_button(button).map(|button| PlatformEvent::MouseButton {
                button,
                pressed: state == ElementState::Pressed,
            })
        }
        WindowEvent::CursorMoved { position, .. } => Some(PlatformEvent::CursorMoved(Vec2::new(
            position.x as f32,
            position.y as f32,
        ))),
        WindowEvent::MouseWheel { delta, .. } => Some(PlatformEvent::MouseWheel(wheel_units(delta))),
        WindowEvent::DroppedFile(path) => Some(PlatformEvent::FileDropped(path)),
        _ => None,
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyT => Key::T,
        KeyCode::Space => Key::Space,
        KeyCode::NumpadAdd => Key::KeypadAdd,
        KeyCode::NumpadSubtract => Key::KeypadSubtract,
        _ => return None,
    };
    Some(key)
}

fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn wheel_units(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, lines) => lines * crate::input::WHEEL_DELTA,
        MouseScrollDelta::PixelDelta(position) => position.y as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalPosition, PhysicalSize};

    #[test]
    fn resize_and_close_translate() {
        assert_eq!(
            translate_event(WindowEvent::Resized(PhysicalSize::new(640, 480))),
            Some(PlatformEvent::Resized(vk::Extent2D { width: 640, height: 480 }))
        );
        assert_eq!(
            translate_event(WindowEvent::CloseRequested),
            Some(PlatformEvent::CloseRequested)
        );
    }

    #[test]
    fn dropped_file_keeps_path() {
        let path = std::path::PathBuf::from("/tmp/scene.gltf");
        assert_eq!(
            translate_event(WindowEvent::DroppedFile(path.clone())),
            Some(PlatformEvent::FileDropped(path))
        );
    }

    #[test]
    fn uninteresting_events_are_dropped() {
        assert_eq!(translate_event(WindowEvent::Focused(true)), None);
    }

    #[test]
    fn key_mapping() {
        assert_eq!(map_key(KeyCode::KeyP), Some(Key::P));
        assert_eq!(map_key(KeyCode::Escape), Some(Key::Escape));
        assert_eq!(map_key(KeyCode::NumpadAdd), Some(Key::KeypadAdd));
        assert_eq!(map_key(KeyCode::KeyZ), None);
    }

    #[test]
    fn wheel_lines_become_wheel_units() {
        assert_eq!(wheel_units(MouseScrollDelta::LineDelta(0.0, 1.0)), 120.0);
        assert_eq!(
            wheel_units(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0))),
            -30.0
        );
        assert_eq!(map_button(winit::event::MouseButton::Back), None);
    }
}
