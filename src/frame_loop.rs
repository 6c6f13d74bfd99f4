// Frame loop and resize controller
//
// One `step` per displayed frame:
//   events -> pending resize -> timer/camera -> acquire -> render -> present -> count
//
// Resizes are debounced into `pending_resize` and only acted on at the start
// of a step, so nothing is rebuilt while an image is outstanding.

use crate::backend::swapchain::{Acquired, Presented};
use crate::camera::{Camera, Movement};
use crate::config::Config;
use crate::input::InputState;
use crate::platform::{is_degenerate, Key, Platform, PlatformEvent};
use crate::timing::{Clock, FrameTiming, SystemClock};
use anyhow::Result;
use ash::vk;
use std::path::Path;
use std::time::Duration;

/// Event wait per step while there is nothing to draw
pub const MINIMIZED_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// GPU-side operations the loop drives
pub trait RenderTarget {
    fn wait_idle(&mut self) -> Result<()>;

    /// Recreate presentation for `desired`; returns the negotiated extent.
    /// A zero-sized result means the surface has no area and nothing was
    /// rebuilt.
    fn recreate_swapchain(&mut self, desired: vk::Extent2D) -> Result<vk::Extent2D>;

    fn rebuild_attachments(&mut self, extent: vk::Extent2D) -> Result<()>;

    fn rebuild_framebuffers(&mut self) -> Result<()>;

    fn acquire_next(&mut self) -> Result<Acquired>;

    fn present(&mut self, image_index: u32) -> Result<Presented>;
}

/// Per-frame data handed to `Demo::render`
#[derive(Debug)]
pub struct FrameContext<'a> {
    pub image_index: u32,
    /// Frames completed before this one
    pub frame_number: u64,
    /// Duration of the previous frame in seconds
    pub frame_timer: f32,
    /// Animation timer in `[0, 1)`
    pub timer: f32,
    pub paused: bool,
    pub input: &'a InputState,
}

/// Scene-specific behavior plugged into the loop
pub trait Demo<T: RenderTarget> {
    /// Called once before the first frame.
    fn prepare(&mut self, _target: &mut T) -> Result<()> {
        Ok(())
    }

    /// Record and submit work rendering into `frame.image_index`.
    fn render(&mut self, target: &mut T, frame: &FrameContext) -> Result<()>;

    /// Swapchain, attachments and framebuffers were rebuilt at `width`x`height`.
    fn on_resized(&mut self, _target: &mut T, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn on_file_dropped(&mut self, _path: &Path) {}

    fn on_key(&mut self, _key: Key) {}

    fn camera(&mut self) -> Option<&mut dyn Camera> {
        None
    }
}

/// What a single `step` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// Zero-sized window, nothing drawn
    Minimized,
    /// No image acquired; recreation queued for the next step
    Stale,
    TimedOut,
    Closed,
}

/// Loop-level settings taken from `Config`
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub title: String,
    pub gpu_name: String,
    pub show_fps: bool,
    pub timer_speed: f32,
}

impl LoopSettings {
    pub fn from_config(config: &Config, gpu_name: impl Into<String>) -> Self {
        Self {
            title: config.window.title.clone(),
            gpu_name: gpu_name.into(),
            show_fps: config.debug.show_fps,
            timer_speed: config.graphics.timer_speed,
        }
    }
}

pub fn window_title(title: &str, gpu_name: &str, fps: u32) -> String {
    format!("{} - {} - {} fps", title, gpu_name, fps)
}

pub struct FrameLoop<P, T, D, C = SystemClock>
where
    P: Platform,
    T: RenderTarget,
    D: Demo<T>,
    C: Clock,
{
    // Demo resources reference the target's device, so the demo drops first
    demo: D,
    target: T,
    platform: P,
    clock: C,
    settings: LoopSettings,
    timing: FrameTiming,
    input: InputState,
    pending_resize: Option<vk::Extent2D>,
    minimized: bool,
    prepared: bool,
    events: Vec<PlatformEvent>,
}

impl<P, T, D> FrameLoop<P, T, D, SystemClock>
where
    P: Platform,
    T: RenderTarget,
    D: Demo<T>,
{
    pub fn new(platform: P, target: T, demo: D, settings: LoopSettings) -> Self {
        Self::with_clock(platform, target, demo, settings, SystemClock)
    }
}

impl<P, T, D, C> FrameLoop<P, T, D, C>
where
    P: Platform,
    T: RenderTarget,
    D: Demo<T>,
    C: Clock,
{
    pub fn with_clock(platform: P, target: T, demo: D, settings: LoopSettings, clock: C) -> Self {
        let timing = FrameTiming::new(settings.timer_speed);
        Self {
            demo,
            target,
            platform,
            clock,
            settings,
            timing,
            input: InputState::new(),
            pending_resize: None,
            minimized: false,
            prepared: false,
            events: Vec::new(),
        }
    }

    /// Run until the platform reports close, then wait for the device.
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering frame loop");
        loop {
            if self.step()? == FrameOutcome::Closed {
                break;
            }
        }
        self.target.wait_idle()?;
        log::info!("Frame loop finished after {} frames", self.timing.total_frames());
        Ok(())
    }

    /// One loop iteration.
    pub fn step(&mut self) -> Result<FrameOutcome> {
        if !self.prepared {
            self.demo.prepare(&mut self.target)?;
            self.prepared = true;
        }

        let frame_start = self.clock.now();

        self.pump_events()?;
        if self.platform.close_requested() {
            return Ok(FrameOutcome::Closed);
        }

        if let Some(extent) = self.pending_resize {
            if is_degenerate(extent) || !self.handle_resize(extent)? {
                self.set_minimized();
                return Ok(FrameOutcome::Minimized);
            }
        }

        if let Some(delta_time) = self.timing.advance() {
            let pad = self.input.gamepad;
            if let Some(camera) = self.demo.camera() {
                camera.update(delta_time);
                if pad.is_active() {
                    camera.update_pad(pad.axis_left, pad.axis_right, delta_time);
                }
            }
        }

        let image_index = match self.target.acquire_next()? {
            Acquired::Image(index) => index,
            Acquired::Stale => {
                self.pending_resize = Some(self.platform.framebuffer_extent());
                return Ok(FrameOutcome::Stale);
            }
            Acquired::TimedOut => {
                log::debug!("Image acquisition timed out");
                return Ok(FrameOutcome::TimedOut);
            }
        };

        let frame = FrameContext {
            image_index,
            frame_number: self.timing.total_frames(),
            frame_timer: self.timing.frame_timer(),
            timer: self.timing.timer(),
            paused: self.timing.is_paused(),
            input: &self.input,
        };
        self.demo.render(&mut self.target, &frame)?;

        if self.target.present(image_index)? == Presented::Stale {
            self.pending_resize = Some(self.platform.framebuffer_extent());
        }

        let elapsed = self.clock.now().saturating_duration_since(frame_start);
        if let Some(fps) = self.timing.end_frame(elapsed) {
            log::debug!("{} fps", fps);
            if self.settings.show_fps {
                let title = window_title(&self.settings.title, &self.settings.gpu_name, fps);
                self.platform.set_title(&title);
            }
        }

        Ok(FrameOutcome::Rendered)
    }

    fn pump_events(&mut self) -> Result<()> {
        let timeout = if self.minimized {
            MINIMIZED_POLL_TIMEOUT
        } else {
            Duration::ZERO
        };
        let mut events = std::mem::take(&mut self.events);
        self.platform.poll_events(&mut events, timeout)?;
        for event in events.drain(..) {
            self.handle_event(event);
        }
        self.events = events;
        Ok(())
    }

    fn handle_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Resized(extent) => self.pending_resize = Some(extent),
            PlatformEvent::CloseRequested => self.platform.request_close(),
            PlatformEvent::Key { key, pressed } => self.handle_key(key, pressed),
            PlatformEvent::MouseButton { button, pressed } => {
                self.input.set_button(button, pressed);
            }
            PlatformEvent::CursorMoved(position) => {
                let delta = self.input.cursor_moved(position);
                if let Some(camera) = self.demo.camera() {
                    self.input.drag_camera(camera, delta);
                }
            }
            PlatformEvent::MouseWheel(wheel) => {
                if let Some(camera) = self.demo.camera() {
                    self.input.scroll_camera(camera, wheel);
                }
            }
            PlatformEvent::Gamepad {
                axis_left,
                axis_right,
            } => {
                self.input.gamepad.axis_left = axis_left;
                self.input.gamepad.axis_right = axis_right;
            }
            PlatformEvent::FileDropped(path) => self.demo.on_file_dropped(&path),
        }
    }

    fn handle_key(&mut self, key: Key, pressed: bool) {
        let movement = match key {
            Key::W => Some(Movement::Forward),
            Key::S => Some(Movement::Back),
            Key::A => Some(Movement::Left),
            Key::D => Some(Movement::Right),
            _ => None,
        };
        if let Some(movement) = movement {
            if let Some(camera) = self.demo.camera() {
                camera.set_movement(movement, pressed);
            }
        }

        if !pressed {
            return;
        }
        match key {
            Key::Escape => self.platform.request_close(),
            Key::P => {
                let paused = self.timing.toggle_pause();
                log::info!("{}", if paused { "Paused" } else { "Resumed" });
            }
            _ => {}
        }
        self.demo.on_key(key);
    }

    fn set_minimized(&mut self) {
        if !self.minimized {
            log::debug!("Window minimized, rendering suspended");
        }
        self.minimized = true;
    }

    /// Rebuild everything sized to the surface. `false` when the surface
    /// turned out to have no area; the resize then stays pending.
    fn handle_resize(&mut self, desired: vk::Extent2D) -> Result<bool> {
        log::debug!("Resizing to {}x{}", desired.width, desired.height);

        self.target.wait_idle()?;
        let extent = self.target.recreate_swapchain(desired)?;
        if is_degenerate(extent) {
            return Ok(false);
        }
        self.target.rebuild_attachments(extent)?;
        self.target.rebuild_framebuffers()?;

        self.pending_resize = None;
        self.minimized = false;

        self.demo
            .on_resized(&mut self.target, extent.width, extent.height)?;
        Ok(true)
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn demo(&self) -> &D {
        &self.demo
    }

    pub fn demo_mut(&mut self) -> &mut D {
        &mut self.demo
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn pending_resize(&self) -> Option<vk::Extent2D> {
        self.pending_resize
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }
}
