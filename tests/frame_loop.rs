// Frame loop behavior against scripted collaborators; no GPU needed.

use anyhow::Result;
use ash::vk;
use glam::{Vec2, Vec3};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use vkframe::backend::attachments::{plan_attachments, AttachmentKind, AttachmentSpec};
use vkframe::backend::swapchain::{choose_image_count, Acquired, Presented};
use vkframe::camera::{Camera, Movement};
use vkframe::frame_loop::MINIMIZED_POLL_TIMEOUT;
use vkframe::input::InputState;
use vkframe::platform::{is_degenerate, Key, MouseButton, Platform, PlatformEvent};
use vkframe::timing::Clock;
use vkframe::{Demo, FrameContext, FrameLoop, FrameOutcome, LoopSettings, RenderTarget};

const FRAME_TIME: Duration = Duration::from_millis(250);

fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

// -----------------------------------------------------------------------------
// Clock
// -----------------------------------------------------------------------------

#[derive(Clone)]
struct ManualClock(Rc<Cell<Instant>>);

impl ManualClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

// -----------------------------------------------------------------------------
// Platform
// -----------------------------------------------------------------------------

/// Event batches handed out one per poll; shared so a demo can inject
/// events while a frame is in progress.
type EventScript = Rc<RefCell<VecDeque<Vec<PlatformEvent>>>>;

struct ScriptedPlatform {
    script: EventScript,
    extent: vk::Extent2D,
    close_requested: bool,
    titles: Vec<String>,
    /// Timeout passed to each poll
    timeouts: Vec<Duration>,
}

impl ScriptedPlatform {
    fn new(extent: vk::Extent2D) -> (Self, EventScript) {
        let script = EventScript::default();
        let platform = Self {
            script: script.clone(),
            extent,
            close_requested: false,
            titles: Vec::new(),
            timeouts: Vec::new(),
        };
        (platform, script)
    }
}

impl Platform for ScriptedPlatform {
    fn poll_events(&mut self, events: &mut Vec<PlatformEvent>, timeout: Duration) -> Result<()> {
        self.timeouts.push(timeout);
        if let Some(batch) = self.script.borrow_mut().pop_front() {
            for event in &batch {
                if let PlatformEvent::Resized(size) = event {
                    self.extent = *size;
                }
            }
            events.extend(batch);
        }
        Ok(())
    }

    fn framebuffer_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn close_requested(&self) -> bool {
        self.close_requested
    }

    fn set_title(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }
}

// -----------------------------------------------------------------------------
// Render target
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    WaitIdle,
    Recreate(vk::Extent2D),
    Attachments(vk::Extent2D),
    Framebuffers,
    Acquire,
    Present(u32),
}

const COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Surface that reports its own size and allows 2..=3 images
fn surface_caps(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 3,
        current_extent: current,
        ..Default::default()
    }
}

struct MockTarget {
    calls: Vec<Call>,
    swap_extent: vk::Extent2D,
    attachment_extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    /// One entry per swapchain image view
    image_views: Vec<u32>,
    attachments: Vec<AttachmentSpec>,
    /// Extent the surface reports regardless of the requested one
    surface_extent: Option<vk::Extent2D>,
    next_image: u32,
    acquire_script: VecDeque<Acquired>,
    present_script: VecDeque<Presented>,
    /// (swapchain, attachment) extents seen by each present
    presented_extents: Vec<(vk::Extent2D, vk::Extent2D)>,
}

impl MockTarget {
    fn new(initial: vk::Extent2D, samples: u32) -> Self {
        let samples = vk::SampleCountFlags::from_raw(samples);
        Self {
            calls: Vec::new(),
            swap_extent: initial,
            attachment_extent: initial,
            samples,
            image_views: (0..choose_image_count(&surface_caps(initial))).collect(),
            attachments: plan_attachments(initial, samples, COLOR_FORMAT, DEPTH_FORMAT),
            surface_extent: None,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            presented_extents: Vec::new(),
        }
    }

    fn count(&self, call: fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| call(c)).count()
    }
}

impl RenderTarget for MockTarget {
    fn wait_idle(&mut self) -> Result<()> {
        self.calls.push(Call::WaitIdle);
        Ok(())
    }

    fn recreate_swapchain(&mut self, desired: vk::Extent2D) -> Result<vk::Extent2D> {
        self.calls.push(Call::Recreate(desired));
        let negotiated = self.surface_extent.unwrap_or(desired);
        if is_degenerate(negotiated) {
            return Ok(negotiated);
        }
        self.swap_extent = negotiated;
        self.image_views = (0..choose_image_count(&surface_caps(negotiated))).collect();
        Ok(negotiated)
    }

    fn rebuild_attachments(&mut self, extent: vk::Extent2D) -> Result<()> {
        self.calls.push(Call::Attachments(extent));
        self.attachment_extent = extent;
        self.attachments = plan_attachments(extent, self.samples, COLOR_FORMAT, DEPTH_FORMAT);
        Ok(())
    }

    fn rebuild_framebuffers(&mut self) -> Result<()> {
        self.calls.push(Call::Framebuffers);
        Ok(())
    }

    fn acquire_next(&mut self) -> Result<Acquired> {
        self.calls.push(Call::Acquire);
        if let Some(scripted) = self.acquire_script.pop_front() {
            return Ok(scripted);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_views.len() as u32;
        Ok(Acquired::Image(index))
    }

    fn present(&mut self, image_index: u32) -> Result<Presented> {
        self.calls.push(Call::Present(image_index));
        self.presented_extents
            .push((self.swap_extent, self.attachment_extent));
        Ok(self.present_script.pop_front().unwrap_or(Presented::Done))
    }
}

// -----------------------------------------------------------------------------
// Demo + camera
// -----------------------------------------------------------------------------

#[derive(Default)]
struct RecordingCamera {
    updates: Vec<f32>,
    rotations: Vec<Vec3>,
    translations: Vec<Vec3>,
    movement: Vec<(Movement, bool)>,
    pad_updates: u32,
}

impl Camera for RecordingCamera {
    fn update(&mut self, delta_time: f32) {
        self.updates.push(delta_time);
    }

    fn rotate(&mut self, delta: Vec3) {
        self.rotations.push(delta);
    }

    fn translate(&mut self, delta: Vec3) {
        self.translations.push(delta);
    }

    fn set_movement(&mut self, movement: Movement, active: bool) {
        self.movement.push((movement, active));
    }

    fn update_pad(&mut self, _axis_left: Vec2, _axis_right: Vec2, _delta_time: f32) -> bool {
        self.pad_updates += 1;
        true
    }
}

struct RecordingDemo {
    clock: ManualClock,
    prepared: u32,
    /// (image index, frame number, timer)
    frames: Vec<(u32, u64, f32)>,
    resized: Vec<(u32, u32)>,
    dropped: Vec<PathBuf>,
    keys: Vec<Key>,
    camera: RecordingCamera,
    /// Events pushed into the platform while the next render runs
    inject_during_render: Option<(EventScript, Vec<PlatformEvent>)>,
}

impl RecordingDemo {
    fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            prepared: 0,
            frames: Vec::new(),
            resized: Vec::new(),
            dropped: Vec::new(),
            keys: Vec::new(),
            camera: RecordingCamera::default(),
            inject_during_render: None,
        }
    }
}

impl Demo<MockTarget> for RecordingDemo {
    fn prepare(&mut self, _target: &mut MockTarget) -> Result<()> {
        self.prepared += 1;
        Ok(())
    }

    fn render(&mut self, _target: &mut MockTarget, frame: &FrameContext) -> Result<()> {
        self.frames
            .push((frame.image_index, frame.frame_number, frame.timer));
        if let Some((script, events)) = self.inject_during_render.take() {
            script.borrow_mut().push_back(events);
        }
        self.clock.advance(FRAME_TIME);
        Ok(())
    }

    fn on_resized(&mut self, _target: &mut MockTarget, width: u32, height: u32) -> Result<()> {
        self.resized.push((width, height));
        Ok(())
    }

    fn on_file_dropped(&mut self, path: &Path) {
        self.dropped.push(path.to_path_buf());
    }

    fn on_key(&mut self, key: Key) {
        self.keys.push(key);
    }

    fn camera(&mut self) -> Option<&mut dyn Camera> {
        Some(&mut self.camera)
    }
}

// -----------------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------------

type TestLoop = FrameLoop<ScriptedPlatform, MockTarget, RecordingDemo, ManualClock>;

fn settings() -> LoopSettings {
    LoopSettings {
        title: "Vulkan Example".to_string(),
        gpu_name: "Mock GPU".to_string(),
        show_fps: true,
        timer_speed: 0.25,
    }
}

fn harness(initial: vk::Extent2D, samples: u32) -> (TestLoop, EventScript) {
    let clock = ManualClock::new();
    let (platform, script) = ScriptedPlatform::new(initial);
    let target = MockTarget::new(initial, samples);
    let demo = RecordingDemo::new(clock.clone());
    let frame_loop = FrameLoop::with_clock(platform, target, demo, settings(), clock);
    (frame_loop, script)
}

fn key(key: Key, pressed: bool) -> PlatformEvent {
    PlatformEvent::Key { key, pressed }
}

fn is_rebuild(call: &Call) -> bool {
    matches!(
        call,
        Call::WaitIdle | Call::Recreate(_) | Call::Attachments(_) | Call::Framebuffers
    )
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[test]
fn five_frames_then_resize() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 4);

    for _ in 0..5 {
        assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);
    }

    let timing = frame_loop.timing();
    assert_eq!(timing.total_frames(), 5);
    // Four 250 ms frames make the first full second
    assert_eq!(timing.last_fps(), 4);
    assert_eq!(timing.frame_counter(), 1);
    assert_eq!(
        frame_loop.platform().titles,
        vec!["Vulkan Example - Mock GPU - 4 fps".to_string()]
    );
    assert_eq!(frame_loop.demo().prepared, 1);

    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::Resized(extent(640, 480))]);
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);

    let target = frame_loop.target();
    assert_eq!(
        target.presented_extents.last(),
        Some(&(extent(640, 480), extent(640, 480)))
    );
    assert_eq!(frame_loop.demo().resized, vec![(640, 480)]);

    // One view per negotiated image
    assert_eq!(
        target.image_views.len(),
        choose_image_count(&surface_caps(extent(640, 480))) as usize
    );
    assert_eq!(target.image_views.len(), 3);

    // Multisampled color and depth, rebuilt at the new size
    let color = target
        .attachments
        .iter()
        .find(|a| a.kind == AttachmentKind::Color)
        .expect("multisampled color attachment");
    let depth = target
        .attachments
        .iter()
        .find(|a| a.kind == AttachmentKind::Depth)
        .expect("depth attachment");
    for attachment in [color, depth] {
        assert_eq!(attachment.samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(attachment.extent, extent(640, 480));
        assert!(attachment
            .usage
            .contains(vk::ImageUsageFlags::TRANSIENT_ATTACHMENT));
    }

    let tail = &target.calls[target.calls.len() - 6..];
    assert_eq!(
        tail,
        &[
            Call::WaitIdle,
            Call::Recreate(extent(640, 480)),
            Call::Attachments(extent(640, 480)),
            Call::Framebuffers,
            Call::Acquire,
            Call::Present(2),
        ]
    );
}

#[test]
fn resize_events_are_debounced() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script.borrow_mut().push_back(vec![
        PlatformEvent::Resized(extent(1000, 700)),
        PlatformEvent::Resized(extent(900, 600)),
        PlatformEvent::Resized(extent(800, 500)),
    ]);

    frame_loop.step().unwrap();

    let target = frame_loop.target();
    assert_eq!(target.count(|c| matches!(c, Call::Recreate(_))), 1);
    assert!(target.calls.contains(&Call::Recreate(extent(800, 500))));
    assert_eq!(frame_loop.demo().resized, vec![(800, 500)]);

    // Single-sampled: depth only
    assert_eq!(target.attachments.len(), 1);
    assert_eq!(target.attachments[0].kind, AttachmentKind::Depth);
    assert_eq!(target.attachments[0].extent, extent(800, 500));
}

#[test]
fn no_rebuild_between_acquire_and_present() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 4);
    frame_loop.step().unwrap();

    // The resize shows up while the frame is being rendered
    frame_loop.demo_mut().inject_during_render = Some((
        script.clone(),
        vec![PlatformEvent::Resized(extent(640, 480))],
    ));
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();

    let calls = &frame_loop.target().calls;
    let mut outstanding = false;
    for call in calls {
        match call {
            Call::Acquire => outstanding = true,
            Call::Present(_) => outstanding = false,
            other if is_rebuild(other) => assert!(!outstanding, "{:?} while image outstanding", other),
            _ => {}
        }
    }

    // The in-progress frame was presented at the old size
    let target = frame_loop.target();
    assert_eq!(target.presented_extents[1], (extent(1280, 720), extent(1280, 720)));
    assert_eq!(target.presented_extents[2], (extent(640, 480), extent(640, 480)));
    assert_eq!(frame_loop.demo().resized, vec![(640, 480)]);
}

#[test]
fn minimized_window_skips_until_restored() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 4);
    frame_loop.step().unwrap();
    let calls_before = frame_loop.target().calls.len();

    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::Resized(extent(0, 0))]);
    for _ in 0..4 {
        assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Minimized);
    }
    assert!(frame_loop.is_minimized());
    // Nothing was torn down or touched while minimized
    assert_eq!(frame_loop.target().calls.len(), calls_before);
    assert_eq!(frame_loop.demo().frames.len(), 1);

    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::Resized(extent(800, 600))]);
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);
    assert!(!frame_loop.is_minimized());
    assert!(frame_loop
        .target()
        .calls
        .contains(&Call::Recreate(extent(800, 600))));
    assert_eq!(frame_loop.demo().resized, vec![(800, 600)]);

    // Event waits are bounded while minimized instead of spinning
    frame_loop.step().unwrap();
    let timeouts = &frame_loop.platform().timeouts;
    assert_eq!(timeouts.len(), 7);
    assert_eq!(&timeouts[..2], &[Duration::ZERO, Duration::ZERO]);
    assert!(timeouts[2..6].iter().all(|&t| t == MINIMIZED_POLL_TIMEOUT));
    assert_eq!(timeouts[6], Duration::ZERO);
}

#[test]
fn surface_without_area_defers_resize() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 4);
    frame_loop.step().unwrap();

    // Minimized between the resize event and the surface query
    frame_loop.target_mut().surface_extent = Some(extent(0, 0));
    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::Resized(extent(800, 600))]);
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Minimized);
    assert!(frame_loop.is_minimized());
    assert_eq!(frame_loop.pending_resize(), Some(extent(800, 600)));

    let target = frame_loop.target();
    assert_eq!(
        &target.calls[target.calls.len() - 2..],
        &[Call::WaitIdle, Call::Recreate(extent(800, 600))]
    );
    assert_eq!(target.count(|c| matches!(c, Call::Attachments(_))), 0);
    assert_eq!(target.count(|c| matches!(c, Call::Framebuffers)), 0);
    assert_eq!(target.attachment_extent, extent(1280, 720));
    assert!(target.attachments.iter().all(|a| a.extent == extent(1280, 720)));
    assert!(frame_loop.demo().resized.is_empty());
    assert_eq!(frame_loop.demo().frames.len(), 1);

    // Surface has area again: the pending resize goes through
    frame_loop.target_mut().surface_extent = None;
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);
    assert!(!frame_loop.is_minimized());
    assert_eq!(frame_loop.pending_resize(), None);
    assert_eq!(frame_loop.target().attachment_extent, extent(800, 600));
    assert_eq!(frame_loop.demo().resized, vec![(800, 600)]);
}

#[test]
fn one_zero_dimension_is_minimized() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::Resized(extent(1280, 0))]);
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Minimized);
    assert!(frame_loop.target().calls.is_empty());
}

#[test]
fn stale_acquire_recreates_next_step() {
    let (mut frame_loop, _script) = harness(extent(1280, 720), 4);
    frame_loop
        .target_mut()
        .acquire_script
        .push_back(Acquired::Stale);

    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Stale);
    assert_eq!(frame_loop.pending_resize(), Some(extent(1280, 720)));
    assert!(frame_loop.demo().frames.is_empty());
    assert_eq!(frame_loop.target().count(|c| matches!(c, Call::Present(_))), 0);

    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);
    assert_eq!(frame_loop.pending_resize(), None);
    assert_eq!(
        frame_loop.target().count(|c| matches!(c, Call::Recreate(_))),
        1
    );
}

#[test]
fn stale_present_recreates_next_step() {
    let (mut frame_loop, _script) = harness(extent(1280, 720), 4);
    frame_loop
        .target_mut()
        .present_script
        .push_back(Presented::Stale);

    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Rendered);
    assert_eq!(frame_loop.pending_resize(), Some(extent(1280, 720)));
    assert_eq!(frame_loop.timing().total_frames(), 1);

    frame_loop.step().unwrap();
    assert_eq!(frame_loop.pending_resize(), None);
    assert_eq!(
        frame_loop.target().count(|c| matches!(c, Call::Recreate(_))),
        1
    );
    assert_eq!(frame_loop.demo().resized, vec![(1280, 720)]);
}

#[test]
fn timed_out_acquire_skips_frame() {
    let (mut frame_loop, _script) = harness(extent(1280, 720), 1);
    frame_loop
        .target_mut()
        .acquire_script
        .push_back(Acquired::TimedOut);

    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::TimedOut);
    assert!(frame_loop.demo().frames.is_empty());
    assert_eq!(frame_loop.pending_resize(), None);
    assert_eq!(frame_loop.timing().total_frames(), 0);
}

#[test]
fn escape_closes_and_run_waits_idle() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script.borrow_mut().push_back(vec![]);
    script.borrow_mut().push_back(vec![]);
    script.borrow_mut().push_back(vec![key(Key::Escape, true)]);

    frame_loop.run().unwrap();

    assert!(frame_loop.platform().close_requested);
    assert_eq!(frame_loop.demo().frames.len(), 2);
    assert_eq!(frame_loop.target().calls.last(), Some(&Call::WaitIdle));
}

#[test]
fn close_request_stops_loop() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::CloseRequested]);
    assert_eq!(frame_loop.step().unwrap(), FrameOutcome::Closed);
    assert!(frame_loop.demo().frames.is_empty());
}

#[test]
fn pause_freezes_timer_and_camera() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();
    let updates_before = frame_loop.demo().camera.updates.len();
    assert_eq!(updates_before, 2);

    script.borrow_mut().push_back(vec![key(Key::P, true)]);
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();

    let demo = frame_loop.demo();
    assert_eq!(demo.camera.updates.len(), updates_before);
    let (_, _, paused_timer) = demo.frames[2];
    let (_, _, later_timer) = demo.frames[3];
    assert_eq!(paused_timer, later_timer);
    assert!(frame_loop.timing().is_paused());
    // Frames are still counted while paused
    assert_eq!(frame_loop.timing().total_frames(), 4);
    assert_eq!(demo.keys, vec![Key::P]);
}

#[test]
fn timer_advances_by_previous_frame() {
    let (mut frame_loop, _script) = harness(extent(1280, 720), 1);
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();

    let demo = frame_loop.demo();
    assert_eq!(demo.camera.updates, vec![0.0, 0.25, 0.25]);
    // 0.25 speed * 0.25 s per frame
    let (_, _, timer) = demo.frames[2];
    assert!((timer - 0.125).abs() < 1e-6);
    assert_eq!(demo.frames[2].1, 2);
}

#[test]
fn input_drives_camera() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script.borrow_mut().push_back(vec![
        PlatformEvent::CursorMoved(Vec2::new(100.0, 100.0)),
        PlatformEvent::MouseButton {
            button: MouseButton::Left,
            pressed: true,
        },
        PlatformEvent::CursorMoved(Vec2::new(90.0, 120.0)),
        PlatformEvent::MouseWheel(120.0),
        key(Key::W, true),
        key(Key::W, false),
    ]);
    frame_loop.step().unwrap();

    let camera = &frame_loop.demo().camera;
    assert_eq!(camera.rotations.last(), Some(&Vec3::new(-20.0, -10.0, 0.0)));
    assert_eq!(camera.translations.len(), 1);
    assert!(camera.translations[0].abs_diff_eq(Vec3::new(0.0, 0.0, 0.6), 1e-6));
    assert_eq!(
        camera.movement,
        vec![(Movement::Forward, true), (Movement::Forward, false)]
    );

    let input: &InputState = frame_loop.input();
    assert!(input.mouse_buttons.left);
    assert_eq!(input.mouse_position, Vec2::new(90.0, 120.0));
}

#[test]
fn gamepad_feeds_camera_while_active() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    frame_loop.step().unwrap();
    assert_eq!(frame_loop.demo().camera.pad_updates, 0);

    script.borrow_mut().push_back(vec![PlatformEvent::Gamepad {
        axis_left: Vec2::new(0.5, 0.0),
        axis_right: Vec2::ZERO,
    }]);
    frame_loop.step().unwrap();
    frame_loop.step().unwrap();
    assert_eq!(frame_loop.demo().camera.pad_updates, 2);
}

#[test]
fn dropped_files_reach_demo() {
    let (mut frame_loop, script) = harness(extent(1280, 720), 1);
    script
        .borrow_mut()
        .push_back(vec![PlatformEvent::FileDropped(PathBuf::from("scene.gltf"))]);
    frame_loop.step().unwrap();
    assert_eq!(
        frame_loop.demo().dropped,
        vec![PathBuf::from("scene.gltf")]
    );
}
