// =============================================================================
// VKFRAME DEMO - a spinning triangle on top of the lifecycle core
// =============================================================================
//
// FLOW:
// 1. Config file + CLI overrides
// 2. Window (winit, pumped by the frame loop)
// 3. Vulkan device bootstrap
// 4. Render context: swapchain, attachments, render pass, framebuffers
// 5. Frame loop: events -> resize -> render -> present
//
// Without compiled shaders the demo still runs and just clears the screen.
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use clap::Parser;
use glam::{Mat4, Vec2, Vec3};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use vkframe::backend::shader::{self, ShaderStage};
use vkframe::backend::sync::PerSlot;
use vkframe::backend::{Buffer, RenderContext, VulkanDevice};
use vkframe::camera::{Camera, Movement};
use vkframe::config::{Args, Config};
use vkframe::platform::{is_degenerate, Key, Platform, WinitPlatform};
use vkframe::{logging, Demo, FatalError, FrameContext, FrameLoop, LoopSettings};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> ExitCode {
    let args = Args::parse();
    let (config, config_error) = Config::from_args(&args);

    logging::init_logging(&config);
    if let Some(e) = config_error {
        log::warn!("Failed to load config: {:#}. Using defaults.", e);
    }

    let result = if args.list_gpus {
        list_gpus()
    } else {
        run(config)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            log::logger().flush();
            ExitCode::FAILURE
        }
    }
}

fn list_gpus() -> Result<()> {
    let gpus = VulkanDevice::enumerate_gpus()?;
    if gpus.is_empty() {
        return Err(FatalError::NoDevice.into());
    }
    for (index, name) in gpus.iter().enumerate() {
        log::info!("GPU {}: {}", index, name);
    }
    Ok(())
}

fn run(config: Config) -> Result<()> {
    log::info!("Starting vkframe demo");

    let platform = WinitPlatform::create_window(&config.window)?;
    let device = VulkanDevice::new(
        &config,
        platform.raw_display_handle(),
        platform.raw_window_handle(),
    )?;

    let mut extent = platform.framebuffer_extent();
    if is_degenerate(extent) {
        extent = vk::Extent2D {
            width: config.window.width,
            height: config.window.height,
        };
    }

    let settings = LoopSettings::from_config(&config, device.name());
    // The device moves into the context so it is gone before the window
    let context = RenderContext::new(device, &config, extent)?;
    let demo = TriangleDemo::new(config.assets.shader_dir.clone());

    FrameLoop::new(platform, context, demo, settings).run()
}

// =============================================================================
// CAMERA
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct MovementKeys {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
}

/// Minimal look-at camera driven by mouse drags and WASD
struct DemoCamera {
    rotation: Vec3,
    position: Vec3,
    keys: MovementKeys,
    movement_speed: f32,
    rotation_speed: f32,
    aspect: f32,
}

impl DemoCamera {
    fn new(aspect: f32) -> Self {
        Self {
            rotation: Vec3::ZERO,
            position: Vec3::new(0.0, 0.0, -2.5),
            keys: MovementKeys::default(),
            movement_speed: 2.0,
            rotation_speed: 0.25,
            aspect,
        }
    }

    fn front(&self) -> Vec3 {
        let (pitch, yaw) = (self.rotation.x.to_radians(), self.rotation.y.to_radians());
        Vec3::new(
            -pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        )
        .normalize()
    }

    fn view(&self) -> Mat4 {
        let rotation = Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians());
        Mat4::from_translation(self.position) * rotation
    }

    fn projection(&self) -> Mat4 {
        let mut projection = Mat4::perspective_rh(60f32.to_radians(), self.aspect, 0.1, 256.0);
        // Vulkan clip space has Y pointing down
        projection.y_axis.y *= -1.0;
        projection
    }
}

impl Camera for DemoCamera {
    fn update(&mut self, delta_time: f32) {
        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        let step = self.movement_speed * delta_time;

        if self.keys.forward {
            self.position += front * step;
        }
        if self.keys.back {
            self.position -= front * step;
        }
        if self.keys.left {
            self.position -= right * step;
        }
        if self.keys.right {
            self.position += right * step;
        }
    }

    fn rotate(&mut self, delta: Vec3) {
        self.rotation += delta * self.rotation_speed;
    }

    fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    fn set_movement(&mut self, movement: Movement, active: bool) {
        match movement {
            Movement::Forward => self.keys.forward = active,
            Movement::Back => self.keys.back = active,
            Movement::Left => self.keys.left = active,
            Movement::Right => self.keys.right = active,
        }
    }

    fn update_pad(&mut self, axis_left: Vec2, axis_right: Vec2, delta_time: f32) -> bool {
        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        self.position += (front * -axis_left.y + right * axis_left.x)
            * self.movement_speed
            * delta_time;
        self.rotation += Vec3::new(axis_right.y, -axis_right.x, 0.0) * 90.0 * delta_time;
        axis_left != Vec2::ZERO || axis_right != Vec2::ZERO
    }
}

// =============================================================================
// TRIANGLE DEMO
// =============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    projection: Mat4,
    model: Mat4,
}

struct TrianglePipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    set_layout: vk::DescriptorSetLayout,
    /// One per frame in flight, each pointing at that frame's uniforms
    descriptor_sets: Vec<vk::DescriptorSet>,
    render_pass: vk::RenderPass,
}

impl TrianglePipeline {
    fn destroy(&self, device: &VulkanDevice) {
        unsafe {
            let _ = device
                .device
                .free_descriptor_sets(device.descriptor_pool, &self.descriptor_sets);
            device.device.destroy_pipeline(self.pipeline, None);
            device.device.destroy_pipeline_layout(self.layout, None);
            device
                .device
                .destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

struct TriangleDemo {
    shader_dir: PathBuf,
    camera: DemoCamera,
    pipeline: Option<TrianglePipeline>,
    // Rewritten every frame, so each frame in flight gets its own
    uniforms: PerSlot<Buffer>,
    device: Option<Arc<VulkanDevice>>,
}

impl TriangleDemo {
    fn new(shader_dir: PathBuf) -> Self {
        Self {
            shader_dir,
            camera: DemoCamera::new(16.0 / 9.0),
            pipeline: None,
            uniforms: PerSlot::new(),
            device: None,
        }
    }

    /// Build the pipeline; missing shaders degrade to clear-only rendering.
    fn build_pipeline(&mut self, target: &RenderContext) -> Result<()> {
        let device = target.device().clone();
        if self.uniforms.len() != target.frames_in_flight() {
            anyhow::bail!("Uniform buffers not created");
        }

        let stages = match load_stages(&device, &self.shader_dir) {
            Ok(stages) => stages,
            Err(e) => match e.downcast_ref::<FatalError>() {
                Some(FatalError::ShaderNotFound { .. }) => {
                    log::warn!("{}; rendering clear color only", e);
                    return Ok(());
                }
                _ => return Err(e),
            },
        };

        let pipeline = create_pipeline(&device, target, &self.uniforms, &stages);
        for stage in &stages {
            stage.destroy(&device);
        }
        self.pipeline = Some(pipeline?);
        Ok(())
    }

    fn destroy_pipeline(&mut self) {
        if let (Some(pipeline), Some(device)) = (self.pipeline.take(), &self.device) {
            pipeline.destroy(device);
        }
    }
}

fn load_stages(device: &VulkanDevice, dir: &Path) -> Result<Vec<ShaderStage>> {
    let vert = shader::load_shader(
        device,
        dir,
        "triangle.vert.spv",
        vk::ShaderStageFlags::VERTEX,
    )?;
    match shader::load_shader(device, dir, "triangle.frag.spv", vk::ShaderStageFlags::FRAGMENT) {
        Ok(frag) => Ok(vec![vert, frag]),
        Err(e) => {
            vert.destroy(device);
            Err(e)
        }
    }
}

fn create_pipeline(
    device: &VulkanDevice,
    target: &RenderContext,
    uniforms: &PerSlot<Buffer>,
    stages: &[ShaderStage],
) -> Result<TrianglePipeline> {
    let raw = &device.device;

    // Descriptor set: one uniform buffer for the vertex stage
    let bindings = [vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .build()];
    let set_layout = unsafe {
        raw.create_descriptor_set_layout(
            &vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings),
            None,
        )
    }
    .context("Failed to create descriptor set layout")?;

    let set_layouts = vec![set_layout; uniforms.len()];
    let descriptor_sets = unsafe {
        raw.allocate_descriptor_sets(
            &vk::DescriptorSetAllocateInfo::builder()
                .descriptor_pool(device.descriptor_pool)
                .set_layouts(&set_layouts),
        )
    }
    .context("Failed to allocate descriptor sets")?;

    let buffer_infos = uniforms
        .iter()
        .map(|buffer| [buffer.descriptor])
        .collect::<Vec<_>>();
    let writes = descriptor_sets
        .iter()
        .zip(&buffer_infos)
        .map(|(&set, info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(info)
                .build()
        })
        .collect::<Vec<_>>();
    unsafe { raw.update_descriptor_sets(&writes, &[]) };

    let set_layouts = [set_layout];
    let layout = unsafe {
        raw.create_pipeline_layout(
            &vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts),
            None,
        )
    }
    .context("Failed to create pipeline layout")?;

    let shader_stages = stages.iter().map(ShaderStage::stage_info).collect::<Vec<_>>();

    // Vertices come from gl_VertexIndex
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    // Viewport and scissor are set per frame so resizes don't need a new pipeline
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(target.sample_count());

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build()];
    let color_blending =
        vk::PipelineColorBlendStateCreateInfo::builder().attachments(&color_blend_attachments);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(target.render_pass())
        .subpass(0)
        .build();

    let pipeline = unsafe {
        raw.create_graphics_pipelines(device.pipeline_cache, &[pipeline_info], None)
    }
    .map_err(|(_, e)| e)
    .context("Failed to create graphics pipeline")?[0];

    log::info!("Triangle pipeline ready ({:?})", target.sample_count());

    Ok(TrianglePipeline {
        pipeline,
        layout,
        set_layout,
        descriptor_sets,
        render_pass: target.render_pass(),
    })
}

impl Demo<RenderContext> for TriangleDemo {
    fn prepare(&mut self, target: &mut RenderContext) -> Result<()> {
        let device = target.device().clone();
        let extent = target.extent();
        self.camera.aspect = extent.width as f32 / extent.height.max(1) as f32;

        self.uniforms.resize(
            target.frames_in_flight(),
            |_| {
                Buffer::create(
                    device.clone(),
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                    std::mem::size_of::<Uniforms>() as vk::DeviceSize,
                    true,
                )
            },
            drop,
        )?;
        self.device = Some(device);

        self.build_pipeline(target)
    }

    fn render(&mut self, target: &mut RenderContext, frame: &FrameContext) -> Result<()> {
        let angle = frame.timer * std::f32::consts::TAU;
        let data = Uniforms {
            projection: self.camera.projection(),
            model: self.camera.view() * Mat4::from_rotation_z(angle),
        };
        // The fence for this slot was waited on before acquire
        let slot = target.frame_index();
        self.uniforms
            .get_mut(slot)
            .context("No uniform buffer for frame slot")?
            .write(&[data])?;

        let cmd = target.begin_frame(frame.image_index)?;
        if let Some(pipeline) = &self.pipeline {
            let device = &target.device().device;
            unsafe {
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.layout,
                    0,
                    &pipeline.descriptor_sets[slot..=slot],
                    &[],
                );
                device.cmd_draw(cmd, 3, 1, 0, 0);
            }
        }
        target.end_frame(cmd, frame.image_index)
    }

    fn on_resized(&mut self, target: &mut RenderContext, width: u32, height: u32) -> Result<()> {
        self.camera.aspect = width as f32 / height.max(1) as f32;

        // A surface format change brings a new render pass
        let stale = self
            .pipeline
            .as_ref()
            .is_some_and(|p| p.render_pass != target.render_pass());
        if stale {
            self.destroy_pipeline();
            self.build_pipeline(target)?;
        }
        Ok(())
    }

    fn on_file_dropped(&mut self, path: &Path) {
        log::info!("Dropped file: {}", path.display());
    }

    fn on_key(&mut self, key: Key) {
        if key == Key::F1 {
            log::info!(
                "Camera at {:?}, rotation {:?}",
                self.camera.position,
                self.camera.rotation
            );
        }
    }

    fn camera(&mut self) -> Option<&mut dyn Camera> {
        Some(&mut self.camera)
    }
}

impl Drop for TriangleDemo {
    fn drop(&mut self) {
        if let Some(device) = &self.device {
            let _ = device.wait_idle();
        }
        self.destroy_pipeline();
    }
}
