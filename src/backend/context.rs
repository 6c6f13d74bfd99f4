// Render context - everything a demo renders through
//
// Owns presentation, attachments, render pass, framebuffers, per-frame
// command buffers and synchronization on top of a shared `VulkanDevice`.
// The frame loop drives it through `RenderTarget`.

use crate::config::Config;
use crate::frame_loop::RenderTarget;
use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::attachments::AttachmentManager;
use super::device::clamp_sample_count;
use super::render_pass::{self, AttachmentLayout};
use super::swapchain::{Acquired, PresentState, Presented, Swapchain};
use super::sync::{self, FramesInFlight, PerSlot};
use super::VulkanDevice;
use crate::platform::is_degenerate;

pub struct RenderContext {
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    render_pass: vk::RenderPass,
    layout: AttachmentLayout,
    sample_count: vk::SampleCountFlags,
    clear_color: [f32; 4],
    // Presentation waits on these, so one per swapchain image
    render_finished: PerSlot<vk::Semaphore>,
    frames: FramesInFlight,
    attachments: AttachmentManager,
    swapchain: Swapchain,
    // Dropped last
    device: Arc<VulkanDevice>,
}

impl RenderContext {
    pub fn new(device: Arc<VulkanDevice>, config: &Config, extent: vk::Extent2D) -> Result<Self> {
        let sample_count =
            clamp_sample_count(config.requested_samples(), device.usable_sample_counts);
        if config.graphics.multisampling && sample_count == vk::SampleCountFlags::TYPE_1 {
            log::warn!("Multisampling requested but unsupported, rendering single-sampled");
        }
        log::info!("Sample count: {:?}", sample_count);

        let swapchain = Swapchain::new(device.clone(), extent, config.graphics.vsync)?;

        let mut attachments = AttachmentManager::new(device.clone(), swapchain.format);
        attachments.rebuild(swapchain.extent, sample_count)?;

        let frames = FramesInFlight::new(device.clone(), config.max_frames_in_flight())?;

        let mut render_finished = PerSlot::new();
        render_finished.resize(
            swapchain.images.len(),
            |_| sync::create_semaphore(&device),
            |semaphore| unsafe { device.device.destroy_semaphore(semaphore, None) },
        )?;

        let layout = AttachmentLayout::new(sample_count);
        let render_pass = match render_pass::create_render_pass(
            &device,
            swapchain.format,
            device.depth_format,
            sample_count,
        ) {
            Ok(render_pass) => render_pass,
            Err(e) => {
                render_finished.clear(|semaphore| unsafe {
                    device.device.destroy_semaphore(semaphore, None)
                });
                return Err(e);
            }
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(device.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames.len() as u32);
        let command_buffers = match unsafe { device.device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers,
            Err(e) => {
                unsafe { device.device.destroy_render_pass(render_pass, None) };
                render_finished.clear(|semaphore| unsafe {
                    device.device.destroy_semaphore(semaphore, None)
                });
                return Err(e).context("Failed to allocate command buffers");
            }
        };

        let mut context = Self {
            framebuffers: Vec::new(),
            command_buffers,
            render_pass,
            layout,
            sample_count,
            clear_color: config.graphics.clear_color,
            render_finished,
            frames,
            attachments,
            swapchain,
            device,
        };
        context.rebuild_framebuffers()?;

        Ok(context)
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_views.len()
    }

    pub fn presentation_state(&self) -> PresentState {
        self.swapchain.state()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn sample_count(&self) -> vk::SampleCountFlags {
        self.sample_count
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Slot in `0..frames_in_flight()` of the frame being recorded. Per-frame
    /// host data (uniform buffers, descriptor sets) is indexed by it.
    pub fn frame_index(&self) -> usize {
        self.frames.index()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Command buffer for the current frame in flight
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffers[self.frames.index()]
    }

    /// Start recording into the current command buffer and begin the render
    /// pass on `image_index`'s framebuffer with full-extent viewport and scissor.
    pub fn begin_frame(&self, image_index: u32) -> Result<vk::CommandBuffer> {
        let cmd = self.command_buffer();
        let framebuffer = self
            .framebuffer(image_index)
            .context("No framebuffer for acquired image")?;
        let extent = self.swapchain.extent;
        let device = &self.device.device;

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin command buffer")?;

            let clear_values = render_pass::clear_values(self.layout, self.clear_color);
            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(
                cmd,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                }],
            );
        }

        Ok(cmd)
    }

    /// End the render pass and submit the frame rendering `image_index`.
    pub fn end_frame(&mut self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()> {
        unsafe {
            self.device.device.cmd_end_render_pass(cmd);
            self.device
                .device
                .end_command_buffer(cmd)
                .context("Failed to end command buffer")?;
        }
        self.submit(cmd, image_index)
    }

    /// Submit `cmd`: waits for the acquired image, signals the image's
    /// render-finished semaphore and the frame's fence.
    pub fn submit(&mut self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()> {
        let render_finished = self.render_finished_for(image_index)?;
        self.frames.reset_current()?;
        let sync = self.frames.current();

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info],
                sync.in_flight_fence,
            )
        }
        .context("Failed to submit frame")
    }

    fn render_finished_for(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .copied()
            .with_context(|| format!("No render-finished semaphore for image {}", image_index))
    }

    fn destroy_framebuffers(&mut self) {
        render_pass::destroy_framebuffers(&self.device, &mut self.framebuffers);
    }
}

impl RenderTarget for RenderContext {
    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    fn recreate_swapchain(&mut self, desired: vk::Extent2D) -> Result<vk::Extent2D> {
        // A surface with no area keeps everything as it is
        let surface_extent = self.swapchain.surface_extent(desired)?;
        if is_degenerate(surface_extent) {
            return Ok(surface_extent);
        }

        // Framebuffers reference the views about to be destroyed
        self.destroy_framebuffers();

        let old_format = self.swapchain.format;
        let extent = self.swapchain.recreate(desired)?;
        if is_degenerate(extent) {
            return Ok(extent);
        }

        let device = self.device.clone();
        self.render_finished.resize(
            self.swapchain.images.len(),
            |_| sync::create_semaphore(&device),
            |semaphore| unsafe { device.device.destroy_semaphore(semaphore, None) },
        )?;

        if self.swapchain.format != old_format {
            log::info!(
                "Surface format changed {:?} -> {:?}",
                old_format,
                self.swapchain.format
            );
            let render_pass = render_pass::create_render_pass(
                &self.device,
                self.swapchain.format,
                self.device.depth_format,
                self.sample_count,
            )?;
            unsafe {
                self.device
                    .device
                    .destroy_render_pass(self.render_pass, None)
            };
            self.render_pass = render_pass;
        }

        Ok(extent)
    }

    fn rebuild_attachments(&mut self, extent: vk::Extent2D) -> Result<()> {
        self.attachments.set_color_format(self.swapchain.format);
        self.attachments.rebuild(extent, self.sample_count)
    }

    fn rebuild_framebuffers(&mut self) -> Result<()> {
        self.destroy_framebuffers();

        let depth = self
            .attachments
            .depth_view()
            .context("Depth attachment missing")?;
        self.framebuffers = render_pass::create_framebuffers(
            &self.device,
            self.render_pass,
            self.layout,
            &self.swapchain.image_views,
            self.attachments.color_view(),
            depth,
            self.swapchain.extent,
        )?;

        self.swapchain.mark_ready()
    }

    fn acquire_next(&mut self) -> Result<Acquired> {
        self.frames.wait_current()?;
        let semaphore = self.frames.current().image_available;
        self.swapchain.acquire_next(semaphore)
    }

    fn present(&mut self, image_index: u32) -> Result<Presented> {
        let render_finished = self.render_finished_for(image_index)?;
        let presented =
            self.swapchain
                .present(self.device.graphics_queue, image_index, &[render_finished])?;
        self.frames.advance();
        Ok(presented)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
        self.destroy_framebuffers();
        unsafe {
            self.device
                .device
                .free_command_buffers(self.device.command_pool, &self.command_buffers);
            self.device
                .device
                .destroy_render_pass(self.render_pass, None);
        }
        let device = self.device.clone();
        self.render_finished
            .clear(|semaphore| unsafe { device.device.destroy_semaphore(semaphore, None) });
    }
}
