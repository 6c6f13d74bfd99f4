// Render pass and framebuffers
//
// One subpass that clears color and depth. With multisampling the
// multisampled color target resolves into the swapchain image.

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

/// Attachment order within the render pass and every framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLayout {
    pub color: u32,
    pub depth: u32,
    pub resolve: Option<u32>,
}

impl AttachmentLayout {
    pub fn new(samples: vk::SampleCountFlags) -> Self {
        if samples == vk::SampleCountFlags::TYPE_1 {
            Self {
                color: 0,
                depth: 1,
                resolve: None,
            }
        } else {
            Self {
                color: 0,
                depth: 2,
                resolve: Some(1),
            }
        }
    }

    pub fn count(&self) -> usize {
        if self.resolve.is_some() {
            3
        } else {
            2
        }
    }
}

pub fn create_render_pass(
    device: &VulkanDevice,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Result<vk::RenderPass> {
    let layout = AttachmentLayout::new(samples);
    let multisampled = layout.resolve.is_some();

    // Either the swapchain image or the multisampled target
    let color_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(if multisampled {
            vk::AttachmentStoreOp::DONT_CARE
        } else {
            vk::AttachmentStoreOp::STORE
        })
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(if multisampled {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::PRESENT_SRC_KHR
        })
        .build();

    let resolve_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::DONT_CARE)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let depth_attachment = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_ref = vk::AttachmentReference {
        attachment: layout.color,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: layout.depth,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_refs = layout
        .resolve
        .map(|attachment| {
            vec![vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            }]
        })
        .unwrap_or_default();

    let color_refs = [color_ref];
    let mut subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref);
    if multisampled {
        subpass = subpass.resolve_attachments(&resolve_refs);
    }
    let subpass = subpass.build();

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build();

    let attachments = if multisampled {
        vec![color_attachment, resolve_attachment, depth_attachment]
    } else {
        vec![color_attachment, depth_attachment]
    };
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.device.create_render_pass(&render_pass_info, None) }
        .context("Failed to create render pass")
}

/// Views for one framebuffer in render pass attachment order.
///
/// `color` is the multisampled target when multisampling, otherwise unused.
pub fn framebuffer_views(
    layout: AttachmentLayout,
    swapchain_view: vk::ImageView,
    color: Option<vk::ImageView>,
    depth: vk::ImageView,
) -> Result<Vec<vk::ImageView>> {
    let mut views = vec![vk::ImageView::null(); layout.count()];
    match layout.resolve {
        Some(resolve) => {
            views[layout.color as usize] =
                color.context("Multisampled pass needs a color attachment")?;
            views[resolve as usize] = swapchain_view;
        }
        None => views[layout.color as usize] = swapchain_view,
    }
    views[layout.depth as usize] = depth;
    Ok(views)
}

/// One framebuffer per swapchain image
pub fn create_framebuffers(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    layout: AttachmentLayout,
    swapchain_views: &[vk::ImageView],
    color: Option<vk::ImageView>,
    depth: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(swapchain_views.len());
    for &view in swapchain_views {
        let attachments = framebuffer_views(layout, view, color, depth)?;
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        match unsafe { device.device.create_framebuffer(&framebuffer_info, None) } {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                destroy_framebuffers(device, &mut framebuffers);
                return Err(e).context("Failed to create framebuffer");
            }
        }
    }
    Ok(framebuffers)
}

pub fn destroy_framebuffers(device: &VulkanDevice, framebuffers: &mut Vec<vk::Framebuffer>) {
    for framebuffer in framebuffers.drain(..) {
        unsafe { device.device.destroy_framebuffer(framebuffer, None) };
    }
}

/// Clear values in attachment order
pub fn clear_values(layout: AttachmentLayout, color: [f32; 4]) -> Vec<vk::ClearValue> {
    let mut values = vec![
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        };
        layout.count()
    ];
    values[layout.depth as usize] = vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue {
            depth: 1.0,
            stencil: 0,
        },
    };
    values
}
