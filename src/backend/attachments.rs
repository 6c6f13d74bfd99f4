// Attachments - depth and multisample render targets
//
// Sized to the swapchain and rebuilt with it. Memory comes from the shared
// gpu-allocator as GpuOnly allocations.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use super::VulkanDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Multisampled color, resolved into the swapchain image
    Color,
    Depth,
}

/// Description of one attachment image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub kind: AttachmentKind,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// Attachments needed at `extent` with `samples` per pixel.
///
/// Single-sampled rendering only needs depth. Multisampling adds a color
/// target; both multisampled images are transient since only the resolved
/// color survives the pass.
pub fn plan_attachments(
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Vec<AttachmentSpec> {
    let multisampled = samples != vk::SampleCountFlags::TYPE_1;
    let transient = if multisampled {
        vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
    } else {
        vk::ImageUsageFlags::empty()
    };

    let mut specs = Vec::with_capacity(2);
    if multisampled {
        specs.push(AttachmentSpec {
            kind: AttachmentKind::Color,
            format: color_format,
            extent,
            samples,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | transient,
            aspect: vk::ImageAspectFlags::COLOR,
        });
    }
    specs.push(AttachmentSpec {
        kind: AttachmentKind::Depth,
        format: depth_format,
        extent,
        samples,
        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | transient,
        aspect: depth_aspect(depth_format),
    });
    specs
}

/// Depth formats with a stencil component need both aspects on the view
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

struct Attachment {
    spec: AttachmentSpec,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

/// Owns the depth (and multisample color) attachments for the swapchain.
pub struct AttachmentManager {
    device: Arc<VulkanDevice>,
    color_format: vk::Format,
    attachments: Vec<Attachment>,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
}

impl AttachmentManager {
    /// Empty manager; nothing is allocated until `rebuild`.
    pub fn new(device: Arc<VulkanDevice>, color_format: vk::Format) -> Self {
        Self {
            device,
            color_format,
            attachments: Vec::new(),
            extent: vk::Extent2D::default(),
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }

    /// Swapchain color format changed with a recreation.
    pub fn set_color_format(&mut self, format: vk::Format) {
        self.color_format = format;
    }

    /// Destroy current attachments and allocate new ones at `extent`.
    pub fn rebuild(&mut self, extent: vk::Extent2D, samples: vk::SampleCountFlags) -> Result<()> {
        self.destroy();

        let specs = plan_attachments(extent, samples, self.color_format, self.device.depth_format);
        for spec in specs {
            let attachment = self.create_attachment(spec)?;
            self.attachments.push(attachment);
        }

        self.extent = extent;
        self.samples = samples;

        log::debug!(
            "Rebuilt {} attachment(s) at {}x{} ({:?})",
            self.attachments.len(),
            extent.width,
            extent.height,
            samples
        );
        Ok(())
    }

    fn create_attachment(&self, spec: AttachmentSpec) -> Result<Attachment> {
        let device = &self.device.device;

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(spec.format)
            .extent(vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(spec.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }
            .context("Failed to create attachment image")?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let name = match spec.kind {
            AttachmentKind::Color => "msaa color attachment",
            AttachmentKind::Depth => "depth attachment",
        };

        let allocation = self.device.with_allocator(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .context("Failed to allocate attachment memory")
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut attachment = Attachment {
            spec,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
        };

        let bound = attachment
            .allocation
            .as_ref()
            .map(|a| unsafe { device.bind_image_memory(image, a.memory(), a.offset()) });
        if let Some(Err(e)) = bound {
            self.release(&mut attachment);
            return Err(e).context("Failed to bind attachment memory");
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(spec.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: spec.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => attachment.view = view,
            Err(e) => {
                self.release(&mut attachment);
                return Err(e).context("Failed to create attachment view");
            }
        }

        Ok(attachment)
    }

    fn release(&self, attachment: &mut Attachment) {
        unsafe {
            if attachment.view != vk::ImageView::null() {
                self.device.device.destroy_image_view(attachment.view, None);
            }
            self.device.device.destroy_image(attachment.image, None);
        }
        if let Some(allocation) = attachment.allocation.take() {
            let freed = self.device.with_allocator(|allocator| {
                allocator
                    .free(allocation)
                    .context("Failed to free attachment memory")
            });
            if let Err(e) = freed {
                log::warn!("{:#}", e);
            }
        }
    }

    pub fn destroy(&mut self) {
        let mut attachments = std::mem::take(&mut self.attachments);
        for attachment in &mut attachments {
            self.release(attachment);
        }
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    fn view_of(&self, kind: AttachmentKind) -> Option<vk::ImageView> {
        self.attachments
            .iter()
            .find(|a| a.spec.kind == kind)
            .map(|a| a.view)
    }

    /// Multisample color view, present only when multisampling
    pub fn color_view(&self) -> Option<vk::ImageView> {
        self.view_of(AttachmentKind::Color)
    }

    pub fn depth_view(&self) -> Option<vk::ImageView> {
        self.view_of(AttachmentKind::Depth)
    }

    pub fn images(&self) -> impl Iterator<Item = (AttachmentKind, vk::Image)> + '_ {
        self.attachments.iter().map(|a| (a.spec.kind, a.image))
    }
}

impl Drop for AttachmentManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn single_sample_is_depth_only() {
        let specs = plan_attachments(
            EXTENT,
            vk::SampleCountFlags::TYPE_1,
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
        );
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, AttachmentKind::Depth);
        assert_eq!(specs[0].usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(specs[0].aspect, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn multisample_adds_transient_color() {
        let specs = plan_attachments(
            EXTENT,
            vk::SampleCountFlags::TYPE_4,
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D24_UNORM_S8_UINT,
        );
        assert_eq!(specs.len(), 2);

        let color = specs[0];
        assert_eq!(color.kind, AttachmentKind::Color);
        assert_eq!(color.format, vk::Format::B8G8R8A8_SRGB);
        assert!(color.usage.contains(vk::ImageUsageFlags::TRANSIENT_ATTACHMENT));

        let depth = specs[1];
        assert_eq!(depth.samples, vk::SampleCountFlags::TYPE_4);
        assert!(depth.usage.contains(
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
        ));
        assert_eq!(
            depth.aspect,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn every_attachment_matches_extent() {
        let resized = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let specs = plan_attachments(
            resized,
            vk::SampleCountFlags::TYPE_8,
            vk::Format::B8G8R8A8_UNORM,
            vk::Format::D32_SFLOAT,
        );
        assert!(specs.iter().all(|s| s.extent == resized));
    }
}
