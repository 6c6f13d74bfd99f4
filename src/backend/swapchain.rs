// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Negotiation is split into pure functions over the surface queries so every
// choice can be tested without a driver. Presentation order is enforced by
// `PresentTracker`:
//
//   Uninitialized -> Configured -> Ready -> (Acquired <-> Ready) -> ...
//                                    Stale -> (recreate) -> Configured

use crate::error::FatalError;
use crate::platform::is_degenerate;
use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use std::time::Duration;
use super::VulkanDevice;

/// Upper bound on a single acquire
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(250);

/// Presentation state. `Acquired` carries the outstanding image index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentState {
    Uninitialized,
    Configured,
    Ready,
    Acquired(u32),
    Stale,
}

/// Result of `acquire_next`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Image(u32),
    /// Surface changed; recreate before trying again
    Stale,
    TimedOut,
}

/// Result of `present`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    Done,
    Stale,
}

/// Enforces acquire/present/recreate ordering.
#[derive(Debug)]
pub struct PresentTracker {
    state: PresentState,
}

impl Default for PresentTracker {
    fn default() -> Self {
        Self {
            state: PresentState::Uninitialized,
        }
    }
}

impl PresentTracker {
    pub fn state(&self) -> PresentState {
        self.state
    }

    pub fn configured(&mut self) {
        self.state = PresentState::Configured;
    }

    pub fn mark_ready(&mut self) -> Result<(), FatalError> {
        match self.state {
            PresentState::Configured | PresentState::Ready => {
                self.state = PresentState::Ready;
                Ok(())
            }
            state => Err(FatalError::PresentOrder {
                operation: "mark ready",
                state,
            }),
        }
    }

    /// `Ok(false)` means the surface is already stale and the driver must
    /// not be asked for an image.
    pub fn begin_acquire(&self) -> Result<bool, FatalError> {
        match self.state {
            PresentState::Ready => Ok(true),
            PresentState::Stale => Ok(false),
            state => Err(FatalError::PresentOrder {
                operation: "acquire",
                state,
            }),
        }
    }

    pub fn finish_acquire(&mut self, result: Acquired) {
        match result {
            Acquired::Image(index) => self.state = PresentState::Acquired(index),
            Acquired::Stale => self.state = PresentState::Stale,
            Acquired::TimedOut => {}
        }
    }

    pub fn begin_present(&self, image_index: u32) -> Result<(), FatalError> {
        match self.state {
            PresentState::Acquired(index) if index == image_index => Ok(()),
            state => Err(FatalError::PresentOrder {
                operation: "present",
                state,
            }),
        }
    }

    pub fn finish_present(&mut self, result: Presented) {
        self.state = match result {
            Presented::Done => PresentState::Ready,
            Presented::Stale => PresentState::Stale,
        };
    }

    pub fn begin_recreate(&self) -> Result<(), FatalError> {
        match self.state {
            PresentState::Acquired(_) => Err(FatalError::PresentOrder {
                operation: "recreate",
                state: self.state,
            }),
            _ => Ok(()),
        }
    }
}

/// Everything negotiated against the surface for one swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

pub fn negotiate(
    caps: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    desired: vk::Extent2D,
    vsync: bool,
) -> Result<SwapchainConfig, FatalError> {
    Ok(SwapchainConfig {
        surface_format: choose_surface_format(formats)?,
        present_mode: choose_present_mode(present_modes, vsync),
        extent: choose_extent(caps, desired),
        image_count: choose_image_count(caps),
        pre_transform: choose_pre_transform(caps),
        composite_alpha: choose_composite_alpha(caps),
    })
}

/// Prefer B8G8R8A8_SRGB / sRGB-nonlinear, else the first reported format.
/// A lone UNDEFINED entry means the surface has no preference.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, FatalError> {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return Ok(vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: only.color_space,
            });
        }
    }

    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
        .ok_or(FatalError::NoSurfaceFormat)
}

// FIFO: vsync, guaranteed available
// MAILBOX: no vsync, no tearing
// IMMEDIATE: no vsync, may tear
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: desired
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: desired
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 = unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&flag| caps.supported_composite_alpha.contains(flag))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    vsync: bool,
    tracker: PresentTracker,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// Configure presentation for the device's surface.
    pub fn new(device: Arc<VulkanDevice>, desired: vk::Extent2D, vsync: bool) -> Result<Self> {
        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&device.instance, &device.device);

        let mut this = Self {
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: desired,
            vsync,
            tracker: PresentTracker::default(),
            device,
        };
        let extent = this.build(desired)?;
        if is_degenerate(extent) {
            anyhow::bail!(
                "Surface has no drawable area ({}x{})",
                extent.width,
                extent.height
            );
        }
        Ok(this)
    }

    pub fn state(&self) -> PresentState {
        self.tracker.state()
    }

    /// Framebuffers for the current images exist.
    pub fn mark_ready(&mut self) -> Result<()> {
        self.tracker.mark_ready()?;
        Ok(())
    }

    /// Replace the swapchain, e.g. after a resize or a stale present.
    ///
    /// Returns the negotiated extent. A zero-sized one means the surface has
    /// no area right now and the current swapchain was left untouched.
    pub fn recreate(&mut self, desired: vk::Extent2D) -> Result<vk::Extent2D> {
        self.tracker.begin_recreate()?;
        self.build(desired)
    }

    /// Extent a swapchain created now for `desired` would get.
    pub fn surface_extent(&self, desired: vk::Extent2D) -> Result<vk::Extent2D> {
        let caps = unsafe {
            self.device
                .surface_loader
                .get_physical_device_surface_capabilities(
                    self.device.physical_device,
                    self.device.surface,
                )
        }
        .context("Failed to query surface capabilities")?;
        Ok(choose_extent(&caps, desired))
    }

    fn build(&mut self, desired: vk::Extent2D) -> Result<vk::Extent2D> {
        let device = self.device.clone();
        let physical_device = device.physical_device;
        let surface = device.surface;

        // Query surface capabilities, formats and present modes
        let (caps, formats, present_modes) = unsafe {
            let loader = &device.surface_loader;
            (
                loader
                    .get_physical_device_surface_capabilities(physical_device, surface)
                    .context("Failed to query surface capabilities")?,
                loader
                    .get_physical_device_surface_formats(physical_device, surface)
                    .context("Failed to query surface formats")?,
                loader
                    .get_physical_device_surface_present_modes(physical_device, surface)
                    .context("Failed to query present modes")?,
            )
        };

        let config = negotiate(&caps, &formats, &present_modes, desired, self.vsync)?;
        if is_degenerate(config.extent) {
            log::debug!(
                "Surface extent is {}x{}, keeping the current swapchain",
                config.extent.width,
                config.extent.height
            );
            return Ok(config.extent);
        }

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.present_mode,
            config.image_count
        );

        let old_swapchain = self.swapchain;

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(config.pre_transform)
            .composite_alpha(config.composite_alpha)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        // The old chain is retired; its views and handle go now, the surface stays
        self.destroy_views();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .context("Failed to get swapchain images")?;

        log::debug!("Swapchain has {} images", self.images.len());

        self.image_views = self
            .images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(config.surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.device.create_image_view(&create_info, None) }
                    .context("Failed to create image view")
            })
            .collect::<Result<Vec<_>>>()?;

        self.format = config.surface_format.format;
        self.color_space = config.surface_format.color_space;
        self.present_mode = config.present_mode;
        self.extent = config.extent;
        self.tracker.configured();

        Ok(config.extent)
    }

    /// Acquire the next image, waiting at most `ACQUIRE_TIMEOUT`.
    pub fn acquire_next(&mut self, semaphore: vk::Semaphore) -> Result<Acquired> {
        if !self.tracker.begin_acquire()? {
            return Ok(Acquired::Stale);
        }

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                ACQUIRE_TIMEOUT.as_nanos() as u64,
                semaphore,
                vk::Fence::null(),
            )
        };

        let acquired = match result {
            // Suboptimal still hands out a usable image; present reports it
            Ok((index, _suboptimal)) => Acquired::Image(index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Acquired::Stale,
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Acquired::TimedOut,
            Err(e) => return Err(e).context("Failed to acquire swapchain image"),
        };

        self.tracker.finish_acquire(acquired);
        Ok(acquired)
    }

    /// Present the outstanding image once `wait_semaphores` signal.
    pub fn present(
        &mut self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<Presented> {
        self.tracker.begin_present(image_index)?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };

        let presented = match result {
            Ok(false) => Presented::Done,
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Presented::Stale,
            Err(e) => return Err(e).context("Failed to present swapchain image"),
        };

        self.tracker.finish_present(presented);
        Ok(presented)
    }

    fn destroy_views(&mut self) {
        for view in self.image_views.drain(..) {
            unsafe { self.device.device.destroy_image_view(view, None) };
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
