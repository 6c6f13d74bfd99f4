// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with optional validation + diagnostic sink
// - Presentation surface for the window
// - Physical device selection (prefer discrete GPU)
// - Logical device + graphics/present queue
// - Command pool, pipeline cache, descriptor pool, memory allocator
//
// Every failure here is an environment problem the demo cannot work around,
// so errors propagate straight out of `new`.

use crate::config::Config;
use crate::error::FatalError;
use anyhow::{Context, Result};
use ash::extensions::{
    ext::DebugUtils,
    khr::{Surface, Swapchain},
};
use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Preferred depth formats, best first
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 5] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
    vk::Format::D16_UNORM,
];

/// Generous pool so demos never run dry on a handful of materials
const DESCRIPTOR_POOL_SIZES: [(vk::DescriptorType, u32); 4] = [
    (vk::DescriptorType::UNIFORM_BUFFER, 128),
    (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 128),
    (vk::DescriptorType::STORAGE_BUFFER, 64),
    (vk::DescriptorType::STORAGE_IMAGE, 32),
];
const DESCRIPTOR_POOL_MAX_SETS: u32 = 256;

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    // Vulkan handles (destroyed in reverse creation order by Drop)
    allocator: Mutex<Option<Allocator>>,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    _entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    // Presentation surface (outlives every swapchain)
    pub surface: vk::SurfaceKHR,
    pub surface_loader: Surface,

    // Pools shared by every demo
    pub command_pool: vk::CommandPool,
    pub pipeline_cache: vk::PipelineCache,
    pub descriptor_pool: vk::DescriptorPool,

    // Diagnostic sink, resolved once; None when validation is off or missing
    diagnostics: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,

    // Device properties (cached for performance)
    pub properties: vk::PhysicalDeviceProperties,
    pub enabled_features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub depth_format: vk::Format,
    pub usable_sample_counts: vk::SampleCountFlags,
}

impl VulkanDevice {
    /// Create the device context for a window.
    pub fn new(
        config: &Config,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", config.window.title);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Resolve the diagnostic sink before the instance exists
        let enable_diagnostics =
            config.debug.validation_layers && Self::diagnostics_available(&entry);

        // Step 3: Create instance
        let instance = Self::create_instance(
            &entry,
            &config.window.title,
            display_handle,
            enable_diagnostics,
        )?;

        let diagnostics = if enable_diagnostics {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        // Step 4: Surface
        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
        }
        .context("Failed to create window surface")?;
        let surface_loader = Surface::new(&entry, &instance);

        // Step 5: Pick physical device (GPU)
        let (physical_device, graphics_queue_family) = Self::pick_physical_device(
            &instance,
            &surface_loader,
            surface,
            config.graphics.gpu,
        )?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let supported_features = unsafe { instance.get_physical_device_features(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::info!("Selected GPU: {}", device_name(&properties));
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        // Step 6: Create logical device
        let enabled_features = enabled_features(&supported_features);
        let (device, graphics_queue) = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            &enabled_features,
        )?;

        // Step 7: Pools and cache
        let command_pool = Self::create_command_pool(&device, graphics_queue_family)?;
        let pipeline_cache = unsafe {
            device.create_pipeline_cache(&vk::PipelineCacheCreateInfo::builder(), None)
        }
        .context("Failed to create pipeline cache")?;
        let descriptor_pool = Self::create_descriptor_pool(&device)?;

        // Step 8: Create memory allocator
        let allocator = Self::create_allocator(&instance, physical_device, &device)?;

        // Step 9: Formats and sample counts the attachments will need
        let depth_format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            let props =
                unsafe { instance.get_physical_device_format_properties(physical_device, format) };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })?;
        let usable_sample_counts = properties.limits.framebuffer_color_sample_counts
            & properties.limits.framebuffer_depth_sample_counts;

        log::info!("Depth format: {:?}", depth_format);
        log::debug!("Usable sample counts: {:?}", usable_sample_counts);

        Ok(Arc::new(Self {
            allocator: Mutex::new(Some(allocator)),
            device,
            physical_device,
            instance,
            _entry: entry,
            graphics_queue,
            graphics_queue_family,
            surface,
            surface_loader,
            command_pool,
            pipeline_cache,
            descriptor_pool,
            diagnostics,
            properties,
            enabled_features,
            memory_properties,
            depth_format,
            usable_sample_counts,
        }))
    }

    /// Names of every GPU the loader can see, in enumeration order.
    pub fn enumerate_gpus() -> Result<Vec<String>> {
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;
        let app_info = vk::ApplicationInfo::builder().api_version(vk::API_VERSION_1_2);
        let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        let names = unsafe { instance.enumerate_physical_devices() }
            .map(|devices| {
                devices
                    .into_iter()
                    .map(|device| {
                        let props = unsafe { instance.get_physical_device_properties(device) };
                        format!("{} ({:?})", device_name(&props), props.device_type)
                    })
                    .collect::<Vec<_>>()
            })
            .context("Failed to enumerate physical devices");

        unsafe { instance.destroy_instance(None) };
        names
    }

    fn diagnostics_available(entry: &Entry) -> bool {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let extensions =
            unsafe { entry.enumerate_instance_extension_properties(None) }.unwrap_or_default();

        let layer_names: Vec<&CStr> = layers
            .iter()
            .map(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) })
            .collect();
        let extension_names: Vec<&CStr> = extensions
            .iter()
            .map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) })
            .collect();

        let available = layer_names.contains(&VALIDATION_LAYER)
            && extension_names.contains(&DebugUtils::name());
        if !available {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation or VK_EXT_debug_utils is missing; diagnostics disabled");
        }
        available
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_diagnostics: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = c"vkframe";

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        // Surface extensions for whatever window system we're on
        let mut extensions = ash_window::enumerate_required_extensions(display_handle)
            .context("Window system has no Vulkan surface support")?
            .to_vec();
        if enable_diagnostics {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_diagnostics {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to register debug messenger")?;

        log::info!("Validation layers enabled");
        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
        requested: Option<usize>,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        let candidates = devices
            .iter()
            .map(|&device| {
                let props = unsafe { instance.get_physical_device_properties(device) };
                let families =
                    unsafe { instance.get_physical_device_queue_family_properties(device) };
                let queue_family = find_queue_family(&families, |index| unsafe {
                    surface_loader
                        .get_physical_device_surface_support(device, index, surface)
                        .unwrap_or(false)
                });
                let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
                    .unwrap_or_default();
                let supports_swapchain = extensions.iter().any(|ext| {
                    (unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }) == Swapchain::name()
                });

                DeviceCandidate {
                    name: device_name(&props),
                    device_type: props.device_type,
                    queue_family,
                    supports_swapchain,
                }
            })
            .collect::<Vec<_>>();

        for (index, candidate) in candidates.iter().enumerate() {
            log::info!(
                "GPU {}: {} ({:?}){}",
                index,
                candidate.name,
                candidate.device_type,
                if candidate.is_suitable() { "" } else { " [unsuitable]" }
            );
        }

        let index = select_device(&candidates, requested)?;
        let queue_family = candidates[index]
            .queue_family
            .ok_or(FatalError::NoSuitableDevice)?;

        Ok((devices[index], queue_family))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extensions = [Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok((device, graphics_queue))
    }

    fn create_command_pool(device: &ash::Device, queue_family: u32) -> Result<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")
    }

    fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
        let pool_sizes = DESCRIPTOR_POOL_SIZES
            .iter()
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty,
                descriptor_count,
            })
            .collect::<Vec<_>>();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTOR_POOL_MAX_SETS)
            .pool_sizes(&pool_sizes);

        unsafe { device.create_descriptor_pool(&pool_info, None) }
            .context("Failed to create descriptor pool")
    }

    fn create_allocator(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Result<Allocator> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("Failed to create memory allocator")?;

        Ok(allocator)
    }

    /// Run `f` with exclusive access to the memory allocator.
    pub fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator) -> Result<R>) -> Result<R> {
        let mut guard = self.allocator.lock();
        let allocator = guard.as_mut().context("Memory allocator already destroyed")?;
        f(allocator)
    }

    /// Whether validation output is being forwarded to the log
    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics.is_some()
    }

    pub fn name(&self) -> String {
        device_name(&self.properties)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }

    /// Find a memory type index matching `type_filter` with `properties`
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32, FatalError> {
        find_memory_type(&self.memory_properties, type_filter, properties)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Allocator frees its memory blocks through the device, so it goes first
        drop(self.allocator.lock().take());

        // Cleanup in reverse order
        unsafe {
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_pipeline_cache(self.pipeline_cache, None);
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);

            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((debug_utils, messenger)) = self.diagnostics.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// What bootstrap knows about a physical device when choosing one
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Queue family with graphics + present support, if any
    pub queue_family: Option<u32>,
    pub supports_swapchain: bool,
}

impl DeviceCandidate {
    pub fn is_suitable(&self) -> bool {
        self.queue_family.is_some() && self.supports_swapchain
    }
}

/// Choose a device: the requested index, else the first suitable discrete
/// GPU, else the first suitable device.
pub fn select_device(
    candidates: &[DeviceCandidate],
    requested: Option<usize>,
) -> Result<usize, FatalError> {
    if candidates.is_empty() {
        return Err(FatalError::NoDevice);
    }

    if let Some(index) = requested {
        let candidate = candidates.get(index).ok_or(FatalError::GpuIndexOutOfRange {
            requested: index,
            available: candidates.len(),
        })?;
        return if candidate.is_suitable() {
            Ok(index)
        } else {
            Err(FatalError::NoSuitableDevice)
        };
    }

    let suitable = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.is_suitable())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    suitable
        .iter()
        .copied()
        .find(|&index| candidates[index].device_type == vk::PhysicalDeviceType::DISCRETE_GPU)
        .or_else(|| suitable.first().copied())
        .ok_or(FatalError::NoSuitableDevice)
}

/// First queue family that can both draw and present
pub fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, props)| props.queue_count > 0)
        .map(|(index, props)| (index as u32, props))
        .find(|&(index, props)| {
            props.queue_flags.contains(vk::QueueFlags::GRAPHICS) && supports_present(index)
        })
        .map(|(index, _)| index)
}

/// First candidate usable as an optimal-tiling depth/stencil attachment
pub fn select_depth_format(
    candidates: &[vk::Format],
    supports_depth_attachment: impl Fn(vk::Format) -> bool,
) -> Result<vk::Format, FatalError> {
    candidates
        .iter()
        .copied()
        .find(|&format| supports_depth_attachment(format))
        .ok_or(FatalError::NoDepthFormat)
}

/// Largest supported sample count not above `requested`
pub fn clamp_sample_count(requested: u32, supported: vk::SampleCountFlags) -> vk::SampleCountFlags {
    const COUNTS: [(u32, vk::SampleCountFlags); 7] = [
        (64, vk::SampleCountFlags::TYPE_64),
        (32, vk::SampleCountFlags::TYPE_32),
        (16, vk::SampleCountFlags::TYPE_16),
        (8, vk::SampleCountFlags::TYPE_8),
        (4, vk::SampleCountFlags::TYPE_4),
        (2, vk::SampleCountFlags::TYPE_2),
        (1, vk::SampleCountFlags::TYPE_1),
    ];

    COUNTS
        .iter()
        .find(|&&(count, flag)| count <= requested && supported.contains(flag))
        .map(|&(_, flag)| flag)
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Optional features turned on whenever the GPU has them
pub fn enabled_features(supported: &vk::PhysicalDeviceFeatures) -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures {
        sampler_anisotropy: supported.sampler_anisotropy,
        fill_mode_non_solid: supported.fill_mode_non_solid,
        wide_lines: supported.wide_lines,
        ..Default::default()
    }
}

pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32, FatalError> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            let has_type = (type_filter & (1 << i)) != 0;
            let has_properties = memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties);
            has_type && has_properties
        })
        .ok_or(FatalError::NoMemoryType {
            type_filter,
            properties,
        })
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!(target: "vulkan", "{}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!(target: "vulkan", "{}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!(target: "vulkan", "{}", message);
        }
        _ => {
            log::debug!(target: "vulkan", "{}", message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(device_type: vk::PhysicalDeviceType, suitable: bool) -> DeviceCandidate {
        DeviceCandidate {
            name: format!("{:?}", device_type),
            device_type,
            queue_family: suitable.then_some(0),
            supports_swapchain: true,
        }
    }

    #[test]
    fn discrete_gpu_wins_when_present() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, true),
        ];
        assert_eq!(select_device(&candidates, None).unwrap(), 1);
    }

    #[test]
    fn first_suitable_device_otherwise() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, false),
            candidate(vk::PhysicalDeviceType::CPU, true),
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
        ];
        assert_eq!(select_device(&candidates, None).unwrap(), 1);
    }

    #[test]
    fn no_devices_is_fatal() {
        assert!(matches!(select_device(&[], None), Err(FatalError::NoDevice)));
        let unsuitable = [candidate(vk::PhysicalDeviceType::DISCRETE_GPU, false)];
        assert!(matches!(
            select_device(&unsuitable, None),
            Err(FatalError::NoSuitableDevice)
        ));
    }

    #[test]
    fn requested_index_is_honored_or_rejected() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, true),
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
        ];
        assert_eq!(select_device(&candidates, Some(1)).unwrap(), 1);
        assert!(matches!(
            select_device(&candidates, Some(5)),
            Err(FatalError::GpuIndexOutOfRange { requested: 5, available: 2 })
        ));
    }

    #[test]
    fn missing_swapchain_extension_is_unsuitable() {
        let mut only = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, true);
        only.supports_swapchain = false;
        assert!(matches!(
            select_device(&[only], None),
            Err(FatalError::NoSuitableDevice)
        ));
    }

    #[test]
    fn queue_family_needs_graphics_and_present() {
        let family = |flags| vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        };
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(find_queue_family(&families, |_| true), Some(1));
        assert_eq!(find_queue_family(&families, |i| i == 2), Some(2));
        assert_eq!(find_queue_family(&families, |_| false), None);
    }

    #[test]
    fn depth_format_prefers_earlier_candidates() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |f| {
            f == vk::Format::D24_UNORM_S8_UINT || f == vk::Format::D16_UNORM
        })
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn no_depth_format_is_fatal() {
        assert!(matches!(
            select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| false),
            Err(FatalError::NoDepthFormat)
        ));
    }

    #[test]
    fn sample_count_clamps_to_supported() {
        let supported = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4;
        assert_eq!(clamp_sample_count(4, supported), vk::SampleCountFlags::TYPE_4);
        assert_eq!(clamp_sample_count(8, supported), vk::SampleCountFlags::TYPE_4);
        assert_eq!(clamp_sample_count(3, supported), vk::SampleCountFlags::TYPE_2);
        assert_eq!(clamp_sample_count(1, supported), vk::SampleCountFlags::TYPE_1);
        assert_eq!(clamp_sample_count(0, supported), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn memory_type_matches_filter_and_flags() {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        props.memory_types[2].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let coherent =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&props, 0b111, coherent).unwrap(), 2);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            1
        );
        assert!(matches!(
            find_memory_type(&props, 0b001, coherent),
            Err(FatalError::NoMemoryType { .. })
        ));
    }

    #[test]
    fn optional_features_follow_support() {
        let supported = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            geometry_shader: vk::TRUE,
            ..Default::default()
        };
        let enabled = enabled_features(&supported);
        assert_eq!(enabled.sampler_anisotropy, vk::TRUE);
        assert_eq!(enabled.fill_mode_non_solid, vk::FALSE);
        assert_eq!(enabled.geometry_shader, vk::FALSE);
    }
}
