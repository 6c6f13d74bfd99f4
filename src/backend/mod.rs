// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. `VulkanDevice` is created once and shared via
// `Arc`; everything else is owned by `RenderContext` and rebuilt on resize.

pub mod attachments;
pub mod buffer;
pub mod context;
pub mod device;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use attachments::AttachmentManager;
pub use buffer::Buffer;
pub use context::RenderContext;
pub use device::VulkanDevice;
pub use swapchain::Swapchain;
