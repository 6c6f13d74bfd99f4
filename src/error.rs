// Fatal error taxonomy
//
// Environment-incompatibility and asset failures that abort startup.
// Transient presentation states are NOT errors; they travel as
// `Acquired::Stale` / `Presented::Stale` and are absorbed by the frame loop.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::swapchain::PresentState;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("No Vulkan-capable GPU found")]
    NoDevice,

    #[error("No GPU offers a graphics queue that can present to this window")]
    NoSuitableDevice,

    #[error("GPU index {requested} is out of range ({available} suitable devices)")]
    GpuIndexOutOfRange { requested: usize, available: usize },

    #[error("No supported depth format found")]
    NoDepthFormat,

    #[error("Surface reports no formats")]
    NoSurfaceFormat,

    #[error("No memory type matches filter {type_filter:#x} with {properties:?}")]
    NoMemoryType {
        type_filter: u32,
        properties: ash::vk::MemoryPropertyFlags,
    },

    #[error("Could not open shader file \"{name}\" at {path}")]
    ShaderNotFound { name: String, path: PathBuf },

    #[error("Cannot {operation} while presentation is {state:?}")]
    PresentOrder {
        operation: &'static str,
        state: PresentState,
    },
}
