// vkframe - device/window/swapchain lifecycle core for Vulkan demos
//
// Bootstrap (`backend::device`) -> presentation + attachments
// (`backend::context`) -> per-frame driving (`frame_loop`).

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod input;
pub mod logging;
pub mod platform;
pub mod timing;

pub use config::Config;
pub use error::FatalError;
pub use frame_loop::{Demo, FrameContext, FrameLoop, FrameOutcome, LoopSettings, RenderTarget};
