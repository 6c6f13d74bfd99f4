// Shader module loading
//
// SPIR-V is read from disk into a buffer owned by the call; the module is
// created from it and the buffer is gone before the function returns.

use crate::error::FatalError;
use anyhow::{Context, Result};
use ash::vk;
use std::fs::File;
use std::path::Path;
use super::VulkanDevice;

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// A compiled shader module and the stage it feeds
pub struct ShaderStage {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
}

impl ShaderStage {
    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }

    pub fn destroy(&self, device: &VulkanDevice) {
        unsafe { device.device.destroy_shader_module(self.module, None) };
    }
}

/// Read a SPIR-V file into 4-byte words.
pub fn read_spirv(path: &Path, name: &str) -> Result<Vec<u32>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::error!(
                "Could not open shader file \"{}\" at {}: {}",
                name,
                path.display(),
                e
            );
            return Err(FatalError::ShaderNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
            }
            .into());
        }
    };

    ash::util::read_spv(&mut file)
        .with_context(|| format!("Shader \"{}\" is not valid SPIR-V", name))
}

/// Create a shader module from SPIR-V words
pub fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.device.create_shader_module(&create_info, None) }
        .context("Failed to create shader module")
}

/// Load `dir/name` as the shader for `stage`.
pub fn load_shader(
    device: &VulkanDevice,
    dir: &Path,
    name: &str,
    stage: vk::ShaderStageFlags,
) -> Result<ShaderStage> {
    let path = dir.join(name);
    let code = read_spirv(&path, name)?;
    let module = create_shader_module(device, &code)?;
    log::debug!("Loaded shader {} ({} words)", path.display(), code.len());
    Ok(ShaderStage { module, stage })
}
