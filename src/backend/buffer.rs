// Buffer - host-visible GPU memory with a persistent mapping
//
// Uniform and staging data is written through a mapping kept open across
// frames. Memory calls go through `MemoryBackend` so the map/unmap/destroy
// lifecycle does not depend on a live GPU.

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;
use super::VulkanDevice;

/// Raw buffer + memory operations a `Buffer` needs
pub trait MemoryBackend {
    /// Create a buffer, allocate matching memory and bind the two.
    fn create_bound_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        size: vk::DeviceSize,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)>;

    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<NonNull<c_void>>;

    fn unmap_memory(&self, memory: vk::DeviceMemory);

    fn flush_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<()>;

    fn invalidate_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<()>;

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory);

    /// Granularity of flush/invalidate ranges on non-coherent memory
    fn non_coherent_atom_size(&self) -> vk::DeviceSize;
}

/// Size of a flush/invalidate range starting at offset 0.
///
/// Ranges must be a multiple of `atom_size` unless they reach the end of the
/// allocation, so `size` is rounded up and becomes `WHOLE_SIZE` once it would
/// cover the whole buffer.
pub fn mapped_range_size(
    size: vk::DeviceSize,
    atom_size: vk::DeviceSize,
    buffer_size: vk::DeviceSize,
) -> vk::DeviceSize {
    if size == vk::WHOLE_SIZE {
        return vk::WHOLE_SIZE;
    }
    match size.checked_next_multiple_of(atom_size.max(1)) {
        Some(rounded) if rounded < buffer_size => rounded,
        _ => vk::WHOLE_SIZE,
    }
}

impl MemoryBackend for VulkanDevice {
    fn create_bound_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        size: vk::DeviceSize,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .context("Failed to create buffer")?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index =
            match self.find_memory_type(requirements.memory_type_bits, memory_properties) {
                Ok(index) => index,
                Err(e) => {
                    unsafe { self.device.destroy_buffer(buffer, None) };
                    return Err(e.into());
                }
            };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e).context("Failed to allocate buffer memory");
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(e).context("Failed to bind buffer memory");
        }

        Ok((buffer, memory))
    }

    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<NonNull<c_void>> {
        let ptr = unsafe {
            self.device
                .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
        }
        .context("Failed to map buffer memory")?;
        NonNull::new(ptr).context("Driver returned a null mapping")
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) };
    }

    fn flush_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(memory)
            .offset(0)
            .size(size)
            .build();
        unsafe { self.device.flush_mapped_memory_ranges(&[range]) }
            .context("Failed to flush mapped memory")
    }

    fn invalidate_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> Result<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(memory)
            .offset(0)
            .size(size)
            .build();
        unsafe { self.device.invalidate_mapped_memory_ranges(&[range]) }
            .context("Failed to invalidate mapped memory")
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) {
        unsafe {
            self.device.destroy_buffer(buffer, None);
            self.device.free_memory(memory, None);
        }
    }

    fn non_coherent_atom_size(&self) -> vk::DeviceSize {
        self.properties.limits.non_coherent_atom_size
    }
}

/// A buffer with its own memory and an optional persistent mapping.
///
/// `destroy` is idempotent and also runs on drop.
pub struct Buffer<B: MemoryBackend = VulkanDevice> {
    backend: Arc<B>,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub descriptor: vk::DescriptorBufferInfo,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory_properties: vk::MemoryPropertyFlags,
    mapped: Option<NonNull<c_void>>,
}

impl<B: MemoryBackend> Buffer<B> {
    /// Allocate a buffer; with `map` the memory stays mapped until `unmap`.
    pub fn create(
        backend: Arc<B>,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        size: vk::DeviceSize,
        map: bool,
    ) -> Result<Self> {
        let (buffer, memory) = backend.create_bound_buffer(usage, memory_properties, size)?;

        let mut this = Self {
            backend,
            buffer,
            memory,
            descriptor: vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range: size,
            },
            size,
            usage,
            memory_properties,
            mapped: None,
        };

        if map {
            this.map()?;
        }

        Ok(this)
    }

    /// Map the whole buffer; returns the existing pointer if already mapped.
    pub fn map(&mut self) -> Result<NonNull<c_void>> {
        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }
        if self.is_destroyed() {
            anyhow::bail!("Cannot map a destroyed buffer");
        }
        let ptr = self.backend.map_memory(self.memory, vk::WHOLE_SIZE)?;
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    /// No-op when not mapped.
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            self.backend.unmap_memory(self.memory);
        }
    }

    pub fn mapped(&self) -> Option<NonNull<c_void>> {
        self.mapped
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn is_host_coherent(&self) -> bool {
        self.memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
    }

    /// Copy plain data to the start of the mapping.
    pub fn write<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            anyhow::bail!(
                "Write of {} bytes overflows a {}-byte buffer",
                bytes.len(),
                self.size
            );
        }
        let ptr = self.mapped.context("Buffer is not mapped")?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().cast::<u8>(), bytes.len());
        }
        Ok(())
    }

    /// Make the first `size` bytes of host writes visible to the device.
    /// Required after every write to memory without `HOST_COHERENT`.
    pub fn flush(&self, size: vk::DeviceSize) -> Result<()> {
        self.backend.flush_memory(self.memory, self.range_size(size))
    }

    pub fn flush_all(&self) -> Result<()> {
        self.flush(vk::WHOLE_SIZE)
    }

    /// Make device writes visible to the host.
    pub fn invalidate(&self, size: vk::DeviceSize) -> Result<()> {
        self.backend
            .invalidate_memory(self.memory, self.range_size(size))
    }

    fn range_size(&self, size: vk::DeviceSize) -> vk::DeviceSize {
        mapped_range_size(size, self.backend.non_coherent_atom_size(), self.size)
    }

    /// Release buffer and memory. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.unmap();
        self.backend.destroy_buffer(self.buffer, self.memory);
        self.buffer = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
        self.descriptor.buffer = vk::Buffer::null();
    }

    pub fn is_destroyed(&self) -> bool {
        self.buffer == vk::Buffer::null() && self.memory == vk::DeviceMemory::null()
    }
}

impl<B: MemoryBackend> Drop for Buffer<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}
