// Synchronization primitives
//
// One image-available semaphore + fence per frame in flight. The fence is
// waited before acquiring and reset only when work is actually submitted, so
// a skipped frame never leaves it unsignaled. Render-finished semaphores are
// waited on by presentation and belong to a swapchain image, not a frame.

use ash::vk;
use anyhow::{Context, Result};
use std::sync::Arc;
use super::VulkanDevice;

pub fn create_semaphore(device: &VulkanDevice) -> Result<vk::Semaphore> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    unsafe { device.device.create_semaphore(&semaphore_info, None) }
        .context("Failed to create semaphore")
}

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        let image_available = create_semaphore(device)?;
        let in_flight_fence = match unsafe { device.device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.device.destroy_semaphore(image_available, None) };
                return Err(e).context("Failed to create fence");
            }
        };

        Ok(Self {
            image_available,
            in_flight_fence,
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// One `T` per index: per swapchain image or per frame in flight.
#[derive(Debug)]
pub struct PerSlot<T> {
    items: Vec<T>,
}

impl<T> Default for PerSlot<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> PerSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow or shrink to `count`. Surviving items keep their index; if
    /// `create` fails, items created by this call are destroyed again.
    pub fn resize(
        &mut self,
        count: usize,
        mut create: impl FnMut(usize) -> Result<T>,
        mut destroy: impl FnMut(T),
    ) -> Result<()> {
        while self.items.len() > count {
            if let Some(item) = self.items.pop() {
                destroy(item);
            }
        }

        let start = self.items.len();
        while self.items.len() < count {
            match create(self.items.len()) {
                Ok(item) => self.items.push(item),
                Err(e) => {
                    for item in self.items.drain(start..) {
                        destroy(item);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self, destroy: impl FnMut(T)) {
        self.items.drain(..).for_each(destroy);
    }
}

/// Round-robin over `max_frames_in_flight` sync sets
pub struct FramesInFlight {
    device: Arc<VulkanDevice>,
    frames: Vec<FrameSync>,
    current: usize,
}

impl FramesInFlight {
    pub fn new(device: Arc<VulkanDevice>, count: usize) -> Result<Self> {
        let mut frames = Vec::with_capacity(count.max(1));
        for _ in 0..count.max(1) {
            match FrameSync::new(&device) {
                Ok(sync) => frames.push(sync),
                Err(e) => {
                    for sync in &frames {
                        sync.destroy(&device.device);
                    }
                    return Err(e);
                }
            }
        }
        log::debug!("{} frame(s) in flight", frames.len());
        Ok(Self {
            device,
            frames,
            current: 0,
        })
    }

    pub fn current(&self) -> &FrameSync {
        &self.frames[self.current]
    }

    /// Slot in `0..len()` used by the current frame
    pub fn index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Block until the GPU has finished the previous use of this slot.
    pub fn wait_current(&self) -> Result<()> {
        let fence = self.current().in_flight_fence;
        unsafe { self.device.device.wait_for_fences(&[fence], true, u64::MAX) }
            .context("Failed to wait for in-flight fence")
    }

    pub fn reset_current(&self) -> Result<()> {
        let fence = self.current().in_flight_fence;
        unsafe { self.device.device.reset_fences(&[fence]) }
            .context("Failed to reset in-flight fence")
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames.len();
    }
}

impl Drop for FramesInFlight {
    fn drop(&mut self) {
        for sync in &self.frames {
            sync.destroy(&self.device.device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_existing_slots() {
        let mut created = Vec::new();
        let mut destroyed = Vec::new();
        let mut slots = PerSlot::new();

        let mut create = |i: usize| -> Result<usize> {
            created.push(i);
            Ok(i * 10)
        };
        slots.resize(3, &mut create, |item| destroyed.push(item)).unwrap();
        assert_eq!(slots.iter().copied().collect::<Vec<_>>(), vec![0, 10, 20]);

        // More swapchain images after a recreate: only the new ones are made
        slots.resize(4, &mut create, |item| destroyed.push(item)).unwrap();
        drop(create);
        assert_eq!(created, vec![0, 1, 2, 3]);
        assert_eq!(slots.get(3), Some(&30));

        slots.resize(2, |_| Ok(0), |item| destroyed.push(item)).unwrap();
        assert_eq!(destroyed, vec![30, 20]);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn failed_resize_rolls_back_new_slots() {
        let mut destroyed = Vec::new();
        let mut slots = PerSlot::new();
        slots.resize(1, |_| Ok(7usize), |_| {}).unwrap();

        let result = slots.resize(
            4,
            |i| if i < 3 { Ok(i) } else { anyhow::bail!("out of semaphores") },
            |item| destroyed.push(item),
        );
        assert!(result.is_err());
        assert_eq!(destroyed, vec![1, 2]);
        assert_eq!(slots.iter().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn each_slot_is_independent() {
        let mut slots = PerSlot::new();
        slots.resize(2, |_| Ok(Vec::<u32>::new()), |_| {}).unwrap();

        // Frame 0 writes its slot while frame 1's data is still in use
        slots.get_mut(1).unwrap().push(1);
        slots.get_mut(0).unwrap().push(2);
        assert_eq!(slots.get(1), Some(&vec![1]));
        assert_eq!(slots.get(0), Some(&vec![2]));
        assert!(slots.get(2).is_none());

        let mut cleared = 0;
        slots.clear(|_| cleared += 1);
        assert_eq!(cleared, 2);
        assert!(slots.is_empty());
    }
}
