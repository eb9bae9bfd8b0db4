//! Synchronization primitives for the frame loop.
//!
//! Each frame in flight owns a [`FrameSync`] triple: a semaphore signaled
//! when its swapchain image is ready, a semaphore signaled when rendering
//! finishes, and a fence the CPU waits on before reusing the frame's
//! command buffer and uniform buffer. Fences start signaled so the first
//! pass through the loop does not deadlock waiting on work that was never
//! submitted.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// RAII wrapper around a binary semaphore.
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled semaphore.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore =
            unsafe { device.create_semaphore(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, semaphore })
    }

    /// Raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// RAII wrapper around a fence.
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence =
            unsafe { device.create_fence(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, fence })
    }

    /// Raw fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until the fence signals or `timeout_ns` elapses.
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) }
            .map_err(VulkanError::Api)
    }

    /// Return the fence to the unsignaled state.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(VulkanError::Api)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// The synchronization objects for one frame in flight.
pub struct FrameSync {
    /// Signaled by acquire when the swapchain image can be rendered to.
    pub image_available: Semaphore,
    /// Signaled by the graphics queue when the frame's commands finish.
    pub render_finished: Semaphore,
    /// Signaled with the submission; gates CPU reuse of frame resources.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the triple, with the fence signaled.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}
