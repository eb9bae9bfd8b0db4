//! Vulkan rendering backend.
//!
//! Each submodule wraps one family of Vulkan objects behind an RAII type:
//! construction returns [`VulkanResult`], the raw handle is reachable
//! through a `handle()` accessor, and `Drop` destroys the object. Owners
//! declare wrapped resources in reverse teardown order so Rust's field
//! drop order tears the GPU state down correctly without manual cleanup
//! code.
//!
//! [`renderer::VulkanRenderer`] assembles the pieces and owns the frame
//! loop; everything else is a building block.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;

use ash::vk;
use thiserror::Error;

/// Errors produced by the Vulkan backend.
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A Vulkan API call returned a failure code.
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Instance, device, or resource setup failed before any API error
    /// code was available.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// A wrapper was used in a state it does not allow.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// What was attempted and why it is not allowed.
        reason: String,
    },

    /// No device-local memory type satisfies a resource's requirements.
    #[error("no suitable memory type available")]
    NoSuitableMemoryType,

    /// No physical device on the system can run the renderer.
    #[error("no suitable graphics device found")]
    NoSuitableDevice,
}

/// Shorthand result for Vulkan operations.
pub type VulkanResult<T> = Result<T, VulkanError>;

pub use buffer::{Buffer, IndexBuffer, UniformBuffer, VertexBuffer};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{
    is_supported, DeviceContext, LogicalDevice, PhysicalDeviceInfo, SurfaceHandle, VulkanContext,
    VulkanInstance,
};
pub use descriptor::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
pub use framebuffer::{ColorTarget, DepthTarget, Framebuffer};
pub use pipeline::{GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use renderer::VulkanRenderer;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::Texture;
