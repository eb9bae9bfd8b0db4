//! Framebuffers and the offscreen attachments they bind.
//!
//! The forward pass renders into two renderer-owned images, a
//! multisampled color target and a multisampled depth target, and
//! resolves into the swapchain image. One [`Framebuffer`] exists per
//! swapchain image; the color and depth targets are shared across all of
//! them because only one frame renders at a time per image.

use ash::{vk, Device};

use super::buffer::find_memory_type;
use super::context::DeviceContext;
use super::{VulkanError, VulkanResult};

/// RAII wrapper around a `vk::Framebuffer`.
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Bind `attachments` to `render_pass` at the given extent. Attachment
    /// order must match the render pass: color, depth, resolve.
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer =
            unsafe { device.create_framebuffer(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Raw framebuffer handle.
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Multisampled color attachment, sized to the swapchain.
///
/// Marked transient: its contents never outlive the render pass, the
/// resolve attachment carries the result.
pub struct ColorTarget {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl ColorTarget {
    /// Create the target in the swapchain's color format.
    pub fn new(
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let (image, memory, view) = create_attachment_image(
            ctx,
            extent,
            format,
            samples,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )?;
        Ok(Self {
            device: ctx.device().clone(),
            image,
            memory,
            view,
        })
    }

    /// View bound into framebuffers.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ColorTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Multisampled depth attachment, sized to the swapchain.
pub struct DepthTarget {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl DepthTarget {
    /// Create the target in a depth format previously chosen with
    /// [`find_depth_format`].
    pub fn new(
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let mut aspect = vk::ImageAspectFlags::DEPTH;
        if has_stencil_component(format) {
            aspect |= vk::ImageAspectFlags::STENCIL;
        }
        let (image, memory, view) = create_attachment_image(
            ctx,
            extent,
            format,
            samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect,
        )?;
        Ok(Self {
            device: ctx.device().clone(),
            image,
            memory,
            view,
        })
    }

    /// View bound into framebuffers.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// First depth format the device supports as an optimal-tiling attachment,
/// preferring pure 32-bit depth.
pub fn find_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> VulkanResult<vk::Format> {
    const CANDIDATES: [vk::Format; 3] = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    for format in CANDIDATES {
        let props =
            unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }
    Err(VulkanError::InitializationFailed(
        "no supported depth attachment format".to_string(),
    ))
}

/// Whether a depth format carries a stencil aspect.
fn has_stencil_component(format: vk::Format) -> bool {
    format == vk::Format::D32_SFLOAT_S8_UINT || format == vk::Format::D24_UNORM_S8_UINT
}

fn create_attachment_image(
    ctx: &DeviceContext,
    extent: vk::Extent2D,
    format: vk::Format,
    samples: vk::SampleCountFlags,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
) -> VulkanResult<(vk::Image, vk::DeviceMemory, vk::ImageView)> {
    let device = ctx.device();

    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(samples)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    let image = unsafe { device.create_image(&image_info, None) }.map_err(VulkanError::Api)?;

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type = match find_memory_type(
        ctx.memory_properties(),
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) {
        Ok(index) => index,
        Err(e) => {
            unsafe { device.destroy_image(image, None) };
            return Err(e);
        }
    };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_image(image, None) };
            return Err(VulkanError::Api(e));
        }
    };

    if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
        unsafe {
            device.destroy_image(image, None);
            device.free_memory(memory, None);
        }
        return Err(VulkanError::Api(e));
    }

    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    let view = match unsafe { device.create_image_view(&view_info, None) } {
        Ok(view) => view,
        Err(e) => {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }
    };

    Ok((image, memory, view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_detection_matches_format_definitions() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }
}
