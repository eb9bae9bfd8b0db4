//! Swapchain creation and recreation.
//!
//! Format, present mode, extent, and image count selection are split into
//! free functions over the queried surface data so the policy is testable
//! without a device. Creation and recreation share one build path; the
//! only difference is whether an old swapchain is handed to the driver.

use ash::extensions::khr;
use ash::{vk, Device};

use super::context::{PhysicalDeviceInfo, SurfaceHandle};
use super::{VulkanError, VulkanResult};

/// The swapchain, its images, and one view per image.
///
/// Images are owned by the swapchain itself and must not be destroyed;
/// the views are created and destroyed here.
pub struct Swapchain {
    device: Device,
    loader: khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

struct BuiltSwapchain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to the current framebuffer.
    pub fn new(
        device: Device,
        loader: khr::Swapchain,
        surface: &SurfaceHandle,
        physical: &PhysicalDeviceInfo,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let built = build(
            &device,
            &loader,
            surface,
            physical,
            framebuffer_size,
            vk::SwapchainKHR::null(),
        )?;
        Ok(Self {
            device,
            loader,
            swapchain: built.swapchain,
            images: built.images,
            image_views: built.image_views,
            format: built.format,
            extent: built.extent,
        })
    }

    /// Rebuild for a new framebuffer size.
    ///
    /// Surface capabilities, formats, and present modes are queried fresh.
    /// The old swapchain is passed as `old_swapchain` so the driver can
    /// recycle its images, then torn down: views first, swapchain second.
    pub fn recreate(
        &mut self,
        surface: &SurfaceHandle,
        physical: &PhysicalDeviceInfo,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<()> {
        let built = build(
            &self.device,
            &self.loader,
            surface,
            physical,
            framebuffer_size,
            self.swapchain,
        )?;

        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }

        self.swapchain = built.swapchain;
        self.images = built.images;
        self.image_views = built.image_views;
        self.format = built.format;
        self.extent = built.extent;
        Ok(())
    }

    /// Raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain images, owned by the swapchain.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per swapchain image, in image order.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images the driver actually created.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Selected surface format and color space.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Current swapchain extent in pixels.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn build(
    device: &Device,
    loader: &khr::Swapchain,
    surface: &SurfaceHandle,
    physical: &PhysicalDeviceInfo,
    framebuffer_size: (u32, u32),
    old_swapchain: vk::SwapchainKHR,
) -> VulkanResult<BuiltSwapchain> {
    let capabilities = surface.capabilities(physical.device)?;
    let formats = surface.formats(physical.device)?;
    let present_modes = surface.present_modes(physical.device)?;

    let format = choose_surface_format(&formats);
    let present_mode = choose_present_mode(&present_modes);
    let extent = choose_extent(&capabilities, framebuffer_size);
    let image_count = choose_image_count(&capabilities);

    let queue_families = [physical.graphics_family, physical.present_family];
    let mut create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface.handle())
        .min_image_count(image_count)
        .image_format(format.format)
        .image_color_space(format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    create_info = if physical.graphics_family == physical.present_family {
        create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    } else {
        create_info
            .image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(&queue_families)
    };

    let swapchain =
        unsafe { loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;

    let images = match unsafe { loader.get_swapchain_images(swapchain) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { loader.destroy_swapchain(swapchain, None) };
            return Err(VulkanError::Api(e));
        }
    };

    let mut image_views = Vec::with_capacity(images.len());
    for &image in &images {
        match create_image_view(device, image, format.format) {
            Ok(view) => image_views.push(view),
            Err(e) => {
                unsafe {
                    for view in image_views {
                        device.destroy_image_view(view, None);
                    }
                    loader.destroy_swapchain(swapchain, None);
                }
                return Err(e);
            }
        }
    }

    log::debug!(
        "swapchain built: {}x{}, {} images, {:?}, {:?}",
        extent.width,
        extent.height,
        images.len(),
        format.format,
        present_mode
    );

    Ok(BuiltSwapchain {
        swapchain,
        images,
        image_views,
        format,
        extent,
    })
}

fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::Api)
}

/// Prefer BGRA8 sRGB with a nonlinear sRGB color space; otherwise take
/// the first format the surface offers.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Prefer mailbox for low latency without tearing; fall back to FIFO,
/// which every conformant device provides.
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's fixed extent when the platform dictates one; when it
/// leaves the choice open, clamp the framebuffer size to the allowed range.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image more than the minimum so the CPU rarely stalls on acquire,
/// capped by the maximum when the surface declares one. A maximum of zero
/// means unbounded.
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn preferred_surface_format_wins_when_offered() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn first_surface_format_is_the_fallback() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn mailbox_present_mode_wins_when_offered() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_is_the_present_mode_fallback() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn fixed_extent_is_taken_verbatim() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, (640, 480));
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn flexible_extent_clamps_framebuffer_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 200,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let small = choose_extent(&capabilities, (50, 50));
        assert_eq!((small.width, small.height), (200, 100));
        let large = choose_extent(&capabilities, (4000, 4000));
        assert_eq!((large.width, large.height), (800, 600));
        let fitting = choose_extent(&capabilities, (640, 480));
        assert_eq!((fitting.width, fitting.height), (640, 480));
    }

    #[test]
    fn image_count_is_one_over_minimum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_respects_surface_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn zero_maximum_means_unbounded() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 5,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 6);
    }
}
