//! Sampled textures with blit-generated mip chains.
//!
//! Pixel data goes through a staging buffer into mip level zero, then
//! the rest of the chain is filled by repeated halving blits. The
//! upload, the blits, and every layout transition are recorded into a
//! single one-shot submission on the graphics queue.

use ash::{vk, Device};

use crate::assets::TextureData;

use super::buffer::{find_memory_type, Buffer};
use super::commands::CommandPool;
use super::context::DeviceContext;
use super::{VulkanError, VulkanResult};

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Number of mip levels needed to take `width` x `height` down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    (width.max(height) as f32).log2().floor() as u32 + 1
}

/// Dimensions of every level in the mip chain, base level first. Each
/// level halves the previous one, clamped at 1 per axis.
pub fn mip_chain_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut extents = Vec::with_capacity(mip_level_count(width, height) as usize);
    let (mut w, mut h) = (width, height);
    extents.push((w, h));
    while w > 1 || h > 1 {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        extents.push((w, h));
    }
    extents
}

fn mip_barrier(
    image: vk::Image,
    base_level: u32,
    level_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: base_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build()
}

/// A device-local sampled image with a full mip chain and its sampler.
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    mip_levels: u32,
}

impl Texture {
    /// Upload `data` and generate its mip chain.
    ///
    /// Fails if the device cannot blit the texture format with linear
    /// filtering, which the mip generation relies on.
    pub fn from_image(
        ctx: &DeviceContext,
        pool: &CommandPool,
        data: &TextureData,
    ) -> VulkanResult<Self> {
        let mip_levels = mip_level_count(data.width, data.height);

        let format_properties = unsafe {
            ctx.instance()
                .get_physical_device_format_properties(ctx.physical_device(), TEXTURE_FORMAT)
        };
        if !format_properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(VulkanError::InitializationFailed(
                "texture format does not support linear blit filtering".to_string(),
            ));
        }

        let staging = Buffer::new(
            ctx,
            data.size_bytes() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(&data.data)?;

        let device = ctx.device().clone();
        let (image, memory) =
            create_texture_image(&device, ctx, data.width, data.height, mip_levels)?;

        if let Err(e) = upload_and_generate_mips(ctx, pool, image, data, mip_levels, &staging) {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(e);
        }

        let view = match create_texture_view(&device, image, mip_levels) {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(ctx.limits().max_sampler_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe {
                    device.destroy_image_view(view, None);
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!(
            "texture uploaded ({}x{}, {mip_levels} mip levels)",
            data.width,
            data.height
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
            sampler,
            mip_levels,
        })
    }

    /// A 1x1 texture of a single color, used when a model carries no
    /// texture of its own.
    pub fn solid_color(
        ctx: &DeviceContext,
        pool: &CommandPool,
        color: [u8; 4],
    ) -> VulkanResult<Self> {
        Self::from_image(ctx, pool, &TextureData::solid_color(1, 1, color))
    }

    /// Image view covering the whole mip chain.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler configured for this texture.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Number of mip levels in the chain.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn create_texture_image(
    device: &Device,
    ctx: &DeviceContext,
    width: u32,
    height: u32,
    mip_levels: u32,
) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
    let create_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(mip_levels)
        .array_layers(1)
        .format(TEXTURE_FORMAT)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
        )
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .samples(vk::SampleCountFlags::TYPE_1);

    let image = unsafe { device.create_image(&create_info, None) }.map_err(VulkanError::Api)?;

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

    Ok((image, memory))
}

fn create_texture_view(
    device: &Device,
    image: vk::Image,
    mip_levels: u32,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(TEXTURE_FORMAT)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::Api)
}

/// Record and submit the whole upload: transition every level for
/// transfer, copy mip zero from staging, then walk the chain with
/// halving blits, retiring each source level to shader-read layout.
fn upload_and_generate_mips(
    ctx: &DeviceContext,
    pool: &CommandPool,
    image: vk::Image,
    data: &TextureData,
    mip_levels: u32,
    staging: &Buffer,
) -> VulkanResult<()> {
    let extents = mip_chain_extents(data.width, data.height);
    let mut recorder = pool.begin_single_time()?;

    recorder.pipeline_barrier(
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::TRANSFER,
        &[mip_barrier(
            image,
            0,
            mip_levels,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        )],
    );

    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: data.width,
            height: data.height,
            depth: 1,
        })
        .build();
    recorder.copy_buffer_to_image(
        staging.handle(),
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region],
    );

    for level in 1..mip_levels {
        let (src_width, src_height) = extents[level as usize - 1];
        let (dst_width, dst_height) = extents[level as usize];

        recorder.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            &[mip_barrier(
                image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            )],
        );

        let blit = vk::ImageBlit::builder()
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: src_width as i32,
                    y: src_height as i32,
                    z: 1,
                },
            ])
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level - 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: dst_width as i32,
                    y: dst_height as i32,
                    z: 1,
                },
            ])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();
        recorder.blit_image(
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        recorder.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[mip_barrier(
                image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::SHADER_READ,
            )],
        );
    }

    // The last level was only ever a blit destination.
    recorder.pipeline_barrier(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        &[mip_barrier(
            image,
            mip_levels - 1,
            1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
        )],
    );

    pool.submit_single_time(ctx.graphics_queue(), recorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pixel_has_one_level() {
        assert_eq!(mip_level_count(1, 1), 1);
    }

    #[test]
    fn power_of_two_counts() {
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(1, 1024), 11);
    }

    #[test]
    fn non_power_of_two_rounds_down() {
        assert_eq!(mip_level_count(1000, 600), 10);
        assert_eq!(mip_level_count(3, 3), 2);
    }

    #[test]
    fn chain_halves_down_to_one_by_one() {
        let extents = mip_chain_extents(8, 4);
        assert_eq!(extents, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
    }

    #[test]
    fn chain_clamps_the_narrow_axis() {
        let extents = mip_chain_extents(16, 1);
        assert_eq!(extents, vec![(16, 1), (8, 1), (4, 1), (2, 1), (1, 1)]);
    }

    #[test]
    fn chain_length_matches_level_count() {
        for (width, height) in [(1, 1), (2, 2), (7, 5), (1000, 600), (1024, 768)] {
            let extents = mip_chain_extents(width, height);
            assert_eq!(
                extents.len(),
                mip_level_count(width, height) as usize,
                "{width}x{height}"
            );
            assert_eq!(*extents.last().unwrap(), (1, 1));
        }
    }
}
