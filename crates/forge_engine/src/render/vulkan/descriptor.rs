//! Descriptor set layouts, pools, and updates.
//!
//! The pool is sized exactly for the renderer's needs: one uniform buffer
//! and one combined image sampler per frame in flight, and no more. Sets
//! are never freed individually, so the pool skips the free flag and
//! releases everything when it is destroyed.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Accumulates bindings for a descriptor set layout.
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding visible to `stages`.
    #[must_use]
    pub fn add_uniform_buffer(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    /// Add a combined image sampler binding visible to `stages`.
    #[must_use]
    pub fn add_combined_image_sampler(
        mut self,
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    /// Create the layout.
    pub fn build(self, device: Device) -> VulkanResult<DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(DescriptorSetLayout { device, layout })
    }
}

/// RAII wrapper around a `vk::DescriptorSetLayout`.
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor counts for `max_sets` frames: one uniform buffer and one
/// combined image sampler each.
fn pool_sizes(max_sets: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: max_sets,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: max_sets,
        },
    ]
}

/// RAII descriptor pool sized for the renderer's per-frame sets.
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool that can hold exactly `max_sets` per-frame sets.
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        let sizes = pool_sizes(max_sets);
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&sizes)
            .max_sets(max_sets);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self { device, pool })
    }

    /// Raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Allocate one set per layout in `layouts`. Sets live until the pool
    /// is destroyed.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Batches descriptor writes and applies them in one update call.
///
/// The `vk::WriteDescriptorSet` entries are only constructed inside
/// [`DescriptorSetWriter::update`], once the info vectors can no longer
/// grow; the entries hold pointers into those vectors, so building them
/// earlier would leave dangling pointers after a reallocation.
#[derive(Default)]
pub struct DescriptorSetWriter {
    buffer_writes: Vec<(vk::DescriptorSet, u32, vk::DescriptorBufferInfo)>,
    image_writes: Vec<(vk::DescriptorSet, u32, vk::DescriptorImageInfo)>,
}

impl DescriptorSetWriter {
    /// Start an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a uniform buffer write for `binding` of `set`.
    #[must_use]
    pub fn write_uniform_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        self.buffer_writes.push((
            set,
            binding,
            vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            },
        ));
        self
    }

    /// Queue a combined image sampler write for `binding` of `set`. The
    /// image is expected in shader-read-only layout when sampled.
    #[must_use]
    pub fn write_combined_image_sampler(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        self.image_writes.push((
            set,
            binding,
            vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        ));
        self
    }

    /// Apply every queued write.
    pub fn update(self, device: &Device) {
        let mut writes = Vec::with_capacity(self.buffer_writes.len() + self.image_writes.len());
        for (set, binding, info) in &self.buffer_writes {
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
                    .build(),
            );
        }
        for (set, binding, info) in &self.image_writes {
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build(),
            );
        }
        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_match_frame_count() {
        let sizes = pool_sizes(3);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 3);
    }

    #[test]
    fn layout_builder_accumulates_bindings() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(builder.bindings.len(), 2);
        assert_eq!(builder.bindings[0].binding, 0);
        assert_eq!(
            builder.bindings[0].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(builder.bindings[1].binding, 1);
        assert_eq!(
            builder.bindings[1].stage_flags,
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn writer_queues_writes_without_building_them() {
        let writer = DescriptorSetWriter::new()
            .write_uniform_buffer(vk::DescriptorSet::null(), 0, vk::Buffer::null(), 192)
            .write_combined_image_sampler(
                vk::DescriptorSet::null(),
                1,
                vk::ImageView::null(),
                vk::Sampler::null(),
            );
        assert_eq!(writer.buffer_writes.len(), 1);
        assert_eq!(writer.image_writes.len(), 1);
        assert_eq!(writer.buffer_writes[0].2.range, 192);
    }
}
