//! Buffers and buffer memory.
//!
//! [`Buffer`] is the raw allocation; [`VertexBuffer`], [`IndexBuffer`],
//! and [`UniformBuffer`] layer usage-specific behavior on top. Geometry
//! lives in device-local memory and is filled through a staging buffer
//! and a one-shot transfer submission. Uniform buffers stay host-visible
//! and permanently mapped because they change every frame.

use std::marker::PhantomData;

use ash::{vk, Device};

use crate::assets::Vertex;

use super::commands::CommandPool;
use super::context::DeviceContext;
use super::{VulkanError, VulkanResult};

/// Find a memory type that covers `type_filter` and carries all
/// `required` property flags.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for index in 0..memory_properties.memory_type_count {
        let type_matches = type_filter & (1 << index) != 0;
        let properties_match = memory_properties.memory_types[index as usize]
            .property_flags
            .contains(required);
        if type_matches && properties_match {
            return Ok(index);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

/// A buffer and its backing allocation.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Allocate a buffer of `size` bytes with the given usage, in memory
    /// carrying the given property flags.
    pub fn new(
        ctx: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create a zero-sized buffer".to_string(),
            });
        }
        let device = ctx.device();

        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer =
            unsafe { device.create_buffer(&create_info, None) }.map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match find_memory_type(
            ctx.memory_properties(),
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocation size in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Copy `data` into the buffer through a temporary mapping. The
    /// buffer must live in host-visible memory.
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        if data.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "write of {} bytes exceeds buffer size {}",
                    data.len(),
                    self.size
                ),
            });
        }
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Read the buffer contents back through a temporary mapping. The
    /// buffer must live in host-visible memory.
    pub fn read_bytes(&self) -> VulkanResult<Vec<u8>> {
        let mut data = vec![0u8; self.size as usize];
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), data.as_mut_ptr(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(data)
    }

    /// Copy a device-local buffer back to the host.
    ///
    /// The buffer must have been created with `TRANSFER_SRC` usage. Blocks
    /// until the transfer finishes; meant for validation and debugging,
    /// not the frame loop.
    pub fn download(&self, ctx: &DeviceContext, pool: &CommandPool) -> VulkanResult<Vec<u8>> {
        let staging = Buffer::new(
            ctx,
            self.size,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        copy_buffer(ctx, pool, self, &staging, self.size)?;
        staging.read_bytes()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Copy `size` bytes between buffers with a one-shot command buffer,
/// waiting for completion.
pub fn copy_buffer(
    ctx: &DeviceContext,
    pool: &CommandPool,
    src: &Buffer,
    dst: &Buffer,
    size: vk::DeviceSize,
) -> VulkanResult<()> {
    let mut recorder = pool.begin_single_time()?;
    recorder.copy_buffer(
        src.handle(),
        dst.handle(),
        &[vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        }],
    );
    pool.submit_single_time(ctx.graphics_queue(), recorder)
}

/// Device-local vertex buffer filled through a staging upload.
pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Upload `vertices` into device-local memory.
    pub fn new(ctx: &DeviceContext, pool: &CommandPool, vertices: &[Vertex]) -> VulkanResult<Self> {
        if vertices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot upload an empty vertex list".to_string(),
            });
        }
        let size = std::mem::size_of_val(vertices) as vk::DeviceSize;

        let staging = Buffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytemuck::cast_slice(vertices))?;

        let buffer = Buffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        copy_buffer(ctx, pool, &staging, &buffer, size)?;

        log::debug!("vertex buffer uploaded ({} vertices, {size} bytes)", vertices.len());

        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of vertices stored.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// The underlying allocation, for readback.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

/// Device-local `u32` index buffer filled through a staging upload.
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload `indices` into device-local memory.
    pub fn new(ctx: &DeviceContext, pool: &CommandPool, indices: &[u32]) -> VulkanResult<Self> {
        if indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot upload an empty index list".to_string(),
            });
        }
        let size = std::mem::size_of_val(indices) as vk::DeviceSize;

        let staging = Buffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytemuck::cast_slice(indices))?;

        let buffer = Buffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        copy_buffer(ctx, pool, &staging, &buffer, size)?;

        log::debug!("index buffer uploaded ({} indices, {size} bytes)", indices.len());

        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices stored.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// The underlying allocation, for readback.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

/// Host-visible uniform buffer for one `T`, mapped for its whole lifetime.
///
/// One exists per frame in flight, so a frame's uniforms can be written
/// while earlier frames still read theirs.
pub struct UniformBuffer<T: bytemuck::Pod> {
    buffer: Buffer,
    mapped: *mut std::ffi::c_void,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    /// Allocate and persistently map a buffer sized for one `T`.
    pub fn new(ctx: &DeviceContext) -> VulkanResult<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let buffer = Buffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let mapped = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, size, vk::MemoryMapFlags::empty())
        }
        .map_err(VulkanError::Api)?;

        Ok(Self {
            buffer,
            mapped,
            _marker: PhantomData,
        })
    }

    /// Write a new value through the persistent mapping. The memory is
    /// host-coherent, so no flush is needed.
    pub fn update(&self, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.cast::<u8>(), bytes.len());
        }
    }

    /// Raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the stored value in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl<T: bytemuck::Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        // Unmap before the inner buffer frees the memory.
        unsafe {
            self.buffer.device.unmap_memory(self.buffer.memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_memory_properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        props.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        props.memory_types[1] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 1,
        };
        props.memory_types[2] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 0,
        };
        props
    }

    #[test]
    fn finds_first_matching_type() {
        let props = synthetic_memory_properties();
        let index = find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert_eq!(index.unwrap(), 0);
    }

    #[test]
    fn honors_the_type_filter() {
        let props = synthetic_memory_properties();
        // Type 1 is host visible, but the filter excludes it.
        let index = find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert_eq!(index.unwrap(), 2);
    }

    #[test]
    fn superset_flags_satisfy_the_request() {
        let props = synthetic_memory_properties();
        let index = find_memory_type(
            &props,
            0b100,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        );
        assert_eq!(index.unwrap(), 2);
    }

    #[test]
    fn no_match_is_an_error() {
        let props = synthetic_memory_properties();
        let result = find_memory_type(&props, 0b001, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn types_beyond_the_count_are_ignored() {
        let mut props = synthetic_memory_properties();
        props.memory_type_count = 1;
        let result = find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(result.is_err());
    }
}
