//! Command pools and command recording.
//!
//! [`CommandRecorder`] tracks whether its command buffer is recording and
//! rejects out-of-order use instead of tripping validation layers.
//! [`ActiveRenderPass`] borrows the recorder for the duration of a render
//! pass and ends the pass when dropped, so a pass can never be left open.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// RAII command pool for one queue family.
///
/// Created with the reset flag so per-frame command buffers can be
/// re-recorded individually.
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for `queue_family`.
    pub fn new(device: Device, queue_family: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);

        let pool =
            unsafe { device.create_command_pool(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self { device, pool })
    }

    /// Raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate `count` primary command buffers. They are freed with the
    /// pool.
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Allocate and begin a command buffer for a single submission.
    /// Pair with [`CommandPool::submit_single_time`].
    pub fn begin_single_time(&self) -> VulkanResult<CommandRecorder> {
        let command_buffer = self.allocate(1)?[0];
        let mut recorder = CommandRecorder::new(self.device.clone(), command_buffer);
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(recorder)
    }

    /// End, submit, and wait for a one-shot recording, then free its
    /// command buffer.
    pub fn submit_single_time(
        &self,
        queue: vk::Queue,
        recorder: CommandRecorder,
    ) -> VulkanResult<()> {
        let command_buffer = recorder.end()?;
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();

        let submit_result =
            unsafe { self.device.queue_submit(queue, &[submit_info], vk::Fence::null()) }
                .and_then(|()| unsafe { self.device.queue_wait_idle(queue) });
        unsafe { self.device.free_command_buffers(self.pool, &command_buffers) };
        submit_result.map_err(VulkanError::Api)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Command buffers from this pool may still be executing.
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Records commands into one command buffer, tracking recording state.
pub struct CommandRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap an allocated command buffer. Recording has not started.
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            recording: false,
        }
    }

    /// The command buffer being recorded.
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Begin recording with the given usage flags.
    pub fn begin(&mut self, usage: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "command buffer is already recording".to_string(),
            });
        }
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(usage);
        unsafe { self.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(VulkanError::Api)?;
        self.recording = true;
        Ok(())
    }

    /// Finish recording and hand the command buffer back for submission.
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "command buffer is not recording".to_string(),
            });
        }
        unsafe { self.device.end_command_buffer(self.command_buffer) }
            .map_err(VulkanError::Api)?;
        self.recording = false;
        Ok(self.command_buffer)
    }

    /// Begin a render pass. Drawing goes through the returned
    /// [`ActiveRenderPass`]; the pass ends when it drops.
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot begin a render pass outside of recording".to_string(),
            });
        }
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        Ok(ActiveRenderPass { recorder: self })
    }

    /// Record a buffer-to-buffer copy.
    pub fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device
                .cmd_copy_buffer(self.command_buffer, src, dst, regions);
        }
    }

    /// Record a buffer-to-image copy.
    pub fn copy_buffer_to_image(
        &mut self,
        buffer: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device
                .cmd_copy_buffer_to_image(self.command_buffer, buffer, image, layout, regions);
        }
    }

    /// Record an image blit.
    pub fn blit_image(
        &mut self,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device.cmd_blit_image(
                self.command_buffer,
                src_image,
                src_layout,
                dst_image,
                dst_layout,
                regions,
                filter,
            );
        }
    }

    /// Record an image layout or access barrier.
    pub fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }
}

/// A render pass in progress. Ends the pass on drop.
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    /// Bind a graphics pipeline.
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Set the dynamic viewport.
    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe {
            self.recorder
                .device
                .cmd_set_viewport(self.recorder.command_buffer, 0, &[viewport]);
        }
    }

    /// Set the dynamic scissor rectangle.
    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe {
            self.recorder
                .device
                .cmd_set_scissor(self.recorder.command_buffer, 0, &[scissor]);
        }
    }

    /// Bind a vertex buffer to binding 0.
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(
                self.recorder.command_buffer,
                0,
                &[buffer],
                &[0],
            );
        }
    }

    /// Bind a `u32` index buffer.
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(
                self.recorder.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Bind one descriptor set at set index 0.
    pub fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        let sets = [set];
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &sets,
                &[],
            );
        }
    }

    /// Record an indexed draw.
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        unsafe {
            self.recorder.device.cmd_draw_indexed(
                self.recorder.command_buffer,
                index_count,
                instance_count,
                0,
                0,
                0,
            );
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
