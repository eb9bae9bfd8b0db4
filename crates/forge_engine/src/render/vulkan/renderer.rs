//! The frame loop and everything it owns.
//!
//! [`VulkanRenderer`] ties the whole backend together: it builds the
//! context and all GPU resources at startup, records and submits one
//! frame per [`VulkanRenderer::draw_frame`] call, and rebuilds the
//! size-dependent resources whenever the swapchain falls out of step
//! with the surface.
//!
//! Swapchain recovery follows two rules. An out-of-date acquire abandons
//! the frame before anything is submitted, so the frame's fence is left
//! signaled and the frame slot is reused. A suboptimal acquire still
//! renders, because the image is usable and dropping it would stall the
//! loop; the present side reports the mismatch and triggers recreation
//! afterwards.

use ash::{vk, Device};

use crate::assets::{Model, ShaderSet};
use crate::core::RendererConfig;
use crate::foundation::math::Mat4;
use crate::render::window::Window;

use super::buffer::{IndexBuffer, UniformBuffer, VertexBuffer};
use super::commands::{CommandPool, CommandRecorder};
use super::context::{effective_sample_count, DeviceContext, VulkanContext};
use super::descriptor::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
use super::framebuffer::{find_depth_format, ColorTarget, DepthTarget, Framebuffer};
use super::pipeline::GraphicsPipeline;
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use super::texture::Texture;
use super::{VulkanError, VulkanResult};

/// Shader uniforms written once per frame: model, view, and projection
/// matrices, tightly packed in std140-compatible column-major order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UniformData {
    /// Object-to-world transform.
    pub model: [[f32; 4]; 4],
    /// World-to-camera transform.
    pub view: [[f32; 4]; 4],
    /// Camera-to-clip transform.
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Zeroable for UniformData {}
unsafe impl bytemuck::Pod for UniformData {}

impl Default for UniformData {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Mat4::identity().into();
        Self {
            model: identity,
            view: identity,
            proj: identity,
        }
    }
}

/// What to do with an acquire attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireDecision {
    /// Render into the swapchain image with this index.
    Render(u32),
    /// The swapchain no longer matches the surface; rebuild it and skip
    /// the frame.
    Recreate,
}

/// What to do after presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PresentDecision {
    /// The frame completed; move to the next frame slot.
    Advance,
    /// Rebuild the swapchain before rendering again.
    Recreate,
}

/// Classify an `acquire_next_image` result. A suboptimal acquire still
/// delivered a usable image, so it renders; recreation happens on the
/// present side.
pub(crate) fn decide_acquire(
    result: Result<(u32, bool), vk::Result>,
) -> VulkanResult<AcquireDecision> {
    match result {
        Ok((image_index, _suboptimal)) => Ok(AcquireDecision::Render(image_index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireDecision::Recreate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Classify a `queue_present` result, folding in a resize the window
/// reported since the last frame.
pub(crate) fn decide_present(
    result: Result<bool, vk::Result>,
    resize_pending: bool,
) -> VulkanResult<PresentDecision> {
    match result {
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentDecision::Recreate),
        Ok(suboptimal) if suboptimal || resize_pending => Ok(PresentDecision::Recreate),
        Ok(_) => Ok(PresentDecision::Advance),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// The frame slot following `current`, wrapping at `frames_in_flight`.
pub(crate) fn next_frame_index(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight
}

/// Geometry and texture currently bound for drawing.
struct LoadedModel {
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    #[allow(dead_code)]
    texture: Option<Texture>,
}

/// The Vulkan rendering backend.
///
/// Fields are declared in teardown order; dropping the renderer waits
/// for the device and then releases resources before the context that
/// created them.
pub struct VulkanRenderer {
    frame_sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<UniformBuffer<UniformData>>,
    model: Option<LoadedModel>,
    fallback_texture: Texture,
    framebuffers: Vec<Framebuffer>,
    color_target: ColorTarget,
    depth_target: DepthTarget,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    descriptor_pool: DescriptorPool,
    descriptor_set_layout: DescriptorSetLayout,
    command_pool: CommandPool,
    device_ctx: DeviceContext,
    context: VulkanContext,

    uniforms: UniformData,
    clear_color: [f32; 4],
    depth_format: vk::Format,
    msaa_samples: vk::SampleCountFlags,
    frames_in_flight: usize,
    current_frame: usize,
    resize_pending: bool,
}

impl VulkanRenderer {
    /// Bring up the full backend for rendering into `window`.
    ///
    /// Fails if no suitable device exists, if the device cannot
    /// multisample, or if any Vulkan object creation fails.
    pub fn new(
        window: &mut Window,
        config: &RendererConfig,
        shaders: &ShaderSet,
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, config)?;
        let device_ctx = context.device_context();
        let device = device_ctx.device().clone();

        let msaa_samples =
            effective_sample_count(context.physical().msaa_samples, config.msaa_samples);
        if msaa_samples == vk::SampleCountFlags::TYPE_1 {
            return Err(VulkanError::InitializationFailed(
                "device does not support multisampled rendering".to_string(),
            ));
        }
        log::debug!("rendering with {msaa_samples:?} samples");

        let depth_format = find_depth_format(device_ctx.instance(), device_ctx.physical_device())?;
        let color_format = context.swapchain().format().format;

        let render_pass =
            RenderPass::new(device.clone(), color_format, depth_format, msaa_samples)?;

        let descriptor_set_layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .build(device.clone())?;

        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            descriptor_set_layout.handle(),
            shaders,
            msaa_samples,
        )?;

        let command_pool = CommandPool::new(device.clone(), device_ctx.graphics_family())?;

        let extent = context.swapchain().extent();
        let color_target = ColorTarget::new(&device_ctx, extent, color_format, msaa_samples)?;
        let depth_target = DepthTarget::new(&device_ctx, extent, depth_format, msaa_samples)?;
        let framebuffers = create_framebuffers(
            &device,
            &render_pass,
            context.swapchain(),
            &color_target,
            &depth_target,
        )?;

        let frames_in_flight = config.max_frames_in_flight;
        let uniforms = UniformData::default();
        let mut uniform_buffers = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            let buffer = UniformBuffer::new(&device_ctx)?;
            buffer.update(&uniforms);
            uniform_buffers.push(buffer);
        }

        let descriptor_pool = DescriptorPool::new(device.clone(), frames_in_flight as u32)?;
        let layouts = vec![descriptor_set_layout.handle(); frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        // Models without a texture of their own sample plain white, which
        // leaves the vertex color untouched.
        let fallback_texture =
            Texture::solid_color(&device_ctx, &command_pool, [255, 255, 255, 255])?;

        let mut writer = DescriptorSetWriter::new();
        for (set, uniform_buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            writer = writer
                .write_uniform_buffer(*set, 0, uniform_buffer.handle(), uniform_buffer.size())
                .write_combined_image_sampler(
                    *set,
                    1,
                    fallback_texture.view(),
                    fallback_texture.sampler(),
                );
        }
        writer.update(&device);

        let command_buffers = command_pool.allocate(frames_in_flight as u32)?;

        let mut frame_sync = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            frame_sync.push(FrameSync::new(&device)?);
        }

        log::info!(
            "Vulkan renderer ready: {}x{}, {} frames in flight",
            extent.width,
            extent.height,
            frames_in_flight
        );

        Ok(Self {
            frame_sync,
            command_buffers,
            descriptor_sets,
            uniform_buffers,
            model: None,
            fallback_texture,
            framebuffers,
            color_target,
            depth_target,
            pipeline,
            render_pass,
            descriptor_pool,
            descriptor_set_layout,
            command_pool,
            device_ctx,
            context,
            uniforms,
            clear_color: config.clear_color,
            depth_format,
            msaa_samples,
            frames_in_flight,
            current_frame: 0,
            resize_pending: false,
        })
    }

    /// Upload a model's geometry and texture, replacing whatever was
    /// bound before. Waits for in-flight frames so their buffers can be
    /// released safely.
    pub fn upload_model(&mut self, model: &Model) -> VulkanResult<()> {
        self.context.wait_idle()?;

        let vertex_buffer =
            VertexBuffer::new(&self.device_ctx, &self.command_pool, &model.mesh.vertices)?;
        let index_buffer =
            IndexBuffer::new(&self.device_ctx, &self.command_pool, &model.mesh.indices)?;
        let texture = match &model.texture {
            Some(data) => Some(Texture::from_image(&self.device_ctx, &self.command_pool, data)?),
            None => None,
        };

        let (view, sampler) = texture.as_ref().map_or(
            (self.fallback_texture.view(), self.fallback_texture.sampler()),
            |t| (t.view(), t.sampler()),
        );
        let mut writer = DescriptorSetWriter::new();
        for set in &self.descriptor_sets {
            writer = writer.write_combined_image_sampler(*set, 1, view, sampler);
        }
        writer.update(self.device_ctx.device());

        log::info!(
            "model uploaded: {} vertices, {} indices, {}",
            vertex_buffer.vertex_count(),
            index_buffer.index_count(),
            if texture.is_some() {
                "textured"
            } else {
                "untextured"
            }
        );

        self.model = Some(LoadedModel {
            vertex_buffer,
            index_buffer,
            texture,
        });
        Ok(())
    }

    /// Render and present one frame.
    ///
    /// Returns without drawing when the swapchain had to be rebuilt; the
    /// caller just tries again next frame.
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<()> {
        self.frame_sync[self.current_frame]
            .in_flight
            .wait(u64::MAX)?;

        let image_available = self.frame_sync[self.current_frame].image_available.handle();
        let render_finished = self.frame_sync[self.current_frame].render_finished.handle();
        let in_flight = self.frame_sync[self.current_frame].in_flight.handle();

        let acquire_result = unsafe {
            self.context.device().swapchain_loader().acquire_next_image(
                self.context.swapchain().handle(),
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };
        let image_index = match decide_acquire(acquire_result)? {
            AcquireDecision::Render(index) => index,
            AcquireDecision::Recreate => {
                // Nothing was submitted: the fence stays signaled and the
                // frame slot is reused, so the next attempt cannot block
                // on work that never happened.
                log::warn!("swapchain out of date on acquire, rebuilding");
                self.recreate_swapchain(window)?;
                return Ok(());
            }
        };
        log::trace!(
            "frame slot {} rendering into image {image_index}",
            self.current_frame
        );

        // Only reset once we know work will be submitted against it.
        self.frame_sync[self.current_frame].in_flight.reset()?;

        self.uniform_buffers[self.current_frame].update(&self.uniforms);

        let command_buffer = self.command_buffers[self.current_frame];
        unsafe {
            self.device_ctx
                .device()
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(VulkanError::Api)?;
        self.record_commands(command_buffer, image_index)?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe {
            self.device_ctx.device().queue_submit(
                self.device_ctx.graphics_queue(),
                &[submit_info],
                in_flight,
            )
        }
        .map_err(VulkanError::Api)?;

        let swapchains = [self.context.swapchain().handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let present_result = unsafe {
            self.context
                .device()
                .swapchain_loader()
                .queue_present(self.context.device().present_queue(), &present_info)
        };

        match decide_present(present_result, self.resize_pending)? {
            PresentDecision::Advance => {
                self.current_frame = next_frame_index(self.current_frame, self.frames_in_flight);
            }
            PresentDecision::Recreate => {
                self.recreate_swapchain(window)?;
            }
        }
        Ok(())
    }

    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<()> {
        let mut recorder =
            CommandRecorder::new(self.device_ctx.device().clone(), command_buffer);
        recorder.begin(vk::CommandBufferUsageFlags::empty())?;

        let extent = self.context.swapchain().extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        // The resolve attachment is never cleared, so two values suffice.
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        {
            let mut pass = recorder.begin_render_pass(
                self.render_pass.handle(),
                self.framebuffers[image_index as usize].handle(),
                render_area,
                &clear_values,
            )?;
            pass.bind_pipeline(self.pipeline.handle());
            pass.set_viewport(vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            });
            pass.set_scissor(render_area);

            if let Some(model) = &self.model {
                pass.bind_vertex_buffer(model.vertex_buffer.handle());
                pass.bind_index_buffer(model.index_buffer.handle());
                pass.bind_descriptor_set(
                    self.pipeline.layout(),
                    self.descriptor_sets[self.current_frame],
                );
                pass.draw_indexed(model.index_buffer.index_count(), 1);
            }
        }

        recorder.end()?;
        Ok(())
    }

    /// Rebuild the swapchain and everything sized to it. Blocks while
    /// the framebuffer is zero-sized, which is what a minimized window
    /// reports.
    fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let mut size = window.get_framebuffer_size();
        while size.0 == 0 || size.1 == 0 {
            window.wait_events();
            size = window.get_framebuffer_size();
        }

        self.context.wait_idle()?;

        // Framebuffers reference the outgoing image views.
        self.framebuffers.clear();
        self.context.recreate_swapchain(size)?;

        let extent = self.context.swapchain().extent();
        let color_format = self.context.swapchain().format().format;
        self.color_target =
            ColorTarget::new(&self.device_ctx, extent, color_format, self.msaa_samples)?;
        self.depth_target =
            DepthTarget::new(&self.device_ctx, extent, self.depth_format, self.msaa_samples)?;
        self.framebuffers = create_framebuffers(
            self.device_ctx.device(),
            &self.render_pass,
            self.context.swapchain(),
            &self.color_target,
            &self.depth_target,
        )?;

        // Whatever resize was pending, this rebuild satisfied it.
        self.resize_pending = false;

        log::info!("swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Set the color the framebuffer is cleared to each frame.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// No-op. Clearing happens through the render pass load operation at
    /// the start of every frame.
    pub fn clear(&mut self) {}

    /// Note that the window was resized. The swapchain is rebuilt after
    /// the next present rather than immediately.
    pub fn resize(&mut self) {
        self.resize_pending = true;
    }

    /// Set the matrices the next recorded frame will use.
    pub fn update_uniforms(&mut self, model: &Mat4, view: &Mat4, proj: &Mat4) {
        self.uniforms = UniformData {
            model: (*model).into(),
            view: (*view).into(),
            proj: (*proj).into(),
        };
    }

    /// Backend name for diagnostics.
    pub fn name(&self) -> &'static str {
        "Vulkan"
    }

    /// Instance API version, like `1.3.250`.
    pub fn version(&self) -> String {
        self.context.instance().version_string()
    }

    /// Block until the device finishes all submitted work.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Queued frames may still reference every resource about to drop.
        if let Err(e) = self.context.wait_idle() {
            log::error!("device wait failed during renderer teardown: {e}");
        }
    }
}

fn create_framebuffers(
    device: &Device,
    render_pass: &RenderPass,
    swapchain: &Swapchain,
    color_target: &ColorTarget,
    depth_target: &DepthTarget,
) -> VulkanResult<Vec<Framebuffer>> {
    swapchain
        .image_views()
        .iter()
        .map(|&view| {
            let attachments = [color_target.view(), depth_target.view(), view];
            Framebuffer::new(
                device.clone(),
                render_pass.handle(),
                &attachments,
                swapchain.extent(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<UniformData>(), 192);
    }

    #[test]
    fn frame_counter_wraps() {
        assert_eq!(next_frame_index(0, 2), 1);
        assert_eq!(next_frame_index(1, 2), 0);
        assert_eq!(next_frame_index(2, 3), 0);
    }

    #[test]
    fn acquire_success_renders() {
        let decision = decide_acquire(Ok((3, false))).unwrap();
        assert_eq!(decision, AcquireDecision::Render(3));
    }

    #[test]
    fn acquire_suboptimal_still_renders() {
        let decision = decide_acquire(Ok((0, true))).unwrap();
        assert_eq!(decision, AcquireDecision::Render(0));
    }

    #[test]
    fn acquire_out_of_date_recreates() {
        let decision = decide_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap();
        assert_eq!(decision, AcquireDecision::Recreate);
    }

    #[test]
    fn acquire_device_loss_is_fatal() {
        let result = decide_acquire(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(
            result,
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn present_success_advances() {
        let decision = decide_present(Ok(false), false).unwrap();
        assert_eq!(decision, PresentDecision::Advance);
    }

    #[test]
    fn present_suboptimal_recreates() {
        let decision = decide_present(Ok(true), false).unwrap();
        assert_eq!(decision, PresentDecision::Recreate);
    }

    #[test]
    fn present_out_of_date_recreates() {
        let decision = decide_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap();
        assert_eq!(decision, PresentDecision::Recreate);
    }

    #[test]
    fn pending_resize_forces_recreation() {
        let decision = decide_present(Ok(false), true).unwrap();
        assert_eq!(decision, PresentDecision::Recreate);
    }

    #[test]
    fn present_device_loss_is_fatal() {
        assert!(decide_present(Err(vk::Result::ERROR_DEVICE_LOST), false).is_err());
    }

    #[test]
    fn recreation_does_not_advance_the_frame_slot() {
        // Walk a simulated loop over present outcomes: frames ending in
        // recreation reuse their slot, completed frames move on.
        let frames_in_flight = 2;
        let mut current = 0;
        let outcomes = [
            PresentDecision::Advance,
            PresentDecision::Recreate,
            PresentDecision::Advance,
            PresentDecision::Advance,
        ];
        let mut visited = Vec::new();
        for outcome in outcomes {
            visited.push(current);
            if outcome == PresentDecision::Advance {
                current = next_frame_index(current, frames_in_flight);
            }
        }
        assert_eq!(visited, vec![0, 1, 1, 0]);
    }
}
