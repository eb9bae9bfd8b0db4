//! Windowing, the Vulkan backend, and the facade applications use.
//!
//! [`Renderer`] keeps every Vulkan type out of the public API.
//! Applications open a [`Window`], build a [`Renderer`] from a
//! [`RendererConfig`], upload a [`Model`](crate::assets::Model), and call
//! [`Renderer::render`] once per frame. Backend failures surface as
//! [`RenderError`] values carrying plain descriptions instead of raw
//! `vk::Result` codes.

pub mod vulkan;
pub mod window;

pub use window::{Window, WindowError, WindowResult};

use thiserror::Error;

use crate::assets::{Model, ShaderSet};
use crate::core::RendererConfig;
use crate::foundation::math::Mat4;

use vulkan::VulkanRenderer;

/// Errors surfaced by the rendering facade.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The renderer could not be brought up: no capable device, missing
    /// drivers, bad configuration, or unloadable shaders.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A frame failed to render or present.
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// A GPU resource could not be created, typically buffers or
    /// textures during a model upload.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// High-level facade over the Vulkan backend.
pub struct Renderer {
    backend: VulkanRenderer,
}

impl Renderer {
    /// Whether a Vulkan implementation can be loaded at all. Cheap to
    /// call before committing to renderer creation.
    pub fn is_supported() -> bool {
        vulkan::is_supported()
    }

    /// Bring up rendering into `window` using `config`.
    ///
    /// Validates the configuration, loads the configured SPIR-V shaders,
    /// and builds the whole backend. The window must stay alive for as
    /// long as the renderer does.
    pub fn new(window: &mut Window, config: &RendererConfig) -> RenderResult<Self> {
        config
            .validate()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        if !window.vulkan_supported() {
            return Err(RenderError::InitializationFailed(
                "windowing system reports no Vulkan support".to_string(),
            ));
        }

        log::info!(
            "Initializing Vulkan renderer for '{}'",
            config.application_name
        );

        let shaders = ShaderSet::load(&config.shaders).map_err(|e| {
            RenderError::InitializationFailed(format!("Failed to load shaders: {e}"))
        })?;

        let backend = VulkanRenderer::new(window, config, &shaders).map_err(|e| {
            RenderError::InitializationFailed(format!("Failed to create Vulkan renderer: {e}"))
        })?;

        Ok(Self { backend })
    }

    /// Upload a model's geometry and optional texture, replacing the
    /// previous one.
    pub fn upload_model(&mut self, model: &Model) -> RenderResult<()> {
        self.backend
            .upload_model(model)
            .map_err(|e| RenderError::ResourceCreationFailed(e.to_string()))
    }

    /// Render and present one frame. Window resizes are absorbed
    /// internally; only unrecoverable failures surface as errors.
    pub fn render(&mut self, window: &mut Window) -> RenderResult<()> {
        self.backend
            .draw_frame(window)
            .map_err(|e| RenderError::RenderingFailed(e.to_string()))
    }

    /// Set the color the frame is cleared to. Takes effect next frame.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.backend.set_clear_color(color);
    }

    /// No-op; the framebuffer is cleared automatically at the start of
    /// every frame.
    pub fn clear(&mut self) {
        self.backend.clear();
    }

    /// Tell the renderer the window was resized. The swapchain is
    /// rebuilt after the next present.
    pub fn resize(&mut self) {
        self.backend.resize();
    }

    /// Set the model, view, and projection matrices for subsequent
    /// frames.
    pub fn update_uniforms(&mut self, model: &Mat4, view: &Mat4, proj: &Mat4) {
        self.backend.update_uniforms(model, view, proj);
    }

    /// Name of the active backend.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Graphics API version string, like `1.3.250`.
    pub fn version(&self) -> String {
        self.backend.version()
    }

    /// Block until the GPU finishes all submitted work. Call before
    /// tearing down resources the GPU might still read.
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.backend
            .wait_idle()
            .map_err(|e| RenderError::BackendError(e.to_string()))
    }
}
