//! Window management using GLFW.
//!
//! Creates windows without an OpenGL context and exposes the pieces the
//! Vulkan backend needs: required instance extensions, native surface
//! creation, framebuffer size queries, and event delivery.

use thiserror::Error;

/// Window management errors.
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW itself failed to initialize.
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created.
    #[error("window creation failed")]
    CreationFailed,

    /// This GLFW build or platform cannot drive Vulkan.
    #[error("Vulkan is not supported by the windowing system")]
    VulkanUnsupported,

    /// Any other GLFW-reported failure.
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Shorthand result for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper.
///
/// Owns the GLFW context, the window, and its event receiver. GLFW shuts
/// down when the last `Window` is dropped.
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a resizable window configured for Vulkan rendering.
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // No OpenGL context; the renderer brings its own API.
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_size_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Whether the user has requested the window close.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request that the window close.
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window events without blocking.
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Block until at least one event arrives, then process it.
    ///
    /// Used while the window is minimized so the renderer does not spin.
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Drain events gathered by the last poll.
    pub fn flush_events(&self) -> glfw::FlushedMessages<'_, (f64, glfw::WindowEvent)> {
        glfw::flush_messages(&self.events)
    }

    /// Window size in screen coordinates.
    pub fn get_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Framebuffer size in pixels. Zero in either dimension while minimized.
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Whether the windowing system can present Vulkan surfaces at all.
    pub fn vulkan_supported(&self) -> bool {
        self.glfw.vulkan_supported()
    }

    /// Instance extensions the windowing system needs for presentation.
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(WindowError::VulkanUnsupported)
    }

    /// Create a presentable surface for `instance` on this window.
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Glfw(format!(
                "failed to create Vulkan surface: {result:?}"
            )))
        }
    }
}
