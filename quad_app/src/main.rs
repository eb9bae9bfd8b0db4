//! Textured quad demo
//!
//! Renders a spinning quad with a procedurally generated checkerboard
//! texture. Demonstrates window creation, renderer setup, model upload,
//! and the per-frame uniform update loop. Escape closes the window.

use forge_engine::foundation::logging;
use forge_engine::prelude::*;
use glfw::{Action, Key, WindowEvent};
use std::time::Instant;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

/// One full turn every eight seconds.
const ANGULAR_VELOCITY: f32 = std::f32::consts::PI / 4.0;

pub struct QuadApp {
    window: Window,
    renderer: Renderer,
    start_time: Instant,
}

impl QuadApp {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Creating quad demo application...");

        if !Renderer::is_supported() {
            return Err("Vulkan is not available on this system".into());
        }

        let mut window = Window::new("Forge - Quad Demo", WINDOW_WIDTH, WINDOW_HEIGHT)?;

        let config = RendererConfig::new("Quad Demo")
            .with_version(0, 1, 0)
            .with_max_frames_in_flight(2)
            .with_msaa_samples(4)
            .with_clear_color([0.02, 0.02, 0.03, 1.0]);
        let mut renderer = Renderer::new(&mut window, &config)?;
        log::info!("Renderer: {} {}", renderer.name(), renderer.version());

        let model = Model::quad().with_texture(checkerboard(256, 8)?);
        renderer.upload_model(&model)?;

        Ok(Self {
            window,
            renderer,
            start_time: Instant::now(),
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Starting quad demo...");

        while !self.window.should_close() {
            self.window.poll_events();

            // Collect events to avoid borrow checker issues
            let events: Vec<_> = self.window.flush_events().collect();
            for (_, event) in events {
                match event {
                    WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                        self.window.set_should_close(true);
                    }
                    WindowEvent::FramebufferSize(_, _) => {
                        self.renderer.resize();
                    }
                    _ => {}
                }
            }

            self.update_uniforms();
            self.renderer.render(&mut self.window)?;
        }

        self.renderer.wait_idle()?;
        log::info!("Quad demo completed");
        Ok(())
    }

    fn update_uniforms(&mut self) {
        let elapsed_seconds = self.start_time.elapsed().as_secs_f32();
        let model = Mat4::rotation_z(elapsed_seconds * ANGULAR_VELOCITY);

        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );

        // Track the live framebuffer size so resizes do not stretch the quad.
        let (width, height) = self.window.get_framebuffer_size();
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_4, aspect, 0.1, 10.0);

        self.renderer.update_uniforms(&model, &view, &proj);
    }
}

/// Procedural checkerboard so the demo needs no asset files on disk.
fn checkerboard(size: u32, cells: u32) -> Result<TextureData, Box<dyn std::error::Error>> {
    let cell = (size / cells).max(1);
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let value = if ((x / cell) + (y / cell)) % 2 == 0 {
                235
            } else {
                40
            };
            data.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Ok(TextureData::from_rgba8(size, size, data)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_default("info");

    log::info!("Starting Forge quad demo");

    // Wrap in catch_unwind so driver-level panics still produce a log line
    let result = std::panic::catch_unwind(|| {
        let mut app = QuadApp::new()?;
        app.run()
    });

    match result {
        Ok(Ok(())) => {
            log::info!("Quad demo finished successfully");
            Ok(())
        }
        Ok(Err(e)) => {
            log::error!("Application error: {e}");
            Err(e)
        }
        Err(_) => {
            log::error!("Application panicked during execution");
            Err("Application panicked during execution".into())
        }
    }
}
