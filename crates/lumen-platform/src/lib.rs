//! Platform abstraction for the Lumen renderer.
//!
//! Turns a winit window into something the GPU context can build a surface for.

use ash::vk;
use lumen_gpu::{GpuError, SurfaceProvider};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use thiserror::Error;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration, in logical pixels.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Create an event loop that polls continuously, for render loops.
pub fn create_event_loop() -> Result<EventLoop<()>> {
    let event_loop = EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);
    Ok(event_loop)
}

/// Open a window for `config`.
pub fn create_window(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Result<Window> {
    let window = event_loop
        .create_window(config.window_attributes())
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

    let size = window.inner_size();
    tracing::info!(
        "Created window '{}' ({}x{} physical)",
        config.title,
        size.width,
        size.height
    );
    Ok(window)
}

/// Drawable size as a Vulkan extent.
pub fn extent_of(size: PhysicalSize<u32>) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

/// A winit window seen as a [`SurfaceProvider`].
#[derive(Debug, Clone, Copy)]
pub struct WindowSurface<'a> {
    window: &'a Window,
}

impl<'a> WindowSurface<'a> {
    pub fn new(window: &'a Window) -> Self {
        Self { window }
    }
}

impl SurfaceProvider for WindowSurface<'_> {
    fn display_handle(&self) -> lumen_gpu::Result<RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))
    }

    fn window_handle(&self) -> lumen_gpu::Result<RawWindowHandle> {
        self.window
            .window_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))
    }

    fn extent(&self) -> vk::Extent2D {
        extent_of(self.window.inner_size())
    }
}
