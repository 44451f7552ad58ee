//! Application context with window and GPU state.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use lumen_gpu::{AshApi, GpuContext, GpuContextBuilder};
use lumen_platform::{extent_of, WindowSurface};
use tracing::info;
use winit::window::Window;

use crate::runner::AppConfig;

/// Application context passed to [`LumenApp`](crate::LumenApp) methods.
pub struct AppContext {
    /// GPU context. Declared before the window so the surface is dropped first.
    pub gpu: GpuContext<AshApi>,
    /// The application window.
    pub window: Arc<Window>,
    /// Time of the previous frame, for delta time.
    pub last_frame_time: Instant,
}

impl AppContext {
    pub(crate) fn new(window: Arc<Window>, config: &AppConfig) -> lumen_gpu::Result<Self> {
        let gpu = GpuContextBuilder::new()
            .app_name(config.title.clone())
            .validation(config.validation)
            .vsync(config.vsync)
            .frames_in_flight(config.frames_in_flight)
            .clear_color(config.clear_color)
            .build(&WindowSurface::new(&window))?;

        if let Some(info) = gpu.device_info() {
            info!("GPU: {}", info.summary());
        }

        Ok(Self {
            gpu,
            window,
            last_frame_time: Instant::now(),
        })
    }

    /// Current swapchain extent, or the window size if there is no swapchain.
    pub fn extent(&self) -> vk::Extent2D {
        self.gpu
            .extent()
            .unwrap_or_else(|| extent_of(self.window.inner_size()))
    }

    /// Aspect ratio of the swapchain images.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        if extent.height == 0 {
            return 1.0;
        }
        extent.width as f32 / extent.height as f32
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.gpu.frames().map_or(0, |frames| frames.frame_number())
    }

    /// Seconds since the previous call.
    pub(crate) fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        dt
    }

    /// Rebuild the swapchain for a new window size.
    pub(crate) fn recreate_swapchain(&mut self, width: u32, height: u32) -> lumen_gpu::Result<()> {
        self.gpu.rebuild_surface(vk::Extent2D { width, height })
    }

    pub(crate) fn cleanup(&mut self) {
        self.gpu.destroy();
    }
}
