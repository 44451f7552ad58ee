//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lumen_gpu::{GpuError, PresentOutcome, DEFAULT_CLEAR_COLOR, MAX_FRAMES_IN_FLIGHT};
use lumen_platform::{create_event_loop, create_window, PlatformConfig};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowId;

use crate::app::LumenApp;
use crate::context::AppContext;
use crate::frame::FrameContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Colour every frame is cleared to.
    pub clear_color: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            vsync: true,
            validation: cfg!(debug_assertions),
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, count: usize) -> Self {
        self.frames_in_flight = count;
        self
    }

    /// Set the clear colour.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Minimum duration of one frame, if the frame rate is capped.
    pub fn target_frame_time(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }

    pub(crate) fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
        }
    }
}

/// What the frame loop does after a failed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameFault {
    /// Rebuild the swapchain, then carry on.
    Rebuild,
    /// Drop this frame.
    Skip,
    /// Stop the application.
    Fatal,
}

impl FrameFault {
    fn of(err: &GpuError) -> Self {
        if err.is_surface_stale() {
            Self::Rebuild
        } else if err.is_recoverable() {
            Self::Skip
        } else {
            Self::Fatal
        }
    }
}

/// Frame rate statistics reported at shutdown.
#[derive(Debug, Clone, Copy)]
struct FpsStats {
    min: f64,
    max: f64,
    sum: f64,
    samples: u64,
}

impl Default for FpsStats {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: 0.0,
            sum: 0.0,
            samples: 0,
        }
    }
}

impl FpsStats {
    fn record(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let fps = 1.0 / f64::from(dt);
        self.min = self.min.min(fps);
        self.max = self.max.max(fps);
        self.sum += fps;
        self.samples += 1;
    }

    fn average(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

/// Run a LumenApp with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and runs the
/// event loop until the window is closed or the GPU fails.
pub fn run_app<A: LumenApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = create_event_loop()?;

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        failure: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct AppRunner<A: LumenApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    failure: Option<anyhow::Error>,
}

struct AppState<A: LumenApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    stats: FpsStats,
    minimized: bool,
}

impl<A: LumenApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                if let Err(e) = state.render_frame() {
                    error!("Fatal frame error: {e}");
                    self.failure = Some(e);
                    self.shutdown(event_loop);
                }
            }
            WindowEvent::Resized(size) => {
                let Some(state) = &mut self.state else {
                    return;
                };
                if let Err(e) = state.handle_resize(size.width, size.height) {
                    error!("Resize error: {e}");
                    self.failure = Some(e);
                    self.shutdown(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: LumenApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window = Arc::new(create_window(event_loop, &self.config.platform_config())?);

        let mut ctx = AppContext::new(window, &self.config)?;
        let app = A::init(&mut ctx)?;

        Ok(AppState {
            ctx,
            app,
            target_frame_time: self.config.target_frame_time(),
            stats: FpsStats::default(),
            minimized: false,
        })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.cleanup();
        }
        event_loop.exit();
    }
}

impl<A: LumenApp> AppState<A> {
    /// Run one frame. Errors returned from here are fatal.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn render_frame(&mut self) -> anyhow::Result<()> {
        if self.minimized {
            return Ok(());
        }

        let frame_start = Instant::now();
        let dt = self.ctx.tick();
        self.stats.record(dt);

        self.app.update(&self.ctx, dt);

        let gpu_frame = match self.ctx.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(e) => return self.recover(e),
        };

        let mut frame = FrameContext::new(&gpu_frame, dt);
        if let Err(e) = self.app.render(&self.ctx, &mut frame) {
            error!("Render error: {e}");
        }

        match self.ctx.gpu.end_frame() {
            Ok(PresentOutcome::Presented) => {}
            Ok(PresentOutcome::Suboptimal) => {
                debug!("Swapchain suboptimal, rebuilding");
                self.rebuild()?;
            }
            Err(e) => self.recover(e)?,
        }

        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn recover(&mut self, err: GpuError) -> anyhow::Result<()> {
        match FrameFault::of(&err) {
            FrameFault::Rebuild => {
                debug!("{err}, rebuilding swapchain");
                self.rebuild()
            }
            FrameFault::Skip => {
                warn!("Frame skipped: {err}");
                Ok(())
            }
            FrameFault::Fatal => Err(err.into()),
        }
    }

    /// Rebuild for the current window size.
    fn rebuild(&mut self) -> anyhow::Result<()> {
        let size = self.ctx.window.inner_size();
        self.handle_resize(size.width, size.height)
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        // Minimized windows report a zero size; no swapchain can have that.
        if width == 0 || height == 0 {
            self.minimized = true;
            return Ok(());
        }
        self.minimized = false;

        self.ctx.recreate_swapchain(width, height)?;
        self.app.on_resize(&mut self.ctx, width, height)?;

        info!("Resized to {}x{}", width, height);
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(avg_fps) = self.stats.average() {
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.stats.min);
            info!("  Max: {:.1}", self.stats.max);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_count());
        }

        info!("Starting cleanup...");
        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);
        self.ctx.cleanup();

        info!("Cleanup complete");
    }
}
