//! GPU context management.
//!
//! [`GpuContext`] owns every object the frame loop needs and tears them down
//! in reverse creation order. It is an ordinary value: create one with
//! [`GpuContextBuilder`], pass it to whoever renders, drop it at shutdown.

use std::time::Duration;

use ash::vk;

use crate::backend::{AshApi, GraphicsApi};
use crate::capabilities::{required_device_extensions, DeviceInfo};
use crate::command::CommandPool;
use crate::device::{DeviceSelector, LogicalDeviceBinding};
use crate::error::{GpuError, Result};
use crate::frame::{
    FrameConfig, FrameContext, FrameState, FrameSynchronizer, FrameTargets, PresentOutcome,
    DEFAULT_CLEAR_COLOR, DEFAULT_TIMEOUT, MAX_FRAMES_IN_FLIGHT,
};
use crate::instance::{check_validation_layer_support, instance_request, validation_layers};
use crate::surface::SurfaceProvider;
use crate::swapchain::{PresentationSurface, SurfaceTarget};

/// Main GPU context: device, swapchain, and frame loop state.
pub struct GpuContext<A: GraphicsApi> {
    api: A,
    validation: bool,
    vsync: bool,

    instance: Option<vk::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: Option<vk::SurfaceKHR>,
    selector: Option<DeviceSelector>,
    binding: Option<LogicalDeviceBinding>,
    presentation: Option<PresentationSurface>,
    render_pass: Option<vk::RenderPass>,
    commands: Option<CommandPool>,
    frames: Option<FrameSynchronizer>,
}

impl<A: GraphicsApi> std::fmt::Debug for GpuContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("validation", &self.validation)
            .field("device", &self.selector.as_ref().map(|s| &s.info().name))
            .field("extent", &self.presentation.as_ref().map(PresentationSurface::extent))
            .field("frame_state", &self.frames.as_ref().map(FrameSynchronizer::state))
            .finish_non_exhaustive()
    }
}

/// Wrap a bare native failure in the error kind of the step that made it.
fn creation_error(wrap: fn(String) -> GpuError) -> impl Fn(GpuError) -> GpuError {
    move |e| match e {
        GpuError::Vulkan(result) => wrap(result.to_string()),
        other => other,
    }
}

impl<A: GraphicsApi> GpuContext<A> {
    fn empty(api: A, validation: bool, vsync: bool) -> Self {
        Self {
            api,
            validation,
            vsync,
            instance: None,
            debug_messenger: None,
            surface: None,
            selector: None,
            binding: None,
            presentation: None,
            render_pass: None,
            commands: None,
            frames: None,
        }
    }

    fn init(
        &mut self,
        provider: &dyn SurfaceProvider,
        app_name: &str,
        frame_config: FrameConfig,
    ) -> Result<()> {
        let layers = if self.validation {
            validation_layers()
        } else {
            vec![]
        };

        if self.validation {
            check_validation_layer_support(&self.api, &layers)?;
        }

        let request = instance_request(app_name, &provider.required_extensions()?, self.validation);
        self.instance = Some(
            self.api
                .create_instance(&request)
                .map_err(creation_error(GpuError::InstanceCreation))?,
        );

        if self.validation {
            self.debug_messenger = Some(
                self.api
                    .create_debug_messenger()
                    .map_err(creation_error(GpuError::DebugMessenger))?,
            );
        }

        let surface = self
            .api
            .create_surface(provider)
            .map_err(creation_error(GpuError::SurfaceCreation))?;
        self.surface = Some(surface);

        let selector = DeviceSelector::pick(&self.api, surface, &required_device_extensions())?;
        let binding = selector.create_logical_device(&mut self.api, surface, &layers)?;
        self.binding = Some(binding);

        let target = SurfaceTarget {
            surface,
            physical_device: selector.physical_device(),
            desired_extent: provider.extent(),
            vsync: self.vsync,
        };
        self.selector = Some(selector);

        let presentation =
            PresentationSurface::create(&self.api, &target, &binding, vk::SwapchainKHR::null())?;
        let format = presentation.format();
        let image_count = presentation.image_count();
        let presentation = self.presentation.insert(presentation);

        let render_pass = self
            .api
            .create_render_pass(format)
            .map_err(creation_error(GpuError::ResourceCreation))?;
        self.render_pass = Some(render_pass);

        presentation.create_targets(&self.api, render_pass)?;

        self.commands = Some(CommandPool::new(
            &self.api,
            binding.graphics_family,
            image_count,
        )?);

        self.frames = Some(FrameSynchronizer::new(&self.api, frame_config, image_count)?);

        tracing::info!("GPU context ready");
        Ok(())
    }

    /// Everything `begin_frame`/`end_frame` need, split out of `self`.
    fn frame_parts(&mut self) -> Result<(&A, &mut FrameSynchronizer, FrameTargets<'_>)> {
        let Self {
            api,
            binding,
            presentation,
            render_pass,
            commands,
            frames,
            ..
        } = self;

        match (
            binding.as_ref(),
            presentation.as_ref(),
            *render_pass,
            commands.as_ref(),
            frames.as_mut(),
        ) {
            (Some(binding), Some(surface), Some(render_pass), Some(commands), Some(frames)) => Ok((
                &*api,
                frames,
                FrameTargets {
                    binding,
                    surface,
                    render_pass,
                    commands,
                },
            )),
            _ => Err(GpuError::InvalidState("GPU context is not initialized".into())),
        }
    }

    /// Acquire the next image and start recording into it.
    ///
    /// A [`GpuError::SurfaceStale`] result means [`Self::rebuild_surface`]
    /// must run before the next frame.
    pub fn begin_frame(&mut self) -> Result<FrameContext> {
        let (api, frames, targets) = self.frame_parts()?;
        frames.begin_frame(api, &targets)
    }

    /// Submit and present the frame opened by [`Self::begin_frame`].
    pub fn end_frame(&mut self) -> Result<PresentOutcome> {
        let (api, frames, targets) = self.frame_parts()?;
        frames.end_frame(api, &targets)
    }

    /// Rebuild the swapchain and everything sized by it.
    ///
    /// Waits for the device to go idle, passes the current swapchain as the
    /// old one, and recreates the render pass only if the surface format
    /// changed. The device and its queues are untouched.
    ///
    /// If the new swapchain cannot be created the old one stays in place. A
    /// failure after that point leaves no swapchain at all: frames are
    /// refused until a later rebuild succeeds.
    pub fn rebuild_surface(&mut self, extent: vk::Extent2D) -> Result<()> {
        let (Some(binding), Some(selector), Some(surface)) =
            (self.binding, self.selector.as_ref(), self.surface)
        else {
            return Err(GpuError::InvalidState("GPU context is not initialized".into()));
        };

        if let Some(frames) = &self.frames {
            if frames.state() != FrameState::Idle {
                return Err(GpuError::InvalidState(format!(
                    "cannot rebuild the surface while {:?}",
                    frames.state()
                )));
            }
        }

        let target = SurfaceTarget {
            surface,
            physical_device: selector.physical_device(),
            desired_extent: extent,
            vsync: self.vsync,
        };

        self.api.device_wait_idle()?;

        let old = self.presentation.take();
        let old_swapchain = old
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), PresentationSurface::swapchain);

        let fresh = match PresentationSurface::create(&self.api, &target, &binding, old_swapchain) {
            Ok(fresh) => fresh,
            Err(e) => {
                // The old chain is still valid; keep it for a later attempt
                self.presentation = old;
                return Err(e);
            }
        };

        let format_changed = old.as_ref().map_or(true, |old| old.format() != fresh.format());
        if let Some(old) = old {
            old.destroy(&self.api);
        }

        if let Err(e) = self.install_presentation(fresh, format_changed) {
            tracing::warn!("Swapchain rebuild failed, presentation disabled: {e}");
            self.discard_presentation();
            return Err(e);
        }
        Ok(())
    }

    /// Make `fresh` current and rebuild what depends on it.
    fn install_presentation(
        &mut self,
        fresh: PresentationSurface,
        format_changed: bool,
    ) -> Result<()> {
        let image_count = fresh.image_count();
        let presentation = self.presentation.insert(fresh);

        if format_changed || self.render_pass.is_none() {
            if let Some(render_pass) = self.render_pass.take() {
                self.api.destroy_render_pass(render_pass);
            }
            tracing::debug!("Surface format changed, recreating render pass");
            self.render_pass = Some(
                self.api
                    .create_render_pass(presentation.format())
                    .map_err(creation_error(GpuError::ResourceCreation))?,
            );
        }

        if let Some(render_pass) = self.render_pass {
            presentation.create_targets(&self.api, render_pass)?;
        }

        if let Some(commands) = &mut self.commands {
            commands.reallocate(&self.api, image_count)?;
        }

        if let Some(frames) = &mut self.frames {
            frames.reset_images(&self.api, image_count)?;
        }

        tracing::info!(
            "Swapchain rebuilt at {}x{}",
            presentation.extent().width,
            presentation.extent().height
        );
        Ok(())
    }

    /// Drop a half-built swapchain and its render pass. The device must be idle.
    fn discard_presentation(&mut self) {
        if let Some(presentation) = self.presentation.take() {
            presentation.destroy(&self.api);
        }
        if let Some(render_pass) = self.render_pass.take() {
            self.api.destroy_render_pass(render_pass);
        }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        if self.binding.is_some() {
            self.api.device_wait_idle()?;
        }
        Ok(())
    }

    /// Release everything, newest first. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }

        if self.binding.is_some() {
            if let Err(e) = self.api.device_wait_idle() {
                tracing::warn!("Device wait before teardown failed: {e}");
            }
        }

        if let Some(frames) = self.frames.take() {
            frames.destroy(&self.api);
        }
        if let Some(commands) = self.commands.take() {
            commands.destroy(&self.api);
        }
        if let Some(presentation) = &mut self.presentation {
            presentation.destroy_targets(&self.api);
        }
        if let Some(render_pass) = self.render_pass.take() {
            self.api.destroy_render_pass(render_pass);
        }
        if let Some(presentation) = self.presentation.take() {
            presentation.destroy(&self.api);
        }
        if self.binding.take().is_some() {
            self.api.destroy_device();
        }
        self.selector = None;
        if let Some(messenger) = self.debug_messenger.take() {
            self.api.destroy_debug_messenger(messenger);
        }
        if let Some(surface) = self.surface.take() {
            self.api.destroy_surface(surface);
        }
        if self.instance.take().is_some() {
            self.api.destroy_instance();
        }

        tracing::debug!("GPU context destroyed");
    }

    /// Whether [`Self::destroy`] has run (or initialization never got anywhere).
    pub fn is_destroyed(&self) -> bool {
        self.instance.is_none()
    }

    /// Get the graphics backend.
    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Device and queue handles.
    pub fn binding(&self) -> Option<&LogicalDeviceBinding> {
        self.binding.as_ref()
    }

    /// What the selected device reported about itself.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.selector.as_ref().map(DeviceSelector::info)
    }

    pub fn selector(&self) -> Option<&DeviceSelector> {
        self.selector.as_ref()
    }

    pub fn presentation(&self) -> Option<&PresentationSurface> {
        self.presentation.as_ref()
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass
    }

    pub fn command_pool(&self) -> Option<&CommandPool> {
        self.commands.as_ref()
    }

    pub fn frames(&self) -> Option<&FrameSynchronizer> {
        self.frames.as_ref()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.presentation.as_ref().map(PresentationSurface::extent)
    }

    pub fn frame_state(&self) -> Option<FrameState> {
        self.frames.as_ref().map(FrameSynchronizer::state)
    }
}

impl<A: GraphicsApi> Drop for GpuContext<A> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Builder for creating a GPU context.
#[derive(Debug, Clone)]
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    vsync: bool,
    frame_config: FrameConfig,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Lumen".to_string(),
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            frame_config: FrameConfig::default(),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Prefer FIFO presentation (`true`) or mailbox/immediate (`false`).
    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Number of frames that may be in flight, defaults to [`MAX_FRAMES_IN_FLIGHT`].
    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.frame_config.frames_in_flight = count;
        self
    }

    /// Bound on fence waits and image acquisition, defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.frame_config.timeout = timeout;
        self
    }

    /// Colour the render pass clears to, defaults to [`DEFAULT_CLEAR_COLOR`].
    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.frame_config.clear_color = color;
        self
    }

    /// Block on the present queue after each present.
    pub fn wait_for_present_idle(mut self, wait: bool) -> Self {
        self.frame_config.wait_for_present_idle = wait;
        self
    }

    /// Build the GPU context on the system Vulkan loader.
    pub fn build(self, provider: &dyn SurfaceProvider) -> Result<GpuContext<AshApi>> {
        self.build_with(AshApi::load()?, provider)
    }

    /// Build the GPU context on `api`.
    ///
    /// Whatever was created before a failing step is destroyed before the
    /// error is returned.
    pub fn build_with<A: GraphicsApi>(
        self,
        api: A,
        provider: &dyn SurfaceProvider,
    ) -> Result<GpuContext<A>> {
        if self.frame_config.frames_in_flight == 0 {
            return Err(GpuError::InvalidConfig(
                "frames in flight must be at least 1".into(),
            ));
        }

        tracing::debug!(
            "Creating GPU context: validation={}, frames_in_flight={}, timeout={:?}",
            self.enable_validation,
            self.frame_config.frames_in_flight,
            self.frame_config.timeout
        );

        let mut context = GpuContext::empty(api, self.enable_validation, self.vsync);
        if let Err(e) = context.init(provider, &self.app_name, self.frame_config) {
            tracing::error!("GPU initialization failed: {e}");
            context.destroy();
            return Err(e);
        }

        Ok(context)
    }
}
