//! `LumenApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use winit::event::WindowEvent;

/// Trait for Lumen applications.
///
/// The framework owns the window, the GPU context and the frame loop.
/// Implementors only record commands into each frame.
pub trait LumenApp: Sized {
    /// Initialize the application.
    ///
    /// Called once, after the window and GPU context exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before recording, with `dt` in seconds.
    #[allow(unused_variables)]
    fn update(&mut self, ctx: &AppContext, dt: f32) {}

    /// Record a frame.
    ///
    /// The command buffer is inside a render pass that has already cleared
    /// the image. The framework submits and presents it afterwards, even if
    /// this returns an error.
    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()>;

    /// Handle window resize.
    ///
    /// Called after the swapchain has been rebuilt for the new size.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events. Return `true` to stop further processing.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown. The GPU is idle when this runs.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
