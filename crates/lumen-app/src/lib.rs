//! Application framework for the Lumen renderer.
//!
//! Handles the boilerplate around [`lumen_gpu`]:
//! - Window creation
//! - GPU context initialization and teardown
//! - Swapchain rebuilds on resize and on stale surfaces
//! - The event loop and frame pacing
//!
//! # Example
//!
//! ```no_run
//! use lumen_app::{run_app, AppConfig, AppContext, FrameContext, LumenApp};
//!
//! struct Clear;
//!
//! impl LumenApp for Clear {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(Clear)
//!     }
//!
//!     fn render(&mut self, _ctx: &AppContext, _frame: &mut FrameContext) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<Clear>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::LumenApp;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};

pub use lumen_gpu::{GpuContext, GpuContextBuilder, GpuError};
pub use winit::event::WindowEvent;
