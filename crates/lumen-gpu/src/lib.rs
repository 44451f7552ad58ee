//! Vulkan device selection and frame pacing for the Lumen renderer.
//!
//! This crate provides:
//! - Physical device capability probing and selection
//! - Logical device and queue setup
//! - Swapchain handling, including rebuilds after the surface changes
//! - The per-frame acquire/record/submit/present state machine
//! - An owned context that tears everything down in reverse order

pub mod backend;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod surface;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{AshApi, GraphicsApi};
pub use capabilities::{DeviceInfo, GpuVendor, QueueFamilyIndices, SwapchainSupport};
pub use context::{GpuContext, GpuContextBuilder};
pub use device::{DeviceSelector, LogicalDeviceBinding};
pub use error::{FrameStep, GpuError, Result};
pub use frame::{
    FrameContext, FrameState, PresentOutcome, DEFAULT_CLEAR_COLOR, DEFAULT_TIMEOUT,
    MAX_FRAMES_IN_FLIGHT,
};
pub use surface::SurfaceProvider;
pub use swapchain::{PresentableImage, PresentationSurface};
pub use sync::{FrameSlot, FrameSlots};
