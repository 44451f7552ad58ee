//! Presentable surface source.
//!
//! The windowing layer hands the GPU context a [`SurfaceProvider`] instead of a
//! concrete window type, hiding the raw-window-handle plumbing from the rest of
//! the crate.

use std::ffi::CStr;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::{GpuError, Result};

/// Something a Vulkan surface can be created for.
pub trait SurfaceProvider {
    /// Raw display handle of the window system connection.
    fn display_handle(&self) -> Result<RawDisplayHandle>;

    /// Raw handle of the window itself.
    fn window_handle(&self) -> Result<RawWindowHandle>;

    /// Current drawable size in pixels.
    fn extent(&self) -> vk::Extent2D;

    /// Instance extensions the window system needs to present.
    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display = self.display_handle()?;
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(|e| GpuError::SurfaceCreation(format!("Unsupported display: {e}")))?;

        // SAFETY: ash-window hands out pointers into its own static name table.
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }
}
