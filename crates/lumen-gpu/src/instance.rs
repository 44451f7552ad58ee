//! Vulkan instance requirements.

use std::ffi::CStr;

use ash::vk;

use crate::backend::{GraphicsApi, InstanceRequest};
use crate::error::{GpuError, Result};

/// Validation layers to enable when validation is on.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![
        // Standard validation layer
        c"VK_LAYER_KHRONOS_validation",
    ]
}

/// Fail with [`GpuError::UnsupportedLayer`] naming the first requested layer
/// that is not installed.
pub fn check_validation_layer_support<A: GraphicsApi + ?Sized>(
    api: &A,
    layers: &[&CStr],
) -> Result<()> {
    let available = api.available_layers()?;

    for layer in layers {
        let name = layer.to_string_lossy();
        if !available.iter().any(|candidate| *candidate == name) {
            return Err(GpuError::UnsupportedLayer(name.into_owned()));
        }
    }

    Ok(())
}

/// Build the instance request from the window system's extensions.
///
/// With validation on, the debug-utils extension and the validation layers are
/// added; otherwise neither is present.
pub fn instance_request(
    app_name: &str,
    surface_extensions: &[&'static CStr],
    enable_validation: bool,
) -> InstanceRequest {
    let mut extensions = surface_extensions.to_vec();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME);

    let layers = if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME);
        validation_layers()
    } else {
        vec![]
    };

    InstanceRequest {
        app_name: app_name.to_string(),
        api_version: vk::API_VERSION_1_0,
        extensions,
        layers,
    }
}
