//! Device capability probing.
//!
//! Answers, for one candidate device and one surface, the four questions that
//! decide whether the device can drive the frame loop: queue families,
//! device extensions, swapchain support and sampler features.

use std::collections::{BTreeSet, HashSet};
use std::ffi::CStr;

use ash::vk;

use crate::backend::GraphicsApi;
use crate::error::Result;

/// Device extensions every selected device must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// What a device reports about itself.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
}

impl DeviceInfo {
    pub fn vendor(&self) -> GpuVendor {
        GpuVendor::from_vendor_id(self.vendor_id)
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{}",
            self.name,
            self.vendor(),
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

/// Queue family indices for the two roles the frame loop needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both roles are covered. The two indices may be the same family.
    pub fn are_present(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct families in ascending order.
    pub fn unique_families(&self) -> Vec<u32> {
        [self.graphics_family, self.present_family]
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Swapchain capabilities of a device/surface pair.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats, in driver order.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// At least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Record the first graphics family and the first family that can present to
/// `surface`. Families with no queues are ignored.
pub fn find_queue_families<A: GraphicsApi + ?Sized>(
    api: &A,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in api.queue_families(device)?.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() && api.surface_support(device, i, surface)? {
            indices.present_family = Some(i);
        }

        if indices.are_present() {
            break;
        }
    }

    Ok(indices)
}

/// Every name in `required` is advertised by the device.
pub fn check_extension_support<A: GraphicsApi + ?Sized>(
    api: &A,
    device: vk::PhysicalDevice,
    required: &[&CStr],
) -> Result<bool> {
    let available: HashSet<String> = api.device_extensions(device)?.into_iter().collect();

    let missing: Vec<_> = required
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !available.contains(name))
        .collect();

    if !missing.is_empty() {
        tracing::debug!("Missing device extensions: {}", missing.join(", "));
    }

    Ok(missing.is_empty())
}

/// Fetch capabilities, formats and present modes, unfiltered.
pub fn query_swapchain_support<A: GraphicsApi + ?Sized>(
    api: &A,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SwapchainSupport> {
    Ok(SwapchainSupport {
        capabilities: api.surface_capabilities(device, surface)?,
        formats: api.surface_formats(device, surface)?,
        present_modes: api.surface_present_modes(device, surface)?,
    })
}

/// A device under evaluation, with everything the suitability check reads.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    /// Left empty when the swapchain extension is missing.
    pub swapchain_support: SwapchainSupport,
    pub features: vk::PhysicalDeviceFeatures,
}

impl PhysicalDeviceCandidate {
    /// Inspect `device` against `surface`.
    pub fn inspect<A: GraphicsApi + ?Sized>(
        api: &A,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        required_extensions: &[&CStr],
    ) -> Result<Self> {
        let info = api.device_info(device)?;
        let queue_families = find_queue_families(api, device, surface)?;
        let extensions_supported = check_extension_support(api, device, required_extensions)?;

        // Surface queries are only valid once the swapchain extension is known to exist
        let swapchain_support = if extensions_supported {
            query_swapchain_support(api, device, surface)?
        } else {
            SwapchainSupport::default()
        };

        let features = api.device_features(device)?;

        Ok(Self {
            handle: device,
            info,
            queue_families,
            extensions_supported,
            swapchain_support,
            features,
        })
    }

    /// Names of the suitability conditions this device fails.
    pub fn unmet_requirements(&self) -> Vec<&'static str> {
        let mut unmet = Vec::new();
        if !self.queue_families.are_present() {
            unmet.push("graphics and present queue families");
        }
        if !self.extensions_supported {
            unmet.push("required device extensions");
        }
        if !self.swapchain_support.is_adequate() {
            unmet.push("surface formats and present modes");
        }
        if self.features.sampler_anisotropy != vk::TRUE {
            unmet.push("anisotropic sampling");
        }
        unmet
    }

    /// All four conditions hold.
    pub fn is_suitable(&self) -> bool {
        self.unmet_requirements().is_empty()
    }
}

/// Whether `device` can drive the frame loop for `surface`.
pub fn is_device_suitable<A: GraphicsApi + ?Sized>(
    api: &A,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> Result<bool> {
    Ok(PhysicalDeviceCandidate::inspect(api, device, surface, required_extensions)?.is_suitable())
}
