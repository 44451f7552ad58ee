//! Physical device selection and logical device creation.

use std::ffi::CStr;

use ash::vk;

use crate::backend::{DeviceRequest, GraphicsApi, QueueRequest};
use crate::capabilities::{
    find_queue_families, DeviceInfo, PhysicalDeviceCandidate, QueueFamilyIndices,
    SwapchainSupport,
};
use crate::error::{GpuError, Result};

/// The logical device and the two queues the frame loop submits to.
#[derive(Debug, Clone, Copy)]
pub struct LogicalDeviceBinding {
    pub device: vk::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
}

impl LogicalDeviceBinding {
    /// Queue families that touch swapchain images, without duplicates.
    pub fn image_sharing_families(&self) -> Vec<u32> {
        if self.graphics_family == self.present_family {
            vec![self.graphics_family]
        } else {
            vec![self.graphics_family, self.present_family]
        }
    }
}

/// The winning physical device and what was learned while probing it.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    physical_device: vk::PhysicalDevice,
    info: DeviceInfo,
    queue_families: QueueFamilyIndices,
    swapchain_support: SwapchainSupport,
    required_extensions: Vec<&'static CStr>,
}

impl DeviceSelector {
    /// Pick the first enumerated device that passes the suitability check.
    ///
    /// Every candidate is considered in enumeration order; selection stops at
    /// the first success.
    pub fn pick<A: GraphicsApi + ?Sized>(
        api: &A,
        surface: vk::SurfaceKHR,
        required_extensions: &[&'static CStr],
    ) -> Result<Self> {
        let devices = api.enumerate_physical_devices()?;

        if devices.is_empty() {
            return Err(GpuError::NoDevice);
        }

        tracing::info!("Found {} physical device(s)", devices.len());

        for device in devices {
            let candidate =
                PhysicalDeviceCandidate::inspect(api, device, surface, required_extensions)?;

            let unmet = candidate.unmet_requirements();
            if !unmet.is_empty() {
                tracing::info!(
                    "Skipping {}: missing {}",
                    candidate.info.name,
                    unmet.join(", ")
                );
                continue;
            }

            tracing::info!("Selected GPU: {}", candidate.info.summary());

            return Ok(Self {
                physical_device: candidate.handle,
                info: candidate.info,
                queue_families: candidate.queue_families,
                swapchain_support: candidate.swapchain_support,
                required_extensions: required_extensions.to_vec(),
            });
        }

        Err(GpuError::NoSuitableDevice)
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Queue family indices resolved during selection.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Swapchain support seen during selection.
    pub fn swapchain_support(&self) -> &SwapchainSupport {
        &self.swapchain_support
    }

    /// Create the logical device and retrieve the graphics and present queues.
    ///
    /// `validation_layers` is empty when validation is disabled.
    pub fn create_logical_device<A: GraphicsApi + ?Sized>(
        &self,
        api: &mut A,
        surface: vk::SurfaceKHR,
        validation_layers: &[&'static CStr],
    ) -> Result<LogicalDeviceBinding> {
        let indices = find_queue_families(api, self.physical_device, surface)?;
        let (Some(graphics_family), Some(present_family)) =
            (indices.graphics_family, indices.present_family)
        else {
            return Err(GpuError::DeviceCreation(
                "selected device lost its graphics or present queue family".into(),
            ));
        };

        let request = self.device_request(&indices, validation_layers);

        let device = api
            .create_device(self.physical_device, &request)
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        let queues = api
            .device_queue(graphics_family, 0)
            .and_then(|graphics| Ok((graphics, api.device_queue(present_family, 0)?)));
        let (graphics_queue, present_queue) = match queues {
            Ok(queues) => queues,
            Err(e) => {
                api.destroy_device();
                return Err(e);
            }
        };

        tracing::debug!(
            "Logical device ready: graphics family {graphics_family}, present family {present_family}"
        );

        Ok(LogicalDeviceBinding {
            device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
        })
    }

    fn device_request(
        &self,
        indices: &QueueFamilyIndices,
        validation_layers: &[&'static CStr],
    ) -> DeviceRequest {
        // One queue per unique family, all at full priority
        let queues = indices
            .unique_families()
            .into_iter()
            .map(|family| QueueRequest {
                family,
                priorities: vec![1.0],
            })
            .collect();

        DeviceRequest {
            queues,
            extensions: self.required_extensions.clone(),
            layers: validation_layers.to_vec(),
            features: vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true),
        }
    }
}
