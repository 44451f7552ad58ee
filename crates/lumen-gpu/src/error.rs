//! GPU error types.

use std::fmt;

use ash::vk;
use thiserror::Error;

/// Step of the per-frame state machine, used to say where a frame failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStep {
    WaitFence,
    Acquire,
    WaitImage,
    ResetFence,
    Record,
    Submit,
    Present,
    WaitPresentIdle,
}

impl fmt::Display for FrameStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitFence => "in-flight fence wait",
            Self::Acquire => "image acquisition",
            Self::WaitImage => "image fence wait",
            Self::ResetFence => "fence reset",
            Self::Record => "command recording",
            Self::Submit => "queue submission",
            Self::Present => "presentation",
            Self::WaitPresentIdle => "present queue idle wait",
        };
        f.write_str(name)
    }
}

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// A requested validation layer is not installed.
    #[error("Validation layer not available: {0}")]
    UnsupportedLayer(String),

    /// Instance creation failed.
    #[error("Instance creation failed: {0}")]
    InstanceCreation(String),

    /// Debug messenger registration failed.
    #[error("Debug messenger registration failed: {0}")]
    DebugMessenger(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// No physical devices were enumerated.
    #[error("No GPU with Vulkan support found")]
    NoDevice,

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Logical device creation failed.
    #[error("Logical device creation failed: {0}")]
    DeviceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Render pass, image view, framebuffer or command object creation failed.
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// Fence or semaphore creation failed.
    #[error("Synchronization object creation failed: {0}")]
    SyncObjectCreation(String),

    /// The surface no longer matches the swapchain and must be rebuilt.
    #[error("Surface out of date during {0}")]
    SurfaceStale(FrameStep),

    /// The device became unusable.
    #[error("Device lost during {0}")]
    DeviceLost(FrameStep),

    /// A bounded wait expired.
    #[error("Timed out during {0}")]
    Timeout(FrameStep),

    /// Any other native failure inside the frame loop.
    #[error("{step} failed: {result}")]
    FrameFailed { step: FrameStep, result: vk::Result },

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// Classify a native failure reported during `step` of the frame loop.
    pub fn frame(step: FrameStep, err: Self) -> Self {
        match err {
            Self::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR) => Self::SurfaceStale(step),
            Self::Vulkan(vk::Result::ERROR_DEVICE_LOST) => Self::DeviceLost(step),
            Self::Vulkan(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Self::Timeout(step),
            Self::Vulkan(result) => Self::FrameFailed { step, result },
            other => other,
        }
    }

    /// Whether the frame loop can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceStale(_) | Self::Timeout(_))
    }

    /// Whether the swapchain has to be rebuilt before the next frame.
    pub fn is_surface_stale(&self) -> bool {
        matches!(self, Self::SurfaceStale(_))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_are_classified() {
        let stale = GpuError::frame(
            FrameStep::Acquire,
            GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR),
        );
        assert!(matches!(stale, GpuError::SurfaceStale(FrameStep::Acquire)));
        assert!(stale.is_recoverable());
        assert!(stale.is_surface_stale());

        let lost = GpuError::frame(
            FrameStep::Submit,
            GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST),
        );
        assert!(matches!(lost, GpuError::DeviceLost(FrameStep::Submit)));
        assert!(!lost.is_recoverable());

        let timeout = GpuError::frame(FrameStep::WaitFence, GpuError::Vulkan(vk::Result::TIMEOUT));
        assert!(matches!(timeout, GpuError::Timeout(FrameStep::WaitFence)));
        assert!(timeout.is_recoverable());
        assert!(!timeout.is_surface_stale());

        let other = GpuError::frame(
            FrameStep::Present,
            GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
        );
        assert!(matches!(
            other,
            GpuError::FrameFailed {
                step: FrameStep::Present,
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            }
        ));
    }

    #[test]
    fn non_native_errors_pass_through() {
        let err = GpuError::frame(FrameStep::Record, GpuError::InvalidState("closed".into()));
        assert!(matches!(err, GpuError::InvalidState(_)));
    }

    #[test]
    fn messages_name_the_step() {
        let err = GpuError::SurfaceStale(FrameStep::Present);
        assert_eq!(err.to_string(), "Surface out of date during presentation");
    }
}
