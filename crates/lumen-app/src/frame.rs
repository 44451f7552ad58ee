//! Per-frame context for rendering.

use ash::vk;

/// Context for the frame being recorded.
///
/// The command buffer is already inside the clearing render pass; anything
/// recorded into it lands on the acquired swapchain image.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Command buffer for recording rendering commands.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// Frame slot in use.
    pub slot_index: usize,
    /// Size of the swapchain images.
    pub extent: vk::Extent2D,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Current frame number.
    pub frame_number: u64,
}

impl FrameContext {
    pub(crate) fn new(frame: &lumen_gpu::FrameContext, dt: f32) -> Self {
        Self {
            command_buffer: frame.command_buffer,
            image_index: frame.image_index,
            slot_index: frame.slot_index,
            extent: frame.extent,
            dt,
            frame_number: frame.frame_number,
        }
    }

    /// Full-extent viewport for the current images.
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}
