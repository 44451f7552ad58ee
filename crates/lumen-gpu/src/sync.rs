//! Synchronization primitives.

use ash::vk;

use crate::backend::GraphicsApi;
use crate::error::{GpuError, Result};

/// Per-frame synchronization resources.
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    /// Semaphore signaled when image is available
    pub image_available: vk::Semaphore,
    /// Semaphore signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Signaled when this slot's last submission has finished on the device.
    /// Created signaled so the first wait returns immediately.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    /// Create frame synchronization resources.
    pub fn new<A: GraphicsApi + ?Sized>(api: &A) -> Result<Self> {
        let image_available = api.create_semaphore().map_err(sync_error)?;

        let render_finished = match api.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                api.destroy_semaphore(image_available);
                return Err(sync_error(e));
            }
        };

        let in_flight = match api.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                api.destroy_semaphore(render_finished);
                api.destroy_semaphore(image_available);
                return Err(sync_error(e));
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Destroy synchronization resources.
    ///
    /// The slot's work must have completed.
    pub fn destroy<A: GraphicsApi + ?Sized>(&self, api: &A) {
        api.destroy_fence(self.in_flight);
        api.destroy_semaphore(self.render_finished);
        api.destroy_semaphore(self.image_available);
    }
}

fn sync_error(e: GpuError) -> GpuError {
    GpuError::SyncObjectCreation(e.to_string())
}

/// Ring of frame slots for multiple frames in flight.
#[derive(Debug)]
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameSlots {
    /// Create `frames_in_flight` slots.
    pub fn new<A: GraphicsApi + ?Sized>(api: &A, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(GpuError::InvalidConfig(
                "at least one frame in flight is required".into(),
            ));
        }

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match FrameSlot::new(api) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        slot.destroy(api);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self { slots, current: 0 })
    }

    /// Get the current slot's sync resources.
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// Get the current slot index.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Swap the current slot's image-available semaphore for a fresh one.
    ///
    /// For an acquisition that will never be waited on, e.g. one made from
    /// a swapchain that has since been retired. The device must be idle.
    pub fn renew_image_available<A: GraphicsApi + ?Sized>(&mut self, api: &A) -> Result<()> {
        let semaphore = api.create_semaphore().map_err(sync_error)?;
        let slot = &mut self.slots[self.current];
        api.destroy_semaphore(slot.image_available);
        slot.image_available = semaphore;
        Ok(())
    }

    /// Advance to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Destroy all resources.
    ///
    /// The device must be idle.
    pub fn destroy<A: GraphicsApi + ?Sized>(self, api: &A) {
        for slot in &self.slots {
            slot.destroy(api);
        }
    }
}
