//! Per-frame acquire, record, submit and present.
//!
//! One cycle per rendered frame:
//!
//! ```text
//! Idle -> Acquiring -> Recording -> Submitted -> Presenting -> Idle
//! ```
//!
//! Frame slots are picked by frame number, not by swapchain image, so the
//! number of frames in flight and the image count vary independently. Each
//! image remembers the fence of the slot that last submitted work for it.

use std::time::Duration;

use ash::vk;

use crate::backend::{GraphicsApi, SubmitRequest};
use crate::command::CommandPool;
use crate::device::LogicalDeviceBinding;
use crate::error::{FrameStep, GpuError, Result};
use crate::swapchain::PresentationSurface;
use crate::sync::{FrameSlot, FrameSlots};

/// Default number of frames that may be in flight at once.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Default bound on fence waits and image acquisition.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default clear colour (magenta).
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

/// Where the frame loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// How a presented frame went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly.
    /// Rebuilding is advised.
    Suboptimal,
}

/// The open frame, handed to the caller between `begin_frame` and `end_frame`.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Swapchain image being rendered.
    pub image_index: u32,
    /// Frame slot whose fence and semaphores this frame uses.
    pub slot_index: usize,
    /// Command buffer in the recording state, inside the render pass.
    pub command_buffer: vk::CommandBuffer,
    /// Frames completed before this one.
    pub frame_number: u64,
    pub extent: vk::Extent2D,
}

/// Frame loop settings.
#[derive(Debug, Clone, Copy)]
pub struct FrameConfig {
    pub frames_in_flight: usize,
    pub timeout: Duration,
    pub clear_color: [f32; 4],
    /// Block on the present queue after every present.
    pub wait_for_present_idle: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            timeout: DEFAULT_TIMEOUT,
            clear_color: DEFAULT_CLEAR_COLOR,
            wait_for_present_idle: true,
        }
    }
}

/// Everything a frame renders into, borrowed from the owner for one call.
#[derive(Debug, Clone, Copy)]
pub struct FrameTargets<'a> {
    pub binding: &'a LogicalDeviceBinding,
    pub surface: &'a PresentationSurface,
    pub render_pass: vk::RenderPass,
    pub commands: &'a CommandPool,
}

/// Drives the per-frame state machine.
#[derive(Debug)]
pub struct FrameSynchronizer {
    config: FrameConfig,
    slots: FrameSlots,
    /// Fence of the slot that last submitted work for each image; null if none.
    images_in_flight: Vec<vk::Fence>,
    state: FrameState,
    frame_number: u64,
    open: Option<FrameContext>,
    acquired_suboptimal: bool,
    /// Image acquired by an attempt that failed before recording. The
    /// current slot's image-available semaphore holds its signal.
    pending_acquire: Option<(u32, bool)>,
}

impl FrameSynchronizer {
    /// Create the slot ring and per-image tracking for `image_count` images.
    pub fn new<A: GraphicsApi + ?Sized>(
        api: &A,
        config: FrameConfig,
        image_count: usize,
    ) -> Result<Self> {
        let slots = FrameSlots::new(api, config.frames_in_flight)?;

        tracing::debug!(
            "Frame sync: {} slot(s) for {} image(s)",
            slots.len(),
            image_count
        );

        Ok(Self {
            config,
            slots,
            images_in_flight: vec![vk::Fence::null(); image_count],
            state: FrameState::Idle,
            frame_number: 0,
            open: None,
            acquired_suboptimal: false,
            pending_acquire: None,
        })
    }

    fn timeout_ns(&self) -> u64 {
        u64::try_from(self.config.timeout.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Acquire an image and open its command buffer inside the render pass.
    ///
    /// On failure the state returns to [`FrameState::Idle`]. A stale surface
    /// or a timeout leaves the slot fence untouched, so the call can be
    /// retried once the cause is dealt with. If the image was acquired but
    /// is still in use by another slot, the retry keeps that image rather
    /// than acquiring again.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn begin_frame<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        targets: &FrameTargets<'_>,
    ) -> Result<FrameContext> {
        if self.state != FrameState::Idle {
            return Err(GpuError::InvalidState(format!(
                "begin_frame called while {:?}",
                self.state
            )));
        }

        self.state = FrameState::Acquiring;
        match self.acquire(api, targets) {
            Ok(frame) => {
                self.state = FrameState::Recording;
                self.open = Some(frame);
                Ok(frame)
            }
            Err(e) => {
                self.state = FrameState::Idle;
                Err(e)
            }
        }
    }

    fn acquire<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        targets: &FrameTargets<'_>,
    ) -> Result<FrameContext> {
        let timeout = self.timeout_ns();
        let slot = *self.slots.current();
        let slot_index = self.slots.current_index();

        let (image_index, suboptimal) = match self.pending_acquire.take() {
            // Slot fence already waited on and still signaled
            Some(acquired) => acquired,
            None => {
                // The slot's semaphores are only free once its last submission is done
                api.wait_for_fence(slot.in_flight, timeout)
                    .map_err(|e| GpuError::frame(FrameStep::WaitFence, e))?;

                for owner in &mut self.images_in_flight {
                    if *owner == slot.in_flight {
                        *owner = vk::Fence::null();
                    }
                }

                api.acquire_next_image(targets.surface.swapchain(), timeout, slot.image_available)
                    .map_err(|e| GpuError::frame(FrameStep::Acquire, e))?
            }
        };

        let image = targets.surface.image(image_index).ok_or_else(|| {
            GpuError::InvalidState(format!("acquired image {image_index} out of range"))
        })?;
        let command_buffer = targets.commands.buffer(image_index).ok_or_else(|| {
            GpuError::InvalidState(format!("no command buffer for image {image_index}"))
        })?;

        // Another slot may still be rendering to this image
        let owner = self
            .images_in_flight
            .get(image_index as usize)
            .copied()
            .unwrap_or_default();
        if owner != vk::Fence::null() {
            if let Err(e) = api.wait_for_fence(owner, timeout) {
                self.pending_acquire = Some((image_index, suboptimal));
                return Err(GpuError::frame(FrameStep::WaitImage, e));
            }
        }

        api.reset_fence(slot.in_flight)
            .map_err(|e| GpuError::frame(FrameStep::ResetFence, e))?;

        api.begin_command_buffer(command_buffer)
            .map_err(|e| GpuError::frame(FrameStep::Record, e))?;

        let extent = targets.surface.extent();
        api.cmd_begin_render_pass(
            command_buffer,
            targets.render_pass,
            image.framebuffer,
            extent,
            self.config.clear_color,
        );

        self.acquired_suboptimal = suboptimal;

        Ok(FrameContext {
            image_index,
            slot_index,
            command_buffer,
            frame_number: self.frame_number,
            extent,
        })
    }

    /// Close the open frame, submit it and present it.
    ///
    /// Once the submission is made the slot cursor advances whatever the
    /// present step reports.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn end_frame<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        targets: &FrameTargets<'_>,
    ) -> Result<PresentOutcome> {
        let frame = match (self.state, self.open) {
            (FrameState::Recording, Some(frame)) => frame,
            (state, _) => {
                return Err(GpuError::InvalidState(format!(
                    "end_frame called while {state:?}"
                )))
            }
        };
        self.open = None;

        let slot = *self.slots.current();

        if let Err(e) = self.submit(api, targets, &frame, &slot) {
            self.state = FrameState::Idle;
            return Err(e);
        }

        self.state = FrameState::Presenting;
        let presented = self.present(api, targets, &frame, &slot);

        self.slots.advance();
        self.frame_number += 1;
        self.state = FrameState::Idle;

        let suboptimal = presented? || std::mem::take(&mut self.acquired_suboptimal);
        Ok(if suboptimal {
            PresentOutcome::Suboptimal
        } else {
            PresentOutcome::Presented
        })
    }

    fn submit<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        targets: &FrameTargets<'_>,
        frame: &FrameContext,
        slot: &FrameSlot,
    ) -> Result<()> {
        api.cmd_end_render_pass(frame.command_buffer);
        api.end_command_buffer(frame.command_buffer)
            .map_err(|e| GpuError::frame(FrameStep::Record, e))?;

        let request = SubmitRequest {
            command_buffer: frame.command_buffer,
            wait_semaphore: slot.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.render_finished,
            fence: slot.in_flight,
        };

        api.queue_submit(targets.binding.graphics_queue, &request)
            .map_err(|e| GpuError::frame(FrameStep::Submit, e))?;
        self.state = FrameState::Submitted;

        if let Some(owner) = self.images_in_flight.get_mut(frame.image_index as usize) {
            *owner = slot.in_flight;
        }

        Ok(())
    }

    fn present<A: GraphicsApi + ?Sized>(
        &self,
        api: &A,
        targets: &FrameTargets<'_>,
        frame: &FrameContext,
        slot: &FrameSlot,
    ) -> Result<bool> {
        let present_queue = targets.binding.present_queue;

        let suboptimal = api
            .queue_present(
                present_queue,
                targets.surface.swapchain(),
                frame.image_index,
                slot.render_finished,
            )
            .map_err(|e| GpuError::frame(FrameStep::Present, e))?;

        if self.config.wait_for_present_idle {
            api.queue_wait_idle(present_queue)
                .map_err(|e| GpuError::frame(FrameStep::WaitPresentIdle, e))?;
        }

        Ok(suboptimal)
    }

    /// Forget which slot owned which image, for a rebuilt swapchain.
    ///
    /// An image still held from an unfinished `begin_frame` is dropped along
    /// with its signaled semaphore. Only valid between frames with the
    /// device idle.
    pub fn reset_images<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        image_count: usize,
    ) -> Result<()> {
        if self.state != FrameState::Idle {
            return Err(GpuError::InvalidState(format!(
                "cannot reset image tracking while {:?}",
                self.state
            )));
        }
        if let Some((image_index, _)) = self.pending_acquire.take() {
            tracing::debug!("Dropping unused acquisition of image {}", image_index);
            self.slots.renew_image_available(api)?;
        }
        self.images_in_flight = vec![vk::Fence::null(); image_count];
        self.acquired_suboptimal = false;
        Ok(())
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Frames completed so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Slot the next frame will use.
    pub fn current_slot(&self) -> &FrameSlot {
        self.slots.current()
    }

    pub fn slots(&self) -> &FrameSlots {
        &self.slots
    }

    /// Image acquired by a `begin_frame` that has not completed yet.
    pub fn pending_image(&self) -> Option<u32> {
        self.pending_acquire.map(|(image_index, _)| image_index)
    }

    /// Fence of the slot that last submitted work for `image_index`.
    pub fn image_owner(&self, image_index: u32) -> Option<vk::Fence> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .filter(|fence| *fence != vk::Fence::null())
    }

    /// Destroy the slots. The device must be idle.
    pub fn destroy<A: GraphicsApi + ?Sized>(self, api: &A) {
        self.slots.destroy(api);
    }
}
