//! Command buffer management.

use ash::vk;

use crate::backend::GraphicsApi;
use crate::error::{GpuError, Result};

/// Graphics command pool with one primary command buffer per swapchain image.
#[derive(Debug)]
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandPool {
    /// Create a pool on `queue_family` and allocate `image_count` buffers.
    pub fn new<A: GraphicsApi + ?Sized>(
        api: &A,
        queue_family: u32,
        image_count: usize,
    ) -> Result<Self> {
        let pool = api
            .create_command_pool(queue_family)
            .map_err(|e| GpuError::ResourceCreation(format!("command pool: {e}")))?;

        let mut this = Self {
            pool,
            queue_family,
            buffers: Vec::new(),
        };

        if let Err(e) = this.reallocate(api, image_count) {
            api.destroy_command_pool(pool);
            return Err(e);
        }

        Ok(this)
    }

    /// Free the current buffers and allocate `image_count` fresh ones.
    ///
    /// Used after a swapchain rebuild, when the image count may have changed.
    pub fn reallocate<A: GraphicsApi + ?Sized>(&mut self, api: &A, image_count: usize) -> Result<()> {
        self.free_buffers(api);

        let count = u32::try_from(image_count)
            .map_err(|_| GpuError::InvalidConfig(format!("{image_count} command buffers")))?;
        self.buffers = api
            .allocate_command_buffers(self.pool, count)
            .map_err(|e| GpuError::ResourceCreation(format!("command buffers: {e}")))?;

        Ok(())
    }

    fn free_buffers<A: GraphicsApi + ?Sized>(&mut self, api: &A) {
        if !self.buffers.is_empty() {
            api.free_command_buffers(self.pool, &self.buffers);
            self.buffers.clear();
        }
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Get the queue family index.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Command buffer recorded for swapchain image `image_index`.
    pub fn buffer(&self, image_index: u32) -> Option<vk::CommandBuffer> {
        self.buffers.get(image_index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Free the buffers and destroy the pool.
    ///
    /// The device must be idle.
    pub fn destroy<A: GraphicsApi + ?Sized>(mut self, api: &A) {
        self.free_buffers(api);
        api.destroy_command_pool(self.pool);
    }
}
