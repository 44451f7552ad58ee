//! Presentable image chain.

use ash::vk;

use crate::backend::{GraphicsApi, SwapchainRequest};
use crate::capabilities::query_swapchain_support;
use crate::device::LogicalDeviceBinding;
use crate::error::{GpuError, Result};

/// One swapchain image with its view and framebuffer.
///
/// View and framebuffer are null until [`PresentationSurface::create_targets`] runs.
#[derive(Debug, Clone, Copy)]
pub struct PresentableImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

/// What a swapchain build needs besides the device.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget {
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    /// Size to use when the surface leaves the extent up to us.
    pub desired_extent: vk::Extent2D,
    pub vsync: bool,
}

/// The swapchain and its presentable images.
#[derive(Debug)]
pub struct PresentationSurface {
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<PresentableImage>,
}

impl PresentationSurface {
    /// Build a swapchain for `target`.
    ///
    /// Surface support is queried afresh, so this is also the rebuild path.
    /// Pass the retiring swapchain as `old_swapchain`; the caller destroys it
    /// afterwards.
    pub fn create<A: GraphicsApi + ?Sized>(
        api: &A,
        target: &SurfaceTarget,
        binding: &LogicalDeviceBinding,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let support = query_swapchain_support(api, target.physical_device, target.surface)?;

        let surface_format = select_surface_format(&support.formats).ok_or_else(|| {
            GpuError::SwapchainCreation("surface reports no formats".into())
        })?;
        let present_mode = select_present_mode(&support.present_modes, target.vsync);
        let extent = calculate_extent(
            &support.capabilities,
            target.desired_extent.width,
            target.desired_extent.height,
        );

        if extent.width == 0 || extent.height == 0 {
            return Err(GpuError::SwapchainCreation(format!(
                "surface has zero area ({}x{})",
                extent.width, extent.height
            )));
        }

        let request = SwapchainRequest {
            surface: target.surface,
            min_image_count: choose_image_count(&support.capabilities),
            surface_format,
            extent,
            present_mode,
            pre_transform: support.capabilities.current_transform,
            queue_families: binding.image_sharing_families(),
            old_swapchain,
        };

        let swapchain = api
            .create_swapchain(&request)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = match api.swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                api.destroy_swapchain(swapchain);
                return Err(e);
            }
        };

        tracing::info!(
            "Swapchain: {} images, {:?}, {:?}, {}x{}",
            images.len(),
            surface_format.format,
            present_mode,
            extent.width,
            extent.height
        );

        Ok(Self {
            swapchain,
            surface_format,
            present_mode,
            extent,
            images: images
                .into_iter()
                .map(|image| PresentableImage {
                    image,
                    view: vk::ImageView::null(),
                    framebuffer: vk::Framebuffer::null(),
                })
                .collect(),
        })
    }

    /// Create a view and a framebuffer for every image.
    ///
    /// On failure the targets created so far are destroyed again.
    pub fn create_targets<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        for i in 0..self.images.len() {
            if let Err(e) = self.create_target(api, i, render_pass) {
                self.destroy_targets(api);
                return Err(GpuError::ResourceCreation(e.to_string()));
            }
        }
        Ok(())
    }

    fn create_target<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &A,
        index: usize,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        let format = self.surface_format.format;
        let extent = self.extent;
        let target = &mut self.images[index];

        target.view = api.create_image_view(target.image, format)?;
        target.framebuffer = api.create_framebuffer(render_pass, target.view, extent)?;
        Ok(())
    }

    /// Destroy framebuffers, then views. Images stay with the swapchain.
    pub fn destroy_targets<A: GraphicsApi + ?Sized>(&mut self, api: &A) {
        for target in &mut self.images {
            if target.framebuffer != vk::Framebuffer::null() {
                api.destroy_framebuffer(target.framebuffer);
                target.framebuffer = vk::Framebuffer::null();
            }
        }
        for target in &mut self.images {
            if target.view != vk::ImageView::null() {
                api.destroy_image_view(target.view);
                target.view = vk::ImageView::null();
            }
        }
    }

    /// Destroy the targets and the swapchain.
    pub fn destroy<A: GraphicsApi + ?Sized>(mut self, api: &A) {
        self.destroy_targets(api);
        api.destroy_swapchain(self.swapchain);
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Get the image format.
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: u32) -> Option<&PresentableImage> {
        self.images.get(index as usize)
    }

    pub fn images(&self) -> &[PresentableImage] {
        &self.images
    }
}

/// Select the best surface format.
///
/// `None` only when `available` is empty.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    // Prefer SRGB
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    // Mailbox first, then immediate; FIFO is always supported
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image more than the minimum, capped by the maximum (0 means no cap).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}
