//! Seam between the frame machinery and the graphics API runtime.
//!
//! Everything above this module talks to the device through [`GraphicsApi`].
//! [`AshApi`] is the Vulkan implementation; tests drive the same code with a
//! recording fake.

mod vulkan;

pub use self::vulkan::AshApi;

use std::ffi::CStr;

use ash::vk;

use crate::capabilities::DeviceInfo;
use crate::error::Result;
use crate::surface::SurfaceProvider;

/// Instance creation request.
#[derive(Debug, Clone)]
pub struct InstanceRequest {
    pub app_name: String,
    pub api_version: u32,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
}

/// One queue family's share of a device creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub family: u32,
    pub priorities: Vec<f32>,
}

/// Logical device creation request.
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub queues: Vec<QueueRequest>,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
    pub features: vk::PhysicalDeviceFeatures,
}

/// Swapchain creation request.
#[derive(Debug, Clone)]
pub struct SwapchainRequest {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Queue families touching the images; more than one means concurrent sharing.
    pub queue_families: Vec<u32>,
    pub old_swapchain: vk::SwapchainKHR,
}

/// A single command buffer submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest {
    pub command_buffer: vk::CommandBuffer,
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

/// Graphics API runtime as seen by the device selector, the surface manager,
/// the frame synchronizer and the lifecycle owner.
///
/// Methods taking `&mut self` create or destroy the objects the backend keeps
/// loaders for (instance, device). Destroy calls on null or unknown handles are
/// the caller's bug; implementations are not required to detect them.
pub trait GraphicsApi {
    // Instance level

    /// Names of the instance layers installed on this machine.
    fn available_layers(&self) -> Result<Vec<String>>;

    fn create_instance(&mut self, request: &InstanceRequest) -> Result<vk::Instance>;

    fn destroy_instance(&mut self);

    /// Register the validation message callback.
    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT>;

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);

    fn create_surface(&mut self, provider: &dyn SurfaceProvider) -> Result<vk::SurfaceKHR>;

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;

    fn device_info(&self, device: vk::PhysicalDevice) -> Result<DeviceInfo>;

    fn queue_families(&self, device: vk::PhysicalDevice) -> Result<Vec<vk::QueueFamilyProperties>>;

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool>;

    fn device_extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>>;

    fn device_features(&self, device: vk::PhysicalDevice) -> Result<vk::PhysicalDeviceFeatures>;

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR>;

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>>;

    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>>;

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> Result<vk::Device>;

    fn device_queue(&self, family: u32, index: u32) -> Result<vk::Queue>;

    fn destroy_device(&mut self);

    // Device level

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    /// Single-subpass render pass clearing one colour attachment for presentation.
    fn create_render_pass(&self, format: vk::Format) -> Result<vk::RenderPass>;

    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_command_pool(&self, queue_family: u32) -> Result<vk::CommandPool>;

    fn destroy_command_pool(&self, pool: vk::CommandPool);

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    fn create_semaphore(&self) -> Result<vk::Semaphore>;

    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;

    fn destroy_fence(&self, fence: vk::Fence);

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    /// Returns the image index and whether the swapchain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool)>;

    /// Reset and begin a one-time-submit recording.
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> Result<()>;

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> Result<()>;

    fn cmd_begin_render_pass(
        &self,
        buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    );

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);

    fn queue_submit(&self, queue: vk::Queue, submit: &SubmitRequest) -> Result<()>;

    /// Returns whether the swapchain is suboptimal.
    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool>;

    fn queue_wait_idle(&self, queue: vk::Queue) -> Result<()>;

    fn device_wait_idle(&self) -> Result<()>;
}
