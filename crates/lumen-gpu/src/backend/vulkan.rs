//! Vulkan backend over `ash`.

use std::ffi::{c_void, CStr, CString};

use ash::vk;

use super::{DeviceRequest, GraphicsApi, InstanceRequest, SubmitRequest, SwapchainRequest};
use crate::capabilities::DeviceInfo;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceProvider;

/// Instance-level extension loaders, alive as long as the instance.
struct InstanceLoaders {
    instance: ash::Instance,
    surface: ash::khr::surface::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
}

/// Device-level loaders, alive as long as the logical device.
struct DeviceLoaders {
    device: ash::Device,
    swapchain: ash::khr::swapchain::Device,
}

/// [`GraphicsApi`] backed by the system Vulkan loader.
pub struct AshApi {
    entry: ash::Entry,
    instance: Option<InstanceLoaders>,
    device: Option<DeviceLoaders>,
}

impl std::fmt::Debug for AshApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AshApi")
            .field("instance", &self.instance.as_ref().map(|i| i.instance.handle()))
            .field("device", &self.device.as_ref().map(|d| d.device.handle()))
            .finish()
    }
}

impl AshApi {
    /// Load the Vulkan entry points.
    pub fn load() -> Result<Self> {
        // SAFETY: the loaded library stays alive in `entry` for as long as any
        // handle derived from it.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        Ok(Self {
            entry,
            instance: None,
            device: None,
        })
    }

    fn instance(&self) -> Result<&InstanceLoaders> {
        self.instance
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("no Vulkan instance".into()))
    }

    fn device(&self) -> Result<&DeviceLoaders> {
        self.device
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("no logical device".into()))
    }
}

impl GraphicsApi for AshApi {
    fn available_layers(&self) -> Result<Vec<String>> {
        // SAFETY: only reads loader state.
        let layers = unsafe { self.entry.enumerate_instance_layer_properties()? };

        Ok(layers
            .iter()
            .filter_map(|props| props.layer_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn create_instance(&mut self, request: &InstanceRequest) -> Result<vk::Instance> {
        if self.instance.is_some() {
            return Err(GpuError::InvalidState("instance already created".into()));
        }

        let app_name = CString::new(request.app_name.as_str())
            .map_err(|e| GpuError::InvalidConfig(format!("application name: {e}")))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Lumen")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(request.api_version);

        let extension_names: Vec<_> = request.extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_names: Vec<_> = request.layers.iter().map(|l| l.as_ptr()).collect();

        // Required for MoltenVK on macOS
        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        // SAFETY: every pointer in `create_info` borrows from locals that outlive the call.
        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .map_err(|e| GpuError::InstanceCreation(e.to_string()))?;

        let debug_enabled = request.extensions.contains(&ash::ext::debug_utils::NAME);
        let handle = instance.handle();

        self.instance = Some(InstanceLoaders {
            surface: ash::khr::surface::Instance::new(&self.entry, &instance),
            debug_utils: debug_enabled
                .then(|| ash::ext::debug_utils::Instance::new(&self.entry, &instance)),
            instance,
        });

        Ok(handle)
    }

    fn destroy_instance(&mut self) {
        if let Some(loaders) = self.instance.take() {
            // SAFETY: the owner destroys every child object before the instance.
            unsafe { loaders.instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT> {
        let debug_utils = self.instance()?.debug_utils.as_ref().ok_or_else(|| {
            GpuError::DebugMessenger("instance was created without VK_EXT_debug_utils".into())
        })?;

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        // SAFETY: the callback is a plain function and needs no user data.
        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| GpuError::DebugMessenger(e.to_string()))
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(debug_utils) = self.instance.as_ref().and_then(|i| i.debug_utils.as_ref()) {
            // SAFETY: the messenger was created from this loader.
            unsafe { debug_utils.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn create_surface(&mut self, provider: &dyn SurfaceProvider) -> Result<vk::SurfaceKHR> {
        let loaders = self.instance()?;
        let display = provider.display_handle()?;
        let window = provider.window_handle()?;

        // SAFETY: the provider guarantees the handles are valid while the
        // window lives, and the owner destroys the surface before the window.
        unsafe {
            ash_window::create_surface(&self.entry, &loaders.instance, display, window, None)
        }
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loaders) = &self.instance {
            // SAFETY: the swapchain using this surface is already gone.
            unsafe { loaders.surface.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        // SAFETY: the instance is alive.
        Ok(unsafe { self.instance()?.instance.enumerate_physical_devices()? })
    }

    fn device_info(&self, device: vk::PhysicalDevice) -> Result<DeviceInfo> {
        // SAFETY: `device` was enumerated from this instance.
        let props = unsafe { self.instance()?.instance.get_physical_device_properties(device) };

        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_string());

        Ok(DeviceInfo {
            name,
            vendor_id: props.vendor_id,
            device_type: props.device_type,
            api_version: props.api_version,
        })
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Result<Vec<vk::QueueFamilyProperties>> {
        // SAFETY: `device` was enumerated from this instance.
        Ok(unsafe {
            self.instance()?
                .instance
                .get_physical_device_queue_family_properties(device)
        })
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        // SAFETY: `family` is below the device's family count.
        Ok(unsafe {
            self.instance()?
                .surface
                .get_physical_device_surface_support(device, family, surface)?
        })
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>> {
        // SAFETY: `device` was enumerated from this instance.
        let extensions = unsafe {
            self.instance()?
                .instance
                .enumerate_device_extension_properties(device)?
        };

        Ok(extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn device_features(&self, device: vk::PhysicalDevice) -> Result<vk::PhysicalDeviceFeatures> {
        // SAFETY: `device` was enumerated from this instance.
        Ok(unsafe { self.instance()?.instance.get_physical_device_features(device) })
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        // SAFETY: device and surface belong to this instance.
        Ok(unsafe {
            self.instance()?
                .surface
                .get_physical_device_surface_capabilities(device, surface)?
        })
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        // SAFETY: device and surface belong to this instance.
        Ok(unsafe {
            self.instance()?
                .surface
                .get_physical_device_surface_formats(device, surface)?
        })
    }

    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        // SAFETY: device and surface belong to this instance.
        Ok(unsafe {
            self.instance()?
                .surface
                .get_physical_device_surface_present_modes(device, surface)?
        })
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> Result<vk::Device> {
        if self.device.is_some() {
            return Err(GpuError::InvalidState("logical device already created".into()));
        }
        let loaders = self.instance()?;

        let queue_create_infos: Vec<_> = request
            .queues
            .iter()
            .map(|queue| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(queue.family)
                    .queue_priorities(&queue.priorities)
            })
            .collect();

        let extension_names: Vec<_> = request.extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_names: Vec<_> = request.layers.iter().map(|l| l.as_ptr()).collect();

        // Device layers are deprecated but older loaders still read them
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&request.features);

        // SAFETY: every pointer in `create_info` borrows from `request` or locals.
        let device = unsafe {
            loaders
                .instance
                .create_device(physical_device, &create_info, None)?
        };

        let handle = device.handle();
        let swapchain = ash::khr::swapchain::Device::new(&loaders.instance, &device);
        self.device = Some(DeviceLoaders { device, swapchain });

        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> Result<vk::Queue> {
        // SAFETY: the family/index pair was part of the device creation request.
        Ok(unsafe { self.device()?.device.get_device_queue(family, index) })
    }

    fn destroy_device(&mut self) {
        if let Some(loaders) = self.device.take() {
            // SAFETY: the device is idle and all of its children are destroyed.
            unsafe { loaders.device.destroy_device(None) };
        }
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        let loaders = self.device()?;

        let sharing_mode = if request.queue_families.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(request.surface)
            .min_image_count(request.min_image_count)
            .image_format(request.surface_format.format)
            .image_color_space(request.surface_format.color_space)
            .image_extent(request.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&request.queue_families)
            .pre_transform(request.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(request.present_mode)
            .clipped(true)
            .old_swapchain(request.old_swapchain);

        // SAFETY: the surface and the retiring swapchain are alive.
        Ok(unsafe { loaders.swapchain.create_swapchain(&create_info, None)? })
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        // SAFETY: `swapchain` came from this device.
        Ok(unsafe { self.device()?.swapchain.get_swapchain_images(swapchain)? })
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Some(loaders) = &self.device {
            // SAFETY: no frame is using the swapchain's images.
            unsafe { loaders.swapchain.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        // SAFETY: `image` is a live swapchain image.
        Ok(unsafe { self.device()?.device.create_image_view(&view_info, None)? })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Some(loaders) = &self.device {
            // SAFETY: framebuffers using the view are already gone.
            unsafe { loaders.device.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&self, format: vk::Format) -> Result<vk::RenderPass> {
        let attachments = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        // Make the layout transition wait for the acquire semaphore
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        // SAFETY: all arrays outlive the call.
        Ok(unsafe { self.device()?.device.create_render_pass(&create_info, None)? })
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        if let Some(loaders) = &self.device {
            // SAFETY: framebuffers built against the pass are already gone.
            unsafe { loaders.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        // SAFETY: the view matches the render pass's single colour attachment.
        Ok(unsafe { self.device()?.device.create_framebuffer(&create_info, None)? })
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        if let Some(loaders) = &self.device {
            // SAFETY: no pending command buffer references the framebuffer.
            unsafe { loaders.device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_command_pool(&self, queue_family: u32) -> Result<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        // SAFETY: the queue family exists on this device.
        Ok(unsafe { self.device()?.device.create_command_pool(&create_info, None)? })
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        if let Some(loaders) = &self.device {
            // SAFETY: none of the pool's buffers are pending.
            unsafe { loaders.device.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        // SAFETY: `pool` came from this device.
        Ok(unsafe { self.device()?.device.allocate_command_buffers(&alloc_info)? })
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if let Some(loaders) = &self.device {
            // SAFETY: the buffers were allocated from `pool` and are not pending.
            unsafe { loaders.device.free_command_buffers(pool, buffers) };
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: plain object creation on a live device.
        Ok(unsafe { self.device()?.device.create_semaphore(&create_info, None)? })
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        if let Some(loaders) = &self.device {
            // SAFETY: no queue operation waits on or signals the semaphore.
            unsafe { loaders.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: plain object creation on a live device.
        Ok(unsafe { self.device()?.device.create_fence(&create_info, None)? })
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        if let Some(loaders) = &self.device {
            // SAFETY: the fence is not armed by a pending submission.
            unsafe { loaders.device.destroy_fence(fence, None) };
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        // SAFETY: `fence` came from this device.
        unsafe { self.device()?.device.wait_for_fences(&[fence], true, timeout_ns)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        // SAFETY: the fence is signaled, so no submission still references it.
        unsafe { self.device()?.device.reset_fences(&[fence])? };
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool)> {
        // SAFETY: `semaphore` has no pending signal operation.
        Ok(unsafe {
            self.device()?.swapchain.acquire_next_image(
                swapchain,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )?
        })
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> Result<()> {
        let device = &self.device()?.device;
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        // SAFETY: the buffer's previous submission has completed.
        unsafe {
            device.reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(buffer, &begin_info)?;
        }
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> Result<()> {
        // SAFETY: the buffer is in the recording state.
        unsafe { self.device()?.device.end_command_buffer(buffer)? };
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let Some(loaders) = &self.device else {
            return;
        };

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        // SAFETY: the buffer is recording and the framebuffer matches the pass.
        unsafe {
            loaders
                .device
                .cmd_begin_render_pass(buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        if let Some(loaders) = &self.device {
            // SAFETY: a render pass is open on the buffer.
            unsafe { loaders.device.cmd_end_render_pass(buffer) };
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &SubmitRequest) -> Result<()> {
        let command_buffers = [submit.command_buffer];
        let wait_semaphores = [submit.wait_semaphore];
        let wait_stages = [submit.wait_stage];
        let signal_semaphores = [submit.signal_semaphore];

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the fence is unsignaled and the command buffer is executable.
        unsafe {
            self.device()?
                .device
                .queue_submit(queue, &[submit_info], submit.fence)?;
        }
        Ok(())
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: the image was acquired and its rendering submitted.
        Ok(unsafe {
            self.device()?
                .swapchain
                .queue_present(queue, &present_info)?
        })
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> Result<()> {
        // SAFETY: `queue` belongs to this device.
        unsafe { self.device()?.device.queue_wait_idle(queue)? };
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<()> {
        // SAFETY: plain wait on a live device.
        unsafe { self.device()?.device.device_wait_idle()? };
        Ok(())
    }
}

/// Forward validation messages to `tracing`.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes a valid callback struct for the duration of the call.
    let message = unsafe { callback_data.as_ref() }
        .filter(|data| !data.p_message.is_null())
        // SAFETY: non-null `p_message` is a NUL-terminated string owned by the loader.
        .map(|data| unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy())
        .unwrap_or_default();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", "{message_type:?}: {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", "{message_type:?}: {message}");
    } else {
        tracing::debug!(target: "vulkan", "{message_type:?}: {message}");
    }

    vk::FALSE
}
