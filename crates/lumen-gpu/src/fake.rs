//! Recording stand-in for the Vulkan runtime.
//!
//! Handles are plain counters. Fences only signal on an explicit completion
//! event (`complete_all`, a queue/device idle wait), so tests can observe the
//! host/device ordering the frame loop relies on.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::backend::{
    DeviceRequest, GraphicsApi, InstanceRequest, SubmitRequest, SwapchainRequest,
};
use crate::capabilities::DeviceInfo;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceProvider;

/// A queue family as the fake reports it.
#[derive(Debug, Clone, Copy)]
pub struct FakeQueueFamily {
    pub flags: vk::QueueFlags,
    pub count: u32,
    pub present: bool,
}

impl FakeQueueFamily {
    pub fn graphics() -> Self {
        Self {
            flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            count: 1,
            present: false,
        }
    }

    pub fn present() -> Self {
        Self {
            flags: vk::QueueFlags::TRANSFER,
            count: 1,
            present: true,
        }
    }

    pub fn graphics_present() -> Self {
        Self {
            present: true,
            ..Self::graphics()
        }
    }

    pub fn compute() -> Self {
        Self {
            flags: vk::QueueFlags::COMPUTE,
            count: 1,
            present: false,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// A physical device as the fake reports it.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub name: String,
    pub queue_families: Vec<FakeQueueFamily>,
    pub extensions: Vec<String>,
    pub anisotropy: bool,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl FakeDevice {
    /// A device passing every suitability check: one family doing graphics and
    /// present, the swapchain extension, anisotropy, sRGB format, FIFO and
    /// mailbox, room for three images.
    pub fn capable(name: &str) -> Self {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };

        Self {
            name: name.to_string(),
            queue_families: vec![FakeQueueFamily::graphics_present()],
            extensions: vec![
                ash::khr::swapchain::NAME.to_string_lossy().into_owned(),
                "VK_KHR_maintenance1".to_string(),
            ],
            anisotropy: true,
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: extent,
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn with_queue_families(mut self, families: Vec<FakeQueueFamily>) -> Self {
        self.queue_families = families;
        self
    }

    pub fn without_extensions(mut self) -> Self {
        self.extensions.clear();
        self
    }

    pub fn without_anisotropy(mut self) -> Self {
        self.anisotropy = false;
        self
    }

    pub fn without_formats(mut self) -> Self {
        self.formats.clear();
        self
    }

    pub fn without_present_modes(mut self) -> Self {
        self.present_modes.clear();
        self
    }
}

/// Everything the fake has seen and the knobs tests turn.
#[derive(Debug, Default)]
pub struct FakeState {
    pub devices: Vec<FakeDevice>,
    pub layers: Vec<String>,

    /// Operation names in call order.
    pub calls: Vec<&'static str>,
    pub created: HashMap<&'static str, usize>,
    pub destroyed: HashMap<&'static str, usize>,
    /// Destroy calls on handles that were not alive.
    pub invalid_destroys: Vec<(&'static str, u64)>,

    pub instance_request: Option<InstanceRequest>,
    pub device_request: Option<DeviceRequest>,
    pub swapchain_requests: Vec<SwapchainRequest>,
    pub surface_support_queries: usize,

    /// Fences passed to `wait_for_fence`, in order.
    pub fence_waits: Vec<vk::Fence>,
    /// Waits on fences whose work never completed. Each one would hang a real device.
    pub unsignaled_waits: Vec<vk::Fence>,
    /// Submissions made with a fence that was still signaled.
    pub submits_with_signaled_fence: usize,
    pub submits: Vec<SubmitRequest>,
    pub presents: Vec<(vk::Queue, u32, vk::Semaphore)>,
    pub acquired: Vec<u32>,
    pub render_passes_begun: Vec<(vk::CommandBuffer, vk::Framebuffer, [f32; 4])>,
    /// Semaphores passed to `acquire_next_image`, in order.
    pub acquire_semaphores: Vec<vk::Semaphore>,
    /// Binary semaphore misuse: a signal while one is already pending, or a
    /// wait with nothing pending. Each entry is invalid on a real device.
    pub semaphore_misuse: Vec<(&'static str, vk::Semaphore)>,

    /// Scripted acquire results, consumed front to back before falling back to round-robin.
    pub acquire_script: VecDeque<std::result::Result<u32, vk::Result>>,
    /// Scripted present results.
    pub present_script: VecDeque<std::result::Result<bool, vk::Result>>,
    /// Scripted submit failures.
    pub submit_script: VecDeque<vk::Result>,
    /// Operations that fail every time with the given code.
    pub failures: HashMap<&'static str, vk::Result>,
    /// Surface extent reported from now on.
    pub surface_extent: Option<vk::Extent2D>,
    /// Surface format reported from now on, replacing the device's list.
    pub surface_format: Option<vk::SurfaceFormatKHR>,

    next_handle: u64,
    live: HashSet<(&'static str, u64)>,
    instance: Option<u64>,
    device: Option<u64>,
    fences: HashMap<u64, bool>,
    pending: VecDeque<vk::Fence>,
    /// Semaphores with a signal nobody has waited on yet.
    signaled_semaphores: HashSet<u64>,
    swapchain_images: HashMap<u64, u32>,
    next_image: u32,
}

impl FakeState {
    fn call(&mut self, op: &'static str) -> Result<()> {
        self.calls.push(op);
        match self.failures.get(op) {
            Some(&code) => Err(GpuError::Vulkan(code)),
            None => Ok(()),
        }
    }

    fn handle(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.insert((kind, raw));
        *self.created.entry(kind).or_default() += 1;
        raw
    }

    fn release(&mut self, kind: &'static str, raw: u64) {
        if self.live.remove(&(kind, raw)) {
            *self.destroyed.entry(kind).or_default() += 1;
        } else {
            self.invalid_destroys.push((kind, raw));
        }
    }

    fn device(&self, device: vk::PhysicalDevice) -> Result<&FakeDevice> {
        let index = device.as_raw().checked_sub(1).ok_or(GpuError::Vulkan(
            vk::Result::ERROR_INITIALIZATION_FAILED,
        ))?;
        self.devices
            .get(index as usize)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))
    }

    fn complete_all(&mut self) {
        for fence in self.pending.drain(..) {
            self.fences.insert(fence.as_raw(), true);
        }
    }

    fn signal_semaphore(&mut self, op: &'static str, semaphore: vk::Semaphore) {
        if !self.signaled_semaphores.insert(semaphore.as_raw()) {
            self.semaphore_misuse.push((op, semaphore));
        }
    }

    fn wait_semaphore(&mut self, op: &'static str, semaphore: vk::Semaphore) {
        if !self.signaled_semaphores.remove(&semaphore.as_raw()) {
            self.semaphore_misuse.push((op, semaphore));
        }
    }

    /// Live objects of `kind`.
    pub fn live(&self, kind: &'static str) -> usize {
        self.live.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn created(&self, kind: &'static str) -> usize {
        self.created.get(kind).copied().unwrap_or_default()
    }

    pub fn destroyed(&self, kind: &'static str) -> usize {
        self.destroyed.get(kind).copied().unwrap_or_default()
    }

    /// Position of the first call named `op`.
    pub fn position(&self, op: &str) -> Option<usize> {
        self.calls.iter().position(|call| *call == op)
    }
}

/// Cloneable handle onto shared fake state.
#[derive(Debug, Clone)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::with_devices(vec![FakeDevice::capable("Fake GPU")])
    }
}

impl FakeApi {
    pub fn with_devices(devices: Vec<FakeDevice>) -> Self {
        let state = FakeState {
            devices,
            layers: vec![
                "VK_LAYER_KHRONOS_validation".to_string(),
                "VK_LAYER_MESA_device_select".to_string(),
            ],
            ..FakeState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Make every call to `op` fail with `code`.
    pub fn fail(&self, op: &'static str, code: vk::Result) {
        self.state().failures.insert(op, code);
    }

    pub fn physical_device(&self, index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(index as u64 + 1)
    }

    /// A surface handle for tests that skip the lifecycle owner.
    pub fn test_surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5EF)
    }

    /// Signal every fence armed by a submission so far.
    pub fn complete_all(&self) {
        self.state().complete_all();
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state()
            .fences
            .get(&fence.as_raw())
            .copied()
            .unwrap_or_default()
    }

    /// Signal the fence of the oldest unfinished submission, as an in-order
    /// queue would. Returns false if nothing was pending.
    pub fn complete_oldest(&self) -> bool {
        let mut state = self.state();
        match state.pending.pop_front() {
            Some(fence) => {
                state.fences.insert(fence.as_raw(), true);
                true
            }
            None => false,
        }
    }

    /// Whether `semaphore` holds a signal nobody has waited on.
    pub fn semaphore_pending(&self, semaphore: vk::Semaphore) -> bool {
        self.state().signaled_semaphores.contains(&semaphore.as_raw())
    }

    /// Number of submissions whose fence has not signaled yet.
    pub fn pending_submissions(&self) -> usize {
        self.state().pending.len()
    }
}

impl GraphicsApi for FakeApi {
    fn available_layers(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        state.call("available_layers")?;
        Ok(state.layers.clone())
    }

    fn create_instance(&mut self, request: &InstanceRequest) -> Result<vk::Instance> {
        let mut state = self.state();
        state.call("create_instance")?;
        state.instance_request = Some(request.clone());
        let raw = state.handle("instance");
        state.instance = Some(raw);
        Ok(vk::Instance::from_raw(raw))
    }

    fn destroy_instance(&mut self) {
        let mut state = self.state();
        state.calls.push("destroy_instance");
        match state.instance.take() {
            Some(raw) => state.release("instance", raw),
            None => state.invalid_destroys.push(("instance", 0)),
        }
    }

    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT> {
        let mut state = self.state();
        state.call("create_debug_messenger")?;
        Ok(vk::DebugUtilsMessengerEXT::from_raw(
            state.handle("debug_messenger"),
        ))
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        let mut state = self.state();
        state.calls.push("destroy_debug_messenger");
        state.release("debug_messenger", messenger.as_raw());
    }

    fn create_surface(&mut self, _provider: &dyn SurfaceProvider) -> Result<vk::SurfaceKHR> {
        let mut state = self.state();
        state.call("create_surface")?;
        Ok(vk::SurfaceKHR::from_raw(state.handle("surface")))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        let mut state = self.state();
        state.calls.push("destroy_surface");
        state.release("surface", surface.as_raw());
    }

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        let mut state = self.state();
        state.call("enumerate_physical_devices")?;
        Ok((0..state.devices.len())
            .map(|i| vk::PhysicalDevice::from_raw(i as u64 + 1))
            .collect())
    }

    fn device_info(&self, device: vk::PhysicalDevice) -> Result<DeviceInfo> {
        let state = self.state();
        let fake = state.device(device)?;
        Ok(DeviceInfo {
            name: fake.name.clone(),
            vendor_id: 0x10DE,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_0,
        })
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Result<Vec<vk::QueueFamilyProperties>> {
        let state = self.state();
        Ok(state
            .device(device)?
            .queue_families
            .iter()
            .map(|family| vk::QueueFamilyProperties {
                queue_flags: family.flags,
                queue_count: family.count,
                ..Default::default()
            })
            .collect())
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        let mut state = self.state();
        state.surface_support_queries += 1;
        let fake = state.device(device)?;
        Ok(fake
            .queue_families
            .get(family as usize)
            .is_some_and(|f| f.present))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let state = self.state();
        Ok(state.device(device)?.extensions.clone())
    }

    fn device_features(&self, device: vk::PhysicalDevice) -> Result<vk::PhysicalDeviceFeatures> {
        let state = self.state();
        let anisotropy = state.device(device)?.anisotropy;
        Ok(vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy))
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        let mut state = self.state();
        state.call("surface_capabilities")?;
        let mut capabilities = state.device(device)?.capabilities;
        if let Some(extent) = state.surface_extent {
            capabilities.current_extent = extent;
        }
        Ok(capabilities)
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        let mut state = self.state();
        state.call("surface_formats")?;
        if let Some(format) = state.surface_format {
            return Ok(vec![format]);
        }
        Ok(state.device(device)?.formats.clone())
    }

    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        let mut state = self.state();
        state.call("surface_present_modes")?;
        Ok(state.device(device)?.present_modes.clone())
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> Result<vk::Device> {
        let mut state = self.state();
        state.call("create_device")?;
        state.device_request = Some(request.clone());
        let raw = state.handle("device");
        state.device = Some(raw);
        Ok(vk::Device::from_raw(raw))
    }

    fn device_queue(&self, family: u32, index: u32) -> Result<vk::Queue> {
        Ok(vk::Queue::from_raw(
            0x1000 + u64::from(family) * 0x10 + u64::from(index),
        ))
    }

    fn destroy_device(&mut self) {
        let mut state = self.state();
        state.calls.push("destroy_device");
        match state.device.take() {
            Some(raw) => state.release("device", raw),
            None => state.invalid_destroys.push(("device", 0)),
        }
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        let mut state = self.state();
        state.call("create_swapchain")?;
        state.swapchain_requests.push(request.clone());
        let raw = state.handle("swapchain");
        state.swapchain_images.insert(raw, request.min_image_count);
        state.next_image = 0;
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        let state = self.state();
        let count = state
            .swapchain_images
            .get(&swapchain.as_raw())
            .copied()
            .unwrap_or_default();
        Ok((0..count)
            .map(|i| vk::Image::from_raw(swapchain.as_raw() * 0x100 + u64::from(i)))
            .collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        state.calls.push("destroy_swapchain");
        state.release("swapchain", swapchain.as_raw());
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> Result<vk::ImageView> {
        let mut state = self.state();
        state.call("create_image_view")?;
        Ok(vk::ImageView::from_raw(state.handle("image_view")))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state();
        state.calls.push("destroy_image_view");
        state.release("image_view", view.as_raw());
    }

    fn create_render_pass(&self, _format: vk::Format) -> Result<vk::RenderPass> {
        let mut state = self.state();
        state.call("create_render_pass")?;
        Ok(vk::RenderPass::from_raw(state.handle("render_pass")))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut state = self.state();
        state.calls.push("destroy_render_pass");
        state.release("render_pass", render_pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let mut state = self.state();
        state.call("create_framebuffer")?;
        Ok(vk::Framebuffer::from_raw(state.handle("framebuffer")))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state();
        state.calls.push("destroy_framebuffer");
        state.release("framebuffer", framebuffer.as_raw());
    }

    fn create_command_pool(&self, _queue_family: u32) -> Result<vk::CommandPool> {
        let mut state = self.state();
        state.call("create_command_pool")?;
        Ok(vk::CommandPool::from_raw(state.handle("command_pool")))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.state();
        state.calls.push("destroy_command_pool");
        state.release("command_pool", pool.as_raw());
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.state();
        state.call("allocate_command_buffers")?;
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.handle("command_buffer")))
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.state();
        state.calls.push("free_command_buffers");
        for buffer in buffers {
            state.release("command_buffer", buffer.as_raw());
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut state = self.state();
        state.call("create_semaphore")?;
        Ok(vk::Semaphore::from_raw(state.handle("semaphore")))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state();
        state.calls.push("destroy_semaphore");
        state.signaled_semaphores.remove(&semaphore.as_raw());
        state.release("semaphore", semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let mut state = self.state();
        state.call("create_fence")?;
        let raw = state.handle("fence");
        state.fences.insert(raw, signaled);
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        state.calls.push("destroy_fence");
        state.fences.remove(&fence.as_raw());
        state.release("fence", fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.call("wait_for_fence")?;
        state.fence_waits.push(fence);
        if state.fences.get(&fence.as_raw()).copied().unwrap_or_default() {
            Ok(())
        } else {
            state.unsignaled_waits.push(fence);
            Err(GpuError::Vulkan(vk::Result::TIMEOUT))
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        let mut state = self.state();
        state.call("reset_fence")?;
        state.fences.insert(fence.as_raw(), false);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool)> {
        let mut state = self.state();
        state.call("acquire_next_image")?;
        state.acquire_semaphores.push(semaphore);
        let index = match state.acquire_script.pop_front() {
            Some(Ok(index)) => index,
            Some(Err(code)) => return Err(GpuError::Vulkan(code)),
            None => {
                let count = state
                    .swapchain_images
                    .get(&swapchain.as_raw())
                    .copied()
                    .unwrap_or(1)
                    .max(1);
                let index = state.next_image % count;
                state.next_image = index + 1;
                index
            }
        };
        state.acquired.push(index);
        state.signal_semaphore("acquire signal", semaphore);
        Ok((index, false))
    }

    fn begin_command_buffer(&self, _buffer: vk::CommandBuffer) -> Result<()> {
        self.state().call("begin_command_buffer")
    }

    fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> Result<()> {
        self.state().call("end_command_buffer")
    }

    fn cmd_begin_render_pass(
        &self,
        buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let mut state = self.state();
        state.calls.push("cmd_begin_render_pass");
        state
            .render_passes_begun
            .push((buffer, framebuffer, clear_color));
    }

    fn cmd_end_render_pass(&self, _buffer: vk::CommandBuffer) {
        self.state().calls.push("cmd_end_render_pass");
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &SubmitRequest) -> Result<()> {
        let mut state = self.state();
        state.call("queue_submit")?;
        if let Some(code) = state.submit_script.pop_front() {
            return Err(GpuError::Vulkan(code));
        }
        if state
            .fences
            .get(&submit.fence.as_raw())
            .copied()
            .unwrap_or_default()
        {
            state.submits_with_signaled_fence += 1;
        }
        state.wait_semaphore("submit wait", submit.wait_semaphore);
        state.signal_semaphore("submit signal", submit.signal_semaphore);
        state.submits.push(*submit);
        state.pending.push_back(submit.fence);
        Ok(())
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool> {
        let mut state = self.state();
        state.call("queue_present")?;
        state.wait_semaphore("present wait", wait_semaphore);
        state.presents.push((queue, image_index, wait_semaphore));
        match state.present_script.pop_front() {
            Some(Ok(suboptimal)) => Ok(suboptimal),
            Some(Err(code)) => Err(GpuError::Vulkan(code)),
            None => Ok(false),
        }
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> Result<()> {
        let mut state = self.state();
        state.call("queue_wait_idle")?;
        state.complete_all();
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        state.call("device_wait_idle")?;
        state.complete_all();
        Ok(())
    }
}

/// Window stand-in that only knows its size.
#[derive(Debug, Clone, Copy)]
pub struct FakeWindow {
    pub extent: vk::Extent2D,
}

impl Default for FakeWindow {
    fn default() -> Self {
        Self {
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
        }
    }
}

impl SurfaceProvider for FakeWindow {
    fn display_handle(&self) -> Result<RawDisplayHandle> {
        Err(GpuError::SurfaceCreation("fake window has no display".into()))
    }

    fn window_handle(&self) -> Result<RawWindowHandle> {
        Err(GpuError::SurfaceCreation("fake window has no handle".into()))
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        Ok(vec![ash::khr::surface::NAME])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_signal_and_empty_wait_are_recorded() {
        let api = FakeApi::default();
        let semaphore = api.create_semaphore().unwrap();
        let swapchain = vk::SwapchainKHR::from_raw(0x5C);

        api.acquire_next_image(swapchain, 0, semaphore).unwrap();
        assert!(api.semaphore_pending(semaphore));
        api.acquire_next_image(swapchain, 0, semaphore).unwrap();
        api.queue_present(vk::Queue::null(), swapchain, 0, semaphore)
            .unwrap();
        api.queue_present(vk::Queue::null(), swapchain, 0, semaphore)
            .unwrap();

        let state = api.state();
        assert_eq!(
            state.semaphore_misuse,
            vec![("acquire signal", semaphore), ("present wait", semaphore)]
        );
    }

    #[test]
    fn failed_acquire_signals_nothing() {
        let api = FakeApi::default();
        let semaphore = api.create_semaphore().unwrap();
        api.state()
            .acquire_script
            .push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));

        assert!(api
            .acquire_next_image(vk::SwapchainKHR::null(), 0, semaphore)
            .is_err());
        assert!(!api.semaphore_pending(semaphore));
    }

    #[test]
    fn submissions_complete_in_order() {
        let api = FakeApi::default();
        let first = api.create_fence(false).unwrap();
        let second = api.create_fence(false).unwrap();
        for fence in [first, second] {
            let acquire = api.create_semaphore().unwrap();
            api.acquire_next_image(vk::SwapchainKHR::null(), 0, acquire)
                .unwrap();
            let submit = SubmitRequest {
                command_buffer: vk::CommandBuffer::null(),
                wait_semaphore: acquire,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_semaphore: api.create_semaphore().unwrap(),
                fence,
            };
            api.queue_submit(vk::Queue::null(), &submit).unwrap();
        }

        assert!(api.complete_oldest());
        assert!(api.fence_signaled(first));
        assert!(!api.fence_signaled(second));
        assert!(api.complete_oldest());
        assert!(!api.complete_oldest());
        assert!(api.state().semaphore_misuse.is_empty());
    }
}
