//! Logical device, per-frame command pools and the submit/present path.

use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ardent_gal::buffer::{Buffer, BufferDesc};
use ardent_gal::command::CommandBuffer;
use ardent_gal::device::{AdapterInfo, DeviceApi, DeviceDesc, FRAMES_IN_FLIGHT, Limits};
use ardent_gal::error::GalError;
use ardent_gal::flags::{Backend, Feature, QueueKind, ValidationMode};
use ardent_gal::pipeline::{
    ComputePipelineDesc, Pipeline, PipelineLayout, PipelineLayoutDesc, RayTracingPipelineDesc,
    RenderPipelineDesc,
};
use ardent_gal::query::{QueryHeap, QueryHeapDesc};
use ardent_gal::sampler::{Sampler, SamplerDesc};
use ardent_gal::shader::{Shader, ShaderDesc};
use ardent_gal::swapchain::{SwapChain, SwapChainDesc, WindowHandle};
use ardent_gal::texture::{Texture, TextureDesc};
use ash::vk;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::buffer::VulkanBuffer;
use crate::command::{PresentRequest, VulkanCommandApi};
use crate::deferred::DestroyQueues;
use crate::instance::{AdapterPick, InstanceState, select_adapter};
use crate::pipeline::{VulkanPipeline, VulkanPipelineLayout};
use crate::query::VulkanQueryHeap;
use crate::sampler::VulkanSampler;
use crate::shader::VulkanShader;
use crate::swapchain::VulkanSwapChain;
use crate::texture::VulkanTexture;
use crate::upload::UploadEngine;

pub(crate) struct QueueInfo {
    pub queue: vk::Queue,
    pub family: u32,
}

/// Optional features the adapter actually provides.
pub(crate) struct DeviceFeatures {
    pub buffer_device_address: bool,
    pub sampler_anisotropy: bool,
    pub texture_compression_bc: bool,
    pub indirect_first_instance: bool,
    pub depth_bounds: bool,
}

/// One command pool per queue kind, with lazily grown buffer lists that
/// reset wholesale when the owning frame slot recycles.
struct QueuePool {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
    next: usize,
}

impl QueuePool {
    fn new(device: &ash::Device, family: u32) -> Result<Self, GalError> {
        let info = vk::CommandPoolCreateInfo::default().queue_family_index(family);
        let pool = unsafe {
            device
                .create_command_pool(&info, None)
                .map_err(|e| GalError::creation("command pool", e))?
        };
        Ok(Self {
            pool,
            buffers: Vec::new(),
            next: 0,
        })
    }

    fn allocate(&mut self, device: &ash::Device) -> Result<vk::CommandBuffer, GalError> {
        if self.next == self.buffers.len() {
            let info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = unsafe {
                device
                    .allocate_command_buffers(&info)
                    .map_err(|e| GalError::creation("command buffer", e))?[0]
            };
            self.buffers.push(cmd);
        }
        let cmd = self.buffers[self.next];
        self.next += 1;
        Ok(cmd)
    }

    fn reset(&mut self, device: &ash::Device) {
        unsafe {
            let _ = device.reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty());
        }
        self.next = 0;
    }

    fn destroy(&mut self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}

/// Per-frame recycling slot: a fence signalled by the slot's last graphics
/// submit and a pool per queue kind.
struct FrameSlot {
    fence: vk::Fence,
    pools: [QueuePool; 3],
}

pub(crate) struct Frames {
    slots: Vec<FrameSlot>,
}

impl Frames {
    fn new(device: &ash::Device, families: [u32; 3]) -> Result<Self, GalError> {
        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT as usize);
        for _ in 0..FRAMES_IN_FLIGHT {
            // Signalled, so the first wait on a fresh slot passes.
            let fence_info =
                vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = unsafe {
                device
                    .create_fence(&fence_info, None)
                    .map_err(|e| GalError::creation("frame fence", e))?
            };
            slots.push(FrameSlot {
                fence,
                pools: [
                    QueuePool::new(device, families[0])?,
                    QueuePool::new(device, families[1])?,
                    QueuePool::new(device, families[2])?,
                ],
            });
        }
        Ok(Self { slots })
    }

    fn destroy(&mut self, device: &ash::Device) {
        for slot in &mut self.slots {
            unsafe { device.destroy_fence(slot.fence, None) };
            for pool in &mut slot.pools {
                pool.destroy(device);
            }
        }
        self.slots.clear();
    }
}

/// State shared between the device and every object it creates. Resources
/// hold an `Arc` to it, which keeps the native device alive until the last
/// handle drops.
pub(crate) struct DeviceShared {
    instance_state: Mutex<InstanceState>,
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub device: ash::Device,
    pub debug_utils: Option<ash::ext::debug_utils::Device>,
    pub features: DeviceFeatures,
    queues: [QueueInfo; 3],
    pub destroy: Mutex<DestroyQueues>,
    pub upload: Mutex<UploadEngine>,
    frames: Mutex<Frames>,
    frame_count: AtomicU64,
}

impl DeviceShared {
    #[inline]
    pub(crate) fn current_frame(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn queue(&self, kind: QueueKind) -> &QueueInfo {
        &self.queues[kind as usize]
    }

    /// Sharing mode for resources touched by more than one queue family.
    pub(crate) fn sharing_mode(&self) -> vk::SharingMode {
        if self.unique_queue_families().len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        }
    }

    pub(crate) fn unique_queue_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.queues.iter().map(|q| q.family).collect();
        families.sort_unstable();
        families.dedup();
        families
    }

    pub(crate) fn allocate_memory(
        &self,
        requirements: &vk::MemoryRequirements,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory, GalError> {
        let type_index = find_memory_type(&self.memory_properties, requirements, flags)
            .ok_or_else(|| GalError::creation("memory allocation", "no suitable memory type"))?;
        let mut flags_info = vk::MemoryAllocateFlagsInfo::default()
            .flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
        let mut info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);
        if self.features.buffer_device_address {
            info = info.push_next(&mut flags_info);
        }
        unsafe {
            self.device
                .allocate_memory(&info, None)
                .map_err(|e| GalError::creation("memory allocation", e))
        }
    }

    pub(crate) fn set_object_name<T: vk::Handle + Copy>(&self, handle: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        unsafe {
            let _ = debug_utils.set_debug_utils_object_name(&info);
        }
    }
}

fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: &vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        requirements.memory_type_bits & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        self.destroy.get_mut().drain(&self.device, u64::MAX);
        self.upload.get_mut().destroy(&self.device);
        self.frames.get_mut().destroy(&self.device);
        unsafe { self.device.destroy_device(None) };
        self.instance_state.get_mut().destroy();
        log::info!("vulkan device destroyed");
    }
}

pub struct VulkanDevice {
    shared: Arc<DeviceShared>,
    adapter_info: AdapterInfo,
    limits: Limits,
}

impl VulkanDevice {
    pub fn new(desc: &DeviceDesc) -> Result<Self, GalError> {
        let instance_state = InstanceState::new(desc.validation)?;
        let entry = instance_state.entry.clone();
        let instance = instance_state.instance.clone();

        let pick = select_adapter(&instance)?;
        let adapter_info = pick.adapter_info();
        log::info!("selected adapter: {}", adapter_info.name);

        let (device, features) = create_logical_device(&instance, &pick)?;

        let debug_utils = if desc.validation != ValidationMode::Disabled {
            Some(ash::ext::debug_utils::Device::new(&instance, &device))
        } else {
            None
        };

        let queues = [
            QueueInfo {
                queue: unsafe { device.get_device_queue(pick.graphics_family, 0) },
                family: pick.graphics_family,
            },
            QueueInfo {
                queue: unsafe { device.get_device_queue(pick.compute_family, 0) },
                family: pick.compute_family,
            },
            QueueInfo {
                queue: unsafe { device.get_device_queue(pick.copy_family, 0) },
                family: pick.copy_family,
            },
        ];

        let upload = UploadEngine::new(&device, pick.copy_family)?;
        let frames = Frames::new(
            &device,
            [pick.graphics_family, pick.compute_family, pick.copy_family],
        )?;

        let limits = Limits {
            max_texture_dimension_2d: pick.properties.limits.max_image_dimension2_d,
            max_texture_dimension_3d: pick.properties.limits.max_image_dimension3_d,
            max_texture_array_layers: pick.properties.limits.max_image_array_layers,
            max_push_constant_size: pick.properties.limits.max_push_constants_size,
            max_sampler_anisotropy: pick.properties.limits.max_sampler_anisotropy,
            timestamp_period_ns: pick.properties.limits.timestamp_period,
        };

        let shared = Arc::new(DeviceShared {
            instance_state: Mutex::new(instance_state),
            entry,
            instance,
            physical: pick.handle,
            properties: pick.properties,
            memory_properties: pick.memory_properties,
            device,
            debug_utils,
            features,
            queues,
            destroy: Mutex::new(DestroyQueues::default()),
            upload: Mutex::new(upload),
            frames: Mutex::new(frames),
            frame_count: AtomicU64::new(0),
        });

        Ok(Self {
            shared,
            adapter_info,
            limits,
        })
    }

    /// Wrap an externally owned `vk::Image` in a [`Texture`] handle.
    ///
    /// The image must outlive the handle and match `desc`. It joins state
    /// tracking starting from the undefined layout, so record a transition
    /// before reading its contents. Dropping the handle releases any cached
    /// views but never destroys the image itself.
    pub fn texture_from_native(&self, image: vk::Image, desc: &TextureDesc) -> Texture {
        use crate::barrier::ResourceState;
        let texture = VulkanTexture::from_borrowed(
            self.shared.clone(),
            image,
            desc.clone(),
            ResourceState::Undefined,
        );
        Texture::from_api(texture)
    }

    /// Wrap an externally owned `vk::Buffer` in a [`Buffer`] handle.
    ///
    /// The buffer must outlive the handle and match `desc`; `cpu_access` is
    /// ignored since no host map is available. Dropping the handle never
    /// destroys the buffer.
    pub fn buffer_from_native(&self, buffer: vk::Buffer, desc: &BufferDesc) -> Buffer {
        Buffer::from_api(VulkanBuffer::from_borrowed(self.shared.clone(), buffer, desc))
    }
}

fn create_logical_device(
    instance: &ash::Instance,
    pick: &AdapterPick,
) -> Result<(ash::Device, DeviceFeatures), GalError> {
    let mut vk12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut supported2 =
        vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12);
    unsafe { instance.get_physical_device_features2(pick.handle, &mut supported2) };
    let supported = supported2.features;

    let features = DeviceFeatures {
        buffer_device_address: vk12.buffer_device_address == vk::TRUE,
        sampler_anisotropy: supported.sampler_anisotropy == vk::TRUE,
        texture_compression_bc: supported.texture_compression_bc == vk::TRUE,
        indirect_first_instance: supported.draw_indirect_first_instance == vk::TRUE,
        depth_bounds: supported.depth_bounds == vk::TRUE,
    };

    let mut families: Vec<u32> = vec![pick.graphics_family, pick.compute_family, pick.copy_family];
    families.sort_unstable();
    families.dedup();

    let priority = [1.0f32];
    let queue_infos: Vec<_> = families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&priority)
        })
        .collect();

    let extensions = [ash::khr::swapchain::NAME.as_ptr()];

    let enabled = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(features.sampler_anisotropy)
        .texture_compression_bc(features.texture_compression_bc)
        .draw_indirect_first_instance(features.indirect_first_instance)
        .depth_bounds(features.depth_bounds);

    let mut enabled12 = vk::PhysicalDeviceVulkan12Features::default()
        .timeline_semaphore(true)
        .host_query_reset(true)
        .buffer_device_address(features.buffer_device_address);
    let mut enabled13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    let info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&enabled)
        .push_next(&mut enabled12)
        .push_next(&mut enabled13);

    let device = unsafe {
        instance
            .create_device(pick.handle, &info, None)
            .map_err(|e| GalError::creation("logical device", e))?
    };
    Ok((device, features))
}

impl DeviceApi for VulkanDevice {
    fn backend(&self) -> Backend {
        Backend::Vulkan
    }

    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn query_feature(&self, feature: Feature) -> bool {
        let features = &self.shared.features;
        match feature {
            Feature::TimelineSemaphore => true,
            Feature::BufferDeviceAddress => features.buffer_device_address,
            Feature::SamplerAnisotropy => features.sampler_anisotropy,
            Feature::TextureCompressionBc => features.texture_compression_bc,
            Feature::IndirectFirstInstance => features.indirect_first_instance,
            Feature::DepthBoundsTest => features.depth_bounds,
        }
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.shared.device.handle(), label);
    }

    fn wait_idle(&self) {
        unsafe {
            let _ = self.shared.device.device_wait_idle();
        }
        self.shared
            .destroy
            .lock()
            .drain(&self.shared.device, u64::MAX);
    }

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer, GalError> {
        let buffer = VulkanBuffer::new(self.shared.clone(), desc, initial_data)?;
        Ok(Buffer::from_api(buffer))
    }

    fn create_texture(
        &self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Texture, GalError> {
        let texture = VulkanTexture::new(self.shared.clone(), desc, initial_data)?;
        Ok(Texture::from_api(texture))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler, GalError> {
        let sampler = VulkanSampler::new(self.shared.clone(), desc)?;
        Ok(Sampler::from_api(sampler))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Shader, GalError> {
        let shader = VulkanShader::new(self.shared.clone(), desc)?;
        Ok(Shader::from_api(shader))
    }

    fn create_pipeline_layout(
        &self,
        desc: &PipelineLayoutDesc,
    ) -> Result<PipelineLayout, GalError> {
        let layout = VulkanPipelineLayout::new(self.shared.clone(), desc)?;
        Ok(PipelineLayout::from_api(layout))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<Pipeline, GalError> {
        let pipeline = VulkanPipeline::new_render(self.shared.clone(), desc)?;
        Ok(Pipeline::from_api(pipeline))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Pipeline, GalError> {
        let pipeline = VulkanPipeline::new_compute(self.shared.clone(), desc)?;
        Ok(Pipeline::from_api(pipeline))
    }

    fn create_ray_tracing_pipeline(
        &self,
        _desc: &RayTracingPipelineDesc,
    ) -> Result<Pipeline, GalError> {
        Err(GalError::unsupported(
            "ray tracing pipelines are not implemented on Vulkan",
        ))
    }

    fn create_query_heap(&self, desc: &QueryHeapDesc) -> Result<QueryHeap, GalError> {
        let heap = VulkanQueryHeap::new(self.shared.clone(), desc)?;
        Ok(QueryHeap::from_api(heap))
    }

    fn create_swap_chain(
        &self,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> Result<SwapChain, GalError> {
        let swapchain = VulkanSwapChain::new(self.shared.clone(), window, desc)?;
        Ok(SwapChain::from_api(swapchain))
    }

    fn begin_command_buffer(
        &self,
        queue: QueueKind,
        label: Option<&str>,
    ) -> Result<CommandBuffer, GalError> {
        let cmd = {
            let mut frames = self.shared.frames.lock();
            let slot = (self.shared.current_frame() % FRAMES_IN_FLIGHT) as usize;
            frames.slots[slot].pools[queue as usize].allocate(&self.shared.device)?
        };

        unsafe {
            self.shared
                .device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .map_err(|e| GalError::creation("command recording", e))?;
        }
        if let Some(label) = label {
            self.shared.set_object_name(cmd, label);
        }

        let api = VulkanCommandApi::new(self.shared.clone(), cmd, queue);
        Ok(CommandBuffer::from_api(Box::new(api)))
    }

    fn submit(&self, command_buffers: Vec<CommandBuffer>) -> Result<(), GalError> {
        let shared = &self.shared;

        // Seal recorders and collect per-queue batches in submission
        // order: copy, compute, graphics.
        let mut batches: [Vec<vk::CommandBuffer>; 3] = Default::default();
        let mut presents: Vec<PresentRequest> = Vec::new();
        for command_buffer in command_buffers {
            let mut recorder = command_buffer
                .into_api()
                .into_any()
                .downcast::<VulkanCommandApi>()
                .map_err(|_| {
                    GalError::validation("command buffer belongs to another backend")
                })?;
            presents.extend(recorder.finish()?);
            batches[recorder.queue_kind() as usize].push(recorder.handle());
        }

        let upload_wait = shared.upload.lock().flush(shared)?;

        for kind in [QueueKind::Copy, QueueKind::Compute] {
            let cmds = &batches[kind as usize];
            if cmds.is_empty() {
                continue;
            }
            let cmd_infos: Vec<_> = cmds
                .iter()
                .map(|&cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd))
                .collect();
            let submit = vk::SubmitInfo2::default().command_buffer_infos(&cmd_infos);
            unsafe {
                shared
                    .device
                    .queue_submit2(shared.queue(kind).queue, &[submit], vk::Fence::null())
                    .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?;
            }
        }

        // Graphics always submits, even empty, so the slot fence advances.
        let slot_fence = {
            let frames = shared.frames.lock();
            frames.slots[(shared.current_frame() % FRAMES_IN_FLIGHT) as usize].fence
        };
        {
            let cmd_infos: Vec<_> = batches[QueueKind::Graphics as usize]
                .iter()
                .map(|&cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd))
                .collect();

            let upload_timeline = shared.upload.lock().timeline();
            let mut waits: SmallVec<[vk::SemaphoreSubmitInfo; 4]> = SmallVec::new();
            if let Some(value) = upload_wait {
                waits.push(
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(upload_timeline)
                        .value(value)
                        .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
                );
            }
            for request in &presents {
                waits.push(
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(request.acquire_semaphore)
                        .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
                );
            }
            let signals: SmallVec<[vk::SemaphoreSubmitInfo; 4]> = presents
                .iter()
                .map(|request| {
                    vk::SemaphoreSubmitInfo::default()
                        .semaphore(request.release_semaphore)
                        .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                })
                .collect();

            let submit = vk::SubmitInfo2::default()
                .command_buffer_infos(&cmd_infos)
                .wait_semaphore_infos(&waits)
                .signal_semaphore_infos(&signals);
            unsafe {
                shared
                    .device
                    .queue_submit2(
                        shared.queue(QueueKind::Graphics).queue,
                        &[submit],
                        slot_fence,
                    )
                    .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?;
            }
        }

        for request in &presents {
            let Some(swapchain) = request
                .swapchain
                .api()
                .as_any()
                .downcast_ref::<VulkanSwapChain>()
            else {
                continue;
            };
            swapchain.present(
                shared.queue(QueueKind::Graphics).queue,
                request.image_index,
                request.release_semaphore,
            )?;
        }

        // Advance, then block until the incoming slot's previous work is
        // done and recycle its pools.
        let next = shared.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut frames = shared.frames.lock();
            let slot = &mut frames.slots[(next % FRAMES_IN_FLIGHT) as usize];
            unsafe {
                shared
                    .device
                    .wait_for_fences(&[slot.fence], true, u64::MAX)
                    .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?;
                shared
                    .device
                    .reset_fences(&[slot.fence])
                    .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?;
            }
            for pool in &mut slot.pools {
                pool.reset(&shared.device);
            }
        }

        shared.destroy.lock().drain(&shared.device, next);
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.shared.current_frame()
    }

    fn frame_index(&self) -> u64 {
        self.shared.current_frame() % FRAMES_IN_FLIGHT
    }

    fn read_query_results(&self, heap: &QueryHeap, results: &mut [u64]) -> Result<(), GalError> {
        let backend = heap
            .api()
            .as_any()
            .downcast_ref::<VulkanQueryHeap>()
            .ok_or_else(|| GalError::validation("query heap belongs to another backend"))?;
        if results.len() as u32 > heap.desc().count {
            return Err(GalError::validation("query result range out of bounds"));
        }
        unsafe {
            self.shared
                .device
                .get_query_pool_results(
                    backend.handle(),
                    0,
                    results,
                    vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
                )
                .map_err(|e| GalError::device_lost(Backend::Vulkan, e))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
