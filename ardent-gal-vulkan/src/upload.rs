//! Copy-queue upload engine.
//!
//! Initial-data uploads for the current frame are batched into one context
//! and flushed as a single copy-queue submission at `Device::submit`, which
//! signals a timeline semaphore the graphics submission waits on. Contexts
//! are recycled through a free list once their timeline value completes;
//! staging buffers grow to the next power of two when a batch does not fit.

use ardent_gal::error::GalError;
use ardent_gal::flags::{Backend, QueueKind};
use ardent_gal::texture::{TextureDesc, subresource_size};
use ash::vk;

use crate::barrier::ResourceState;
use crate::conv;
use crate::device::DeviceShared;

const INITIAL_STAGING_SIZE: u64 = 4 << 20;
const STAGING_ALIGN: u64 = 16;

struct UploadContext {
    cmd: vk::CommandBuffer,
    staging: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    size: u64,
    /// Write head into the staging buffer while recording.
    offset: u64,
    /// Timeline value signalled when this context's last submit completes.
    fence_value: u64,
}

pub(crate) struct UploadEngine {
    pool: vk::CommandPool,
    timeline: vk::Semaphore,
    contexts: Vec<UploadContext>,
    /// Index of the context currently recording, if any.
    active: Option<usize>,
    next_value: u64,
}

// The staging map pointers never leave this module.
unsafe impl Send for UploadEngine {}

impl UploadEngine {
    pub(crate) fn new(device: &ash::Device, copy_family: u32) -> Result<Self, GalError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(copy_family);
        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(|e| GalError::creation("upload command pool", e))?
        };

        let mut timeline_info =
            vk::SemaphoreTypeCreateInfo::default().semaphore_type(vk::SemaphoreType::TIMELINE);
        let semaphore_info = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_info);
        let timeline = unsafe {
            device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| GalError::creation("upload timeline semaphore", e))
                .inspect_err(|_| device.destroy_command_pool(pool, None))?
        };

        Ok(Self {
            pool,
            timeline,
            contexts: Vec::new(),
            active: None,
            next_value: 1,
        })
    }

    #[inline]
    pub(crate) fn timeline(&self) -> vk::Semaphore {
        self.timeline
    }

    /// Copy `data` into `dst` and leave it in `final_state`.
    pub(crate) fn stage_buffer(
        &mut self,
        shared: &DeviceShared,
        dst: vk::Buffer,
        dst_size: u64,
        dst_offset: u64,
        data: &[u8],
        final_state: ResourceState,
    ) -> Result<(), GalError> {
        let index = self.acquire(shared, data.len() as u64)?;
        let context = &mut self.contexts[index];
        let src_offset = context.offset;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                context.mapped.add(src_offset as usize),
                data.len(),
            );
        }
        context.offset = (src_offset + data.len() as u64).next_multiple_of(STAGING_ALIGN);

        let region = vk::BufferCopy::default()
            .src_offset(src_offset)
            .dst_offset(dst_offset)
            .size(data.len() as u64);
        let barrier = vk::BufferMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COPY)
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .dst_stage_mask(final_state.stage_mask())
            .dst_access_mask(final_state.access_mask())
            .buffer(dst)
            .offset(0)
            .size(dst_size);
        unsafe {
            shared
                .device
                .cmd_copy_buffer(context.cmd, context.staging, dst, &[region]);
            shared.device.cmd_pipeline_barrier2(
                context.cmd,
                &vk::DependencyInfo::default().buffer_memory_barriers(&[barrier]),
            );
        }
        Ok(())
    }

    /// Copy tightly-packed subresource data (mip-major, layers within each
    /// mip) into `dst` and leave the whole image in `final_state`.
    pub(crate) fn stage_texture(
        &mut self,
        shared: &DeviceShared,
        dst: vk::Image,
        desc: &TextureDesc,
        data: &[u8],
        final_state: ResourceState,
    ) -> Result<(), GalError> {
        let aspect = conv::aspect_mask(desc.format);
        let layer_count = match desc.dimension {
            ardent_gal::flags::TextureDimension::D3 => 1,
            _ => desc.depth_or_array_layers,
        };

        let mut total = 0u64;
        for mip in 0..desc.mip_level_count {
            total += subresource_size(desc, mip)? * layer_count as u64;
        }
        if (data.len() as u64) < total {
            return Err(GalError::validation("texture initial data too small"));
        }

        let index = self.acquire(shared, total)?;
        let context = &mut self.contexts[index];
        let base_offset = context.offset;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                context.mapped.add(base_offset as usize),
                total as usize,
            );
        }
        context.offset = (base_offset + total).next_multiple_of(STAGING_ALIGN);

        let mut regions = Vec::with_capacity(desc.mip_level_count as usize);
        let mut offset = base_offset;
        for mip in 0..desc.mip_level_count {
            let extent = desc.extent().mip_level(mip);
            let depth = match desc.dimension {
                ardent_gal::flags::TextureDimension::D3 => extent.depth_or_array_layers,
                _ => 1,
            };
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: mip,
                        base_array_layer: 0,
                        layer_count,
                    })
                    .image_extent(vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth,
                    }),
            );
            offset += subresource_size(desc, mip)? * layer_count as u64;
        }

        let range = vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        };
        let to_copy = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::NONE)
            .dst_stage_mask(vk::PipelineStageFlags2::COPY)
            .dst_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .image(dst)
            .subresource_range(range);
        let to_final = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COPY)
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .dst_stage_mask(final_state.stage_mask())
            .dst_access_mask(final_state.access_mask())
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(final_state.image_layout())
            .image(dst)
            .subresource_range(range);

        unsafe {
            shared.device.cmd_pipeline_barrier2(
                context.cmd,
                &vk::DependencyInfo::default().image_memory_barriers(&[to_copy]),
            );
            shared.device.cmd_copy_buffer_to_image(
                context.cmd,
                context.staging,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
            shared.device.cmd_pipeline_barrier2(
                context.cmd,
                &vk::DependencyInfo::default().image_memory_barriers(&[to_final]),
            );
        }
        Ok(())
    }

    /// Submit the active context, if any, and return the timeline value the
    /// consuming queue must wait on.
    pub(crate) fn flush(&mut self, shared: &DeviceShared) -> Result<Option<u64>, GalError> {
        let Some(index) = self.active.take() else {
            return Ok(None);
        };
        let context = &mut self.contexts[index];
        let value = self.next_value;
        self.next_value += 1;

        unsafe {
            shared
                .device
                .end_command_buffer(context.cmd)
                .map_err(|e| GalError::creation("upload recording", e))?;

            let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(context.cmd);
            let signal = vk::SemaphoreSubmitInfo::default()
                .semaphore(self.timeline)
                .value(value)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS);
            let submit = vk::SubmitInfo2::default()
                .command_buffer_infos(std::slice::from_ref(&cmd_info))
                .signal_semaphore_infos(std::slice::from_ref(&signal));
            shared
                .device
                .queue_submit2(shared.queue(QueueKind::Copy).queue, &[submit], vk::Fence::null())
                .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?;
        }

        context.fence_value = value;
        log::trace!("upload batch submitted (timeline value {value})");
        Ok(Some(value))
    }

    /// Find or build a context with `required` staging bytes free and begin
    /// recording into it.
    fn acquire(&mut self, shared: &DeviceShared, required: u64) -> Result<usize, GalError> {
        if let Some(index) = self.active {
            let context = &self.contexts[index];
            if context.size - context.offset >= required {
                return Ok(index);
            }
            // The running batch is too full; submit it and start another.
            self.flush(shared)?;
        }

        let completed = unsafe {
            shared
                .device
                .get_semaphore_counter_value(self.timeline)
                .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?
        };

        let free = self
            .contexts
            .iter()
            .position(|c| c.fence_value <= completed && c.size >= required);
        let index = match free {
            Some(index) => index,
            None => {
                // Recycle any completed context by regrowing its staging
                // buffer, or add a new context to the list.
                let size = required
                    .max(INITIAL_STAGING_SIZE)
                    .next_power_of_two();
                match self
                    .contexts
                    .iter()
                    .position(|c| c.fence_value <= completed)
                {
                    Some(index) => {
                        let context = &mut self.contexts[index];
                        unsafe {
                            shared.device.unmap_memory(context.memory);
                            shared.device.destroy_buffer(context.staging, None);
                            shared.device.free_memory(context.memory, None);
                        }
                        let (staging, memory, mapped) = create_staging(shared, size)?;
                        context.staging = staging;
                        context.memory = memory;
                        context.mapped = mapped;
                        context.size = size;
                        index
                    }
                    None => {
                        let context = self.create_context(shared, size)?;
                        self.contexts.push(context);
                        self.contexts.len() - 1
                    }
                }
            }
        };

        let context = &mut self.contexts[index];
        context.offset = 0;
        unsafe {
            shared
                .device
                .begin_command_buffer(
                    context.cmd,
                    &vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .map_err(|e| GalError::creation("upload recording", e))?;
        }
        self.active = Some(index);
        Ok(index)
    }

    fn create_context(
        &mut self,
        shared: &DeviceShared,
        size: u64,
    ) -> Result<UploadContext, GalError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = unsafe {
            shared
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| GalError::creation("upload command buffer", e))?[0]
        };
        let (staging, memory, mapped) = create_staging(shared, size)?;
        Ok(UploadContext {
            cmd,
            staging,
            memory,
            mapped,
            size,
            offset: 0,
            fence_value: 0,
        })
    }

    /// Destroy all owned handles. The device must be idle.
    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for context in self.contexts.drain(..) {
                device.unmap_memory(context.memory);
                device.destroy_buffer(context.staging, None);
                device.free_memory(context.memory, None);
            }
            device.destroy_semaphore(self.timeline, None);
            device.destroy_command_pool(self.pool, None);
        }
    }
}

fn create_staging(
    shared: &DeviceShared,
    size: u64,
) -> Result<(vk::Buffer, vk::DeviceMemory, *mut u8), GalError> {
    let info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(vk::BufferUsageFlags::TRANSFER_SRC)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe {
        shared
            .device
            .create_buffer(&info, None)
            .map_err(|e| GalError::creation("staging buffer", e))?
    };
    let requirements = unsafe { shared.device.get_buffer_memory_requirements(buffer) };
    let memory = shared
        .allocate_memory(
            &requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .inspect_err(|_| unsafe { shared.device.destroy_buffer(buffer, None) })?;
    unsafe {
        shared
            .device
            .bind_buffer_memory(buffer, memory, 0)
            .map_err(|e| GalError::creation("staging memory binding", e))?;
        let mapped = shared
            .device
            .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
            .map_err(|e| GalError::creation("staging map", e))? as *mut u8;
        Ok((buffer, memory, mapped))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn staging_sizes_round_to_powers_of_two() {
        let required: u64 = (4 << 20) + 1;
        assert_eq!(required.max(4 << 20).next_power_of_two(), 8 << 20);
        let small: u64 = 1024;
        assert_eq!(small.max(4 << 20).next_power_of_two(), 4 << 20);
    }
}
