//! GPU buffer backed by a dedicated `vk::DeviceMemory` allocation.

use std::any::Any;
use std::sync::Arc;

use ardent_gal::buffer::{BufferApi, BufferDesc};
use ardent_gal::error::GalError;
use ardent_gal::flags::CpuAccess;
use ash::vk;
use parking_lot::Mutex;

use crate::barrier::{self, ResourceState, TrackedState};
use crate::device::DeviceShared;

pub(crate) struct VulkanBuffer {
    shared: Arc<DeviceShared>,
    desc: BufferDesc,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    /// Persistent host map, present iff `cpu_access != None`.
    mapped: *mut u8,
    state: Mutex<TrackedState>,
}

// The raw map pointer is only dereferenced through `write`/`read`, which
// bound-check against the descriptor.
unsafe impl Send for VulkanBuffer {}
unsafe impl Sync for VulkanBuffer {}

impl VulkanBuffer {
    pub(crate) fn new(
        shared: Arc<DeviceShared>,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Arc<Self>, GalError> {
        let device = &shared.device;

        let mut desc = desc.clone();
        // Constant buffers bind at the device's offset alignment.
        let uniform_align = shared.properties.limits.min_uniform_buffer_offset_alignment.max(1);
        if desc.usage.contains(ardent_gal::flags::BufferUsage::Constant) {
            desc.size = desc.size.next_multiple_of(uniform_align);
        }

        let mut usage = crate::conv::buffer_usage(desc.usage);
        if shared.features.buffer_device_address {
            usage |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        }

        let families = shared.unique_queue_families();
        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(usage)
            .sharing_mode(shared.sharing_mode())
            .queue_family_indices(&families);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(|e| GalError::creation("buffer", e))?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_flags = match desc.cpu_access {
            CpuAccess::None => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            _ => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        };
        let memory = shared.allocate_memory(&requirements, memory_flags).inspect_err(|_| {
            unsafe { device.destroy_buffer(buffer, None) };
        })?;

        unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(|e| GalError::creation("buffer memory binding", e))?;
        }

        let mapped = if desc.cpu_access != CpuAccess::None {
            unsafe {
                device
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                    .map_err(|e| GalError::creation("buffer map", e))? as *mut u8
            }
        } else {
            std::ptr::null_mut()
        };

        let mut state = TrackedState::new(ResourceState::Undefined);

        if let Some(data) = initial_data {
            if !mapped.is_null() {
                unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), mapped, data.len()) };
                state = TrackedState::new(ResourceState::Undefined);
            } else {
                let final_state = barrier::buffer_initial_state(desc.usage);
                shared
                    .upload
                    .lock()
                    .stage_buffer(&shared, buffer, desc.size, 0, data, final_state)?;
                state = TrackedState::new(final_state);
            }
        }

        if let Some(label) = &desc.label {
            shared.set_object_name(buffer, label);
        }
        log::trace!("buffer created ({} bytes)", desc.size);

        Ok(Arc::new(Self {
            shared,
            desc,
            buffer,
            memory,
            mapped,
            state: Mutex::new(state),
        }))
    }

    /// Wrap a buffer the backend does not own. The handle participates in
    /// state tracking but never frees the buffer. No host map is available,
    /// so `cpu_access` is forced to `None`.
    pub(crate) fn from_borrowed(
        shared: Arc<DeviceShared>,
        buffer: vk::Buffer,
        desc: &BufferDesc,
    ) -> Arc<Self> {
        let mut desc = desc.clone();
        desc.cpu_access = CpuAccess::None;
        Arc::new(Self {
            shared,
            desc,
            buffer,
            memory: vk::DeviceMemory::null(),
            mapped: std::ptr::null_mut(),
            state: Mutex::new(TrackedState::new(ResourceState::Undefined)),
        })
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub(crate) fn state(&self) -> &Mutex<TrackedState> {
        &self.state
    }
}

impl BufferApi for VulkanBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.buffer, label);
    }

    fn gpu_address(&self) -> Option<u64> {
        if !self.shared.features.buffer_device_address {
            return None;
        }
        let info = vk::BufferDeviceAddressInfo::default().buffer(self.buffer);
        Some(unsafe { self.shared.device.get_buffer_device_address(&info) })
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), GalError> {
        if self.desc.cpu_access != CpuAccess::Write {
            return Err(GalError::validation(
                "buffer write requires CpuAccess::Write",
            ));
        }
        if offset + data.len() as u64 > self.desc.size {
            return Err(GalError::validation("buffer write out of bounds"));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.mapped.add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), GalError> {
        if self.desc.cpu_access != CpuAccess::Read {
            return Err(GalError::validation("buffer read requires CpuAccess::Read"));
        }
        if offset + out.len() as u64 > self.desc.size {
            return Err(GalError::validation("buffer read out of bounds"));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.mapped.add(offset as usize),
                out.as_mut_ptr(),
                out.len(),
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if !self.mapped.is_null() {
            unsafe { self.shared.device.unmap_memory(self.memory) };
        }
        let frame = self.shared.current_frame();
        self.shared
            .destroy
            .lock()
            .buffers
            .push((self.buffer, self.memory), frame);
        log::trace!("buffer retired");
    }
}
