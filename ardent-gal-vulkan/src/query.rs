//! Timestamp and statistics query pools.

use std::any::Any;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::query::{QueryHeapApi, QueryHeapDesc};
use ash::vk;

use crate::conv;
use crate::device::DeviceShared;

pub(crate) struct VulkanQueryHeap {
    shared: Arc<DeviceShared>,
    desc: QueryHeapDesc,
    pool: vk::QueryPool,
}

impl VulkanQueryHeap {
    pub(crate) fn new(
        shared: Arc<DeviceShared>,
        desc: &QueryHeapDesc,
    ) -> Result<Arc<Self>, GalError> {
        if desc.count == 0 {
            return Err(GalError::validation("query heap count must be non-zero"));
        }
        let desc = desc.clone();
        let info = vk::QueryPoolCreateInfo::default()
            .query_type(conv::query_type(desc.kind))
            .query_count(desc.count);

        let pool = unsafe {
            shared
                .device
                .create_query_pool(&info, None)
                .map_err(|e| GalError::creation("query heap", e))?
        };
        // Pools start in an undefined state; make every slot resettable
        // from the host before first use.
        unsafe { shared.device.reset_query_pool(pool, 0, desc.count) };

        if let Some(label) = &desc.label {
            shared.set_object_name(pool, label);
        }

        Ok(Arc::new(Self { shared, desc, pool }))
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::QueryPool {
        self.pool
    }
}

impl QueryHeapApi for VulkanQueryHeap {
    fn desc(&self) -> &QueryHeapDesc {
        &self.desc
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.pool, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanQueryHeap {
    fn drop(&mut self) {
        let frame = self.shared.current_frame();
        self.shared.destroy.lock().query_pools.push(self.pool, frame);
    }
}
