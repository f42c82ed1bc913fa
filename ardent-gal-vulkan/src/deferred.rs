//! Deferred destruction of native handles.
//!
//! Dropping a handle wrapper enqueues its native objects here stamped with
//! the frame count at enqueue time; they are destroyed only once the GPU
//! can no longer be reading them.

use std::collections::VecDeque;

use ardent_gal::device::FRAMES_IN_FLIGHT;
use ash::vk;

/// FIFO of `(payload, frame_count)` entries for one class of handle.
pub(crate) struct DestroyQueue<T> {
    entries: VecDeque<(T, u64)>,
}

impl<T> Default for DestroyQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T> DestroyQueue<T> {
    pub(crate) fn push(&mut self, value: T, frame: u64) {
        self.entries.push_back((value, frame));
    }

    /// Pop every entry old enough that no in-flight frame can reference it.
    /// Passing `u64::MAX` drains everything.
    pub(crate) fn drain_completed(&mut self, current_frame: u64) -> Vec<T> {
        let mut out = Vec::new();
        while let Some((_, frame)) = self.entries.front() {
            if frame.saturating_add(FRAMES_IN_FLIGHT) < current_frame {
                out.push(self.entries.pop_front().unwrap().0);
            } else {
                break;
            }
        }
        out
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One queue per native handle class, all guarded by the device's destroy
/// lock.
#[derive(Default)]
pub(crate) struct DestroyQueues {
    pub buffers: DestroyQueue<(vk::Buffer, vk::DeviceMemory)>,
    pub images: DestroyQueue<(vk::Image, vk::DeviceMemory, Vec<vk::ImageView>)>,
    pub samplers: DestroyQueue<vk::Sampler>,
    pub shader_modules: DestroyQueue<vk::ShaderModule>,
    pub pipeline_layouts: DestroyQueue<(vk::PipelineLayout, Vec<vk::DescriptorSetLayout>)>,
    pub pipelines: DestroyQueue<vk::Pipeline>,
    pub query_pools: DestroyQueue<vk::QueryPool>,
    pub semaphores: DestroyQueue<vk::Semaphore>,
}

impl DestroyQueues {
    /// Destroy every handle whose stamp is at least `FRAMES_IN_FLIGHT`
    /// frames behind `current_frame`.
    pub(crate) fn drain(&mut self, device: &ash::Device, current_frame: u64) {
        unsafe {
            for (buffer, memory) in self.buffers.drain_completed(current_frame) {
                // Null memory marks a borrowed buffer (from_native).
                if memory != vk::DeviceMemory::null() {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                }
            }
            for (image, memory, views) in self.images.drain_completed(current_frame) {
                for view in views {
                    device.destroy_image_view(view, None);
                }
                // Null memory marks a borrowed image (swapchain or from_native).
                if memory != vk::DeviceMemory::null() {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
            }
            for sampler in self.samplers.drain_completed(current_frame) {
                device.destroy_sampler(sampler, None);
            }
            for module in self.shader_modules.drain_completed(current_frame) {
                device.destroy_shader_module(module, None);
            }
            for (layout, set_layouts) in self.pipeline_layouts.drain_completed(current_frame) {
                for set_layout in set_layouts {
                    device.destroy_descriptor_set_layout(set_layout, None);
                }
                device.destroy_pipeline_layout(layout, None);
            }
            for pipeline in self.pipelines.drain_completed(current_frame) {
                device.destroy_pipeline(pipeline, None);
            }
            for pool in self.query_pools.drain_completed(current_frame) {
                device.destroy_query_pool(pool, None);
            }
            for semaphore in self.semaphores.drain_completed(current_frame) {
                device.destroy_semaphore(semaphore, None);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buffers.is_empty()
            && self.images.is_empty()
            && self.samplers.is_empty()
            && self.shader_modules.is_empty()
            && self.pipeline_layouts.is_empty()
            && self.pipelines.is_empty()
            && self.query_pools.is_empty()
            && self.semaphores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_entries_outside_the_in_flight_window() {
        let mut queue = DestroyQueue::default();
        queue.push(1u32, 0);
        queue.push(2u32, 1);
        queue.push(3u32, 4);

        // frame 0 completed once 0 + 2 < 3.
        assert!(queue.drain_completed(2).is_empty());
        assert_eq!(queue.drain_completed(3), vec![1]);
        assert_eq!(queue.drain_completed(4), vec![2]);
        assert!(queue.drain_completed(5).is_empty());
        assert_eq!(queue.drain_completed(7), vec![3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let mut queue = DestroyQueue::default();
        for i in 0..5u32 {
            queue.push(i, 0);
        }
        assert_eq!(queue.drain_completed(u64::MAX), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn max_frame_stamp_never_drains_early() {
        let mut queue = DestroyQueue::default();
        queue.push(9u32, u64::MAX);
        assert!(queue.drain_completed(u64::MAX).is_empty());
    }
}
