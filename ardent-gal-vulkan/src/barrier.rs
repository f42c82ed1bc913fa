//! Resource state tracking and synchronization2 barrier lowering.

use ardent_gal::flags::{BufferUsage, BufferUsages, TextureUsage, TextureUsages};
use ash::vk;

/// Pending barriers are flushed once this many accumulate.
pub(crate) const MAX_PENDING_BARRIERS: usize = 16;

/// Logical access state of a buffer or texture. Lowered to sync2
/// stage/access masks and, for textures, an image layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Undefined,
    VertexBuffer,
    IndexBuffer,
    ConstantBuffer,
    IndirectArgument,
    ShaderRead,
    ShaderWrite,
    RenderTarget,
    DepthWrite,
    DepthRead,
    CopySrc,
    CopyDst,
    Present,
}

impl ResourceState {
    pub(crate) fn stage_mask(self) -> vk::PipelineStageFlags2 {
        match self {
            ResourceState::Undefined => vk::PipelineStageFlags2::NONE,
            ResourceState::VertexBuffer => vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
            ResourceState::IndexBuffer => vk::PipelineStageFlags2::INDEX_INPUT,
            ResourceState::ConstantBuffer => vk::PipelineStageFlags2::ALL_GRAPHICS | vk::PipelineStageFlags2::COMPUTE_SHADER,
            ResourceState::IndirectArgument => vk::PipelineStageFlags2::DRAW_INDIRECT,
            ResourceState::ShaderRead => {
                vk::PipelineStageFlags2::VERTEX_SHADER
                    | vk::PipelineStageFlags2::FRAGMENT_SHADER
                    | vk::PipelineStageFlags2::COMPUTE_SHADER
            }
            ResourceState::ShaderWrite => vk::PipelineStageFlags2::COMPUTE_SHADER,
            ResourceState::RenderTarget => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            ResourceState::DepthWrite | ResourceState::DepthRead => {
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
            }
            ResourceState::CopySrc | ResourceState::CopyDst => vk::PipelineStageFlags2::TRANSFER,
            ResourceState::Present => vk::PipelineStageFlags2::NONE,
        }
    }

    pub(crate) fn access_mask(self) -> vk::AccessFlags2 {
        match self {
            ResourceState::Undefined => vk::AccessFlags2::NONE,
            ResourceState::VertexBuffer => vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
            ResourceState::IndexBuffer => vk::AccessFlags2::INDEX_READ,
            ResourceState::ConstantBuffer => vk::AccessFlags2::UNIFORM_READ,
            ResourceState::IndirectArgument => vk::AccessFlags2::INDIRECT_COMMAND_READ,
            ResourceState::ShaderRead => vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
            ResourceState::ShaderWrite => {
                vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE
            }
            ResourceState::RenderTarget => {
                vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
            }
            ResourceState::DepthWrite => {
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
            }
            ResourceState::DepthRead => vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            ResourceState::CopySrc => vk::AccessFlags2::TRANSFER_READ,
            ResourceState::CopyDst => vk::AccessFlags2::TRANSFER_WRITE,
            ResourceState::Present => vk::AccessFlags2::NONE,
        }
    }

    pub(crate) fn image_layout(self) -> vk::ImageLayout {
        match self {
            ResourceState::Undefined => vk::ImageLayout::UNDEFINED,
            ResourceState::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ResourceState::ShaderWrite => vk::ImageLayout::GENERAL,
            ResourceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ResourceState::DepthWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ResourceState::DepthRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            ResourceState::CopySrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ResourceState::CopyDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ResourceState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
            // Buffer-only states never reach image barriers.
            _ => vk::ImageLayout::GENERAL,
        }
    }

    pub(crate) fn is_read_only(self) -> bool {
        matches!(
            self,
            ResourceState::VertexBuffer
                | ResourceState::IndexBuffer
                | ResourceState::ConstantBuffer
                | ResourceState::IndirectArgument
                | ResourceState::ShaderRead
                | ResourceState::DepthRead
                | ResourceState::CopySrc
                | ResourceState::Present
        )
    }

    /// States reachable on the compute queue.
    pub(crate) fn allowed_on_compute(self) -> bool {
        matches!(
            self,
            ResourceState::Undefined
                | ResourceState::ConstantBuffer
                | ResourceState::IndirectArgument
                | ResourceState::ShaderRead
                | ResourceState::ShaderWrite
                | ResourceState::CopySrc
                | ResourceState::CopyDst
        )
    }
}

/// First access state inferred from buffer usage, used after initial upload.
pub(crate) fn buffer_initial_state(usage: BufferUsages) -> ResourceState {
    if usage.contains(BufferUsage::Vertex) {
        ResourceState::VertexBuffer
    } else if usage.contains(BufferUsage::Index) {
        ResourceState::IndexBuffer
    } else if usage.contains(BufferUsage::Constant) {
        ResourceState::ConstantBuffer
    } else if usage.contains(BufferUsage::ShaderWrite) {
        ResourceState::ShaderWrite
    } else if usage.contains(BufferUsage::ShaderRead) {
        ResourceState::ShaderRead
    } else if usage.contains(BufferUsage::Indirect) {
        ResourceState::IndirectArgument
    } else {
        ResourceState::CopyDst
    }
}

/// First access state inferred from texture usage, used after initial upload.
pub(crate) fn texture_initial_state(usage: TextureUsages, is_depth: bool) -> ResourceState {
    if usage.contains(TextureUsage::ShaderRead) {
        ResourceState::ShaderRead
    } else if usage.contains(TextureUsage::ShaderWrite) {
        ResourceState::ShaderWrite
    } else if usage.contains(TextureUsage::RenderTarget) {
        if is_depth {
            ResourceState::DepthWrite
        } else {
            ResourceState::RenderTarget
        }
    } else {
        ResourceState::CopyDst
    }
}

/// Per-resource tracking cell. Writers on different queues must be
/// externally serialized; the lock only protects the bookkeeping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackedState {
    pub current: ResourceState,
    /// Set between a split-barrier begin and its matching end.
    pub transitioning: Option<ResourceState>,
}

impl TrackedState {
    pub(crate) fn new(state: ResourceState) -> Self {
        Self {
            current: state,
            transitioning: None,
        }
    }
}

/// What a requested transition must record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionPlan {
    /// Same read-only state, nothing to synchronize.
    Skip,
    /// Record a full barrier from the old state.
    Emit { from: ResourceState },
}

/// Decide the barrier for moving `state` to `dst` and update the logical
/// state immediately, so later transitions see the new state even before
/// the pending barrier list is flushed.
pub(crate) fn plan_transition(state: &mut TrackedState, dst: ResourceState) -> TransitionPlan {
    // A begun split barrier resolves here: emit the deferred half.
    if let Some(pending) = state.transitioning.take() {
        if pending == dst {
            let from = state.current;
            state.current = dst;
            return TransitionPlan::Emit { from };
        }
    }

    if state.current == dst && dst.is_read_only() {
        return TransitionPlan::Skip;
    }

    let from = state.current;
    state.current = dst;
    TransitionPlan::Emit { from }
}

/// Mark the destination of a split barrier; the barrier itself is recorded
/// when the matching transition request arrives.
pub(crate) fn begin_split_transition(state: &mut TrackedState, dst: ResourceState) {
    state.transitioning = Some(dst);
}

/// A not-yet-lowered image barrier, kept in domain form so pending lists
/// stay `Send`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImageBarrier {
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub from: ResourceState,
    pub to: ResourceState,
    /// Drop the old contents (old layout becomes UNDEFINED).
    pub discard: bool,
}

impl ImageBarrier {
    pub(crate) fn to_vk(self) -> vk::ImageMemoryBarrier2<'static> {
        let old_layout = if self.discard {
            vk::ImageLayout::UNDEFINED
        } else {
            self.from.image_layout()
        };
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.from.stage_mask())
            .src_access_mask(self.from.access_mask())
            .dst_stage_mask(self.to.stage_mask())
            .dst_access_mask(self.to.access_mask())
            .old_layout(old_layout)
            .new_layout(self.to.image_layout())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferBarrier {
    pub buffer: vk::Buffer,
    pub size: u64,
    pub from: ResourceState,
    pub to: ResourceState,
}

impl BufferBarrier {
    pub(crate) fn to_vk(self) -> vk::BufferMemoryBarrier2<'static> {
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(self.from.stage_mask())
            .src_access_mask(self.from.access_mask())
            .dst_stage_mask(self.to.stage_mask())
            .dst_access_mask(self.to.access_mask())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.buffer)
            .offset(0)
            .size(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_read_transition_skips() {
        let mut state = TrackedState::new(ResourceState::ShaderRead);
        assert_eq!(
            plan_transition(&mut state, ResourceState::ShaderRead),
            TransitionPlan::Skip
        );
    }

    #[test]
    fn write_states_always_barrier() {
        // Back-to-back writes need a barrier even without a state change.
        let mut state = TrackedState::new(ResourceState::ShaderWrite);
        assert_eq!(
            plan_transition(&mut state, ResourceState::ShaderWrite),
            TransitionPlan::Emit {
                from: ResourceState::ShaderWrite
            }
        );
    }

    #[test]
    fn logical_state_updates_before_flush() {
        let mut state = TrackedState::new(ResourceState::Undefined);
        let plan = plan_transition(&mut state, ResourceState::CopyDst);
        assert_eq!(
            plan,
            TransitionPlan::Emit {
                from: ResourceState::Undefined
            }
        );
        assert_eq!(state.current, ResourceState::CopyDst);

        let plan = plan_transition(&mut state, ResourceState::ShaderRead);
        assert_eq!(
            plan,
            TransitionPlan::Emit {
                from: ResourceState::CopyDst
            }
        );
    }

    #[test]
    fn split_transition_resolves_on_request() {
        let mut state = TrackedState::new(ResourceState::RenderTarget);
        begin_split_transition(&mut state, ResourceState::ShaderRead);
        let plan = plan_transition(&mut state, ResourceState::ShaderRead);
        assert_eq!(
            plan,
            TransitionPlan::Emit {
                from: ResourceState::RenderTarget
            }
        );
        assert!(state.transitioning.is_none());
    }

    #[test]
    fn compute_queue_state_subset() {
        assert!(ResourceState::ShaderWrite.allowed_on_compute());
        assert!(ResourceState::CopyDst.allowed_on_compute());
        assert!(!ResourceState::RenderTarget.allowed_on_compute());
        assert!(!ResourceState::DepthWrite.allowed_on_compute());
        assert!(!ResourceState::Present.allowed_on_compute());
    }

    #[test]
    fn usage_to_first_state() {
        assert_eq!(
            buffer_initial_state(BufferUsage::Vertex | BufferUsage::ShaderRead),
            ResourceState::VertexBuffer
        );
        assert_eq!(
            buffer_initial_state(BufferUsage::ShaderRead.into()),
            ResourceState::ShaderRead
        );
        assert_eq!(
            texture_initial_state(TextureUsage::RenderTarget.into(), true),
            ResourceState::DepthWrite
        );
    }

    #[test]
    fn depth_lowering() {
        assert_eq!(
            ResourceState::DepthRead.image_layout(),
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        );
        assert!(
            ResourceState::DepthWrite
                .stage_mask()
                .contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS)
        );
    }
}
