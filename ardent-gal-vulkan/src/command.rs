//! Command recording.
//!
//! State transitions are planned against each resource's tracked state and
//! accumulated as pending barriers, then flushed in one
//! `vkCmdPipelineBarrier2` before the draw, dispatch or pass that needs
//! them. The pending lists also flush once they reach
//! [`MAX_PENDING_BARRIERS`].

use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use ardent_gal::buffer::{Buffer, BufferApi};
use ardent_gal::command::{CommandApi, RenderPassDesc};
use ardent_gal::error::GalError;
use ardent_gal::flags::{IndexFormat, QueueKind, ShaderStages};
use ardent_gal::pipeline::Pipeline;
use ardent_gal::query::QueryHeap;
use ardent_gal::swapchain::SwapChain;
use ardent_gal::texture::{Texture, TextureApi, TextureSubresource};
use ardent_gal::types::{Color, Rect, Viewport};
use ash::vk;
use smallvec::SmallVec;

use crate::barrier::{
    BufferBarrier, ImageBarrier, MAX_PENDING_BARRIERS, ResourceState, TransitionPlan,
    begin_split_transition, plan_transition,
};
use crate::buffer::VulkanBuffer;
use crate::device::DeviceShared;
use crate::pipeline::VulkanPipeline;
use crate::query::VulkanQueryHeap;
use crate::swapchain::VulkanSwapChain;
use crate::texture::VulkanTexture;

/// A backbuffer acquired during this recording, presented after submit.
pub(crate) struct PresentRequest {
    pub swapchain: SwapChain,
    pub texture: Texture,
    pub image_index: u32,
    pub acquire_semaphore: vk::Semaphore,
    pub release_semaphore: vk::Semaphore,
}

pub(crate) struct VulkanCommandApi {
    shared: Arc<DeviceShared>,
    cmd: vk::CommandBuffer,
    queue: QueueKind,
    inside_render_pass: bool,
    debug_group_depth: u32,
    pending_images: SmallVec<[ImageBarrier; MAX_PENDING_BARRIERS]>,
    pending_buffers: SmallVec<[BufferBarrier; MAX_PENDING_BARRIERS]>,
    presents: Vec<PresentRequest>,
    /// Sampled-usage attachments of the open pass; they start a split
    /// transition toward `ShaderRead` when the pass closes.
    pass_sampled_attachments: Vec<Texture>,
    bound_layout: vk::PipelineLayout,
    bound_push_stages: vk::ShaderStageFlags,
}

impl VulkanCommandApi {
    pub(crate) fn new(shared: Arc<DeviceShared>, cmd: vk::CommandBuffer, queue: QueueKind) -> Self {
        Self {
            shared,
            cmd,
            queue,
            inside_render_pass: false,
            debug_group_depth: 0,
            pending_images: SmallVec::new(),
            pending_buffers: SmallVec::new(),
            presents: Vec::new(),
            pass_sampled_attachments: Vec::new(),
            bound_layout: vk::PipelineLayout::null(),
            bound_push_stages: vk::ShaderStageFlags::empty(),
        }
    }

    #[inline]
    pub(crate) fn queue_kind(&self) -> QueueKind {
        self.queue
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::CommandBuffer {
        self.cmd
    }

    /// Seal the recording for submission: backbuffers move to present
    /// layout, leftover debug groups are closed, pending barriers flush.
    pub(crate) fn finish(&mut self) -> Result<Vec<PresentRequest>, GalError> {
        debug_assert!(!self.inside_render_pass, "render pass left open");
        let presents = std::mem::take(&mut self.presents);
        for request in &presents {
            if let Some(texture) = request.texture.api().as_any().downcast_ref::<VulkanTexture>()
            {
                self.transition_texture(texture, ResourceState::Present);
            }
        }
        while self.debug_group_depth > 0 {
            self.pop_debug_group();
        }
        self.flush_barriers();
        unsafe {
            self.shared
                .device
                .end_command_buffer(self.cmd)
                .map_err(|e| GalError::creation("command recording", e))?;
        }
        Ok(presents)
    }

    fn transition_texture(&mut self, texture: &VulkanTexture, dst: ResourceState) {
        debug_assert!(
            self.queue != QueueKind::Compute || dst.allowed_on_compute(),
            "state not reachable on the compute queue"
        );
        let mut state = texture.state().lock();
        let from_undefined = state.current == ResourceState::Undefined;
        match plan_transition(&mut state, dst) {
            TransitionPlan::Skip => {}
            TransitionPlan::Emit { from } => {
                drop(state);
                debug_assert!(
                    !self.inside_render_pass,
                    "texture transition inside a render pass"
                );
                self.pending_images.push(ImageBarrier {
                    image: texture.handle(),
                    aspect: texture.aspect(),
                    from,
                    to: dst,
                    discard: from_undefined,
                });
                self.flush_if_full();
            }
        }
    }

    fn transition_buffer(&mut self, buffer: &VulkanBuffer, dst: ResourceState) {
        debug_assert!(
            self.queue != QueueKind::Compute || dst.allowed_on_compute(),
            "state not reachable on the compute queue"
        );
        let mut state = buffer.state().lock();
        match plan_transition(&mut state, dst) {
            TransitionPlan::Skip => {}
            TransitionPlan::Emit { from } => {
                drop(state);
                if self.inside_render_pass {
                    // Barriers are illegal inside dynamic rendering; binds
                    // in a pass rely on the usage-inferred initial state.
                    log::warn!(
                        "buffer transition {from:?} -> {dst:?} requested inside a render pass"
                    );
                    return;
                }
                self.pending_buffers.push(BufferBarrier {
                    buffer: buffer.handle(),
                    size: buffer.desc().size,
                    from,
                    to: dst,
                });
                self.flush_if_full();
            }
        }
    }

    fn flush_if_full(&mut self) {
        if self.pending_images.len() >= MAX_PENDING_BARRIERS
            || self.pending_buffers.len() >= MAX_PENDING_BARRIERS
        {
            self.flush_barriers();
        }
    }

    fn flush_barriers(&mut self) {
        if self.pending_images.is_empty() && self.pending_buffers.is_empty() {
            return;
        }
        let images: SmallVec<[vk::ImageMemoryBarrier2; MAX_PENDING_BARRIERS]> =
            self.pending_images.drain(..).map(ImageBarrier::to_vk).collect();
        let buffers: SmallVec<[vk::BufferMemoryBarrier2; MAX_PENDING_BARRIERS]> =
            self.pending_buffers.drain(..).map(BufferBarrier::to_vk).collect();
        let info = vk::DependencyInfo::default()
            .image_memory_barriers(&images)
            .buffer_memory_barriers(&buffers);
        unsafe { self.shared.device.cmd_pipeline_barrier2(self.cmd, &info) };
    }

    fn backend_buffer<'a>(&self, buffer: &'a Buffer) -> Option<&'a VulkanBuffer> {
        buffer.api().as_any().downcast_ref::<VulkanBuffer>()
    }

    fn bind_indirect(&mut self, buffer: &Buffer) -> Option<vk::Buffer> {
        let backend = self.backend_buffer(buffer)?;
        let handle = backend.handle();
        self.transition_buffer(backend, ResourceState::IndirectArgument);
        self.flush_barriers();
        Some(handle)
    }
}

impl CommandApi for VulkanCommandApi {
    fn push_debug_group(&mut self, label: &str) {
        if let Some(debug_utils) = &self.shared.debug_utils {
            if let Ok(name) = CString::new(label) {
                let info = vk::DebugUtilsLabelEXT::default().label_name(&name);
                unsafe { debug_utils.cmd_begin_debug_utils_label(self.cmd, &info) };
            }
        }
        self.debug_group_depth += 1;
    }

    fn pop_debug_group(&mut self) {
        if self.debug_group_depth == 0 {
            return;
        }
        if let Some(debug_utils) = &self.shared.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(self.cmd) };
        }
        self.debug_group_depth -= 1;
    }

    fn acquire_swapchain_texture(
        &mut self,
        swapchain: &SwapChain,
    ) -> Result<Option<Texture>, GalError> {
        debug_assert_eq!(
            self.queue,
            QueueKind::Graphics,
            "backbuffers are acquired on the graphics queue"
        );
        let backend = swapchain
            .api()
            .as_any()
            .downcast_ref::<VulkanSwapChain>()
            .ok_or_else(|| GalError::validation("swapchain belongs to another backend"))?;
        let Some(acquired) = backend.acquire()? else {
            return Ok(None);
        };
        let texture = acquired.texture.clone();
        self.presents.push(PresentRequest {
            swapchain: swapchain.clone(),
            texture: acquired.texture,
            image_index: acquired.image_index,
            acquire_semaphore: acquired.acquire_semaphore,
            release_semaphore: acquired.release_semaphore,
        });
        // The backbuffer is renderable from the moment it is handed out,
        // even if the frame never opens a pass on it.
        if let Some(backend) = texture.api().as_any().downcast_ref::<VulkanTexture>() {
            self.transition_texture(backend, ResourceState::RenderTarget);
        }
        Ok(Some(texture))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDesc) -> Result<(), GalError> {
        debug_assert!(!self.inside_render_pass, "render pass already open");
        debug_assert_eq!(
            self.queue,
            QueueKind::Graphics,
            "render passes record on the graphics queue"
        );

        let mut render_area = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let mut color_infos: SmallVec<[vk::RenderingAttachmentInfo; 8]> = SmallVec::new();

        for attachment in &desc.color_attachments {
            let texture = attachment
                .texture
                .api()
                .as_any()
                .downcast_ref::<VulkanTexture>()
                .ok_or_else(|| GalError::validation("texture belongs to another backend"))?;
            self.transition_texture(texture, ResourceState::RenderTarget);
            if texture
                .desc()
                .usage
                .contains(ardent_gal::flags::TextureUsage::ShaderRead)
            {
                self.pass_sampled_attachments.push(attachment.texture.clone());
            }

            let extent = texture
                .desc()
                .extent()
                .mip_level(attachment.mip_level);
            render_area.width = render_area.width.min(extent.width);
            render_area.height = render_area.height.min(extent.height);

            let view =
                texture.view(TextureSubresource::single(attachment.mip_level, attachment.slice))?;
            color_infos.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(crate::conv::load_op(attachment.load_op))
                    .store_op(crate::conv::store_op(attachment.store_op))
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: [
                                attachment.clear_color.r,
                                attachment.clear_color.g,
                                attachment.clear_color.b,
                                attachment.clear_color.a,
                            ],
                        },
                    }),
            );
        }

        let mut depth_info = None;
        let mut stencil_info = None;
        if let Some(attachment) = &desc.depth_stencil_attachment {
            let texture = attachment
                .texture
                .api()
                .as_any()
                .downcast_ref::<VulkanTexture>()
                .ok_or_else(|| GalError::validation("texture belongs to another backend"))?;
            self.transition_texture(texture, ResourceState::DepthWrite);

            let extent = texture
                .desc()
                .extent()
                .mip_level(attachment.mip_level);
            render_area.width = render_area.width.min(extent.width);
            render_area.height = render_area.height.min(extent.height);

            let view =
                texture.view(TextureSubresource::single(attachment.mip_level, attachment.slice))?;
            let clear_value = vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: attachment.clear_depth,
                    stencil: attachment.clear_stencil,
                },
            };
            let info = texture.desc().format.info();
            if info.has_depth {
                depth_info = Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(view)
                        .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                        .load_op(crate::conv::load_op(attachment.depth_load_op))
                        .store_op(crate::conv::store_op(attachment.depth_store_op))
                        .clear_value(clear_value),
                );
            }
            if info.has_stencil {
                stencil_info = Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(view)
                        .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                        .load_op(crate::conv::load_op(attachment.stencil_load_op))
                        .store_op(crate::conv::store_op(attachment.stencil_store_op))
                        .clear_value(clear_value),
                );
            }
        }

        self.flush_barriers();

        let mut rendering = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: render_area,
            })
            .layer_count(1)
            .color_attachments(&color_infos);
        if let Some(depth) = &depth_info {
            rendering = rendering.depth_attachment(depth);
        }
        if let Some(stencil) = &stencil_info {
            rendering = rendering.stencil_attachment(stencil);
        }

        unsafe { self.shared.device.cmd_begin_rendering(self.cmd, &rendering) };
        self.inside_render_pass = true;

        // Full-surface defaults; callers override with explicit rects.
        self.set_viewport(&Viewport::full(
            render_area.width as f32,
            render_area.height as f32,
        ));
        self.set_scissor(&Rect {
            x: 0,
            y: 0,
            width: render_area.width,
            height: render_area.height,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) {
        debug_assert!(self.inside_render_pass, "no render pass open");
        unsafe { self.shared.device.cmd_end_rendering(self.cmd) };
        self.inside_render_pass = false;

        // Rendered-then-sampled attachments start a split transition; the
        // barrier itself records when the sampled use asks for it.
        for texture in self.pass_sampled_attachments.drain(..) {
            if let Some(backend) = texture.api().as_any().downcast_ref::<VulkanTexture>() {
                begin_split_transition(&mut backend.state().lock(), ResourceState::ShaderRead);
            }
        }
    }

    fn set_render_pipeline(&mut self, pipeline: &Pipeline) {
        let Some(backend) = pipeline.api().as_any().downcast_ref::<VulkanPipeline>() else {
            return;
        };
        self.bound_layout = backend.vk_layout();
        self.bound_push_stages = backend.vk_push_stages();
        unsafe {
            self.shared.device.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                backend.handle(),
            );
        }
    }

    fn set_compute_pipeline(&mut self, pipeline: &Pipeline) {
        let Some(backend) = pipeline.api().as_any().downcast_ref::<VulkanPipeline>() else {
            return;
        };
        self.bound_layout = backend.vk_layout();
        self.bound_push_stages = backend.vk_push_stages();
        unsafe {
            self.shared.device.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::COMPUTE,
                backend.handle(),
            );
        }
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        // The API's viewport is Y-down; flip so clip space matches across
        // backends.
        let flipped = vk::Viewport {
            x: viewport.x,
            y: viewport.y + viewport.height,
            width: viewport.width,
            height: -viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.shared.device.cmd_set_viewport(self.cmd, 0, &[flipped]) };
    }

    fn set_scissor(&mut self, rect: &Rect) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: rect.x,
                y: rect.y,
            },
            extent: vk::Extent2D {
                width: rect.width,
                height: rect.height,
            },
        };
        unsafe { self.shared.device.cmd_set_scissor(self.cmd, 0, &[scissor]) };
    }

    fn set_blend_constants(&mut self, color: Color) {
        let constants = [color.r, color.g, color.b, color.a];
        unsafe { self.shared.device.cmd_set_blend_constants(self.cmd, &constants) };
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        unsafe {
            self.shared.device.cmd_set_stencil_reference(
                self.cmd,
                vk::StencilFaceFlags::FRONT_AND_BACK,
                reference,
            );
        }
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64) {
        let Some(backend) = self.backend_buffer(buffer) else {
            return;
        };
        let handle = backend.handle();
        self.transition_buffer(backend, ResourceState::VertexBuffer);
        unsafe {
            self.shared
                .device
                .cmd_bind_vertex_buffers(self.cmd, slot, &[handle], &[offset]);
        }
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat, offset: u64) {
        let Some(backend) = self.backend_buffer(buffer) else {
            return;
        };
        let handle = backend.handle();
        self.transition_buffer(backend, ResourceState::IndexBuffer);
        unsafe {
            self.shared.device.cmd_bind_index_buffer(
                self.cmd,
                handle,
                offset,
                crate::conv::index_type(format),
            );
        }
    }

    fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) {
        if self.bound_layout == vk::PipelineLayout::null() {
            log::warn!("push constants set with no pipeline bound");
            return;
        }
        let stages = crate::conv::shader_stages(stages) & self.bound_push_stages;
        unsafe {
            self.shared
                .device
                .cmd_push_constants(self.cmd, self.bound_layout, stages, offset, data);
        }
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        debug_assert!(self.inside_render_pass, "draw outside a render pass");
        unsafe {
            self.shared.device.cmd_draw(
                self.cmd,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        debug_assert!(self.inside_render_pass, "draw outside a render pass");
        unsafe {
            self.shared.device.cmd_draw_indexed(
                self.cmd,
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            );
        }
    }

    fn draw_indirect(&mut self, buffer: &Buffer, offset: u64) {
        debug_assert!(self.inside_render_pass, "draw outside a render pass");
        let Some(backend) = self.backend_buffer(buffer) else {
            return;
        };
        let handle = backend.handle();
        self.transition_buffer(backend, ResourceState::IndirectArgument);
        unsafe {
            self.shared
                .device
                .cmd_draw_indirect(self.cmd, handle, offset, 1, 0);
        }
    }

    fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64) {
        debug_assert!(self.inside_render_pass, "draw outside a render pass");
        let Some(backend) = self.backend_buffer(buffer) else {
            return;
        };
        let handle = backend.handle();
        self.transition_buffer(backend, ResourceState::IndirectArgument);
        unsafe {
            self.shared
                .device
                .cmd_draw_indexed_indirect(self.cmd, handle, offset, 1, 0);
        }
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        debug_assert!(!self.inside_render_pass, "dispatch inside a render pass");
        self.flush_barriers();
        unsafe {
            self.shared
                .device
                .cmd_dispatch(self.cmd, group_count_x, group_count_y, group_count_z);
        }
    }

    fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64) {
        debug_assert!(!self.inside_render_pass, "dispatch inside a render pass");
        let Some(handle) = self.bind_indirect(buffer) else {
            return;
        };
        unsafe {
            self.shared
                .device
                .cmd_dispatch_indirect(self.cmd, handle, offset);
        }
    }

    fn write_timestamp(&mut self, heap: &QueryHeap, index: u32) {
        let Some(backend) = heap.api().as_any().downcast_ref::<VulkanQueryHeap>() else {
            return;
        };
        if index >= heap.desc().count {
            log::warn!("timestamp index {index} out of range");
            return;
        }
        unsafe {
            if !self.inside_render_pass {
                self.shared
                    .device
                    .cmd_reset_query_pool(self.cmd, backend.handle(), index, 1);
            }
            self.shared.device.cmd_write_timestamp2(
                self.cmd,
                vk::PipelineStageFlags2::ALL_COMMANDS,
                backend.handle(),
                index,
            );
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
