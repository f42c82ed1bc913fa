//! Command recording: render-pass descriptors, the command vtable and the
//! owning `CommandBuffer` wrapper.

use std::any::Any;

use crate::buffer::Buffer;
use crate::error::GalError;
use crate::flags::{IndexFormat, LoadOp, ShaderStages, StoreOp};
use crate::pipeline::Pipeline;
use crate::query::QueryHeap;
use crate::swapchain::SwapChain;
use crate::texture::Texture;
use crate::types::{Color, Rect, Viewport};

#[derive(Clone)]
pub struct ColorAttachmentDesc {
    pub texture: Texture,
    pub mip_level: u32,
    pub slice: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: Color,
}

impl ColorAttachmentDesc {
    pub fn clear(texture: Texture, color: Color) -> Self {
        Self {
            texture,
            mip_level: 0,
            slice: 0,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: color,
        }
    }

    pub fn load(texture: Texture) -> Self {
        Self {
            texture,
            mip_level: 0,
            slice: 0,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            clear_color: Color::BLACK,
        }
    }
}

#[derive(Clone)]
pub struct DepthStencilAttachmentDesc {
    pub texture: Texture,
    pub mip_level: u32,
    pub slice: u32,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u32,
}

impl DepthStencilAttachmentDesc {
    pub fn clear(texture: Texture, depth: f32) -> Self {
        Self {
            texture,
            mip_level: 0,
            slice: 0,
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::Store,
            clear_depth: depth,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            clear_stencil: 0,
        }
    }
}

/// Up to [`crate::pipeline::MAX_COLOR_ATTACHMENTS`] color attachments and at
/// most one depth/stencil attachment.
#[derive(Clone, Default)]
pub struct RenderPassDesc {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachmentDesc>,
    pub depth_stencil_attachment: Option<DepthStencilAttachmentDesc>,
}

/// Backend contract for one recording session. Captured at
/// `begin_command_buffer`; a command buffer is owned by a single thread
/// while recording.
pub trait CommandApi: Send {
    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);

    /// Acquire the swapchain's next backbuffer, rebuilding on resize.
    /// Returns `None` when the window is minimized.
    fn acquire_swapchain_texture(
        &mut self,
        swapchain: &SwapChain,
    ) -> Result<Option<Texture>, GalError>;

    fn begin_render_pass(&mut self, desc: &RenderPassDesc) -> Result<(), GalError>;
    fn end_render_pass(&mut self);

    fn set_render_pipeline(&mut self, pipeline: &Pipeline);
    fn set_compute_pipeline(&mut self, pipeline: &Pipeline);

    fn set_viewport(&mut self, viewport: &Viewport);
    fn set_scissor(&mut self, rect: &Rect);
    fn set_blend_constants(&mut self, color: Color);
    fn set_stencil_reference(&mut self, reference: u32);

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64);
    fn bind_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat, offset: u64);
    fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );
    fn draw_indirect(&mut self, buffer: &Buffer, offset: u64);
    fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64);

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);
    fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64);

    fn write_timestamp(&mut self, heap: &QueryHeap, index: u32);

    /// Recover the concrete recorder at submit time.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// An open recording session, handed out by `Device::begin_command_buffer`
/// and consumed by `Device::submit`.
pub struct CommandBuffer {
    api: Box<dyn CommandApi>,
}

impl CommandBuffer {
    pub fn from_api(api: Box<dyn CommandApi>) -> Self {
        Self { api }
    }

    pub fn into_api(self) -> Box<dyn CommandApi> {
        self.api
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.api.push_debug_group(label);
    }

    pub fn pop_debug_group(&mut self) {
        self.api.pop_debug_group();
    }

    pub fn acquire_swapchain_texture(
        &mut self,
        swapchain: &SwapChain,
    ) -> Result<Option<Texture>, GalError> {
        self.api.acquire_swapchain_texture(swapchain)
    }

    pub fn begin_render_pass(&mut self, desc: &RenderPassDesc) -> Result<(), GalError> {
        crate::validation::validate_render_pass(desc)?;
        self.api.begin_render_pass(desc)
    }

    pub fn end_render_pass(&mut self) {
        self.api.end_render_pass();
    }

    pub fn set_render_pipeline(&mut self, pipeline: &Pipeline) {
        self.api.set_render_pipeline(pipeline);
    }

    pub fn set_compute_pipeline(&mut self, pipeline: &Pipeline) {
        self.api.set_compute_pipeline(pipeline);
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.api.set_viewport(viewport);
    }

    pub fn set_scissor(&mut self, rect: &Rect) {
        self.api.set_scissor(rect);
    }

    pub fn set_blend_constants(&mut self, color: Color) {
        self.api.set_blend_constants(color);
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.api.set_stencil_reference(reference);
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64) {
        self.api.bind_vertex_buffer(slot, buffer, offset);
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat, offset: u64) {
        self.api.bind_index_buffer(buffer, format, offset);
    }

    pub fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) {
        self.api.set_push_constants(stages, offset, data);
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.api.draw(vertex_count, instance_count, first_vertex, first_instance);
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.api
            .draw_indexed(index_count, instance_count, first_index, base_vertex, first_instance);
    }

    pub fn draw_indirect(&mut self, buffer: &Buffer, offset: u64) {
        self.api.draw_indirect(buffer, offset);
    }

    pub fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64) {
        self.api.draw_indexed_indirect(buffer, offset);
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.api.dispatch(x, y, z);
    }

    pub fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64) {
        self.api.dispatch_indirect(buffer, offset);
    }

    pub fn write_timestamp(&mut self, heap: &QueryHeap, index: u32) {
        self.api.write_timestamp(heap, index);
    }
}
