//! Pipeline layout and pipeline descriptors.

use std::any::Any;
use std::sync::Arc;

use enumflags2::{BitFlags, bitflags};

use crate::flags::{
    BlendFactor, BlendOperation, CompareFunction, CullMode, FrontFace, PipelineKind,
    PrimitiveTopology, ShaderStages, StencilOperation, VertexStepMode,
};
use crate::format::{PixelFormat, VertexFormat};
use crate::shader::Shader;

pub const MAX_COLOR_ATTACHMENTS: usize = 8;
pub const MAX_VERTEX_BUFFERS: usize = 8;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Kind of resource a descriptor-set entry binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    StorageBuffer,
    SampledTexture,
    StorageTexture,
    Sampler,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub kind: DescriptorKind,
    pub count: u32,
}

/// One descriptor set with its register/space index.
#[derive(Debug, Clone)]
pub struct DescriptorSetLayoutDesc {
    pub space: u32,
    pub entries: Vec<DescriptorSetEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    pub offset: u32,
    pub size: u32,
    pub visibility: ShaderStages,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutDesc {
    pub label: Option<String>,
    pub sets: Vec<DescriptorSetLayoutDesc>,
    pub push_constants: Vec<PushConstantRange>,
}

pub trait PipelineLayoutApi: Send + Sync {
    fn desc(&self) -> &PipelineLayoutDesc;
    /// Base index of the push-constant ranges within the backend's binding
    /// slot space, recorded at creation for later binding.
    fn push_constant_base(&self) -> u32;
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct PipelineLayout {
    api: Arc<dyn PipelineLayoutApi>,
}

impl PipelineLayout {
    pub fn from_api(api: Arc<dyn PipelineLayoutApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &PipelineLayoutDesc {
        self.api.desc()
    }

    #[inline]
    pub fn push_constant_base(&self) -> u32 {
        self.api.push_constant_base()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn PipelineLayoutApi {
        self.api.as_ref()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub shader_location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorWrite {
    Red = 1 << 0,
    Green = 1 << 1,
    Blue = 1 << 2,
    Alpha = 1 << 3,
}

pub type ColorWrites = BitFlags<ColorWrite>;

#[derive(Debug, Clone, Copy)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlendState {
    pub blend_enabled: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    pub write_mask: ColorWrites,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            blend_enabled: false,
            color: BlendComponent::default(),
            alpha: BlendComponent::default(),
            write_mask: ColorWrites::all(),
        }
    }
}

impl BlendState {
    pub fn alpha_blending() -> Self {
        Self {
            blend_enabled: true,
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            write_mask: ColorWrites::all(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

impl StencilFaceState {
    fn is_default(&self) -> bool {
        self.compare == CompareFunction::Always
            && self.fail_op == StencilOperation::Keep
            && self.depth_fail_op == StencilOperation::Keep
            && self.pass_op == StencilOperation::Keep
    }
}

#[derive(Debug, Clone)]
pub struct DepthStencilState {
    pub format: PixelFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            format: PixelFormat::Depth32Float,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

impl DepthStencilState {
    /// Depth testing is on when the compare differs from `Always` or depth
    /// writes are requested.
    pub fn depth_test_enabled(&self) -> bool {
        self.depth_compare != CompareFunction::Always || self.depth_write_enabled
    }

    /// Stencil testing is on when either face departs from the all-`Keep`,
    /// compare-`Always` defaults.
    pub fn stencil_test_enabled(&self) -> bool {
        !self.stencil_front.is_default() || !self.stencil_back.is_default()
    }
}

#[derive(Debug, Clone)]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    pub patch_control_points: u32,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
}

impl Default for PrimitiveState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            patch_control_points: 1,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
        }
    }
}

/// Flat render-pipeline descriptor lowered by the backend in a single pass.
#[derive(Clone)]
pub struct RenderPipelineDesc {
    pub label: Option<String>,
    pub layout: PipelineLayout,
    pub vertex_shader: Shader,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub fragment_shader: Option<Shader>,
    /// One entry per color attachment; missing entries mean opaque writes.
    pub blend: Vec<BlendState>,
    pub depth_stencil: Option<DepthStencilState>,
    pub primitive: PrimitiveState,
    pub color_formats: Vec<PixelFormat>,
    pub depth_stencil_format: Option<PixelFormat>,
    pub sample_count: u32,
    pub alpha_to_coverage_enabled: bool,
}

impl RenderPipelineDesc {
    /// Fill zero-valued fields with their documented defaults.
    pub fn filled(&self) -> RenderPipelineDesc {
        let mut desc = self.clone();
        if desc.primitive.patch_control_points == 0 {
            desc.primitive.patch_control_points = 1;
        }
        desc.sample_count = desc.sample_count.max(1);
        desc
    }
}

#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub label: Option<String>,
    pub layout: PipelineLayout,
    pub shader: Shader,
}

#[derive(Clone)]
pub struct RayTracingPipelineDesc {
    pub label: Option<String>,
    pub layout: PipelineLayout,
    pub shaders: Vec<Shader>,
    pub max_recursion_depth: u32,
}

pub trait PipelineApi: Send + Sync {
    fn kind(&self) -> PipelineKind;
    /// Topology of a render pipeline; `None` for compute.
    fn topology(&self) -> Option<PrimitiveTopology>;
    /// Per-binding vertex strides of a render pipeline.
    fn vertex_strides(&self) -> &[u32];
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct Pipeline {
    api: Arc<dyn PipelineApi>,
}

impl Pipeline {
    pub fn from_api(api: Arc<dyn PipelineApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn kind(&self) -> PipelineKind {
        self.api.kind()
    }

    #[inline]
    pub fn topology(&self) -> Option<PrimitiveTopology> {
        self.api.topology()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn PipelineApi {
        self.api.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_test_inference() {
        let mut state = DepthStencilState::default();
        assert!(!state.depth_test_enabled());

        state.depth_compare = CompareFunction::LessEqual;
        assert!(state.depth_test_enabled());

        let state = DepthStencilState {
            depth_write_enabled: true,
            ..Default::default()
        };
        assert!(state.depth_test_enabled());
    }

    #[test]
    fn stencil_test_inference() {
        let mut state = DepthStencilState::default();
        assert!(!state.stencil_test_enabled());

        state.stencil_back.pass_op = StencilOperation::Replace;
        assert!(state.stencil_test_enabled());

        let mut state = DepthStencilState::default();
        state.stencil_front.compare = CompareFunction::NotEqual;
        assert!(state.stencil_test_enabled());
    }
}
