//! Backend-agnostic graphics abstraction layer.
//!
//! Descriptors and handle types shared by every backend. Handles are
//! reference counted; cloning one shares the underlying native resource,
//! and the backend defers its destruction until the GPU can no longer be
//! reading it. A concrete backend implements the `*Api` traits and is
//! selected by the embedding crate at device creation.

pub mod buffer;
pub mod command;
pub mod device;
pub mod error;
pub mod flags;
pub mod format;
pub mod log;
pub mod pipeline;
pub mod query;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod texture;
pub mod types;
mod validation;

pub use buffer::{Buffer, BufferApi, BufferDesc, CONSTANT_BUFFER_ALIGNMENT, MIN_BUFFER_SIZE};
pub use command::{
    ColorAttachmentDesc, CommandApi, CommandBuffer, DepthStencilAttachmentDesc, RenderPassDesc,
};
pub use device::{
    AdapterInfo, Device, DeviceApi, DeviceDesc, FRAMES_IN_FLIGHT, Limits, MAX_FRAMES_IN_FLIGHT,
};
pub use error::GalError;
pub use flags::{
    AdapterKind, AddressMode, Backend, BlendFactor, BlendOperation, BorderColor, BufferUsage,
    BufferUsages, CompareFunction, CpuAccess, CullMode, Feature, FilterMode, FrontFace,
    IndexFormat, LoadOp, PipelineKind, PresentMode, PrimitiveTopology, QueryKind, QueueKind,
    ShaderStage, ShaderStages, StencilOperation, StoreOp, TextureDimension, TextureUsage,
    TextureUsages, ValidationMode, VertexStepMode,
};
pub use format::{FormatInfo, FormatKind, PixelFormat, VertexFormat};
pub use pipeline::{
    BlendComponent, BlendState, ColorWrite, ColorWrites, ComputePipelineDesc, DepthStencilState,
    DescriptorKind, DescriptorSetEntry, DescriptorSetLayoutDesc, MAX_COLOR_ATTACHMENTS,
    MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS, Pipeline, PipelineApi, PipelineLayout,
    PipelineLayoutApi, PipelineLayoutDesc, PrimitiveState, PushConstantRange, RayTracingPipelineDesc,
    RenderPipelineDesc, StencilFaceState, VertexAttribute, VertexBufferLayout,
};
pub use query::{QueryHeap, QueryHeapApi, QueryHeapDesc};
pub use sampler::{MAX_SAMPLER_ANISOTROPY, Sampler, SamplerApi, SamplerDesc};
pub use shader::{Shader, ShaderApi, ShaderDesc};
pub use swapchain::{SwapChain, SwapChainApi, SwapChainDesc, WindowHandle};
pub use texture::{Texture, TextureApi, TextureDesc, TextureSubresource, subresource_size};
pub use types::{
    Color, DispatchIndirectArgs, DrawIndexedIndirectArgs, DrawIndirectArgs, Extent3d, Origin3d,
    Rect, Viewport,
};
