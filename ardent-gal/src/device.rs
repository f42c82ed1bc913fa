//! Device descriptor, adapter info, the device vtable and its handle.

use std::any::Any;
use std::sync::Arc;

use crate::buffer::{Buffer, BufferDesc};
use crate::command::CommandBuffer;
use crate::error::GalError;
use crate::flags::{AdapterKind, Backend, Feature, QueueKind, ValidationMode};
use crate::pipeline::{
    ComputePipelineDesc, Pipeline, PipelineLayout, PipelineLayoutDesc, RayTracingPipelineDesc,
    RenderPipelineDesc,
};
use crate::query::{QueryHeap, QueryHeapDesc};
use crate::sampler::{Sampler, SamplerDesc};
use crate::shader::{Shader, ShaderDesc};
use crate::swapchain::{SwapChain, SwapChainDesc, WindowHandle};
use crate::texture::{Texture, TextureDesc};

/// Number of frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: u64 = 2;
/// Upper bound a backend may ever use for per-frame slot arrays.
pub const MAX_FRAMES_IN_FLIGHT: u64 = 3;

#[derive(Debug, Clone, Default)]
pub struct DeviceDesc {
    pub label: Option<String>,
    /// Requested backend; `None` picks the platform default.
    pub preferred_backend: Option<Backend>,
    pub validation: ValidationMode,
}

#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub kind: AdapterKind,
    pub vendor_id: u32,
    pub device_id: u32,
    pub driver_version: String,
}

/// Hard limits reported by the selected adapter.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_array_layers: u32,
    pub max_push_constant_size: u32,
    pub max_sampler_anisotropy: f32,
    pub timestamp_period_ns: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_texture_dimension_2d: 8192,
            max_texture_dimension_3d: 2048,
            max_texture_array_layers: 256,
            max_push_constant_size: 128,
            max_sampler_anisotropy: 16.0,
            timestamp_period_ns: 1.0,
        }
    }
}

/// Backend entry points. Descriptors arrive already default-filled and
/// validated by the [`Device`] wrapper.
pub trait DeviceApi: Send + Sync {
    fn backend(&self) -> Backend;
    fn adapter_info(&self) -> &AdapterInfo;
    fn limits(&self) -> &Limits;
    fn query_feature(&self, feature: Feature) -> bool;
    fn set_label(&self, label: &str);

    /// Block until all submitted GPU work has completed and drain every
    /// deferred-destroy queue.
    fn wait_idle(&self);

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer, GalError>;
    fn create_texture(
        &self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Texture, GalError>;
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler, GalError>;
    fn create_shader(&self, desc: &ShaderDesc) -> Result<Shader, GalError>;
    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc)
        -> Result<PipelineLayout, GalError>;
    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<Pipeline, GalError>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Pipeline, GalError>;
    fn create_ray_tracing_pipeline(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> Result<Pipeline, GalError>;
    fn create_query_heap(&self, desc: &QueryHeapDesc) -> Result<QueryHeap, GalError>;
    fn create_swap_chain(
        &self,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> Result<SwapChain, GalError>;

    /// Open a recording session against one of the device queues.
    fn begin_command_buffer(
        &self,
        queue: QueueKind,
        label: Option<&str>,
    ) -> Result<CommandBuffer, GalError>;

    /// Submit recorded command buffers, present any backbuffers they
    /// acquired and advance the frame counter.
    fn submit(&self, command_buffers: Vec<CommandBuffer>) -> Result<(), GalError>;

    /// Monotonic count of submitted frames.
    fn frame_count(&self) -> u64;
    /// `frame_count % FRAMES_IN_FLIGHT`, the current per-frame slot.
    fn frame_index(&self) -> u64;

    /// Resolve query-heap results into a caller buffer, in ticks.
    fn read_query_results(&self, heap: &QueryHeap, results: &mut [u64]) -> Result<(), GalError>;

    fn as_any(&self) -> &dyn Any;
}

/// A logical GPU device. Cheap to clone; the underlying native device dies
/// with the last clone.
#[derive(Clone)]
pub struct Device {
    api: Arc<dyn DeviceApi>,
}

impl Device {
    pub fn from_api(api: Arc<dyn DeviceApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.api.backend()
    }

    #[inline]
    pub fn adapter_info(&self) -> &AdapterInfo {
        self.api.adapter_info()
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        self.api.limits()
    }

    #[inline]
    pub fn query_feature(&self, feature: Feature) -> bool {
        self.api.query_feature(feature)
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    pub fn wait_idle(&self) {
        self.api.wait_idle();
    }

    pub fn create_buffer(
        &self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer, GalError> {
        let desc = desc.filled();
        crate::validation::validate_buffer(&desc, initial_data)?;
        self.api.create_buffer(&desc, initial_data)
    }

    pub fn create_texture(
        &self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Texture, GalError> {
        let desc = desc.filled();
        crate::validation::validate_texture(&desc)?;
        self.api.create_texture(&desc, initial_data)
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler, GalError> {
        self.api.create_sampler(&desc.filled())
    }

    pub fn create_shader(&self, desc: &ShaderDesc) -> Result<Shader, GalError> {
        crate::validation::validate_shader(desc)?;
        self.api.create_shader(desc)
    }

    pub fn create_pipeline_layout(
        &self,
        desc: &PipelineLayoutDesc,
    ) -> Result<PipelineLayout, GalError> {
        self.api.create_pipeline_layout(desc)
    }

    pub fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<Pipeline, GalError> {
        let desc = desc.filled();
        crate::validation::validate_render_pipeline(&desc)?;
        self.api.create_render_pipeline(&desc)
    }

    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Pipeline, GalError> {
        self.api.create_compute_pipeline(desc)
    }

    pub fn create_ray_tracing_pipeline(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> Result<Pipeline, GalError> {
        self.api.create_ray_tracing_pipeline(desc)
    }

    pub fn create_query_heap(&self, desc: &QueryHeapDesc) -> Result<QueryHeap, GalError> {
        self.api.create_query_heap(desc)
    }

    pub fn create_swap_chain(
        &self,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> Result<SwapChain, GalError> {
        self.api.create_swap_chain(window, &desc.filled())
    }

    pub fn begin_command_buffer(
        &self,
        queue: QueueKind,
        label: Option<&str>,
    ) -> Result<CommandBuffer, GalError> {
        self.api.begin_command_buffer(queue, label)
    }

    pub fn submit(&self, command_buffers: Vec<CommandBuffer>) -> Result<(), GalError> {
        self.api.submit(command_buffers)
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.api.frame_count()
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.api.frame_index()
    }

    pub fn read_query_results(&self, heap: &QueryHeap, results: &mut [u64]) -> Result<(), GalError> {
        self.api.read_query_results(heap, results)
    }

    #[inline]
    pub fn api(&self) -> &dyn DeviceApi {
        self.api.as_ref()
    }
}
