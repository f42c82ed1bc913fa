//! Shader module descriptor and handle.
//!
//! Shaders arrive as pre-compiled bytecode blobs; source compilation is an
//! external tool's job.

use std::any::Any;
use std::sync::Arc;

use crate::flags::ShaderStage;

#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub label: Option<String>,
    pub stage: ShaderStage,
    /// Backend bytecode (SPIR-V for the Vulkan family, DXIL for D3D12).
    pub bytecode: Vec<u8>,
    pub entry_point: String,
}

impl ShaderDesc {
    pub fn new(stage: ShaderStage, bytecode: Vec<u8>, entry_point: impl Into<String>) -> Self {
        Self {
            label: None,
            stage,
            bytecode,
            entry_point: entry_point.into(),
        }
    }
}

pub trait ShaderApi: Send + Sync {
    fn stage(&self) -> ShaderStage;
    fn entry_point(&self) -> &str;
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct Shader {
    api: Arc<dyn ShaderApi>,
}

impl Shader {
    pub fn from_api(api: Arc<dyn ShaderApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.api.stage()
    }

    #[inline]
    pub fn entry_point(&self) -> &str {
        self.api.entry_point()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn ShaderApi {
        self.api.as_ref()
    }
}
