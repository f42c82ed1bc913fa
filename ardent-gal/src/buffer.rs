//! GPU buffer descriptor and handle.

use std::any::Any;
use std::sync::Arc;

use crate::error::GalError;
use crate::flags::{BufferUsages, CpuAccess};

/// Minimum buffer size filled in for zero-sized requests.
pub const MIN_BUFFER_SIZE: u64 = 4;
/// Alignment applied to constant-buffer sizes across backends.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

#[derive(Debug, Clone, Default)]
pub struct BufferDesc {
    pub label: Option<String>,
    /// Size in bytes. Zero is filled up to [`MIN_BUFFER_SIZE`].
    pub size: u64,
    pub usage: BufferUsages,
    pub cpu_access: CpuAccess,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsages) -> Self {
        Self {
            label: None,
            size,
            usage,
            cpu_access: CpuAccess::None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_cpu_access(mut self, access: CpuAccess) -> Self {
        self.cpu_access = access;
        self
    }

    /// Fill zero-valued fields with their documented defaults.
    pub fn filled(&self) -> BufferDesc {
        let mut desc = self.clone();
        desc.size = desc.size.max(MIN_BUFFER_SIZE);
        if desc.usage.contains(crate::flags::BufferUsage::Constant) {
            desc.size = desc.size.next_multiple_of(CONSTANT_BUFFER_ALIGNMENT);
        }
        desc
    }
}

/// Backend contract for a buffer object.
pub trait BufferApi: Send + Sync {
    fn desc(&self) -> &BufferDesc;
    fn set_label(&self, label: &str);
    /// GPU virtual address, present when the backend supports it and the
    /// usage requested it.
    fn gpu_address(&self) -> Option<u64>;
    /// Write through the persistent host map. Errors unless
    /// `cpu_access == Write`.
    fn write(&self, offset: u64, data: &[u8]) -> Result<(), GalError>;
    /// Read back through the persistent host map. Errors unless
    /// `cpu_access == Read`.
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), GalError>;
    fn as_any(&self) -> &dyn Any;
}

/// Reference-counted buffer handle. Clone shares the underlying resource;
/// the native object is destroyed (deferred) when the last clone drops.
#[derive(Clone)]
pub struct Buffer {
    api: Arc<dyn BufferApi>,
}

impl Buffer {
    pub fn from_api(api: Arc<dyn BufferApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &BufferDesc {
        self.api.desc()
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.api.desc().size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsages {
        self.api.desc().usage
    }

    #[inline]
    pub fn cpu_access(&self) -> CpuAccess {
        self.api.desc().cpu_access
    }

    pub fn gpu_address(&self) -> Option<u64> {
        self.api.gpu_address()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GalError> {
        self.api.write(offset, data)
    }

    pub fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), GalError> {
        self.api.read(offset, out)
    }

    #[inline]
    pub fn api(&self) -> &dyn BufferApi {
        self.api.as_ref()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("desc", self.api.desc())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BufferUsage;

    #[test]
    fn zero_size_fills_to_minimum() {
        let desc = BufferDesc::new(0, BufferUsage::Vertex.into()).filled();
        assert_eq!(desc.size, MIN_BUFFER_SIZE);
    }

    #[test]
    fn constant_buffers_round_to_alignment() {
        let desc = BufferDesc::new(100, BufferUsage::Constant.into()).filled();
        assert_eq!(desc.size, 256);
        let desc = BufferDesc::new(256, BufferUsage::Constant.into()).filled();
        assert_eq!(desc.size, 256);
        let desc = BufferDesc::new(257, BufferUsage::Constant.into()).filled();
        assert_eq!(desc.size, 512);
    }

    #[test]
    fn non_constant_size_kept() {
        let desc = BufferDesc::new(84, BufferUsage::Vertex.into()).filled();
        assert_eq!(desc.size, 84);
    }
}
