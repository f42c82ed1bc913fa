//! Shader module wrapping pre-compiled SPIR-V.

use std::any::Any;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::flags::ShaderStage;
use ardent_gal::shader::{ShaderApi, ShaderDesc};
use ash::vk;

use crate::device::DeviceShared;

pub(crate) struct VulkanShader {
    shared: Arc<DeviceShared>,
    stage: ShaderStage,
    entry_point: String,
    module: vk::ShaderModule,
}

impl VulkanShader {
    pub(crate) fn new(shared: Arc<DeviceShared>, desc: &ShaderDesc) -> Result<Arc<Self>, GalError> {
        let words = spirv_words(&desc.bytecode)?;

        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            shared
                .device
                .create_shader_module(&info, None)
                .map_err(|e| GalError::creation("shader module", e))?
        };

        if let Some(label) = &desc.label {
            shared.set_object_name(module, label);
        }

        Ok(Arc::new(Self {
            shared,
            stage: desc.stage,
            entry_point: desc.entry_point.clone(),
            module,
        }))
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

/// SPIR-V is a stream of 32-bit words; reject blobs that are not.
fn spirv_words(bytecode: &[u8]) -> Result<Vec<u32>, GalError> {
    if bytecode.is_empty() || bytecode.len() % 4 != 0 {
        return Err(GalError::validation(
            "shader bytecode is not a SPIR-V word stream",
        ));
    }
    Ok(bytecode
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

impl ShaderApi for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.module, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        let frame = self.shared.current_frame();
        self.shared
            .destroy
            .lock()
            .shader_modules
            .push(self.module, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::spirv_words;

    #[test]
    fn rejects_misaligned_bytecode() {
        assert!(spirv_words(&[0x03, 0x02, 0x23]).is_err());
        assert!(spirv_words(&[]).is_err());
    }

    #[test]
    fn little_endian_word_order() {
        let words = spirv_words(&[0x03, 0x02, 0x23, 0x07]).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
    }
}
