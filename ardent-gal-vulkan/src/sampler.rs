//! Sampler object.

use std::any::Any;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::sampler::{SamplerApi, SamplerDesc};
use ash::vk;

use crate::conv;
use crate::device::DeviceShared;

pub(crate) struct VulkanSampler {
    shared: Arc<DeviceShared>,
    desc: SamplerDesc,
    sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(crate) fn new(shared: Arc<DeviceShared>, desc: &SamplerDesc) -> Result<Arc<Self>, GalError> {
        let desc = desc.clone();
        let anisotropy_enable =
            desc.max_anisotropy > 1.0 && shared.features.sampler_anisotropy;
        let max_anisotropy = desc
            .max_anisotropy
            .min(shared.properties.limits.max_sampler_anisotropy);

        let info = vk::SamplerCreateInfo::default()
            .mag_filter(conv::filter(desc.mag_filter))
            .min_filter(conv::filter(desc.min_filter))
            .mipmap_mode(conv::mipmap_mode(desc.mip_filter))
            .address_mode_u(conv::address_mode(desc.address_mode_u))
            .address_mode_v(conv::address_mode(desc.address_mode_v))
            .address_mode_w(conv::address_mode(desc.address_mode_w))
            .mip_lod_bias(desc.lod_bias)
            .anisotropy_enable(anisotropy_enable)
            .max_anisotropy(max_anisotropy)
            .compare_enable(desc.compare_enabled())
            .compare_op(conv::compare_op(desc.compare))
            .min_lod(desc.lod_min_clamp)
            .max_lod(desc.lod_max_clamp)
            .border_color(conv::border_color(desc.border_color));

        let sampler = unsafe {
            shared
                .device
                .create_sampler(&info, None)
                .map_err(|e| GalError::creation("sampler", e))?
        };

        if let Some(label) = &desc.label {
            shared.set_object_name(sampler, label);
        }

        Ok(Arc::new(Self {
            shared,
            desc,
            sampler,
        }))
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl SamplerApi for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.sampler, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        let frame = self.shared.current_frame();
        self.shared.destroy.lock().samplers.push(self.sampler, frame);
    }
}
