//! Sampler descriptor and handle.

use std::any::Any;
use std::sync::Arc;

use crate::flags::{AddressMode, BorderColor, CompareFunction, FilterMode};

/// Anisotropy is clamped to this across backends.
pub const MAX_SAMPLER_ANISOTROPY: f32 = 16.0;

#[derive(Debug, Clone)]
pub struct SamplerDesc {
    pub label: Option<String>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub lod_bias: f32,
    pub max_anisotropy: f32,
    /// Comparison sampling is enabled when this is not `Never`.
    pub compare: CompareFunction,
    pub border_color: BorderColor,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            lod_bias: 0.0,
            max_anisotropy: 1.0,
            compare: CompareFunction::Never,
            border_color: BorderColor::TransparentBlack,
        }
    }
}

impl SamplerDesc {
    pub fn nearest() -> Self {
        Self {
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mip_filter: FilterMode::Nearest,
            ..Default::default()
        }
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    #[inline]
    pub fn compare_enabled(&self) -> bool {
        self.compare != CompareFunction::Never
    }

    /// Fill zero-valued fields with defaults and clamp anisotropy.
    pub fn filled(&self) -> SamplerDesc {
        let mut desc = self.clone();
        desc.max_anisotropy = desc.max_anisotropy.clamp(1.0, MAX_SAMPLER_ANISOTROPY);
        if desc.lod_max_clamp <= 0.0 {
            desc.lod_max_clamp = f32::MAX;
        }
        desc
    }
}

pub trait SamplerApi: Send + Sync {
    fn desc(&self) -> &SamplerDesc;
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct Sampler {
    api: Arc<dyn SamplerApi>,
}

impl Sampler {
    pub fn from_api(api: Arc<dyn SamplerApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &SamplerDesc {
        self.api.desc()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn SamplerApi {
        self.api.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anisotropy_clamps() {
        let desc = SamplerDesc {
            max_anisotropy: 64.0,
            ..Default::default()
        }
        .filled();
        assert_eq!(desc.max_anisotropy, MAX_SAMPLER_ANISOTROPY);

        let desc = SamplerDesc {
            max_anisotropy: 0.0,
            ..Default::default()
        }
        .filled();
        assert_eq!(desc.max_anisotropy, 1.0);
    }

    #[test]
    fn comparison_sampling_flag() {
        assert!(!SamplerDesc::default().compare_enabled());
        let desc = SamplerDesc {
            compare: CompareFunction::LessEqual,
            ..Default::default()
        };
        assert!(desc.compare_enabled());
    }
}
