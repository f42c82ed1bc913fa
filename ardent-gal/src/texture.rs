//! GPU texture descriptor and handle.

use std::any::Any;
use std::sync::Arc;

use crate::error::GalError;
use crate::flags::{TextureDimension, TextureUsages};
use crate::format::PixelFormat;
use crate::types::Extent3d;

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: Option<String>,
    pub dimension: TextureDimension,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsages,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureDimension::D2,
            format: PixelFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            usage: TextureUsages::empty(),
        }
    }
}

impl TextureDesc {
    pub fn new_2d(width: u32, height: u32, format: PixelFormat, usage: TextureUsages) -> Self {
        Self {
            format,
            width,
            height,
            usage,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_level_count = levels;
        self
    }

    pub fn with_layers(mut self, layers: u32) -> Self {
        self.depth_or_array_layers = layers;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.sample_count = samples;
        self
    }

    /// Fill zero-valued fields with their documented defaults.
    pub fn filled(&self) -> TextureDesc {
        let mut desc = self.clone();
        if desc.format == PixelFormat::Undefined {
            desc.format = PixelFormat::Rgba8Unorm;
        }
        desc.width = desc.width.max(1);
        desc.height = desc.height.max(1);
        desc.depth_or_array_layers = desc.depth_or_array_layers.max(1);
        desc.mip_level_count = desc.mip_level_count.max(1);
        desc.sample_count = desc.sample_count.max(1);
        desc
    }

    #[inline]
    pub fn extent(&self) -> Extent3d {
        Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }

    /// A 2D, square texture with at least 6 layers is viewable as a cube
    /// map. Validation rejects multisampled cubes at creation.
    pub fn is_cube(&self) -> bool {
        self.dimension == TextureDimension::D2
            && self.width == self.height
            && self.depth_or_array_layers >= 6
    }
}

/// Identity of a texture subresource range, the key of the per-texture
/// view cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSubresource {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl TextureSubresource {
    pub const fn single(mip: u32, layer: u32) -> Self {
        Self {
            base_mip: mip,
            mip_count: 1,
            base_layer: layer,
            layer_count: 1,
        }
    }
}

/// Backend contract for a texture object.
pub trait TextureApi: Send + Sync {
    fn desc(&self) -> &TextureDesc;
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

/// Reference-counted texture handle.
#[derive(Clone)]
pub struct Texture {
    api: Arc<dyn TextureApi>,
}

impl Texture {
    pub fn from_api(api: Arc<dyn TextureApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        self.api.desc()
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.api.desc().format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.api.desc().width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.api.desc().height
    }

    #[inline]
    pub fn is_cube(&self) -> bool {
        self.api.desc().is_cube()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn TextureApi {
        self.api.as_ref()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("desc", self.api.desc())
            .finish()
    }
}

/// Convenience alias used by upload paths: bytes for one full subresource.
pub fn subresource_size(desc: &TextureDesc, mip: u32) -> Result<u64, GalError> {
    if mip >= desc.mip_level_count {
        return Err(GalError::validation("mip level out of range"));
    }
    let extent = desc.extent().mip_level(mip);
    let rows = extent
        .height
        .div_ceil(desc.format.info().block_dim as u32) as u64;
    Ok(desc.format.row_pitch(extent.width) * rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::TextureUsage;

    #[test]
    fn cube_detection() {
        let desc = TextureDesc::new_2d(64, 64, PixelFormat::Rgba8Unorm, TextureUsage::ShaderRead.into())
            .with_layers(6);
        assert!(desc.is_cube());
    }

    #[test]
    fn non_square_is_not_cube() {
        let desc = TextureDesc::new_2d(64, 32, PixelFormat::Rgba8Unorm, TextureUsage::ShaderRead.into())
            .with_layers(6);
        assert!(!desc.is_cube());
    }

    #[test]
    fn few_layers_is_not_cube() {
        let desc = TextureDesc::new_2d(64, 64, PixelFormat::Rgba8Unorm, TextureUsage::ShaderRead.into())
            .with_layers(5);
        assert!(!desc.is_cube());
    }

    #[test]
    fn sample_count_does_not_affect_cube_shape() {
        let desc = TextureDesc::new_2d(64, 64, PixelFormat::Rgba8Unorm, TextureUsage::RenderTarget.into())
            .with_layers(6)
            .with_samples(4);
        assert!(desc.is_cube());
    }

    #[test]
    fn filled_defaults() {
        let desc = TextureDesc {
            width: 0,
            height: 0,
            mip_level_count: 0,
            sample_count: 0,
            format: PixelFormat::Undefined,
            ..Default::default()
        }
        .filled();
        assert_eq!(desc.width, 1);
        assert_eq!(desc.height, 1);
        assert_eq!(desc.mip_level_count, 1);
        assert_eq!(desc.sample_count, 1);
        assert_eq!(desc.format, PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn subresource_sizes() {
        let desc = TextureDesc::new_2d(256, 256, PixelFormat::Rgba8Unorm, TextureUsage::ShaderRead.into())
            .with_mip_levels(2);
        assert_eq!(subresource_size(&desc, 0).unwrap(), 256 * 256 * 4);
        assert_eq!(subresource_size(&desc, 1).unwrap(), 128 * 128 * 4);
        assert!(subresource_size(&desc, 2).is_err());
    }
}
