//! Cross-backend descriptor checks, run before any vtable call.
//!
//! These catch the misuse that every backend would reject (or silently
//! corrupt) so the error carries a readable message instead of a native
//! validation-layer dump.

use crate::buffer::BufferDesc;
use crate::command::RenderPassDesc;
use crate::error::GalError;
use crate::flags::{TextureDimension, TextureUsage};
use crate::pipeline::{
    MAX_COLOR_ATTACHMENTS, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS, RenderPipelineDesc,
};
use crate::shader::ShaderDesc;
use crate::texture::TextureDesc;

pub(crate) fn validate_buffer(
    desc: &BufferDesc,
    initial_data: Option<&[u8]>,
) -> Result<(), GalError> {
    if let Some(data) = initial_data {
        if data.len() as u64 > desc.size {
            return Err(GalError::validation(format!(
                "initial data ({} bytes) exceeds buffer size ({} bytes)",
                data.len(),
                desc.size
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_texture(desc: &TextureDesc) -> Result<(), GalError> {
    if desc.sample_count > 1 {
        if desc.mip_level_count > 1 {
            return Err(GalError::validation(
                "multisampled textures cannot have mip chains",
            ));
        }
        if desc.dimension != TextureDimension::D2 {
            return Err(GalError::validation(
                "multisampling is only valid for 2D textures",
            ));
        }
        if !desc.sample_count.is_power_of_two() || desc.sample_count > 16 {
            return Err(GalError::validation(format!(
                "invalid sample count {}",
                desc.sample_count
            )));
        }
        if desc.is_cube() {
            return Err(GalError::validation(
                "multisampled textures cannot be cube maps",
            ));
        }
    }

    let info = desc.format.info();
    if info.has_depth || info.has_stencil {
        if desc.usage.contains(TextureUsage::ShaderWrite) {
            return Err(GalError::validation(
                "depth/stencil formats cannot be used as storage textures",
            ));
        }
        if desc.dimension != TextureDimension::D2 {
            return Err(GalError::validation(
                "depth/stencil textures must be 2D",
            ));
        }
        if desc.mip_level_count > 1 {
            return Err(GalError::validation(
                "depth/stencil textures cannot have mip chains",
            ));
        }
    }

    if desc.format.is_compressed() {
        if desc.usage.intersects(TextureUsage::RenderTarget | TextureUsage::ShaderWrite) {
            return Err(GalError::validation(
                "block-compressed formats are sample-only",
            ));
        }
        let block = info.block_dim as u32;
        if desc.width % block != 0 || desc.height % block != 0 {
            return Err(GalError::validation(format!(
                "compressed texture extent {}x{} is not a multiple of the {}x{} block",
                desc.width, desc.height, block, block
            )));
        }
    }

    let max_mips = 32 - desc.width.max(desc.height).leading_zeros();
    if desc.mip_level_count > max_mips {
        return Err(GalError::validation(format!(
            "{} mip levels exceed the {} supported by a {}x{} texture",
            desc.mip_level_count, max_mips, desc.width, desc.height
        )));
    }

    Ok(())
}

pub(crate) fn validate_shader(desc: &ShaderDesc) -> Result<(), GalError> {
    if desc.bytecode.is_empty() {
        return Err(GalError::validation("shader bytecode is empty"));
    }
    if desc.entry_point.is_empty() {
        return Err(GalError::validation("shader entry point is empty"));
    }
    Ok(())
}

pub(crate) fn validate_render_pipeline(desc: &RenderPipelineDesc) -> Result<(), GalError> {
    if desc.color_formats.len() > MAX_COLOR_ATTACHMENTS {
        return Err(GalError::validation(format!(
            "{} color targets exceed the limit of {MAX_COLOR_ATTACHMENTS}",
            desc.color_formats.len()
        )));
    }
    if desc.vertex_buffers.len() > MAX_VERTEX_BUFFERS {
        return Err(GalError::validation(format!(
            "{} vertex buffers exceed the limit of {MAX_VERTEX_BUFFERS}",
            desc.vertex_buffers.len()
        )));
    }
    let attribute_count: usize = desc.vertex_buffers.iter().map(|b| b.attributes.len()).sum();
    if attribute_count > MAX_VERTEX_ATTRIBUTES {
        return Err(GalError::validation(format!(
            "{attribute_count} vertex attributes exceed the limit of {MAX_VERTEX_ATTRIBUTES}"
        )));
    }
    for layout in &desc.vertex_buffers {
        for attr in &layout.attributes {
            if attr.offset + attr.format.size_in_bytes() > layout.stride {
                return Err(GalError::validation(format!(
                    "attribute at location {} overruns its vertex stride",
                    attr.shader_location
                )));
            }
        }
    }
    if desc.color_formats.is_empty() && desc.depth_stencil_format.is_none() {
        return Err(GalError::validation(
            "render pipeline declares no attachments",
        ));
    }
    if let Some(format) = desc.depth_stencil_format {
        if !format.is_depth_stencil() {
            return Err(GalError::validation(format!(
                "{format:?} is not a depth/stencil format"
            )));
        }
    }
    if desc.depth_stencil.is_some() && desc.depth_stencil_format.is_none() {
        return Err(GalError::validation(
            "depth/stencil state set without a depth/stencil target format",
        ));
    }
    Ok(())
}

pub(crate) fn validate_render_pass(desc: &RenderPassDesc) -> Result<(), GalError> {
    if desc.color_attachments.len() > MAX_COLOR_ATTACHMENTS {
        return Err(GalError::validation(format!(
            "{} color attachments exceed the limit of {MAX_COLOR_ATTACHMENTS}",
            desc.color_attachments.len()
        )));
    }
    if desc.color_attachments.is_empty() && desc.depth_stencil_attachment.is_none() {
        return Err(GalError::validation("render pass has no attachments"));
    }
    for attachment in &desc.color_attachments {
        let tex = attachment.texture.desc();
        if !tex.usage.contains(TextureUsage::RenderTarget) {
            return Err(GalError::validation(
                "color attachment texture was not created with RenderTarget usage",
            ));
        }
        if attachment.mip_level >= tex.mip_level_count {
            return Err(GalError::validation("color attachment mip out of range"));
        }
    }
    if let Some(ds) = &desc.depth_stencil_attachment {
        if !ds.texture.format().is_depth_stencil() {
            return Err(GalError::validation(
                "depth attachment texture has a color format",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::TextureUsages;
    use crate::format::PixelFormat;

    #[test]
    fn multisampled_mipped_texture_rejected() {
        let desc = TextureDesc::new_2d(64, 64, PixelFormat::Rgba8Unorm, TextureUsages::empty())
            .with_samples(4)
            .with_mip_levels(2);
        assert!(validate_texture(&desc).is_err());
    }

    #[test]
    fn depth_storage_rejected() {
        let desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::Depth32Float,
            TextureUsage::ShaderWrite.into(),
        );
        assert!(validate_texture(&desc).is_err());
    }

    #[test]
    fn mipped_depth_rejected() {
        let desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::Depth32Float,
            TextureUsage::RenderTarget.into(),
        )
        .with_mip_levels(2);
        assert!(validate_texture(&desc).is_err());
        let desc = desc.with_mip_levels(1);
        assert!(validate_texture(&desc).is_ok());
    }

    #[test]
    fn multisampled_cube_rejected() {
        let desc = TextureDesc::new_2d(64, 64, PixelFormat::Rgba8Unorm, TextureUsages::empty())
            .with_layers(6)
            .with_samples(4);
        assert!(validate_texture(&desc).is_err());
        let desc = desc.with_samples(1);
        assert!(validate_texture(&desc).is_ok());
    }

    #[test]
    fn excessive_mip_chain_rejected() {
        let desc = TextureDesc::new_2d(16, 16, PixelFormat::Rgba8Unorm, TextureUsages::empty())
            .with_mip_levels(6);
        assert!(validate_texture(&desc).is_err());
        let desc = desc.with_mip_levels(5);
        assert!(validate_texture(&desc).is_ok());
    }

    #[test]
    fn compressed_render_target_rejected() {
        let desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::Bc1RgbaUnorm,
            TextureUsage::RenderTarget.into(),
        );
        assert!(validate_texture(&desc).is_err());
    }

    #[test]
    fn oversized_initial_data_rejected() {
        let desc = BufferDesc::new(8, crate::flags::BufferUsage::Vertex.into()).filled();
        assert!(validate_buffer(&desc, Some(&[0u8; 16])).is_err());
        assert!(validate_buffer(&desc, Some(&[0u8; 8])).is_ok());
    }
}
