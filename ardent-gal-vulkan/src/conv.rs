//! Lowering of the portable enums into their `vk` equivalents.

use ardent_gal::flags::{
    AddressMode, BlendFactor, BlendOperation, BorderColor, BufferUsage, BufferUsages,
    CompareFunction, CullMode, FilterMode, FrontFace, IndexFormat, LoadOp, PresentMode,
    PrimitiveTopology, QueryKind, ShaderStage, ShaderStages, StencilOperation, StoreOp,
    TextureDimension, TextureUsage, TextureUsages, VertexStepMode,
};
use ardent_gal::format::{PixelFormat, VertexFormat};
use ardent_gal::pipeline::{ColorWrite, ColorWrites, DescriptorKind};
use ash::vk;

pub(crate) fn pixel_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Undefined => vk::Format::UNDEFINED,
        PixelFormat::R8Unorm => vk::Format::R8_UNORM,
        PixelFormat::R8Snorm => vk::Format::R8_SNORM,
        PixelFormat::R8Uint => vk::Format::R8_UINT,
        PixelFormat::R8Sint => vk::Format::R8_SINT,
        PixelFormat::R16Uint => vk::Format::R16_UINT,
        PixelFormat::R16Sint => vk::Format::R16_SINT,
        PixelFormat::R16Float => vk::Format::R16_SFLOAT,
        PixelFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        PixelFormat::Rg8Snorm => vk::Format::R8G8_SNORM,
        PixelFormat::Rg8Uint => vk::Format::R8G8_UINT,
        PixelFormat::Rg8Sint => vk::Format::R8G8_SINT,
        PixelFormat::R32Uint => vk::Format::R32_UINT,
        PixelFormat::R32Sint => vk::Format::R32_SINT,
        PixelFormat::R32Float => vk::Format::R32_SFLOAT,
        PixelFormat::Rg16Uint => vk::Format::R16G16_UINT,
        PixelFormat::Rg16Sint => vk::Format::R16G16_SINT,
        PixelFormat::Rg16Float => vk::Format::R16G16_SFLOAT,
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::Rgba8Snorm => vk::Format::R8G8B8A8_SNORM,
        PixelFormat::Rgba8Uint => vk::Format::R8G8B8A8_UINT,
        PixelFormat::Rgba8Sint => vk::Format::R8G8B8A8_SINT,
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::Rgb10a2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        PixelFormat::Rg11b10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
        PixelFormat::Rg32Uint => vk::Format::R32G32_UINT,
        PixelFormat::Rg32Sint => vk::Format::R32G32_SINT,
        PixelFormat::Rg32Float => vk::Format::R32G32_SFLOAT,
        PixelFormat::Rgba16Uint => vk::Format::R16G16B16A16_UINT,
        PixelFormat::Rgba16Sint => vk::Format::R16G16B16A16_SINT,
        PixelFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::Rgba32Uint => vk::Format::R32G32B32A32_UINT,
        PixelFormat::Rgba32Sint => vk::Format::R32G32B32A32_SINT,
        PixelFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::Stencil8 => vk::Format::S8_UINT,
        PixelFormat::Depth16Unorm => vk::Format::D16_UNORM,
        PixelFormat::Depth32Float => vk::Format::D32_SFLOAT,
        PixelFormat::Depth24UnormStencil8 => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
        PixelFormat::Bc1RgbaUnorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        PixelFormat::Bc1RgbaUnormSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        PixelFormat::Bc2RgbaUnorm => vk::Format::BC2_UNORM_BLOCK,
        PixelFormat::Bc3RgbaUnorm => vk::Format::BC3_UNORM_BLOCK,
        PixelFormat::Bc4RUnorm => vk::Format::BC4_UNORM_BLOCK,
        PixelFormat::Bc5RgUnorm => vk::Format::BC5_UNORM_BLOCK,
        PixelFormat::Bc6hRgbFloat => vk::Format::BC6H_SFLOAT_BLOCK,
        PixelFormat::Bc7RgbaUnorm => vk::Format::BC7_UNORM_BLOCK,
        PixelFormat::Bc7RgbaUnormSrgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// Reverse mapping for formats a surface may hand back.
pub(crate) fn pixel_format_from_vk(format: vk::Format) -> PixelFormat {
    match format {
        vk::Format::R8G8B8A8_UNORM => PixelFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::Rgba8UnormSrgb,
        vk::Format::B8G8R8A8_UNORM => PixelFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => PixelFormat::Bgra8UnormSrgb,
        vk::Format::A2B10G10R10_UNORM_PACK32 => PixelFormat::Rgb10a2Unorm,
        vk::Format::R16G16B16A16_SFLOAT => PixelFormat::Rgba16Float,
        _ => PixelFormat::Undefined,
    }
}

pub(crate) fn aspect_mask(format: PixelFormat) -> vk::ImageAspectFlags {
    let info = format.info();
    match (info.has_depth, info.has_stencil) {
        (true, true) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        (true, false) => vk::ImageAspectFlags::DEPTH,
        (false, true) => vk::ImageAspectFlags::STENCIL,
        (false, false) => vk::ImageAspectFlags::COLOR,
    }
}

pub(crate) fn vertex_format(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Uint8x2 => vk::Format::R8G8_UINT,
        VertexFormat::Uint8x4 => vk::Format::R8G8B8A8_UINT,
        VertexFormat::Sint8x2 => vk::Format::R8G8_SINT,
        VertexFormat::Sint8x4 => vk::Format::R8G8B8A8_SINT,
        VertexFormat::Unorm8x2 => vk::Format::R8G8_UNORM,
        VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
        VertexFormat::Snorm8x2 => vk::Format::R8G8_SNORM,
        VertexFormat::Snorm8x4 => vk::Format::R8G8B8A8_SNORM,
        VertexFormat::Uint16x2 => vk::Format::R16G16_UINT,
        VertexFormat::Uint16x4 => vk::Format::R16G16B16A16_UINT,
        VertexFormat::Sint16x2 => vk::Format::R16G16_SINT,
        VertexFormat::Sint16x4 => vk::Format::R16G16B16A16_SINT,
        VertexFormat::Unorm16x2 => vk::Format::R16G16_UNORM,
        VertexFormat::Unorm16x4 => vk::Format::R16G16B16A16_UNORM,
        VertexFormat::Snorm16x2 => vk::Format::R16G16_SNORM,
        VertexFormat::Snorm16x4 => vk::Format::R16G16B16A16_SNORM,
        VertexFormat::Float16x2 => vk::Format::R16G16_SFLOAT,
        VertexFormat::Float16x4 => vk::Format::R16G16B16A16_SFLOAT,
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Uint32 => vk::Format::R32_UINT,
        VertexFormat::Uint32x2 => vk::Format::R32G32_UINT,
        VertexFormat::Uint32x3 => vk::Format::R32G32B32_UINT,
        VertexFormat::Uint32x4 => vk::Format::R32G32B32A32_UINT,
        VertexFormat::Sint32 => vk::Format::R32_SINT,
        VertexFormat::Sint32x2 => vk::Format::R32G32_SINT,
        VertexFormat::Sint32x3 => vk::Format::R32G32B32_SINT,
        VertexFormat::Sint32x4 => vk::Format::R32G32B32A32_SINT,
        VertexFormat::Int1010102Normalized => vk::Format::A2B10G10R10_SNORM_PACK32,
        VertexFormat::UInt1010102Normalized => vk::Format::A2B10G10R10_UNORM_PACK32,
    }
}

pub(crate) fn compare_op(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn stencil_op(op: StencilOperation) -> vk::StencilOp {
    match op {
        StencilOperation::Keep => vk::StencilOp::KEEP,
        StencilOperation::Zero => vk::StencilOp::ZERO,
        StencilOperation::Replace => vk::StencilOp::REPLACE,
        StencilOperation::Invert => vk::StencilOp::INVERT,
        StencilOperation::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOperation::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOperation::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOperation::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub(crate) fn blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturated => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendFactor::BlendColor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::OneMinusBlendColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

pub(crate) fn blend_op(op: BlendOperation) -> vk::BlendOp {
    match op {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
        BlendOperation::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn filter(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn mipmap_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub(crate) fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub(crate) fn border_color(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub(crate) fn present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
    }
}

pub(crate) fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::PatchList => vk::PrimitiveTopology::PATCH_LIST,
    }
}

pub(crate) fn index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::Uint16 => vk::IndexType::UINT16,
        IndexFormat::Uint32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn shader_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub(crate) fn shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    stages
        .iter()
        .fold(vk::ShaderStageFlags::empty(), |acc, s| acc | shader_stage(s))
}

pub(crate) fn step_mode(mode: VertexStepMode) -> vk::VertexInputRate {
    match mode {
        VertexStepMode::Vertex => vk::VertexInputRate::VERTEX,
        VertexStepMode::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub(crate) fn descriptor_type(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorKind::SampledTexture => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorKind::StorageTexture => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
    }
}

pub(crate) fn query_type(kind: QueryKind) -> vk::QueryType {
    match kind {
        QueryKind::Timestamp => vk::QueryType::TIMESTAMP,
        QueryKind::Occlusion => vk::QueryType::OCCLUSION,
        QueryKind::PipelineStatistics => vk::QueryType::PIPELINE_STATISTICS,
    }
}

pub(crate) fn color_write_mask(writes: ColorWrites) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if writes.contains(ColorWrite::Red) {
        flags |= vk::ColorComponentFlags::R;
    }
    if writes.contains(ColorWrite::Green) {
        flags |= vk::ColorComponentFlags::G;
    }
    if writes.contains(ColorWrite::Blue) {
        flags |= vk::ColorComponentFlags::B;
    }
    if writes.contains(ColorWrite::Alpha) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

pub(crate) fn sample_count(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub(crate) fn image_type(dimension: TextureDimension) -> vk::ImageType {
    match dimension {
        TextureDimension::D1 => vk::ImageType::TYPE_1D,
        TextureDimension::D2 => vk::ImageType::TYPE_2D,
        TextureDimension::D3 => vk::ImageType::TYPE_3D,
    }
}

pub(crate) fn buffer_usage(usage: BufferUsages) -> vk::BufferUsageFlags {
    // Every buffer can receive staged uploads.
    let mut flags = vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC;
    if usage.contains(BufferUsage::Vertex) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::Index) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::Constant) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::ShaderRead) || usage.contains(BufferUsage::ShaderWrite) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::Indirect) {
        flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if usage.contains(BufferUsage::Predication) {
        flags |= vk::BufferUsageFlags::CONDITIONAL_RENDERING_EXT;
    }
    if usage.contains(BufferUsage::RayTracing) {
        flags |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR;
    }
    flags
}

pub(crate) fn image_usage(usage: TextureUsages, format: PixelFormat) -> vk::ImageUsageFlags {
    // Transient images live in tile memory and only allow attachment
    // usages; transfer bits would fail validation.
    let mut flags = if usage.contains(TextureUsage::Transient) {
        vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
    } else {
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC
    };
    if usage.contains(TextureUsage::ShaderRead) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::ShaderWrite) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::RenderTarget) {
        if format.is_depth_stencil() {
            flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        } else {
            flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_map_to_depth_aspect() {
        assert_eq!(
            aspect_mask(PixelFormat::Depth32Float),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_mask(PixelFormat::Depth24UnormStencil8),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_mask(PixelFormat::Rgba8Unorm), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn surface_format_round_trip() {
        for format in [PixelFormat::Bgra8Unorm, PixelFormat::Rgba8UnormSrgb] {
            assert_eq!(pixel_format_from_vk(pixel_format(format)), format);
        }
    }

    #[test]
    fn render_target_usage_follows_format() {
        let usage: TextureUsages = TextureUsage::RenderTarget.into();
        assert!(
            image_usage(usage, PixelFormat::Depth32Float)
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
        assert!(
            image_usage(usage, PixelFormat::Rgba8Unorm)
                .contains(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        );
    }

    #[test]
    fn transient_images_carry_no_transfer_usage() {
        let usage = TextureUsage::Transient | TextureUsage::RenderTarget;
        let flags = image_usage(usage, PixelFormat::Rgba8Unorm);
        assert!(flags.contains(vk::ImageUsageFlags::TRANSIENT_ATTACHMENT));
        assert!(flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(!flags.intersects(
            vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST
        ));
    }
}
