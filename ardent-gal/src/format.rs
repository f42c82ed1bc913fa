//! Static pixel- and vertex-format metadata tables.

/// Pixel format of a texture or swapchain backbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    Undefined,
    // 8-bit
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    // 16-bit
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    // 32-bit
    R32Uint,
    R32Sint,
    R32Float,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    // Packed 32-bit
    Rgb10a2Unorm,
    Rg11b10Float,
    // 64-bit
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    // 128-bit
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    // Depth / stencil
    Stencil8,
    Depth16Unorm,
    Depth32Float,
    Depth24UnormStencil8,
    Depth32FloatStencil8,
    // Block-compressed
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc3RgbaUnorm,
    Bc4RUnorm,
    Bc5RgUnorm,
    Bc6hRgbFloat,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
}

/// Numeric interpretation of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Unorm,
    UnormSrgb,
    Snorm,
    Uint,
    Sint,
    Float,
}

/// Per-format metadata: block footprint and depth/stencil planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Bytes per texel block (a block is 1x1 for uncompressed formats).
    pub bytes_per_block: u8,
    /// Block edge length in texels (1 or 4).
    pub block_dim: u8,
    pub kind: FormatKind,
    pub has_depth: bool,
    pub has_stencil: bool,
}

impl FormatInfo {
    const fn color(bytes_per_block: u8, kind: FormatKind) -> Self {
        Self {
            bytes_per_block,
            block_dim: 1,
            kind,
            has_depth: false,
            has_stencil: false,
        }
    }

    const fn compressed(bytes_per_block: u8, kind: FormatKind) -> Self {
        Self {
            bytes_per_block,
            block_dim: 4,
            kind,
            has_depth: false,
            has_stencil: false,
        }
    }

    const fn depth_stencil(bytes_per_block: u8, has_depth: bool, has_stencil: bool) -> Self {
        Self {
            bytes_per_block,
            block_dim: 1,
            kind: FormatKind::Float,
            has_depth,
            has_stencil,
        }
    }
}

impl PixelFormat {
    pub const fn info(self) -> FormatInfo {
        use FormatKind::*;
        match self {
            PixelFormat::Undefined => FormatInfo::color(0, Unorm),

            PixelFormat::R8Unorm => FormatInfo::color(1, Unorm),
            PixelFormat::R8Snorm => FormatInfo::color(1, Snorm),
            PixelFormat::R8Uint => FormatInfo::color(1, Uint),
            PixelFormat::R8Sint => FormatInfo::color(1, Sint),

            PixelFormat::R16Uint => FormatInfo::color(2, Uint),
            PixelFormat::R16Sint => FormatInfo::color(2, Sint),
            PixelFormat::R16Float => FormatInfo::color(2, Float),
            PixelFormat::Rg8Unorm => FormatInfo::color(2, Unorm),
            PixelFormat::Rg8Snorm => FormatInfo::color(2, Snorm),
            PixelFormat::Rg8Uint => FormatInfo::color(2, Uint),
            PixelFormat::Rg8Sint => FormatInfo::color(2, Sint),

            PixelFormat::R32Uint => FormatInfo::color(4, Uint),
            PixelFormat::R32Sint => FormatInfo::color(4, Sint),
            PixelFormat::R32Float => FormatInfo::color(4, Float),
            PixelFormat::Rg16Uint => FormatInfo::color(4, Uint),
            PixelFormat::Rg16Sint => FormatInfo::color(4, Sint),
            PixelFormat::Rg16Float => FormatInfo::color(4, Float),
            PixelFormat::Rgba8Unorm => FormatInfo::color(4, Unorm),
            PixelFormat::Rgba8UnormSrgb => FormatInfo::color(4, UnormSrgb),
            PixelFormat::Rgba8Snorm => FormatInfo::color(4, Snorm),
            PixelFormat::Rgba8Uint => FormatInfo::color(4, Uint),
            PixelFormat::Rgba8Sint => FormatInfo::color(4, Sint),
            PixelFormat::Bgra8Unorm => FormatInfo::color(4, Unorm),
            PixelFormat::Bgra8UnormSrgb => FormatInfo::color(4, UnormSrgb),
            PixelFormat::Rgb10a2Unorm => FormatInfo::color(4, Unorm),
            PixelFormat::Rg11b10Float => FormatInfo::color(4, Float),

            PixelFormat::Rg32Uint => FormatInfo::color(8, Uint),
            PixelFormat::Rg32Sint => FormatInfo::color(8, Sint),
            PixelFormat::Rg32Float => FormatInfo::color(8, Float),
            PixelFormat::Rgba16Uint => FormatInfo::color(8, Uint),
            PixelFormat::Rgba16Sint => FormatInfo::color(8, Sint),
            PixelFormat::Rgba16Float => FormatInfo::color(8, Float),

            PixelFormat::Rgba32Uint => FormatInfo::color(16, Uint),
            PixelFormat::Rgba32Sint => FormatInfo::color(16, Sint),
            PixelFormat::Rgba32Float => FormatInfo::color(16, Float),

            PixelFormat::Stencil8 => FormatInfo::depth_stencil(1, false, true),
            PixelFormat::Depth16Unorm => FormatInfo::depth_stencil(2, true, false),
            PixelFormat::Depth32Float => FormatInfo::depth_stencil(4, true, false),
            PixelFormat::Depth24UnormStencil8 => FormatInfo::depth_stencil(4, true, true),
            PixelFormat::Depth32FloatStencil8 => FormatInfo::depth_stencil(8, true, true),

            PixelFormat::Bc1RgbaUnorm => FormatInfo::compressed(8, Unorm),
            PixelFormat::Bc1RgbaUnormSrgb => FormatInfo::compressed(8, UnormSrgb),
            PixelFormat::Bc2RgbaUnorm => FormatInfo::compressed(16, Unorm),
            PixelFormat::Bc3RgbaUnorm => FormatInfo::compressed(16, Unorm),
            PixelFormat::Bc4RUnorm => FormatInfo::compressed(8, Unorm),
            PixelFormat::Bc5RgUnorm => FormatInfo::compressed(16, Unorm),
            PixelFormat::Bc6hRgbFloat => FormatInfo::compressed(16, Float),
            PixelFormat::Bc7RgbaUnorm => FormatInfo::compressed(16, Unorm),
            PixelFormat::Bc7RgbaUnormSrgb => FormatInfo::compressed(16, UnormSrgb),
        }
    }

    #[inline]
    pub const fn has_depth(self) -> bool {
        self.info().has_depth
    }

    #[inline]
    pub const fn has_stencil(self) -> bool {
        self.info().has_stencil
    }

    #[inline]
    pub const fn is_depth_stencil(self) -> bool {
        let info = self.info();
        info.has_depth || info.has_stencil
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.info().block_dim > 1
    }

    #[inline]
    pub const fn is_srgb(self) -> bool {
        matches!(self.info().kind, FormatKind::UnormSrgb)
    }

    /// Bytes of one row of texel blocks for a mip of the given width.
    pub const fn row_pitch(self, width: u32) -> u64 {
        let info = self.info();
        let blocks = width.div_ceil(info.block_dim as u32) as u64;
        blocks * info.bytes_per_block as u64
    }
}

/// Memory format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Float16x2,
    Float16x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
    Int1010102Normalized,
    UInt1010102Normalized,
}

impl VertexFormat {
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            VertexFormat::Uint8x2
            | VertexFormat::Sint8x2
            | VertexFormat::Unorm8x2
            | VertexFormat::Snorm8x2 => 2,
            VertexFormat::Uint8x4
            | VertexFormat::Sint8x4
            | VertexFormat::Unorm8x4
            | VertexFormat::Snorm8x4
            | VertexFormat::Uint16x2
            | VertexFormat::Sint16x2
            | VertexFormat::Unorm16x2
            | VertexFormat::Snorm16x2
            | VertexFormat::Float16x2
            | VertexFormat::Float32
            | VertexFormat::Uint32
            | VertexFormat::Sint32
            // Packed 10:10:10:2 occupies a single 32-bit word.
            | VertexFormat::Int1010102Normalized
            | VertexFormat::UInt1010102Normalized => 4,
            VertexFormat::Uint16x4
            | VertexFormat::Sint16x4
            | VertexFormat::Unorm16x4
            | VertexFormat::Snorm16x4
            | VertexFormat::Float16x4
            | VertexFormat::Float32x2
            | VertexFormat::Uint32x2
            | VertexFormat::Sint32x2 => 8,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 | VertexFormat::Sint32x4 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_report_planes() {
        assert!(PixelFormat::Depth32Float.has_depth());
        assert!(!PixelFormat::Depth32Float.has_stencil());
        assert!(PixelFormat::Depth24UnormStencil8.has_depth());
        assert!(PixelFormat::Depth24UnormStencil8.has_stencil());
        assert!(PixelFormat::Stencil8.has_stencil());
        assert!(!PixelFormat::Stencil8.has_depth());
        assert!(!PixelFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn block_compressed_footprints() {
        let info = PixelFormat::Bc1RgbaUnorm.info();
        assert_eq!(info.block_dim, 4);
        assert_eq!(info.bytes_per_block, 8);
        assert!(PixelFormat::Bc7RgbaUnorm.is_compressed());
        // 7 texels -> 2 blocks of 16 bytes
        assert_eq!(PixelFormat::Bc7RgbaUnorm.row_pitch(7), 32);
    }

    #[test]
    fn row_pitch_uncompressed() {
        assert_eq!(PixelFormat::Rgba8Unorm.row_pitch(1280), 1280 * 4);
        assert_eq!(PixelFormat::Rgba32Float.row_pitch(3), 48);
    }

    #[test]
    fn packed_1010102_is_one_word() {
        assert_eq!(VertexFormat::Int1010102Normalized.size_in_bytes(), 4);
        assert_eq!(VertexFormat::UInt1010102Normalized.size_in_bytes(), 4);
    }

    #[test]
    fn srgb_pairs() {
        assert!(PixelFormat::Bgra8UnormSrgb.is_srgb());
        assert!(!PixelFormat::Bgra8Unorm.is_srgb());
    }
}
