//! Plain geometric and argument types shared by every backend.

/// RGBA color, each channel in `[0.0, 1.0]` for unorm targets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Integer rectangle, origin at top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Viewport with depth range, following D3D conventions (Y is down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub const fn full(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        }
    }
}

impl Extent3d {
    /// Extent of the given mip level, clamped to 1.
    pub const fn mip_level(self, level: u32) -> Extent3d {
        let width = self.width >> level;
        let height = self.height >> level;
        Extent3d {
            width: if width == 0 { 1 } else { width },
            height: if height == 0 { 1 } else { height },
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

// Indirect argument layouts. These must match the native indirect argument
// structs bit-for-bit on both backend families.

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchIndirectArgs {
    pub group_count_x: u32,
    pub group_count_y: u32,
    pub group_count_z: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

const _: () = assert!(core::mem::size_of::<DispatchIndirectArgs>() == 12);
const _: () = assert!(core::mem::size_of::<DrawIndirectArgs>() == 16);
const _: () = assert!(core::mem::size_of::<DrawIndexedIndirectArgs>() == 20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indirect_args_match_native_layouts() {
        assert_eq!(core::mem::align_of::<DrawIndexedIndirectArgs>(), 4);
        assert_eq!(core::mem::offset_of!(DrawIndexedIndirectArgs, base_vertex), 12);
        assert_eq!(core::mem::offset_of!(DrawIndirectArgs, first_instance), 12);
    }

    #[test]
    fn mip_extent_clamps_to_one() {
        let e = Extent3d {
            width: 1280,
            height: 720,
            depth_or_array_layers: 1,
        };
        assert_eq!(e.mip_level(1).width, 640);
        assert_eq!(e.mip_level(11).width, 1);
        assert_eq!(e.mip_level(11).height, 1);
    }

    #[test]
    fn mip_extent_usable_in_const() {
        const TAIL: Extent3d = Extent3d {
            width: 4,
            height: 2,
            depth_or_array_layers: 1,
        }
        .mip_level(3);
        assert_eq!(TAIL.width, 1);
        assert_eq!(TAIL.height, 1);
    }
}
