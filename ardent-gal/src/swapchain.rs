//! Swapchain descriptor, opaque window handle and handle type.

use std::any::Any;
use std::sync::Arc;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::flags::PresentMode;
use crate::format::PixelFormat;

/// Opaque native window identity supplied by the embedder.
///
/// The embedder guarantees that the native window and display outlive every
/// swapchain created against them; that contract is what makes the handle
/// shareable across threads.
#[derive(Debug, Clone, Copy)]
pub struct WindowHandle {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

unsafe impl Send for WindowHandle {}
unsafe impl Sync for WindowHandle {}

impl WindowHandle {
    pub fn new(display: RawDisplayHandle, window: RawWindowHandle) -> Self {
        Self { display, window }
    }
}

#[derive(Debug, Clone)]
pub struct SwapChainDesc {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub present_mode: PresentMode,
    pub vsync: bool,
    pub is_fullscreen: bool,
}

impl Default for SwapChainDesc {
    fn default() -> Self {
        Self {
            label: None,
            width: 0,
            height: 0,
            format: PixelFormat::Bgra8Unorm,
            present_mode: PresentMode::Immediate,
            vsync: false,
            is_fullscreen: false,
        }
    }
}

impl SwapChainDesc {
    /// Fill zero-valued fields with their documented defaults.
    pub fn filled(&self) -> SwapChainDesc {
        let mut desc = self.clone();
        if desc.format == PixelFormat::Undefined {
            desc.format = PixelFormat::Bgra8Unorm;
        }
        desc.width = desc.width.max(1);
        desc.height = desc.height.max(1);
        desc
    }
}

pub trait SwapChainApi: Send + Sync {
    fn desc(&self) -> &SwapChainDesc;
    /// Format actually selected from the surface's supported set.
    fn format(&self) -> PixelFormat;
    fn extent(&self) -> (u32, u32);
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct SwapChain {
    api: Arc<dyn SwapChainApi>,
}

impl SwapChain {
    pub fn from_api(api: Arc<dyn SwapChainApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &SwapChainDesc {
        self.api.desc()
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.api.format()
    }

    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        self.api.extent()
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn SwapChainApi {
        self.api.as_ref()
    }

    #[inline]
    pub fn api_arc(&self) -> Arc<dyn SwapChainApi> {
        self.api.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let desc = SwapChainDesc::default().filled();
        assert_eq!(desc.format, PixelFormat::Bgra8Unorm);
        assert_eq!(desc.present_mode, PresentMode::Immediate);
        assert_eq!((desc.width, desc.height), (1, 1));
    }
}
