//! Vulkan backend for the `ardent-gal` graphics abstraction layer.
//!
//! Targets Vulkan 1.3: dynamic rendering, synchronization2 and timeline
//! semaphores are assumed core.

mod barrier;
mod buffer;
mod command;
mod conv;
mod deferred;
mod device;
mod instance;
mod pipeline;
mod query;
mod sampler;
mod shader;
mod swapchain;
mod texture;
mod upload;

use std::sync::Arc;

use ardent_gal::device::{Device, DeviceDesc};
use ardent_gal::error::GalError;

pub use device::VulkanDevice;

// Callers of the native-interop constructors need the `vk` handle types.
pub use ash;

/// Whether a Vulkan loader is present on this machine. A `true` here does
/// not guarantee a capable adapter; `create_device` still validates that.
pub fn is_supported() -> bool {
    unsafe { ash::Entry::load().is_ok() }
}

/// Create a device on the best available Vulkan 1.3 adapter.
pub fn create_device(desc: &DeviceDesc) -> Result<Device, GalError> {
    let device = VulkanDevice::new(desc)?;
    Ok(Device::from_api(Arc::new(device)))
}
