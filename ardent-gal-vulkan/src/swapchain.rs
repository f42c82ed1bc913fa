//! Surface and swapchain management.
//!
//! The swapchain rebuilds itself during acquire when the surface size no
//! longer matches or a previous present reported it out of date. A minimized
//! window (zero-sized surface) yields no backbuffer for the frame.

use std::any::Any;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::flags::{Backend, QueueKind};
use ardent_gal::format::PixelFormat;
use ardent_gal::swapchain::{SwapChainApi, SwapChainDesc, WindowHandle};
use ardent_gal::texture::Texture;
use ash::vk;
use parking_lot::Mutex;

use crate::barrier::ResourceState;
use crate::conv;
use crate::device::DeviceShared;
use crate::texture::{VulkanTexture, backbuffer_desc};

/// Result of a successful backbuffer acquire, consumed by the recorder and
/// the submit path.
pub(crate) struct Acquired {
    pub texture: Texture,
    pub image_index: u32,
    pub acquire_semaphore: vk::Semaphore,
    pub release_semaphore: vk::Semaphore,
}

struct SwapInner {
    swapchain: vk::SwapchainKHR,
    format: PixelFormat,
    extent: vk::Extent2D,
    textures: Vec<Texture>,
    /// Cycled per acquire, one per backbuffer.
    acquire_semaphores: Vec<vk::Semaphore>,
    /// Indexed by acquired image, waited on by present.
    release_semaphores: Vec<vk::Semaphore>,
    sync_index: usize,
    needs_rebuild: bool,
}

pub(crate) struct VulkanSwapChain {
    shared: Arc<DeviceShared>,
    desc: SwapChainDesc,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    loader: ash::khr::swapchain::Device,
    inner: Mutex<SwapInner>,
}

impl VulkanSwapChain {
    pub(crate) fn new(
        shared: Arc<DeviceShared>,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> Result<Arc<Self>, GalError> {
        let desc = desc.clone();
        let surface = unsafe {
            ash_window::create_surface(
                &shared.entry,
                &shared.instance,
                window.display,
                window.window,
                None,
            )
            .map_err(|e| GalError::creation("window surface", e))?
        };
        let surface_loader = ash::khr::surface::Instance::new(&shared.entry, &shared.instance);
        let loader = ash::khr::swapchain::Device::new(&shared.instance, &shared.device);

        let graphics_family = shared.queue(QueueKind::Graphics).family;
        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(shared.physical, graphics_family, surface)
                .unwrap_or(false)
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(GalError::unsupported(
                "surface cannot be presented from the graphics queue",
            ));
        }

        let inner = build_swapchain(
            &shared,
            &surface_loader,
            &loader,
            surface,
            &desc,
            vk::SwapchainKHR::null(),
        )?;
        let inner = inner.ok_or(GalError::OutOfDate)?;

        log::info!(
            "swapchain created: {}x{} {:?}",
            inner.extent.width,
            inner.extent.height,
            inner.format
        );

        Ok(Arc::new(Self {
            shared,
            desc,
            surface_loader,
            surface,
            loader,
            inner: Mutex::new(inner),
        }))
    }

    /// Acquire the next backbuffer, rebuilding the swapchain when stale.
    /// Returns `None` while the window is minimized.
    pub(crate) fn acquire(&self) -> Result<Option<Acquired>, GalError> {
        let mut inner = self.inner.lock();

        for attempt in 0..2 {
            let caps = unsafe {
                self.surface_loader
                    .get_physical_device_surface_capabilities(self.shared.physical, self.surface)
                    .map_err(|e| GalError::device_lost(Backend::Vulkan, e))?
            };
            if caps.current_extent.width == 0 || caps.current_extent.height == 0 {
                return Ok(None);
            }

            let stale = inner.needs_rebuild
                || (caps.current_extent.width != u32::MAX
                    && caps.current_extent != inner.extent);
            if stale {
                self.rebuild(&mut inner)?;
            }

            inner.sync_index = (inner.sync_index + 1) % inner.acquire_semaphores.len();
            let acquire_semaphore = inner.acquire_semaphores[inner.sync_index];

            let result = unsafe {
                self.loader.acquire_next_image(
                    inner.swapchain,
                    u64::MAX,
                    acquire_semaphore,
                    vk::Fence::null(),
                )
            };
            match result {
                Ok((image_index, suboptimal)) => {
                    if suboptimal {
                        inner.needs_rebuild = true;
                    }
                    let texture = inner.textures[image_index as usize].clone();
                    return Ok(Some(Acquired {
                        texture,
                        image_index,
                        acquire_semaphore,
                        release_semaphore: inner.release_semaphores[image_index as usize],
                    }));
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) if attempt == 0 => {
                    inner.needs_rebuild = true;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Err(GalError::OutOfDate),
                Err(e) => return Err(GalError::device_lost(Backend::Vulkan, e)),
            }
        }
        Err(GalError::OutOfDate)
    }

    /// Queue the acquired image for presentation. Failure marks the
    /// swapchain for rebuild on the next acquire.
    pub(crate) fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<(), GalError> {
        let mut inner = self.inner.lock();
        let swapchains = [inner.swapchain];
        let indices = [image_index];
        let waits = [wait];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);
        let result = unsafe { self.loader.queue_present(queue, &info) };
        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    inner.needs_rebuild = true;
                }
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                inner.needs_rebuild = true;
                Ok(())
            }
            Err(e) => Err(GalError::device_lost(Backend::Vulkan, e)),
        }
    }

    fn rebuild(&self, inner: &mut SwapInner) -> Result<(), GalError> {
        // Every in-flight frame may still reference the old backbuffers.
        unsafe {
            let _ = self.shared.device.device_wait_idle();
        }
        let old = inner.swapchain;
        let new = build_swapchain(
            &self.shared,
            &self.surface_loader,
            &self.loader,
            self.surface,
            &self.desc,
            old,
        )?;
        let Some(new) = new else {
            return Err(GalError::OutOfDate);
        };
        destroy_sync(&self.shared.device, inner);
        inner.textures.clear();
        unsafe { self.loader.destroy_swapchain(old, None) };
        *inner = new;
        log::info!(
            "swapchain rebuilt: {}x{} {:?}",
            inner.extent.width,
            inner.extent.height,
            inner.format
        );
        Ok(())
    }
}

impl SwapChainApi for VulkanSwapChain {
    fn desc(&self) -> &SwapChainDesc {
        &self.desc
    }

    fn format(&self) -> PixelFormat {
        self.inner.lock().format
    }

    fn extent(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.extent.width, inner.extent.height)
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.inner.lock().swapchain, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapChain {
    fn drop(&mut self) {
        unsafe {
            let _ = self.shared.device.device_wait_idle();
        }
        let inner = self.inner.get_mut();
        destroy_sync(&self.shared.device, inner);
        inner.textures.clear();
        unsafe {
            self.loader.destroy_swapchain(inner.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

fn destroy_sync(device: &ash::Device, inner: &mut SwapInner) {
    unsafe {
        for semaphore in inner.acquire_semaphores.drain(..) {
            device.destroy_semaphore(semaphore, None);
        }
        for semaphore in inner.release_semaphores.drain(..) {
            device.destroy_semaphore(semaphore, None);
        }
    }
}

/// Create a swapchain against `surface`. Returns `None` for a zero-sized
/// (minimized) surface.
fn build_swapchain(
    shared: &Arc<DeviceShared>,
    surface_loader: &ash::khr::surface::Instance,
    loader: &ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    desc: &SwapChainDesc,
    old_swapchain: vk::SwapchainKHR,
) -> Result<Option<SwapInner>, GalError> {
    let caps = unsafe {
        surface_loader
            .get_physical_device_surface_capabilities(shared.physical, surface)
            .map_err(|e| GalError::creation("swapchain", e))?
    };
    let formats = unsafe {
        surface_loader
            .get_physical_device_surface_formats(shared.physical, surface)
            .map_err(|e| GalError::creation("swapchain", e))?
    };
    let present_modes = unsafe {
        surface_loader
            .get_physical_device_surface_present_modes(shared.physical, surface)
            .map_err(|e| GalError::creation("swapchain", e))?
    };

    let extent = if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: desc
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: desc
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    };
    if extent.width == 0 || extent.height == 0 {
        return Ok(None);
    }

    let surface_format = choose_surface_format(&formats, desc.format);
    let present_mode = choose_present_mode(&present_modes, desc);

    // Mailbox needs a spare image to bounce between.
    let wanted = if present_mode == vk::PresentModeKHR::MAILBOX {
        3
    } else {
        2
    };
    let mut image_count = (caps.min_image_count + 1).max(wanted);
    if caps.max_image_count > 0 {
        image_count = image_count.min(caps.max_image_count);
    }

    let info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(caps.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    let swapchain = unsafe {
        loader
            .create_swapchain(&info, None)
            .map_err(|e| GalError::creation("swapchain", e))?
    };
    let images = unsafe {
        loader
            .get_swapchain_images(swapchain)
            .map_err(|e| GalError::creation("swapchain images", e))?
    };

    let format = conv::pixel_format_from_vk(surface_format.format);
    let mut textures = Vec::with_capacity(images.len());
    let mut acquire_semaphores = Vec::with_capacity(images.len());
    let mut release_semaphores = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let tex = VulkanTexture::from_borrowed(
            shared.clone(),
            *image,
            backbuffer_desc(format, extent),
            ResourceState::Undefined,
        );
        if let Some(label) = &desc.label {
            shared.set_object_name(*image, &format!("{label} backbuffer {index}"));
        }
        textures.push(Texture::from_api(tex));

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        unsafe {
            acquire_semaphores.push(
                shared
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| GalError::creation("swapchain semaphore", e))?,
            );
            release_semaphores.push(
                shared
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| GalError::creation("swapchain semaphore", e))?,
            );
        }
    }

    Ok(Some(SwapInner {
        swapchain,
        format,
        extent,
        textures,
        acquire_semaphores,
        release_semaphores,
        sync_index: 0,
        needs_rebuild: false,
    }))
}

/// Prefer the exact requested format in sRGB-nonlinear color space, then
/// fall back to BGRA8.
fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    requested: PixelFormat,
) -> vk::SurfaceFormatKHR {
    let wanted = conv::pixel_format(requested);
    formats
        .iter()
        .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| {
            formats.iter().find(|f| {
                f.format == vk::Format::B8G8R8A8_UNORM
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Fifo when vsync is requested; otherwise the requested mode when
/// available, then Mailbox, then Immediate. Fifo is the guaranteed
/// fallback.
fn choose_present_mode(modes: &[vk::PresentModeKHR], desc: &SwapChainDesc) -> vk::PresentModeKHR {
    if desc.vsync {
        return vk::PresentModeKHR::FIFO;
    }
    let requested = conv::present_mode(desc.present_mode);
    for candidate in [
        requested,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ] {
        if modes.contains(&candidate) {
            return candidate;
        }
    }
    vk::PresentModeKHR::FIFO
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardent_gal::flags::PresentMode;

    #[test]
    fn vsync_forces_fifo() {
        let desc = SwapChainDesc {
            vsync: true,
            present_mode: PresentMode::Mailbox,
            ..Default::default()
        };
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, &desc), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn vsync_off_prefers_mailbox_then_immediate() {
        let desc = SwapChainDesc {
            vsync: false,
            present_mode: PresentMode::Mailbox,
            ..Default::default()
        };
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, &desc),
            vk::PresentModeKHR::MAILBOX
        );

        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&modes, &desc),
            vk::PresentModeKHR::IMMEDIATE
        );

        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, &desc), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn exact_format_wins_over_fallback() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let picked = choose_surface_format(&formats, PixelFormat::Rgba8Unorm);
        assert_eq!(picked.format, vk::Format::R8G8B8A8_UNORM);

        let picked = choose_surface_format(&formats, PixelFormat::Rgba16Float);
        assert_eq!(picked.format, vk::Format::B8G8R8A8_UNORM);
    }
}
