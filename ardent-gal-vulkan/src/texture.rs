//! Texture object with a lazily-populated image view cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::flags::{TextureDimension, TextureUsage};
use ardent_gal::format::PixelFormat;
use ardent_gal::texture::{TextureApi, TextureDesc, TextureSubresource};
use ash::vk;
use parking_lot::Mutex;

use crate::barrier::{self, ResourceState, TrackedState};
use crate::conv;
use crate::device::DeviceShared;

pub(crate) struct VulkanTexture {
    shared: Arc<DeviceShared>,
    desc: TextureDesc,
    image: vk::Image,
    /// Null for borrowed images (swapchain backbuffers, `from_native`).
    memory: vk::DeviceMemory,
    views: Mutex<HashMap<TextureSubresource, vk::ImageView>>,
    state: Mutex<TrackedState>,
}

impl VulkanTexture {
    pub(crate) fn new(
        shared: Arc<DeviceShared>,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Arc<Self>, GalError> {
        let device = &shared.device;
        let desc = desc.clone();
        let is_depth = desc.format.info().has_depth || desc.format.info().has_stencil;

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.is_cube() {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }
        let (depth, layers) = match desc.dimension {
            TextureDimension::D3 => (desc.depth_or_array_layers, 1),
            _ => (1, desc.depth_or_array_layers),
        };

        let families = shared.unique_queue_families();
        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(conv::image_type(desc.dimension))
            .format(conv::pixel_format(desc.format))
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth,
            })
            .mip_levels(desc.mip_level_count)
            .array_layers(layers)
            .samples(conv::sample_count(desc.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(conv::image_usage(desc.usage, desc.format))
            .sharing_mode(shared.sharing_mode())
            .queue_family_indices(&families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(|e| GalError::creation("texture", e))?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = shared
            .allocate_memory(&requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .inspect_err(|_| unsafe { device.destroy_image(image, None) })?;

        unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .map_err(|e| GalError::creation("texture memory binding", e))?;
        }

        let mut state = TrackedState::new(ResourceState::Undefined);

        if let Some(data) = initial_data {
            let final_state = barrier::texture_initial_state(desc.usage, is_depth);
            shared
                .upload
                .lock()
                .stage_texture(&shared, image, &desc, data, final_state)?;
            state = TrackedState::new(final_state);
        }

        if let Some(label) = &desc.label {
            shared.set_object_name(image, label);
        }
        log::trace!(
            "texture created ({}x{}x{} {:?})",
            desc.width,
            desc.height,
            desc.depth_or_array_layers,
            desc.format
        );

        Ok(Arc::new(Self {
            shared,
            desc,
            image,
            memory,
            views: Mutex::new(HashMap::new()),
            state: Mutex::new(state),
        }))
    }

    /// Wrap an image the backend does not own. Used for swapchain
    /// backbuffers and native interop; only the views are released on drop.
    pub(crate) fn from_borrowed(
        shared: Arc<DeviceShared>,
        image: vk::Image,
        desc: TextureDesc,
        state: ResourceState,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared,
            desc,
            image,
            memory: vk::DeviceMemory::null(),
            views: Mutex::new(HashMap::new()),
            state: Mutex::new(TrackedState::new(state)),
        })
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub(crate) fn state(&self) -> &Mutex<TrackedState> {
        &self.state
    }

    #[inline]
    pub(crate) fn aspect(&self) -> vk::ImageAspectFlags {
        conv::aspect_mask(self.desc.format)
    }

    /// Fetch or create the view covering `sub`.
    pub(crate) fn view(&self, sub: TextureSubresource) -> Result<vk::ImageView, GalError> {
        let mut views = self.views.lock();
        if let Some(view) = views.get(&sub) {
            return Ok(*view);
        }

        let view_type = match self.desc.dimension {
            TextureDimension::D1 => vk::ImageViewType::TYPE_1D,
            TextureDimension::D3 => vk::ImageViewType::TYPE_3D,
            TextureDimension::D2 => {
                if self.desc.is_cube() && sub.layer_count == 6 {
                    vk::ImageViewType::CUBE
                } else if sub.layer_count > 1 {
                    vk::ImageViewType::TYPE_2D_ARRAY
                } else {
                    vk::ImageViewType::TYPE_2D
                }
            }
        };

        let info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(conv::pixel_format(self.desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect(),
                base_mip_level: sub.base_mip,
                level_count: sub.mip_count,
                base_array_layer: sub.base_layer,
                layer_count: sub.layer_count,
            });

        let view = unsafe {
            self.shared
                .device
                .create_image_view(&info, None)
                .map_err(|e| GalError::creation("texture view", e))?
        };
        views.insert(sub, view);
        Ok(view)
    }
}

impl TextureApi for VulkanTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.image, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        let views = self.views.get_mut().drain().map(|(_, v)| v).collect();
        let frame = self.shared.current_frame();
        self.shared
            .destroy
            .lock()
            .images
            .push((self.image, self.memory, views), frame);
        log::trace!("texture retired");
    }
}

/// Borrowed-image descriptor for swapchain backbuffers.
pub(crate) fn backbuffer_desc(format: PixelFormat, extent: vk::Extent2D) -> TextureDesc {
    TextureDesc {
        label: None,
        dimension: TextureDimension::D2,
        format,
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
        mip_level_count: 1,
        sample_count: 1,
        usage: TextureUsage::RenderTarget.into(),
    }
}
