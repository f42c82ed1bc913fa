//! Instance creation, validation layers and adapter selection.

use std::ffi::{CStr, CString};

use ardent_gal::device::AdapterInfo;
use ardent_gal::error::GalError;
use ardent_gal::flags::{AdapterKind, ValidationMode};
use ash::{Entry, Instance, vk};
use log::{debug, error, info, warn};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Scoring weights for adapter selection.
const SCORE_DISCRETE_GPU: u32 = 10000;
const SCORE_INTEGRATED_GPU: u32 = 1000;
const SCORE_VIRTUAL_GPU: u32 = 500;
const SCORE_CPU: u32 = 100;
const SCORE_PER_GB_VRAM: u32 = 100;
const SCORE_VULKAN_1_4: u32 = 600;
const SCORE_VULKAN_1_3: u32 = 400;

pub(crate) struct InstanceState {
    pub entry: Entry,
    pub instance: Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl InstanceState {
    pub(crate) fn new(validation: ValidationMode) -> Result<Self, GalError> {
        let entry = unsafe {
            Entry::load().map_err(|e| GalError::creation("Vulkan loader", e))?
        };

        let instance = create_instance(&entry, validation)?;

        let debug_utils = if validation != ValidationMode::Disabled {
            match setup_debug_messenger(&entry, &instance) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("debug messenger unavailable: {e:?}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    /// Called from the owning device's drop, after the logical device is
    /// destroyed.
    pub(crate) fn destroy(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn layer_available(entry: &Entry, name: &str) -> bool {
    let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };
    layers.iter().any(|layer| {
        unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }.to_string_lossy() == name
    })
}

fn instance_extensions(entry: &Entry, validation: ValidationMode) -> Vec<*const i8> {
    let mut extensions = vec![ash::khr::surface::NAME.as_ptr()];

    let available = unsafe { entry.enumerate_instance_extension_properties(None) }
        .unwrap_or_default();
    let has = |name: &CStr| {
        available
            .iter()
            .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name)
    };

    #[cfg(target_os = "windows")]
    if has(ash::khr::win32_surface::NAME) {
        extensions.push(ash::khr::win32_surface::NAME.as_ptr());
    }

    #[cfg(target_os = "linux")]
    {
        for name in [
            ash::khr::xlib_surface::NAME,
            ash::khr::xcb_surface::NAME,
            ash::khr::wayland_surface::NAME,
        ] {
            if has(name) {
                extensions.push(name.as_ptr());
            }
        }
    }

    #[cfg(target_os = "macos")]
    if has(ash::ext::metal_surface::NAME) {
        extensions.push(ash::ext::metal_surface::NAME.as_ptr());
    }

    if validation != ValidationMode::Disabled && has(ash::ext::debug_utils::NAME) {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    extensions
}

fn create_instance(entry: &Entry, validation: ValidationMode) -> Result<Instance, GalError> {
    let app_name = CString::new("ardent").unwrap();

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&app_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_3);

    let extensions = instance_extensions(entry, validation);

    let validation_layer = CString::new(VALIDATION_LAYER).unwrap();
    let mut layers: Vec<*const i8> = Vec::new();
    if validation != ValidationMode::Disabled {
        if layer_available(entry, VALIDATION_LAYER) {
            layers.push(validation_layer.as_ptr());
        } else {
            warn!("{VALIDATION_LAYER} requested but not installed");
        }
    }

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    // GPU-assisted and synchronization validation ride on the same layer.
    let gpu_features = [
        vk::ValidationFeatureEnableEXT::GPU_ASSISTED,
        vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
    ];
    let mut validation_features =
        vk::ValidationFeaturesEXT::default().enabled_validation_features(&gpu_features);
    if validation == ValidationMode::Gpu && !layers.is_empty() {
        create_info = create_info.push_next(&mut validation_features);
    }

    unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(|e| GalError::creation("Vulkan instance", e))
    }
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT), vk::Result> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
    Ok((debug_utils, messenger))
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*callback_data).p_message) }.to_string_lossy();

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[validation]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[performance]",
        _ => "[general]",
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("vulkan {type_str}: {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("vulkan {type_str}: {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("vulkan {type_str}: {message}"),
        _ => debug!("vulkan {type_str}: {message}"),
    }

    vk::FALSE
}

/// The selected physical device plus everything the logical device needs
/// to know about it.
pub(crate) struct AdapterPick {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub graphics_family: u32,
    pub compute_family: u32,
    pub copy_family: u32,
}

impl AdapterPick {
    pub(crate) fn adapter_info(&self) -> AdapterInfo {
        let name = unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let version = self.properties.driver_version;
        AdapterInfo {
            name,
            kind: adapter_kind(self.properties.device_type),
            vendor_id: self.properties.vendor_id,
            device_id: self.properties.device_id,
            driver_version: format!(
                "{}.{}.{}",
                vk::api_version_major(version),
                vk::api_version_minor(version),
                vk::api_version_patch(version)
            ),
        }
    }
}

fn adapter_kind(device_type: vk::PhysicalDeviceType) -> AdapterKind {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterKind::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterKind::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterKind::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterKind::Cpu,
        _ => AdapterKind::Other,
    }
}

/// Pick queue families: graphics, then the most dedicated compute and
/// transfer families available.
fn find_queue_families(
    instance: &Instance,
    device: vk::PhysicalDevice,
) -> Option<(u32, u32, u32)> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics = None;
    let mut dedicated_compute = None;
    let mut dedicated_copy = None;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let flags = family.queue_flags;

        if graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }
        if flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS) {
            dedicated_compute.get_or_insert(index);
        }
        if flags.contains(vk::QueueFlags::TRANSFER)
            && !flags.contains(vk::QueueFlags::GRAPHICS)
            && !flags.contains(vk::QueueFlags::COMPUTE)
        {
            dedicated_copy.get_or_insert(index);
        }
    }

    let graphics = graphics?;
    let compute = dedicated_compute.unwrap_or(graphics);
    let copy = dedicated_copy.unwrap_or(compute);
    Some((graphics, compute, copy))
}

fn score_adapter(
    properties: &vk::PhysicalDeviceProperties,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> u32 {
    let mut score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => SCORE_DISCRETE_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU => SCORE_INTEGRATED_GPU,
        vk::PhysicalDeviceType::VIRTUAL_GPU => SCORE_VIRTUAL_GPU,
        vk::PhysicalDeviceType::CPU => SCORE_CPU,
        _ => 10,
    };

    let api_version = properties.api_version;
    if api_version >= vk::make_api_version(0, 1, 4, 0) {
        score += SCORE_VULKAN_1_4;
    } else if api_version >= vk::API_VERSION_1_3 {
        score += SCORE_VULKAN_1_3;
    }

    let vram_bytes: u64 = memory_properties.memory_heaps
        [..memory_properties.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum();
    score += (vram_bytes / (1024 * 1024 * 1024)) as u32 * SCORE_PER_GB_VRAM;

    score
}

pub(crate) fn select_adapter(instance: &Instance) -> Result<AdapterPick, GalError> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(|e| GalError::creation("physical device enumeration", e))?
    };
    if devices.is_empty() {
        return Err(GalError::unsupported("no Vulkan-capable adapter found"));
    }

    let mut best: Option<AdapterPick> = None;
    let mut best_score = 0u32;

    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        // Vulkan 1.3 is the floor for dynamic rendering and sync2.
        if properties.api_version < vk::API_VERSION_1_3 {
            continue;
        }
        let Some((graphics, compute, copy)) = find_queue_families(instance, device) else {
            continue;
        };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let score = score_adapter(&properties, &memory_properties);

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();
        info!(
            "found adapter: {} (score {}, type {:?})",
            name, score, properties.device_type
        );

        if score > best_score {
            best = Some(AdapterPick {
                handle: device,
                properties,
                memory_properties,
                graphics_family: graphics,
                compute_family: compute,
                copy_family: copy,
            });
            best_score = score;
        }
    }

    best.ok_or_else(|| GalError::unsupported("no suitable Vulkan 1.3 adapter"))
}
