//! Umbrella crate: backend registry and device creation.
//!
//! Backends register as [`Driver`] entries in platform preference order.
//! When the requested backend is unavailable the registry falls back once
//! to the first supported driver and logs the substitution.

pub use ardent_gal::*;

use ardent_gal::device::{Device, DeviceDesc};
use ardent_gal::error::GalError;
use ardent_gal::flags::Backend;

/// One backend's entry points.
pub struct Driver {
    pub backend: Backend,
    pub is_supported: fn() -> bool,
    pub create_device: fn(&DeviceDesc) -> Result<Device, GalError>,
}

/// Platform preference order. The first supported entry is the default.
pub const DRIVERS: &[Driver] = &[Driver {
    backend: Backend::Vulkan,
    is_supported: ardent_gal_vulkan::is_supported,
    create_device: ardent_gal_vulkan::create_device,
}];

pub fn is_backend_supported(backend: Backend) -> bool {
    DRIVERS
        .iter()
        .any(|driver| driver.backend == backend && (driver.is_supported)())
}

/// Create a device, honoring `desc.preferred_backend` when possible.
pub fn create_device(desc: &DeviceDesc) -> Result<Device, GalError> {
    let driver = select_driver(DRIVERS, desc.preferred_backend)?;
    ::log::info!("creating {:?} device", driver.backend);
    (driver.create_device)(desc)
}

/// Resolve the driver for `preferred`, falling back once to the first
/// supported driver when the preference cannot be met.
fn select_driver(
    drivers: &[Driver],
    preferred: Option<Backend>,
) -> Result<&Driver, GalError> {
    if let Some(backend) = preferred {
        match drivers
            .iter()
            .find(|driver| driver.backend == backend)
        {
            Some(driver) if (driver.is_supported)() => return Ok(driver),
            _ => {
                ::log::warn!("{backend:?} backend unavailable, falling back");
            }
        }
    }
    drivers
        .iter()
        .find(|driver| (driver.is_supported)())
        .ok_or_else(|| GalError::unsupported("no graphics backend available on this platform"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn stub_create(_: &DeviceDesc) -> Result<Device, GalError> {
        Err(GalError::unsupported("stub"))
    }

    fn yes() -> bool {
        true
    }

    fn no() -> bool {
        false
    }

    fn registry() -> Vec<Driver> {
        vec![
            Driver {
                backend: Backend::D3d12,
                is_supported: no,
                create_device: stub_create,
            },
            Driver {
                backend: Backend::Vulkan,
                is_supported: yes,
                create_device: stub_create,
            },
            Driver {
                backend: Backend::WebGpu,
                is_supported: yes,
                create_device: stub_create,
            },
        ]
    }

    #[test]
    fn preferred_backend_wins_when_supported() {
        let drivers = registry();
        let driver = select_driver(&drivers, Some(Backend::WebGpu)).unwrap();
        assert_eq!(driver.backend, Backend::WebGpu);
    }

    #[test]
    fn unsupported_preference_falls_back_to_first_supported() {
        init_logging();
        let drivers = registry();
        let driver = select_driver(&drivers, Some(Backend::D3d12)).unwrap();
        assert_eq!(driver.backend, Backend::Vulkan);
    }

    #[test]
    fn unknown_preference_falls_back() {
        let drivers = registry();
        let driver = select_driver(&drivers, Some(Backend::D3d11)).unwrap();
        assert_eq!(driver.backend, Backend::Vulkan);
    }

    #[test]
    fn no_preference_takes_first_supported() {
        let drivers = registry();
        let driver = select_driver(&drivers, None).unwrap();
        assert_eq!(driver.backend, Backend::Vulkan);
    }

    #[test]
    fn backend_support_probe_is_idempotent() {
        for backend in [Backend::Vulkan, Backend::D3d12, Backend::D3d11] {
            let first = is_backend_supported(backend);
            assert_eq!(is_backend_supported(backend), first);
        }
    }

    #[test]
    fn empty_registry_errors() {
        let drivers: Vec<Driver> = Vec::new();
        assert!(select_driver(&drivers, None).is_err());
    }
}
