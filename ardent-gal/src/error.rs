//! Error hierarchy of the abstraction layer.

use std::fmt;

use crate::flags::Backend;

/// Errors surfaced by device creation, resource creation and presentation.
#[derive(Debug)]
pub enum GalError {
    /// Backend not available, feature missing, or format unsupported.
    Unsupported { what: String },
    /// A native object could not be created.
    ResourceCreation { what: String, reason: String },
    /// The device was lost; further operations on it are undefined.
    DeviceLost { backend: Backend, reason: String },
    /// Swapchain is out of date or suboptimal and could not be rebuilt.
    OutOfDate,
    /// Invalid descriptor or API misuse caught by cross-backend validation.
    Validation { message: String },
}

impl GalError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        GalError::Unsupported { what: what.into() }
    }

    pub fn creation(what: impl Into<String>, reason: impl fmt::Display) -> Self {
        GalError::ResourceCreation {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn device_lost(backend: Backend, reason: impl fmt::Display) -> Self {
        GalError::DeviceLost {
            backend,
            reason: reason.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GalError::Validation {
            message: message.into(),
        }
    }
}

impl fmt::Display for GalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GalError::Unsupported { what } => {
                write!(f, "unsupported: {what}")
            }
            GalError::ResourceCreation { what, reason } => {
                write!(f, "failed to create {what}: {reason}")
            }
            GalError::DeviceLost { backend, reason } => {
                write!(f, "{backend:?} device lost: {reason}")
            }
            GalError::OutOfDate => {
                write!(f, "swapchain out of date")
            }
            GalError::Validation { message } => {
                write!(f, "validation failed: {message}")
            }
        }
    }
}

impl std::error::Error for GalError {}
