//! Error types for the binding layer
//!
//! Every variant except [`BindingError::Backend`] describes a programmer error:
//! bad shader metadata, a disposed resource reaching the binding path, or an
//! object used against the wrong device. They are returned immediately and
//! never retried. Device loss is not an error; see
//! [`GpuResource::invalidate_on_device_reset`](crate::gfx::resources::GpuResource::invalidate_on_device_reset).

use thiserror::Error;

use crate::gfx::backend::{DeviceId, ShaderStage};
use crate::gfx::resources::ResourceId;

/// Failure modes of binding, view creation and sampler activation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// Write access requested on a stage that forbids it, or a slot that is
    /// out of range for the stage.
    #[error("invalid binding for {stage:?} slot {slot}: {reason}")]
    InvalidBinding {
        stage: ShaderStage,
        slot: u32,
        reason: &'static str,
    },

    /// A raw filter or filter-mode value that does not name a known state.
    #[error("unsupported {kind} value {value}")]
    UnsupportedFilter { value: u32, kind: &'static str },

    /// A wrap mode the backend cannot express.
    #[error("unsupported texture wrap mode: {mode}")]
    UnsupportedWrapMode { mode: String },

    /// A view was requested from a handle that has been disposed.
    #[error("resource {id:?} ({label}) has been disposed")]
    DisposedResource { id: ResourceId, label: String },

    /// An object bound to one device was used against another.
    #[error("object is bound to device {expected:?} but was used with {found:?}")]
    DeviceMismatch { expected: DeviceId, found: DeviceId },

    /// The native layer rejected a request.
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl BindingError {
    pub(crate) fn backend(message: impl Into<String>) -> Self {
        BindingError::Backend {
            message: message.into(),
        }
    }
}

/// Alias for `Result<T, BindingError>`.
pub type Result<T> = std::result::Result<T, BindingError>;
