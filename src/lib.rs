// src/lib.rs
//! Slotbind
//!
//! Keeps the shader-visible resources of each pipeline stage in sync with a
//! graphics device. Textures, buffers and samplers are bound on the CPU side;
//! only the slots that changed are pushed to the device.

pub mod error;
pub mod gfx;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use error::{BindingError, Result};
