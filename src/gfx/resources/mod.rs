// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Bindable resources ([`GpuResource`]) with their wgpu sources, and sampler
//! configuration objects.

pub mod gpu_resource;
pub mod sampler;
pub mod structured_buffer;
pub mod texture_resource;

// Re-export main types
pub use gpu_resource::{GpuResource, ResourceId, ResourceKind, ResourceSource};
pub use sampler::{
    CompareFunction, SamplerConfiguration, SamplerParameters, SamplerState, TextureAddressMode, TextureFilter,
    TextureFilterMode,
};
pub use structured_buffer::StructuredBufferSource;
pub use texture_resource::TextureSource;
