//! # Slotbind Prelude
//!
//! Commonly used types in one import:
//!
//! ```rust
//! use slotbind::prelude::*;
//! ```

pub use crate::error::{BindingError, Result};

// Backends and device configuration
pub use crate::gfx::backend::{
    DeviceCapabilities, DeviceContext, DeviceId, GraphicsBackend, RecordingBackend, SamplerTarget, ShaderStage,
    SlotTransform, WgpuBackend,
};

// Resources and samplers
pub use crate::gfx::resources::{
    GpuResource, ResourceId, ResourceKind, ResourceSource, SamplerConfiguration, SamplerState, StructuredBufferSource,
    TextureAddressMode, TextureFilter, TextureFilterMode, TextureSource,
};

// Binding state
pub use crate::gfx::binding::{
    ActiveTextureSet, BindingOrchestrator, Partition, ReflectedResource, RenderTargetBinding, ResourceBindingTable,
    ShaderReflection, ShaderResourceInfo, SharedSampler,
};
