// src/gfx/binding/mod.rs
//! Resource binding state
//!
//! CPU-side mirrors of what each shader stage sees. Every mutation marks slots
//! dirty; `apply_all` pushes only the dirty slots through the backend.

pub mod dirty_set;
pub mod orchestrator;
pub mod resource_table;
pub mod texture_set;

// Re-export main types
pub use dirty_set::DirtySet;
pub use orchestrator::{BindingOrchestrator, ReflectedResource, ShaderReflection, SharedSampler};
pub use resource_table::{Partition, ResourceBinding, ResourceBindingTable, ShaderResourceInfo};
pub use texture_set::{ActiveTextureSet, RenderTargetBinding};
