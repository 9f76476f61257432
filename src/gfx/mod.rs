//! # Graphics Module
//!
//! Resource binding for GPU shader stages.
//!
//! ## Architecture Overview
//!
//! - **Backends** ([`backend`]) - the [`GraphicsBackend`] trait, device
//!   capabilities, and the wgpu and recording implementations
//! - **Resources** ([`resources`]) - bindable textures and buffers with lazily
//!   created views, and sampler configurations
//! - **Binding** ([`binding`]) - per-stage resource tables, texture sets and
//!   the orchestrator that drives them from shader reflection
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use slotbind::gfx::backend::recording::RecordedSource;
//! use slotbind::gfx::backend::{DeviceCapabilities, DeviceContext, GraphicsBackend, RecordingBackend, ShaderStage};
//! use slotbind::gfx::binding::{BindingOrchestrator, ShaderResourceInfo};
//! use slotbind::gfx::resources::GpuResource;
//!
//! let context = DeviceContext::new(RecordingBackend::new(DeviceCapabilities::default()));
//! let mut orchestrator = BindingOrchestrator::new(context.lock().capabilities());
//!
//! let albedo = GpuResource::new("albedo", RecordedSource::texture(1));
//! orchestrator
//!     .set_resource(ShaderStage::Fragment, &albedo, ShaderResourceInfo::read(0))
//!     .unwrap();
//!
//! let mut backend = context.lock();
//! orchestrator.apply_all(&mut backend).unwrap();
//! assert_eq!(backend.slot_calls(), 1);
//! ```

pub mod backend;
pub mod binding;
pub mod resources;

// Re-export commonly used types
pub use backend::{DeviceCapabilities, DeviceContext, GraphicsBackend, ShaderStage};
pub use binding::{ActiveTextureSet, BindingOrchestrator, ResourceBindingTable};
pub use resources::{GpuResource, SamplerConfiguration, SamplerState};
