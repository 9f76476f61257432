//! # Backend abstraction
//!
//! Everything that talks to a native graphics API goes through
//! [`GraphicsBackend`]. The binding tables only decide *what* changed; the
//! backend decides how a slot change becomes a native call.
//!
//! Two implementations ship with the crate:
//!
//! - [`WgpuBackend`] - a real device built on `wgpu`, with separate read-only
//!   and read-write register spaces. Slot state is flushed into bind groups.
//! - [`RecordingBackend`] - a headless device that records every call. Used
//!   for tooling and tests.
//!
//! Binding-model differences between APIs are not compile-time branches:
//! they are described by [`DeviceCapabilities`] and its [`SlotTransform`].

pub mod capabilities;
pub mod mipmap;
pub mod recording;
pub mod wgpu_backend;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use crate::gfx::resources::sampler::SamplerParameters;

pub use capabilities::{DeviceCapabilities, SlotTransform};
pub use recording::{BackendCall, RecordingBackend};
pub use wgpu_backend::{WgpuBackend, WgpuResource, WgpuView};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a device instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Allocates a fresh id. Every backend instance takes one at construction.
    pub fn next() -> Self {
        DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Pipeline stage that consumes bound resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 3] = [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute];

    /// Dense index for per-stage arrays
    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
            ShaderStage::Compute => 2,
        }
    }

    /// Only compute shaders may bind read-write resources.
    pub fn supports_write_access(self) -> bool {
        matches!(self, ShaderStage::Compute)
    }

    pub fn to_wgpu(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
            ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
        }
    }
}

/// Where a binding lands on the device
///
/// `storage_index` is the position inside the stage's slot array after the
/// slot transform. `logical_slot` is the register number the shader declared;
/// unified-slot backends bind by it, and counter-buffer emulation looks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAssignment {
    pub storage_index: usize,
    pub logical_slot: u32,
    pub counter_slot: Option<u32>,
}

impl SlotAssignment {
    /// Assignment for a slot that needs no transform (texture slots)
    pub fn direct(slot: usize) -> Self {
        Self {
            storage_index: slot,
            logical_slot: slot as u32,
            counter_slot: None,
        }
    }
}

/// Sampler slot addressed by an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerTarget {
    pub stage: ShaderStage,
    pub slot: usize,
}

/// Describes which part of a native resource a view covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDescription {
    Texture {
        base_mip_level: u32,
        mip_level_count: Option<u32>,
    },
    Buffer {
        offset: u64,
        size: Option<u64>,
    },
}

impl ViewDescription {
    /// Whole-texture view
    pub const FULL_TEXTURE: ViewDescription = ViewDescription::Texture {
        base_mip_level: 0,
        mip_level_count: None,
    };

    /// Whole-buffer view
    pub const FULL_BUFFER: ViewDescription = ViewDescription::Buffer { offset: 0, size: None };

    /// Single-mip texture view, the shape write views take
    pub fn texture_mip(mip_level: u32) -> Self {
        ViewDescription::Texture {
            base_mip_level: mip_level,
            mip_level_count: Some(1),
        }
    }
}

/// Native device operations consumed by the binding layer
///
/// All methods are called with the device context lock held (see
/// [`DeviceContext`]). Slot setters never fail: the tables validate slots
/// before anything reaches the backend.
pub trait GraphicsBackend {
    /// Native texture or buffer object
    type Resource;
    /// Read-only view (shader-resource view)
    type ReadView;
    /// Read-write view (unordered-access view)
    type WriteView;
    /// Native sampler object
    type Sampler;

    fn device_id(&self) -> DeviceId;

    fn capabilities(&self) -> &DeviceCapabilities;

    fn create_read_view(&mut self, resource: &Self::Resource, desc: &ViewDescription) -> Result<Self::ReadView>;

    fn create_write_view(&mut self, resource: &Self::Resource, desc: &ViewDescription) -> Result<Self::WriteView>;

    /// Binds (or clears, with `None`) a read-only view.
    fn set_read_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&Self::ReadView>);

    /// Binds (or clears, with `None`) a read-write view.
    fn set_write_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&Self::WriteView>);

    fn create_sampler(&mut self, params: &SamplerParameters) -> Result<Self::Sampler>;

    fn set_sampler(&mut self, target: SamplerTarget, sampler: Option<&Self::Sampler>);

    /// Applies sampling state directly to the texture bound at `target`.
    /// Used by backends without sampler objects.
    fn set_texture_parameters(&mut self, target: SamplerTarget, params: &SamplerParameters) -> Result<()>;

    /// Fills mips 1.. of the viewed texture from mip 0.
    fn generate_mips(&mut self, view: &Self::ReadView) -> Result<()>;
}

/// The device's immediate context
///
/// Binding state and the native command stream share ordering requirements,
/// so any sequence of native calls happens under this lock. Hold the guard
/// across `apply_all` and the draw or dispatch that follows it.
pub struct DeviceContext<B> {
    device_id: DeviceId,
    backend: Mutex<B>,
}

impl<B: GraphicsBackend> DeviceContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            device_id: backend.device_id(),
            backend: Mutex::new(backend),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, B> {
        self.backend.lock()
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn into_inner(self) -> B {
        self.backend.into_inner()
    }
}
