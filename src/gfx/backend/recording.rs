//! Headless backend that records native calls
//!
//! Every view, sampler and slot operation is appended to a call log instead
//! of reaching a GPU. Native objects are plain integer ids, so identity and
//! construction counts can be inspected directly.

use log::trace;

use super::{
    DeviceCapabilities, DeviceId, GraphicsBackend, SamplerTarget, ShaderStage, SlotAssignment,
    ViewDescription,
};
use crate::error::{BindingError, Result};
use crate::gfx::resources::gpu_resource::{ResourceKind, ResourceSource};
use crate::gfx::resources::sampler::SamplerParameters;

/// One native operation as seen by the device
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateResource {
        resource: u64,
        kind: ResourceKind,
    },
    CreateReadView {
        view: u64,
        resource: u64,
    },
    CreateWriteView {
        view: u64,
        resource: u64,
        desc: ViewDescription,
    },
    SetReadView {
        stage: ShaderStage,
        slot: SlotAssignment,
        view: Option<u64>,
    },
    SetWriteView {
        stage: ShaderStage,
        slot: SlotAssignment,
        view: Option<u64>,
    },
    CreateSampler {
        sampler: u64,
        params: SamplerParameters,
    },
    SetSampler {
        target: SamplerTarget,
        sampler: Option<u64>,
    },
    SetTextureParameters {
        target: SamplerTarget,
        params: SamplerParameters,
    },
    GenerateMips {
        resource: u64,
    },
}

impl BackendCall {
    /// Slot bind or unbind, as opposed to object creation
    pub fn is_slot_call(&self) -> bool {
        matches!(
            self,
            BackendCall::SetReadView { .. } | BackendCall::SetWriteView { .. } | BackendCall::SetSampler { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResource {
    pub id: u64,
    pub kind: ResourceKind,
    pub mip_levels: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedView {
    pub id: u64,
    pub resource: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSampler {
    pub id: u64,
    pub params: SamplerParameters,
}

pub struct RecordingBackend {
    device_id: DeviceId,
    capabilities: DeviceCapabilities,
    next_object: u64,
    calls: Vec<BackendCall>,
}

impl RecordingBackend {
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            device_id: DeviceId::next(),
            capabilities,
            next_object: 1,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drains the log
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of slot bind/unbind calls in the log
    pub fn slot_calls(&self) -> usize {
        self.calls.iter().filter(|c| c.is_slot_call()).count()
    }

    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// Allocates a native resource id; what [`RecordedSource`] calls.
    pub fn create_resource(&mut self, kind: ResourceKind, mip_levels: u32) -> RecordedResource {
        let id = self.allocate();
        self.calls.push(BackendCall::CreateResource { resource: id, kind });
        RecordedResource { id, kind, mip_levels }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_object;
        self.next_object += 1;
        id
    }

    fn check_view_kind(resource: &RecordedResource, desc: &ViewDescription) -> Result<()> {
        match (resource.kind, desc) {
            (ResourceKind::Texture, ViewDescription::Texture { base_mip_level, .. }) => {
                if *base_mip_level >= resource.mip_levels {
                    return Err(BindingError::backend(format!(
                        "mip {} requested from a texture with {} levels",
                        base_mip_level, resource.mip_levels
                    )));
                }
                Ok(())
            }
            (ResourceKind::StructuredBuffer, ViewDescription::Buffer { .. }) => Ok(()),
            (kind, desc) => Err(BindingError::backend(format!(
                "{:?} view requested from a {:?} resource",
                desc, kind
            ))),
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    type Resource = RecordedResource;
    type ReadView = RecordedView;
    type WriteView = RecordedView;
    type Sampler = RecordedSampler;

    fn device_id(&self) -> DeviceId {
        self.device_id
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_read_view(&mut self, resource: &RecordedResource, desc: &ViewDescription) -> Result<RecordedView> {
        Self::check_view_kind(resource, desc)?;
        let id = self.allocate();
        self.calls.push(BackendCall::CreateReadView {
            view: id,
            resource: resource.id,
        });
        Ok(RecordedView {
            id,
            resource: resource.id,
        })
    }

    fn create_write_view(&mut self, resource: &RecordedResource, desc: &ViewDescription) -> Result<RecordedView> {
        Self::check_view_kind(resource, desc)?;
        let id = self.allocate();
        self.calls.push(BackendCall::CreateWriteView {
            view: id,
            resource: resource.id,
            desc: *desc,
        });
        Ok(RecordedView {
            id,
            resource: resource.id,
        })
    }

    fn set_read_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&RecordedView>) {
        trace!("{:?} read slot {} <- {:?}", stage, slot.storage_index, view.map(|v| v.id));
        self.calls.push(BackendCall::SetReadView {
            stage,
            slot,
            view: view.map(|v| v.id),
        });
    }

    fn set_write_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&RecordedView>) {
        trace!("{:?} write slot {} <- {:?}", stage, slot.storage_index, view.map(|v| v.id));
        self.calls.push(BackendCall::SetWriteView {
            stage,
            slot,
            view: view.map(|v| v.id),
        });
    }

    fn create_sampler(&mut self, params: &SamplerParameters) -> Result<RecordedSampler> {
        let id = self.allocate();
        self.calls.push(BackendCall::CreateSampler {
            sampler: id,
            params: params.clone(),
        });
        Ok(RecordedSampler {
            id,
            params: params.clone(),
        })
    }

    fn set_sampler(&mut self, target: SamplerTarget, sampler: Option<&RecordedSampler>) {
        self.calls.push(BackendCall::SetSampler {
            target,
            sampler: sampler.map(|s| s.id),
        });
    }

    fn set_texture_parameters(&mut self, target: SamplerTarget, params: &SamplerParameters) -> Result<()> {
        self.calls.push(BackendCall::SetTextureParameters {
            target,
            params: params.clone(),
        });
        Ok(())
    }

    fn generate_mips(&mut self, view: &RecordedView) -> Result<()> {
        self.calls.push(BackendCall::GenerateMips {
            resource: view.resource,
        });
        Ok(())
    }
}

/// Resource source whose native objects live in a [`RecordingBackend`]
#[derive(Debug, Clone, Copy)]
pub struct RecordedSource {
    pub kind: ResourceKind,
    pub mip_levels: u32,
}

impl RecordedSource {
    pub fn texture(mip_levels: u32) -> Self {
        Self {
            kind: ResourceKind::Texture,
            mip_levels: mip_levels.max(1),
        }
    }

    pub fn structured_buffer() -> Self {
        Self {
            kind: ResourceKind::StructuredBuffer,
            mip_levels: 1,
        }
    }
}

impl ResourceSource<RecordingBackend> for RecordedSource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    fn create_native(&self, backend: &mut RecordingBackend) -> Result<RecordedResource> {
        Ok(backend.create_resource(self.kind, self.mip_levels))
    }

    fn read_view_description(&self) -> ViewDescription {
        match self.kind {
            ResourceKind::Texture => ViewDescription::FULL_TEXTURE,
            ResourceKind::StructuredBuffer => ViewDescription::FULL_BUFFER,
        }
    }

    fn write_view_description(&self, mip_level: u32) -> ViewDescription {
        match self.kind {
            ResourceKind::Texture => ViewDescription::texture_mip(mip_level),
            ResourceKind::StructuredBuffer => ViewDescription::FULL_BUFFER,
        }
    }
}
