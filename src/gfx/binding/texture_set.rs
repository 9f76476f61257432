//! Texture slots of one shader stage

use std::sync::{Arc, Weak};

use log::{debug, trace};

use super::dirty_set::DirtySet;
use crate::error::{BindingError, Result};
use crate::gfx::backend::{DeviceCapabilities, DeviceId, GraphicsBackend, ShaderStage, SlotAssignment};
use crate::gfx::resources::{GpuResource, ResourceId, ResourceKind};

/// A resource currently used as a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBinding {
    pub target: ResourceId,
    pub array_slice: u32,
}

impl RenderTargetBinding {
    pub fn new<B: GraphicsBackend>(resource: &GpuResource<B>) -> Self {
        Self {
            target: resource.id(),
            array_slice: 0,
        }
    }

    pub fn with_array_slice(mut self, array_slice: u32) -> Self {
        self.array_slice = array_slice;
        self
    }
}

struct TextureBinding<B: GraphicsBackend> {
    id: ResourceId,
    resource: Weak<GpuResource<B>>,
}

impl<B: GraphicsBackend> TextureBinding<B> {
    fn live(&self) -> Option<Arc<GpuResource<B>>> {
        self.resource.upgrade().filter(|resource| !resource.is_disposed())
    }
}

/// Textures bound for sampling by one stage
///
/// Unlike [`ResourceBindingTable`](super::ResourceBindingTable) there is no
/// read/write split: every slot holds a read view.
pub struct ActiveTextureSet<B: GraphicsBackend> {
    stage: ShaderStage,
    textures: Vec<Option<TextureBinding<B>>>,
    dirty: DirtySet,
    applied: DirtySet,
    device: Option<DeviceId>,
}

impl<B: GraphicsBackend> ActiveTextureSet<B> {
    pub fn new(stage: ShaderStage, capabilities: &DeviceCapabilities) -> Self {
        let capacity = capabilities.max_slots_per_stage;
        Self {
            stage,
            textures: (0..capacity).map(|_| None).collect(),
            dirty: DirtySet::with_capacity(capacity),
            applied: DirtySet::with_capacity(capacity),
            device: None,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn max_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn bound_count(&self) -> usize {
        self.textures.iter().filter(|texture| texture.is_some()).count()
    }

    /// Live texture at `slot`
    pub fn texture(&self, slot: usize) -> Option<Arc<GpuResource<B>>> {
        self.textures.get(slot)?.as_ref()?.live()
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Binds `texture` at `slot`, or unbinds the slot with `None`.
    ///
    /// Rebinding the texture a slot already holds is a no-op. Returns whether
    /// the slot changed.
    pub fn set_texture(&mut self, slot: usize, texture: Option<&Arc<GpuResource<B>>>) -> Result<bool> {
        let stage = self.stage;
        let Some(entry) = self.textures.get_mut(slot) else {
            return Err(BindingError::InvalidBinding {
                stage,
                slot: slot as u32,
                reason: "texture slot exceeds the stage's capacity",
            });
        };

        if let Some(texture) = texture {
            if texture.kind() != ResourceKind::Texture {
                return Err(BindingError::InvalidBinding {
                    stage,
                    slot: slot as u32,
                    reason: "only textures can be bound to texture slots",
                });
            }
        }

        let current = entry.as_ref().map(|binding| binding.id);
        if current == texture.map(|texture| texture.id()) {
            return Ok(false);
        }

        *entry = texture.map(|texture| TextureBinding {
            id: texture.id(),
            resource: Arc::downgrade(texture),
        });
        self.dirty.insert(slot);
        trace!("{:?} texture slot {} <- {:?}", stage, slot, texture.map(|t| t.label()));
        Ok(true)
    }

    /// Unbinds every slot holding one of `targets`.
    ///
    /// Matching slots are cleared on the device right away and stay dirty,
    /// so the next `apply_all` issues the unbind through the normal path.
    /// Returns the number of slots cleared.
    pub fn clear_hazards(&mut self, backend: &mut B, targets: &[RenderTargetBinding]) -> usize {
        if targets.is_empty() {
            return 0;
        }

        let mut cleared = 0;
        for (slot, entry) in self.textures.iter_mut().enumerate() {
            let Some(binding) = entry else { continue };
            if !targets.iter().any(|target| target.target == binding.id) {
                continue;
            }

            debug!("{:?} texture slot {} is a render target, unbinding", self.stage, slot);
            *entry = None;
            backend.set_read_view(self.stage, SlotAssignment::direct(slot), None);
            self.applied.remove(slot);
            self.dirty.insert(slot);
            cleared += 1;
        }
        cleared
    }

    /// Empties every slot; slots holding a view on the device stay dirty.
    pub fn clear(&mut self) {
        self.textures.iter_mut().for_each(|texture| *texture = None);
        self.dirty.union_with(&self.applied);
    }

    pub fn mark_all_bound_dirty(&mut self) {
        for (slot, texture) in self.textures.iter().enumerate() {
            if texture.is_some() {
                self.dirty.insert(slot);
            }
        }
        self.dirty.union_with(&self.applied);
    }

    /// Pushes every dirty slot to the device in ascending order.
    pub fn apply_all(&mut self, backend: &mut B) -> Result<()> {
        let found = backend.device_id();
        match self.device {
            Some(expected) if expected != found => return Err(BindingError::DeviceMismatch { expected, found }),
            Some(_) => {}
            None => self.device = Some(found),
        }

        while let Some(slot) = self.dirty.pop_first() {
            let live = self.textures[slot].as_ref().and_then(TextureBinding::live);
            let view = match live.map(|texture| texture.read_view(backend)).transpose() {
                Ok(view) => view,
                Err(BindingError::DisposedResource { .. }) => None,
                Err(err) => {
                    self.dirty.insert(slot);
                    return Err(err);
                }
            };
            backend.set_read_view(self.stage, SlotAssignment::direct(slot), view.as_deref());
            if view.is_some() {
                self.applied.insert(slot);
            } else {
                self.applied.remove(slot);
            }
        }
        Ok(())
    }
}
