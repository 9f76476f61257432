//! Device capability description
//!
//! The capability set is the only configuration the binding layer needs. It
//! decides slot capacities, which sampler parameters may be applied, and how
//! a shader's logical register number maps onto a slot array.

/// Maps a logical binding slot to an index in a stage's slot array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTransform {
    /// Split register spaces: slot N is stored at N.
    Identity,
    /// Unified slots: cross-compiled shaders shift write registers past the
    /// read registers (u0 becomes binding 16), so the stored index wraps back
    /// into the stage's range.
    Unshift { slots_per_stage: usize },
}

impl SlotTransform {
    pub fn storage_index(&self, logical_slot: u32) -> usize {
        match *self {
            SlotTransform::Identity => logical_slot as usize,
            SlotTransform::Unshift { slots_per_stage } => {
                if slots_per_stage == 0 {
                    logical_slot as usize
                } else {
                    logical_slot as usize % slots_per_stage
                }
            }
        }
    }
}

/// What the device can do, as seen by the binding layer
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub supports_anisotropic_filter: bool,
    pub supports_texture_max_level: bool,
    pub supports_border_color: bool,
    pub supports_lod_bias: bool,
    /// Native sampler objects exist; otherwise sampling state is set per texture.
    pub supports_sampler_objects: bool,
    pub max_anisotropy: f32,
    /// Read-only slots (and texture slots) per stage
    pub max_slots_per_stage: usize,
    /// Read-write slots per stage
    pub max_write_slots_per_stage: usize,
    pub max_sampler_slots_per_stage: usize,
    pub slot_transform: SlotTransform,
}

impl Default for DeviceCapabilities {
    /// A split-register device in the D3D11 mould.
    fn default() -> Self {
        Self {
            supports_anisotropic_filter: true,
            supports_texture_max_level: true,
            supports_border_color: true,
            supports_lod_bias: true,
            supports_sampler_objects: true,
            max_anisotropy: 16.0,
            max_slots_per_stage: 16,
            max_write_slots_per_stage: 8,
            max_sampler_slots_per_stage: 16,
            slot_transform: SlotTransform::Identity,
        }
    }
}

impl DeviceCapabilities {
    /// Number of write registers a cross-compiler shifts past the read registers
    pub const WRITE_REGISTER_SHIFT: u32 = 16;

    /// A device with one slot space shared between read and write access
    pub fn unified_slots(slots_per_stage: usize) -> Self {
        Self {
            max_slots_per_stage: slots_per_stage,
            max_write_slots_per_stage: slots_per_stage,
            max_sampler_slots_per_stage: slots_per_stage,
            slot_transform: SlotTransform::Unshift { slots_per_stage },
            ..Self::default()
        }
    }

    /// Read and write access share one slot space
    pub fn has_unified_slots(&self) -> bool {
        matches!(self.slot_transform, SlotTransform::Unshift { .. })
    }

    /// Derives capabilities from a wgpu adapter or device
    ///
    /// wgpu samplers carry no LOD bias and textures carry no max level, so
    /// both are reported unsupported. Border colors need
    /// `ADDRESS_MODE_CLAMP_TO_BORDER`.
    pub fn from_wgpu(features: wgpu::Features, limits: &wgpu::Limits) -> Self {
        let write_slots = limits
            .max_storage_buffers_per_shader_stage
            .max(limits.max_storage_textures_per_shader_stage);

        Self {
            supports_anisotropic_filter: true,
            supports_texture_max_level: false,
            supports_border_color: features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
            supports_lod_bias: false,
            supports_sampler_objects: true,
            max_anisotropy: 16.0,
            max_slots_per_stage: limits.max_sampled_textures_per_shader_stage as usize,
            max_write_slots_per_stage: write_slots as usize,
            max_sampler_slots_per_stage: limits.max_samplers_per_shader_stage as usize,
            slot_transform: SlotTransform::Identity,
        }
    }

    pub fn with_border_color(mut self, supported: bool) -> Self {
        self.supports_border_color = supported;
        self
    }

    pub fn with_lod_bias(mut self, supported: bool) -> Self {
        self.supports_lod_bias = supported;
        self
    }

    pub fn with_anisotropy(mut self, supported: bool, max_anisotropy: f32) -> Self {
        self.supports_anisotropic_filter = supported;
        self.max_anisotropy = max_anisotropy.max(1.0);
        self
    }

    pub fn with_texture_max_level(mut self, supported: bool) -> Self {
        self.supports_texture_max_level = supported;
        self
    }

    pub fn with_sampler_objects(mut self, supported: bool) -> Self {
        self.supports_sampler_objects = supported;
        self
    }

    /// Overrides the slot counts. A unified device wraps at the new read count.
    pub fn with_slot_counts(mut self, read: usize, write: usize) -> Self {
        self.max_slots_per_stage = read;
        self.max_write_slots_per_stage = write;
        if let SlotTransform::Unshift { slots_per_stage } = &mut self.slot_transform {
            *slots_per_stage = read;
        }
        self
    }
}
