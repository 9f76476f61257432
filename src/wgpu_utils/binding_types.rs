// src/wgpu_utils/binding_types.rs
//! WGPU binding type utilities
//!
//! Slot state is flushed into a single bind group per stage. Each slot space
//! gets its own range of binding numbers, `SLOT_STRIDE` wide:
//!
//! | space    | binding               |
//! |----------|-----------------------|
//! | read     | `slot`                |
//! | sampler  | `SAMPLER_BASE + slot` |
//! | write    | `WRITE_BASE + slot`   |
//! | counter  | `COUNTER_BASE + slot` |

use crate::gfx::backend::ShaderStage;

/// Width of each binding-number range
pub const SLOT_STRIDE: u32 = 64;
pub const SAMPLER_BASE: u32 = SLOT_STRIDE;
pub const WRITE_BASE: u32 = SLOT_STRIDE * 2;
pub const COUNTER_BASE: u32 = SLOT_STRIDE * 3;

pub fn read_binding(slot: u32) -> u32 {
    slot
}

pub fn sampler_binding(slot: u32) -> u32 {
    SAMPLER_BASE + slot
}

pub fn write_binding(slot: u32) -> u32 {
    WRITE_BASE + slot
}

pub fn counter_binding(slot: u32) -> u32 {
    COUNTER_BASE + slot
}

pub fn buffer(read_only: bool) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub fn storage_buffer_read_write() -> wgpu::BindingType {
    buffer(false)
}

pub fn storage_buffer_read_only() -> wgpu::BindingType {
    buffer(true)
}

pub fn sampler(filtering: wgpu::SamplerBindingType) -> wgpu::BindingType {
    wgpu::BindingType::Sampler(filtering)
}

pub fn texture_2d() -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}

pub fn depth_texture_2d() -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Depth,
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}

pub fn image_2d(format: wgpu::TextureFormat, access: wgpu::StorageTextureAccess) -> wgpu::BindingType {
    wgpu::BindingType::StorageTexture {
        access,
        view_dimension: wgpu::TextureViewDimension::D2,
        format,
    }
}

fn entry(binding: u32, stage: ShaderStage, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: stage.to_wgpu(),
        ty,
        count: None,
    }
}

/// Layout entry for read slot `slot`
pub fn read_entry(slot: u32, stage: ShaderStage, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    entry(read_binding(slot), stage, ty)
}

/// Layout entry for sampler slot `slot`
pub fn sampler_entry(
    slot: u32,
    stage: ShaderStage,
    filtering: wgpu::SamplerBindingType,
) -> wgpu::BindGroupLayoutEntry {
    entry(sampler_binding(slot), stage, sampler(filtering))
}

/// Layout entry for write slot `slot`
pub fn write_entry(slot: u32, stage: ShaderStage, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    entry(write_binding(slot), stage, ty)
}

/// Layout entry for the counter buffer at counter slot `slot`
pub fn counter_entry(slot: u32, stage: ShaderStage) -> wgpu::BindGroupLayoutEntry {
    entry(counter_binding(slot), stage, storage_buffer_read_write())
}
