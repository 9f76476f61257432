// src/gfx/resources/structured_buffer.rs
//! Structured (storage) buffer sources for the wgpu backend

use std::marker::PhantomData;

use crate::error::Result;
use crate::gfx::backend::{ViewDescription, WgpuBackend, WgpuResource};

use super::gpu_resource::{ResourceKind, ResourceSource};

/// Size of the append/consume counter that can accompany a buffer
pub const COUNTER_SIZE: u64 = 4;

/// Array of `Content` elements bound as a storage buffer
///
/// Read views bind it read-only; write views bind it read-write on compute,
/// together with its counter buffer when one was requested.
pub struct StructuredBufferSource<Content> {
    label: String,
    capacity: usize,
    has_counter: bool,
    initial_data: Option<Vec<u8>>,
    content_type: PhantomData<fn() -> Content>,
}

impl<Content: bytemuck::Pod> StructuredBufferSource<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        match type_name.rfind(':') {
            Some(pos) => &type_name[(pos + 1)..],
            None => type_name,
        }
    }

    /// Uninitialized buffer with room for `capacity` elements
    pub fn new(capacity: usize) -> Self {
        Self {
            label: format!("StructuredBuffer<{}>", Self::name()),
            capacity,
            has_counter: false,
            initial_data: None,
            content_type: PhantomData,
        }
    }

    /// Buffer holding a copy of `data`
    pub fn with_data(data: &[Content]) -> Self {
        let mut source = Self::new(data.len());
        source.initial_data = Some(bytemuck::cast_slice(data).to_vec());
        source
    }

    /// Allocates a hidden counter buffer next to the data.
    pub fn with_counter(mut self) -> Self {
        self.has_counter = true;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_counter(&self) -> bool {
        self.has_counter
    }

    /// Allocation size; wgpu wants non-empty buffers with 4-byte aligned sizes.
    pub fn byte_size(&self) -> u64 {
        let raw = (self.capacity * std::mem::size_of::<Content>()) as u64;
        wgpu::util::align_to(raw.max(COUNTER_SIZE), wgpu::COPY_BUFFER_ALIGNMENT)
    }
}

impl<Content: bytemuck::Pod> ResourceSource<WgpuBackend> for StructuredBufferSource<Content> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StructuredBuffer
    }

    fn create_native(&self, backend: &mut WgpuBackend) -> Result<WgpuResource> {
        let device = backend.device();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&self.label),
            size: self.byte_size(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: self.initial_data.is_some(),
        });

        if let Some(data) = &self.initial_data {
            {
                let mut mapped = buffer.slice(..).get_mapped_range_mut();
                mapped[..data.len()].copy_from_slice(data);
            }
            buffer.unmap();
        }

        let counter = self.has_counter.then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} Counter", self.label)),
                size: COUNTER_SIZE,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });

        Ok(WgpuResource::Buffer { buffer, counter })
    }

    fn read_view_description(&self) -> ViewDescription {
        ViewDescription::FULL_BUFFER
    }

    fn write_view_description(&self, _mip_level: u32) -> ViewDescription {
        ViewDescription::FULL_BUFFER
    }
}
