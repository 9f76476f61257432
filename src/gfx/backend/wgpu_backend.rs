//! wgpu device backend
//!
//! wgpu has no per-slot bind calls: shaders see resources through bind
//! groups. This backend keeps a per-stage copy of the slot state the binding
//! tables push, and turns it into a `wgpu::BindGroup` on demand. A bind group
//! is rebuilt only after a slot of its stage changed.
//!
//! Binding numbers follow [`crate::wgpu_utils::binding_types`]: read slot N is
//! binding N, sampler slot N is `SAMPLER_BASE + N`, write slot N is
//! `WRITE_BASE + N` and the counter buffer for counter slot N is
//! `COUNTER_BASE + N`.

use std::sync::Arc;

use log::{debug, trace, warn};

use super::mipmap::MipmapGenerator;
use super::{
    DeviceCapabilities, DeviceId, GraphicsBackend, SamplerTarget, ShaderStage, SlotAssignment, ViewDescription,
};
use crate::error::{BindingError, Result};
use crate::gfx::resources::sampler::{MagFilter, MinFilter, SamplerParameters, WrapMode};
use crate::wgpu_utils::binding_types;

/// Native resource behind a `GpuResource` on wgpu
#[derive(Debug, Clone)]
pub enum WgpuResource {
    Texture(wgpu::Texture),
    Buffer {
        buffer: wgpu::Buffer,
        counter: Option<wgpu::Buffer>,
    },
}

/// Read or write view on wgpu
#[derive(Debug, Clone)]
pub enum WgpuView {
    Texture {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
    Buffer {
        buffer: wgpu::Buffer,
        offset: u64,
        size: Option<wgpu::BufferSize>,
        counter: Option<wgpu::Buffer>,
    },
}

impl WgpuView {
    pub fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            WgpuView::Texture { view, .. } => wgpu::BindingResource::TextureView(view),
            WgpuView::Buffer {
                buffer, offset, size, ..
            } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: *offset,
                size: *size,
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct WriteSlot {
    view: WgpuView,
    counter_slot: Option<u32>,
}

/// Slot state of one stage as last pushed by the binding tables
#[derive(Default)]
struct StageSlots {
    read: Vec<Option<WgpuView>>,
    write: Vec<Option<WriteSlot>>,
    samplers: Vec<Option<wgpu::Sampler>>,
    bind_group: Option<wgpu::BindGroup>,
}

impl StageSlots {
    fn new(caps: &DeviceCapabilities) -> Self {
        Self {
            read: vec![None; caps.max_slots_per_stage],
            write: vec![None; caps.max_write_slots_per_stage],
            samplers: vec![None; caps.max_sampler_slots_per_stage],
            bind_group: None,
        }
    }
}

/// Binding backend driving a wgpu device
pub struct WgpuBackend {
    device_id: DeviceId,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    capabilities: DeviceCapabilities,
    stages: [StageSlots; 3],
    mipmaps: MipmapGenerator,
}

impl WgpuBackend {
    /// Creates a backend with capabilities read from the device.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let mut capabilities = DeviceCapabilities::from_wgpu(device.features(), &device.limits());
        capabilities.max_slots_per_stage = capabilities.max_slots_per_stage.min(binding_types::SLOT_STRIDE as usize);
        capabilities.max_write_slots_per_stage = capabilities
            .max_write_slots_per_stage
            .min(binding_types::SLOT_STRIDE as usize);
        capabilities.max_sampler_slots_per_stage = capabilities
            .max_sampler_slots_per_stage
            .min(binding_types::SLOT_STRIDE as usize);
        Self::with_capabilities(device, queue, capabilities)
    }

    pub fn with_capabilities(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        capabilities: DeviceCapabilities,
    ) -> Self {
        let mipmaps = MipmapGenerator::new(&device);
        Self {
            device_id: DeviceId::next(),
            stages: std::array::from_fn(|_| StageSlots::new(&capabilities)),
            device,
            queue,
            capabilities,
            mipmaps,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Swaps in a recreated device after device loss.
    ///
    /// The backend keeps its [`DeviceId`]: objects bound to the lost device
    /// remain bound to this backend and recreate their native parts on next
    /// use. All slot state is dropped.
    pub fn replace_device(&mut self, device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) {
        debug!("Replacing wgpu device for {:?}", self.device_id);
        self.mipmaps = MipmapGenerator::new(&device);
        self.device = device;
        self.queue = queue;
        self.stages = std::array::from_fn(|_| StageSlots::new(&self.capabilities));
    }

    /// Bind group holding the stage's current slot state
    ///
    /// `layout` must be the stage's layout built with the binding-number
    /// conventions of [`binding_types`]. The group is cached until a slot of
    /// the stage changes.
    pub fn bind_group(&mut self, stage: ShaderStage, layout: &wgpu::BindGroupLayout) -> &wgpu::BindGroup {
        let device = &self.device;
        let slots = &mut self.stages[stage.index()];
        let (read, write, samplers) = (&slots.read, &slots.write, &slots.samplers);

        slots.bind_group.get_or_insert_with(|| {
            let mut entries = Vec::new();

            for (slot, view) in read.iter().enumerate() {
                if let Some(view) = view {
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding_types::read_binding(slot as u32),
                        resource: view.binding_resource(),
                    });
                }
            }
            for (slot, sampler) in samplers.iter().enumerate() {
                if let Some(sampler) = sampler {
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding_types::sampler_binding(slot as u32),
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                }
            }
            for (slot, write) in write.iter().enumerate() {
                let Some(write) = write else { continue };
                entries.push(wgpu::BindGroupEntry {
                    binding: binding_types::write_binding(slot as u32),
                    resource: write.view.binding_resource(),
                });
                if let (WgpuView::Buffer { counter: Some(counter), .. }, Some(counter_slot)) =
                    (&write.view, write.counter_slot)
                {
                    if counter_slot >= binding_types::SLOT_STRIDE {
                        warn!("{:?} counter slot {} has no binding number, skipping", stage, counter_slot);
                        continue;
                    }
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding_types::counter_binding(counter_slot),
                        resource: counter.as_entire_binding(),
                    });
                }
            }

            trace!("Building {:?} bind group with {} entries", stage, entries.len());
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{:?} Slot Bind Group", stage)),
                layout,
                entries: &entries,
            })
        })
    }

    /// Forces every stage's bind group to be rebuilt on next request.
    pub fn invalidate_bind_groups(&mut self) {
        for slots in &mut self.stages {
            slots.bind_group = None;
        }
    }

    fn slots_mut(&mut self, stage: ShaderStage) -> &mut StageSlots {
        let slots = &mut self.stages[stage.index()];
        slots.bind_group = None;
        slots
    }
}

/// Stores `value` at `index`, ignoring indices past the end.
fn store<T>(slots: &mut [Option<T>], index: usize, value: Option<T>, what: &str) {
    match slots.get_mut(index) {
        Some(slot) => *slot = value,
        None => warn!("{} slot {} is outside the stage's {} slots", what, index, slots.len()),
    }
}

fn filter_mode(linear: bool) -> wgpu::FilterMode {
    if linear {
        wgpu::FilterMode::Linear
    } else {
        wgpu::FilterMode::Nearest
    }
}

fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToBorder => wgpu::AddressMode::ClampToBorder,
    }
}

/// wgpu only offers three border colors; anything else falls back to
/// transparent black.
fn border_color(rgba: Option<[f32; 4]>) -> wgpu::SamplerBorderColor {
    match rgba {
        Some([r, g, b, a]) if r == 0.0 && g == 0.0 && b == 0.0 && a == 1.0 => wgpu::SamplerBorderColor::OpaqueBlack,
        Some([r, g, b, a]) if r == 1.0 && g == 1.0 && b == 1.0 && a == 1.0 => wgpu::SamplerBorderColor::OpaqueWhite,
        Some([r, g, b, a]) if r == 0.0 && g == 0.0 && b == 0.0 && a == 0.0 => {
            wgpu::SamplerBorderColor::TransparentBlack
        }
        Some(other) => {
            warn!("Border color {:?} has no wgpu equivalent, using transparent black", other);
            wgpu::SamplerBorderColor::TransparentBlack
        }
        None => wgpu::SamplerBorderColor::TransparentBlack,
    }
}

/// Translates resolved sampler parameters into a wgpu sampler descriptor
pub fn sampler_descriptor(params: &SamplerParameters) -> wgpu::SamplerDescriptor<'static> {
    let (min_linear, mip_linear) = match params.min_filter {
        MinFilter::Nearest | MinFilter::NearestMipmapNearest => (false, false),
        MinFilter::Linear | MinFilter::LinearMipmapNearest => (true, false),
        MinFilter::NearestMipmapLinear => (false, true),
        MinFilter::LinearMipmapLinear => (true, true),
    };
    let mag_linear = params.mag_filter == MagFilter::Linear;

    // wgpu rejects anisotropy unless every filter is linear
    let requested = params.max_anisotropy.map_or(1, |a| a.round().clamp(1.0, 16.0) as u16);
    let anisotropy_clamp = if min_linear && mag_linear && mip_linear { requested } else { 1 };

    let lod_max_clamp = if params.min_filter.uses_mipmaps() { params.max_lod } else { 0.0 };
    let needs_border = params.wrap.contains(&WrapMode::ClampToBorder);

    if params.lod_bias.is_some_and(|bias| bias != 0.0) {
        debug!("wgpu samplers have no LOD bias; ignoring {:?}", params.lod_bias);
    }

    wgpu::SamplerDescriptor {
        label: Some("Slot Sampler"),
        address_mode_u: address_mode(params.wrap[0]),
        address_mode_v: address_mode(params.wrap[1]),
        address_mode_w: address_mode(params.wrap[2]),
        mag_filter: filter_mode(mag_linear),
        min_filter: filter_mode(min_linear),
        mipmap_filter: filter_mode(mip_linear),
        lod_min_clamp: 0.0,
        lod_max_clamp,
        compare: params.compare.map(|f| f.to_wgpu()),
        anisotropy_clamp,
        border_color: needs_border.then(|| border_color(params.border_color)),
    }
}

impl GraphicsBackend for WgpuBackend {
    type Resource = WgpuResource;
    type ReadView = WgpuView;
    type WriteView = WgpuView;
    type Sampler = wgpu::Sampler;

    fn device_id(&self) -> DeviceId {
        self.device_id
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_read_view(&mut self, resource: &WgpuResource, desc: &ViewDescription) -> Result<WgpuView> {
        create_view(resource, desc, "read")
    }

    fn create_write_view(&mut self, resource: &WgpuResource, desc: &ViewDescription) -> Result<WgpuView> {
        create_view(resource, desc, "write")
    }

    fn set_read_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&WgpuView>) {
        trace!("{:?} read slot {} <- {}", stage, slot.storage_index, view.is_some());
        let slots = self.slots_mut(stage);
        store(&mut slots.read, slot.storage_index, view.cloned(), "read");
    }

    fn set_write_view(&mut self, stage: ShaderStage, slot: SlotAssignment, view: Option<&WgpuView>) {
        trace!("{:?} write slot {} <- {}", stage, slot.storage_index, view.is_some());
        let value = view.map(|view| WriteSlot {
            view: view.clone(),
            counter_slot: slot.counter_slot,
        });
        let slots = self.slots_mut(stage);
        store(&mut slots.write, slot.storage_index, value, "write");
    }

    fn create_sampler(&mut self, params: &SamplerParameters) -> Result<wgpu::Sampler> {
        Ok(self.device.create_sampler(&sampler_descriptor(params)))
    }

    fn set_sampler(&mut self, target: SamplerTarget, sampler: Option<&wgpu::Sampler>) {
        let slots = self.slots_mut(target.stage);
        store(&mut slots.samplers, target.slot, sampler.cloned(), "sampler");
    }

    fn set_texture_parameters(&mut self, target: SamplerTarget, params: &SamplerParameters) -> Result<()> {
        // No per-texture sampling state on wgpu: an equivalent sampler takes the slot.
        let sampler = self.create_sampler(params)?;
        self.set_sampler(target, Some(&sampler));
        Ok(())
    }

    fn generate_mips(&mut self, view: &WgpuView) -> Result<()> {
        match view {
            WgpuView::Texture { texture, .. } => self.mipmaps.generate(&self.device, &self.queue, texture),
            WgpuView::Buffer { .. } => Err(BindingError::backend("cannot generate mips for a buffer")),
        }
    }
}

fn create_view(resource: &WgpuResource, desc: &ViewDescription, access: &str) -> Result<WgpuView> {
    match (resource, desc) {
        (
            WgpuResource::Texture(texture),
            ViewDescription::Texture {
                base_mip_level,
                mip_level_count,
            },
        ) => {
            if *base_mip_level >= texture.mip_level_count() {
                return Err(BindingError::backend(format!(
                    "{} view of mip {} requested from a texture with {} mips",
                    access,
                    base_mip_level,
                    texture.mip_level_count()
                )));
            }
            let view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&format!("{} view", access)),
                base_mip_level: *base_mip_level,
                mip_level_count: *mip_level_count,
                ..Default::default()
            });
            Ok(WgpuView::Texture {
                texture: texture.clone(),
                view,
            })
        }
        (WgpuResource::Buffer { buffer, counter }, ViewDescription::Buffer { offset, size }) => Ok(WgpuView::Buffer {
            buffer: buffer.clone(),
            offset: *offset,
            size: size.and_then(wgpu::BufferSize::new),
            counter: counter.clone(),
        }),
        (WgpuResource::Texture(_), ViewDescription::Buffer { .. }) => Err(BindingError::backend(format!(
            "buffer {} view requested from a texture",
            access
        ))),
        (WgpuResource::Buffer { .. }, ViewDescription::Texture { .. }) => Err(BindingError::backend(format!(
            "texture {} view requested from a buffer",
            access
        ))),
    }
}
