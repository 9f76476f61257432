//! Per-draw binding glue
//!
//! [`BindingOrchestrator`] owns the binding state of every shader stage and
//! drives it from shader reflection data. Before each draw or dispatch,
//! [`BindingOrchestrator::apply_all`] pushes whatever changed.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use super::dirty_set::DirtySet;
use super::resource_table::{Partition, ResourceBindingTable, ShaderResourceInfo};
use super::texture_set::{ActiveTextureSet, RenderTargetBinding};
use crate::error::{BindingError, Result};
use crate::gfx::backend::{DeviceCapabilities, GraphicsBackend, SamplerTarget, ShaderStage};
use crate::gfx::resources::{GpuResource, ResourceId, SamplerConfiguration};

/// Sampler configuration shared between slots and stages
pub type SharedSampler<B> = Arc<Mutex<SamplerConfiguration<B>>>;

/// Tracked entries below this count are never pruned
const TRACK_PRUNE_THRESHOLD: usize = 64;

/// One resource a shader program declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedResource {
    pub name: String,
    pub info: ShaderResourceInfo,
}

/// Resources one program stage declares, as produced by shader reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    pub program: u64,
    pub stage: ShaderStage,
    pub resources: Vec<ReflectedResource>,
}

struct StageBindings<B: GraphicsBackend> {
    program: Option<u64>,
    resources: ResourceBindingTable<B>,
    textures: ActiveTextureSet<B>,
    samplers: Vec<Option<SharedSampler<B>>>,
    sampler_dirty: DirtySet,
    sampler_applied: DirtySet,
    /// Slots whose sampler was last activated with mipmaps
    sampler_mipmapped: DirtySet,
}

impl<B: GraphicsBackend> StageBindings<B> {
    fn new(stage: ShaderStage, capabilities: &DeviceCapabilities) -> Self {
        let sampler_slots = capabilities.max_sampler_slots_per_stage;
        Self {
            program: None,
            resources: ResourceBindingTable::new(stage, capabilities),
            textures: ActiveTextureSet::new(stage, capabilities),
            samplers: (0..sampler_slots).map(|_| None).collect(),
            sampler_dirty: DirtySet::with_capacity(sampler_slots),
            sampler_applied: DirtySet::with_capacity(sampler_slots),
            sampler_mipmapped: DirtySet::with_capacity(sampler_slots),
        }
    }

    fn apply_samplers(&mut self, backend: &mut B, stage: ShaderStage) -> Result<()> {
        while let Some(slot) = self.sampler_dirty.pop_first() {
            let target = SamplerTarget { stage, slot };
            match &self.samplers[slot] {
                Some(sampler) => {
                    let use_mipmaps = self
                        .textures
                        .texture(slot)
                        .is_some_and(|texture| texture.mip_levels() > 1);
                    if let Err(err) = sampler.lock().activate(backend, target, use_mipmaps) {
                        self.sampler_dirty.insert(slot);
                        return Err(err);
                    }
                    self.sampler_applied.insert(slot);
                    if use_mipmaps {
                        self.sampler_mipmapped.insert(slot);
                    } else {
                        self.sampler_mipmapped.remove(slot);
                    }
                }
                None => {
                    backend.set_sampler(target, None);
                    self.sampler_applied.remove(slot);
                    self.sampler_mipmapped.remove(slot);
                }
            }
        }
        Ok(())
    }

    fn mark_all_bound_dirty(&mut self) {
        self.resources.mark_all_bound_dirty();
        self.textures.mark_all_bound_dirty();
        for (slot, sampler) in self.samplers.iter().enumerate() {
            if sampler.is_some() {
                self.sampler_dirty.insert(slot);
            }
        }
        self.sampler_dirty.union_with(&self.sampler_applied);
    }
}

/// Binding state of the vertex, fragment and compute stages
pub struct BindingOrchestrator<B: GraphicsBackend> {
    stages: [StageBindings<B>; 3],
    render_targets: Vec<RenderTargetBinding>,
    tracked_resources: HashMap<ResourceId, Weak<GpuResource<B>>>,
    tracked_samplers: HashMap<usize, Weak<Mutex<SamplerConfiguration<B>>>>,
    prune_at: usize,
}

impl<B: GraphicsBackend> BindingOrchestrator<B> {
    pub fn new(capabilities: &DeviceCapabilities) -> Self {
        Self {
            stages: ShaderStage::ALL.map(|stage| StageBindings::new(stage, capabilities)),
            render_targets: Vec::new(),
            tracked_resources: HashMap::new(),
            tracked_samplers: HashMap::new(),
            prune_at: TRACK_PRUNE_THRESHOLD,
        }
    }

    fn stage_mut(&mut self, stage: ShaderStage) -> &mut StageBindings<B> {
        &mut self.stages[stage.index()]
    }

    pub fn resources(&self, stage: ShaderStage) -> &ResourceBindingTable<B> {
        &self.stages[stage.index()].resources
    }

    pub fn textures(&self, stage: ShaderStage) -> &ActiveTextureSet<B> {
        &self.stages[stage.index()].textures
    }

    pub fn render_targets(&self) -> &[RenderTargetBinding] {
        &self.render_targets
    }

    /// Program currently bound to `stage`
    pub fn program(&self, stage: ShaderStage) -> Option<u64> {
        self.stages[stage.index()].program
    }

    /// Registers `resource` for device-reset invalidation. Held weakly.
    pub fn track(&mut self, resource: &Arc<GpuResource<B>>) {
        self.prune_tracked();
        self.tracked_resources
            .entry(resource.id())
            .or_insert_with(|| Arc::downgrade(resource));
    }

    fn track_sampler(&mut self, sampler: &SharedSampler<B>) {
        self.prune_tracked();
        // A live Weak pins the allocation, so the address cannot be reused
        // while the entry exists.
        self.tracked_samplers
            .entry(Arc::as_ptr(sampler) as usize)
            .or_insert_with(|| Arc::downgrade(sampler));
    }

    /// Drops entries of dead objects once the tracked count doubles.
    fn prune_tracked(&mut self) {
        if self.tracked_resources.len() + self.tracked_samplers.len() < self.prune_at {
            return;
        }
        self.tracked_resources.retain(|_, weak| weak.strong_count() > 0);
        self.tracked_samplers.retain(|_, weak| weak.strong_count() > 0);
        let live = self.tracked_resources.len() + self.tracked_samplers.len();
        self.prune_at = (live * 2).max(TRACK_PRUNE_THRESHOLD);
        trace!("Pruned tracked objects, {} still alive", live);
    }

    fn is_render_target(&self, resource: &GpuResource<B>) -> bool {
        self.render_targets.iter().any(|target| target.target == resource.id())
    }

    /// Read slots of `stage` holding both a texture and a read-only shader
    /// resource. Both are pushed through the same device slot.
    pub fn shared_read_slots(&self, stage: ShaderStage) -> Vec<usize> {
        let bindings = &self.stages[stage.index()];
        (0..bindings.textures.max_textures())
            .filter(|&slot| {
                bindings.textures.texture(slot).is_some()
                    && bindings.resources.binding(Partition::ReadOnly, slot).is_some()
            })
            .collect()
    }

    fn warn_if_read_slot_shared(&self, stage: ShaderStage, slot: usize) {
        let bindings = &self.stages[stage.index()];
        if bindings.textures.texture(slot).is_some() && bindings.resources.binding(Partition::ReadOnly, slot).is_some() {
            warn!(
                "{:?} read slot {} holds a texture and a shader resource, they overwrite each other",
                stage, slot
            );
        }
    }

    /// Binds the resources a program stage declares.
    ///
    /// Switching to a different program clears the stage's resource table
    /// first. Resources `resolve` cannot find are skipped.
    ///
    /// # Arguments
    /// * `reflection` - Resources declared by the program stage
    /// * `resolve` - Looks a resource up by its shader name
    pub fn bind_program(
        &mut self,
        reflection: &ShaderReflection,
        resolve: impl Fn(&str) -> Option<Arc<GpuResource<B>>>,
    ) -> Result<()> {
        let stage = self.stage_mut(reflection.stage);
        if stage.program != Some(reflection.program) {
            debug!(
                "{:?} program changed {:?} -> {}",
                reflection.stage, stage.program, reflection.program
            );
            stage.resources.clear();
            stage.program = Some(reflection.program);
        }

        for reflected in &reflection.resources {
            match resolve(&reflected.name) {
                Some(resource) => self.set_resource(reflection.stage, &resource, reflected.info)?,
                None => warn!(
                    "{:?} program {} declares '{}' but no resource is assigned",
                    reflection.stage, reflection.program, reflected.name
                ),
            }
        }
        Ok(())
    }

    /// Binds `texture` at `slot`, or unbinds the slot with `None`.
    ///
    /// A current render target is never bound for sampling: the slot is left
    /// empty instead.
    pub fn set_texture(&mut self, stage: ShaderStage, slot: usize, texture: Option<&Arc<GpuResource<B>>>) -> Result<()> {
        let texture = match texture {
            Some(texture) if self.is_render_target(texture) => {
                warn!(
                    "'{}' is a current render target, leaving {:?} texture slot {} empty",
                    texture.label(),
                    stage,
                    slot
                );
                None
            }
            texture => texture,
        };

        let bindings = self.stage_mut(stage);
        if !bindings.textures.set_texture(slot, texture)? {
            return Ok(());
        }
        // Mipmap use of the slot's sampler follows the texture.
        let use_mipmaps = texture.is_some_and(|texture| texture.mip_levels() > 1);
        if bindings.samplers.get(slot).is_some_and(Option::is_some)
            && bindings.sampler_mipmapped.contains(slot) != use_mipmaps
        {
            bindings.sampler_dirty.insert(slot);
        }

        if let Some(texture) = texture {
            self.track(texture);
            self.warn_if_read_slot_shared(stage, slot);
        }
        Ok(())
    }

    /// Binds `sampler` at `slot`, or unbinds the slot with `None`.
    pub fn set_sampler(&mut self, stage: ShaderStage, slot: usize, sampler: Option<SharedSampler<B>>) -> Result<()> {
        if let Some(sampler) = &sampler {
            self.track_sampler(sampler);
        }

        let bindings = self.stage_mut(stage);
        let Some(entry) = bindings.samplers.get_mut(slot) else {
            return Err(BindingError::InvalidBinding {
                stage,
                slot: slot as u32,
                reason: "sampler slot exceeds the stage's capacity",
            });
        };

        let unchanged = match (entry.as_ref(), sampler.as_ref()) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            *entry = sampler;
            bindings.sampler_dirty.insert(slot);
        }
        Ok(())
    }

    pub fn set_resource(
        &mut self,
        stage: ShaderStage,
        resource: &Arc<GpuResource<B>>,
        info: ShaderResourceInfo,
    ) -> Result<()> {
        self.stage_mut(stage).resources.set_resource(resource, info)?;
        self.track(resource);
        if !info.write_access {
            let slot = self.resources(stage).storage_index(info.binding_slot);
            self.warn_if_read_slot_shared(stage, slot);
        }
        Ok(())
    }

    /// Records the active render targets and unbinds them from every
    /// stage's texture slots. Until the targets change, `set_texture` refuses
    /// to bind them. Returns the number of slots cleared.
    pub fn set_render_targets(&mut self, backend: &mut B, targets: &[RenderTargetBinding]) -> usize {
        self.render_targets = targets.to_vec();
        self.stages
            .iter_mut()
            .map(|stage| stage.textures.clear_hazards(backend, targets))
            .sum()
    }

    /// Pushes pending changes of every stage: textures, then samplers, then
    /// shader resources.
    pub fn apply_all(&mut self, backend: &mut B) -> Result<()> {
        for stage in ShaderStage::ALL {
            let bindings = &mut self.stages[stage.index()];
            bindings.textures.apply_all(backend)?;
            bindings.apply_samplers(backend, stage)?;
            bindings.resources.apply_all(backend)?;
        }
        Ok(())
    }

    /// Drops native objects of every tracked resource and sampler and marks
    /// all bound slots dirty, so the next `apply_all` re-pushes everything.
    pub fn device_reset(&mut self) {
        self.tracked_resources.retain(|_, weak| match weak.upgrade() {
            Some(resource) => {
                resource.invalidate_on_device_reset();
                true
            }
            None => false,
        });
        self.tracked_samplers.retain(|_, weak| match weak.upgrade() {
            Some(sampler) => {
                sampler.lock().invalidate_on_device_reset();
                true
            }
            None => false,
        });

        for stage in &mut self.stages {
            stage.mark_all_bound_dirty();
        }
        debug!(
            "Device reset: invalidated {} resources and {} samplers",
            self.tracked_resources.len(),
            self.tracked_samplers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::RecordedSource;
    use crate::gfx::backend::{BackendCall, RecordingBackend};
    use crate::gfx::resources::SamplerState;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup() -> (RecordingBackend, BindingOrchestrator<RecordingBackend>) {
        init_logger();
        let backend = RecordingBackend::new(DeviceCapabilities::default());
        let orchestrator = BindingOrchestrator::new(backend.capabilities());
        (backend, orchestrator)
    }

    fn reflection(program: u64, stage: ShaderStage, names: &[(&str, ShaderResourceInfo)]) -> ShaderReflection {
        ShaderReflection {
            program,
            stage,
            resources: names
                .iter()
                .map(|(name, info)| ReflectedResource {
                    name: name.to_string(),
                    info: *info,
                })
                .collect(),
        }
    }

    #[test]
    fn test_bind_program_resolves_by_name() {
        let (mut backend, mut orchestrator) = setup();
        let particles = GpuResource::new("particles", RecordedSource::structured_buffer());
        let noise = GpuResource::new("noise", RecordedSource::texture(1));

        let program = reflection(
            7,
            ShaderStage::Compute,
            &[
                ("particles", ShaderResourceInfo::write(0)),
                ("noise", ShaderResourceInfo::read(1)),
                ("missing", ShaderResourceInfo::read(2)),
            ],
        );
        orchestrator
            .bind_program(&program, |name| match name {
                "particles" => Some(Arc::clone(&particles)),
                "noise" => Some(Arc::clone(&noise)),
                _ => None,
            })
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();

        assert_eq!(orchestrator.program(ShaderStage::Compute), Some(7));
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetReadView { view: Some(_), .. })), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetWriteView { view: Some(_), .. })), 1);
    }

    #[test]
    fn test_program_change_clears_stage() {
        let (mut backend, mut orchestrator) = setup();
        let a = GpuResource::new("a", RecordedSource::texture(1));
        let resolve = |_: &str| Some(Arc::clone(&a));

        orchestrator
            .bind_program(&reflection(1, ShaderStage::Fragment, &[("a", ShaderResourceInfo::read(4))]), resolve)
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        backend.take_calls();

        orchestrator
            .bind_program(&reflection(2, ShaderStage::Fragment, &[("a", ShaderResourceInfo::read(1))]), resolve)
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();

        let slots: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetReadView { slot, view, .. } => Some((slot.storage_index, view.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![(1, true), (4, false)]);
    }

    #[test]
    fn test_write_access_on_fragment_fails() {
        let (_, mut orchestrator) = setup();
        let buffer = GpuResource::new("buffer", RecordedSource::structured_buffer());
        let result = orchestrator.set_resource(ShaderStage::Fragment, &buffer, ShaderResourceInfo::write(0));
        assert!(matches!(result, Err(BindingError::InvalidBinding { .. })));
    }

    #[test]
    fn test_render_targets_clear_hazards_on_all_stages() {
        let (mut backend, mut orchestrator) = setup();
        let target = GpuResource::new("target", RecordedSource::texture(1));
        orchestrator.set_texture(ShaderStage::Vertex, 0, Some(&target)).unwrap();
        orchestrator.set_texture(ShaderStage::Fragment, 3, Some(&target)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        backend.take_calls();

        let cleared = orchestrator.set_render_targets(&mut backend, &[RenderTargetBinding::new(&target)]);
        assert_eq!(cleared, 2);
        assert_eq!(orchestrator.render_targets().len(), 1);
        assert!(orchestrator.textures(ShaderStage::Fragment).texture(3).is_none());
    }

    #[test]
    fn test_current_render_target_is_not_bound_for_sampling() {
        let (mut backend, mut orchestrator) = setup();
        let target = GpuResource::new("target", RecordedSource::texture(1));
        orchestrator.set_render_targets(&mut backend, &[RenderTargetBinding::new(&target)]);

        orchestrator.set_texture(ShaderStage::Fragment, 3, Some(&target)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert!(orchestrator.textures(ShaderStage::Fragment).texture(3).is_none());
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetReadView { view: Some(_), .. })), 0);

        orchestrator.set_render_targets(&mut backend, &[]);
        orchestrator.set_texture(ShaderStage::Fragment, 3, Some(&target)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert!(orchestrator.textures(ShaderStage::Fragment).texture(3).is_some());
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetReadView { view: Some(_), .. })), 1);
    }

    #[test]
    fn test_dropped_objects_leave_tracking() {
        let (_, mut orchestrator) = setup();
        let kept: Vec<_> = (0..200)
            .map(|i| GpuResource::new(format!("kept{}", i), RecordedSource::texture(1)))
            .collect();
        for resource in &kept {
            orchestrator.track(resource);
        }

        for i in 0..10_000 {
            let transient = GpuResource::new(format!("transient{}", i), RecordedSource::texture(1));
            orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&transient)).unwrap();
        }
        for _ in 0..1_000 {
            let sampler: SharedSampler<RecordingBackend> =
                Arc::new(Mutex::new(SamplerConfiguration::new(SamplerState::default())));
            orchestrator.set_sampler(ShaderStage::Fragment, 0, Some(sampler)).unwrap();
        }

        let tracked = orchestrator.tracked_resources.len() + orchestrator.tracked_samplers.len();
        assert!(tracked < 2 * (kept.len() + 2), "{} objects still tracked", tracked);
        assert!(kept
            .iter()
            .all(|resource| orchestrator.tracked_resources.contains_key(&resource.id())));
    }

    #[test]
    fn test_sampler_is_rebound_only_when_mip_use_changes() {
        let (mut backend, mut orchestrator) = setup();
        let plain = GpuResource::new("plain", RecordedSource::texture(1));
        let other = GpuResource::new("other", RecordedSource::texture(1));
        let mipped = GpuResource::new("mipped", RecordedSource::texture(4));
        let sampler: SharedSampler<RecordingBackend> =
            Arc::new(Mutex::new(SamplerConfiguration::new(SamplerState::linear_wrap())));

        orchestrator
            .set_sampler(ShaderStage::Fragment, 0, Some(Arc::clone(&sampler)))
            .unwrap();
        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&plain)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        backend.take_calls();

        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&plain)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert!(backend.calls().is_empty());

        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&other)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetReadView { .. })), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetSampler { .. })), 0);

        backend.take_calls();
        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&mipped)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetSampler { .. })), 1);
    }

    #[test]
    fn test_shared_read_slots_are_reported() {
        let (_, mut orchestrator) = setup();
        let albedo = GpuResource::new("albedo", RecordedSource::texture(1));
        let lights = GpuResource::new("lights", RecordedSource::structured_buffer());

        orchestrator.set_texture(ShaderStage::Fragment, 2, Some(&albedo)).unwrap();
        orchestrator
            .set_resource(ShaderStage::Fragment, &lights, ShaderResourceInfo::read(3))
            .unwrap();
        assert!(orchestrator.shared_read_slots(ShaderStage::Fragment).is_empty());

        orchestrator
            .set_resource(ShaderStage::Fragment, &lights, ShaderResourceInfo::read(2))
            .unwrap();
        assert_eq!(orchestrator.shared_read_slots(ShaderStage::Fragment), vec![2]);
        assert!(orchestrator.shared_read_slots(ShaderStage::Vertex).is_empty());
    }

    #[test]
    fn test_sampler_follows_texture_mip_levels() {
        let (mut backend, mut orchestrator) = setup();
        let mipped = GpuResource::new("mipped", RecordedSource::texture(4));
        let sampler: SharedSampler<RecordingBackend> =
            Arc::new(Mutex::new(SamplerConfiguration::new(SamplerState::linear_wrap())));

        orchestrator
            .set_sampler(ShaderStage::Fragment, 0, Some(Arc::clone(&sampler)))
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&mipped)).unwrap();
        orchestrator.apply_all(&mut backend).unwrap();

        let created: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::CreateSampler { params, .. } => Some(params.min_filter.uses_mipmaps()),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![false, true]);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::SetSampler { .. })), 2);
    }

    #[test]
    fn test_same_sampler_is_not_rebound() {
        let (mut backend, mut orchestrator) = setup();
        let sampler: SharedSampler<RecordingBackend> =
            Arc::new(Mutex::new(SamplerConfiguration::new(SamplerState::point_clamp())));

        orchestrator
            .set_sampler(ShaderStage::Fragment, 2, Some(Arc::clone(&sampler)))
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        backend.take_calls();

        orchestrator
            .set_sampler(ShaderStage::Fragment, 2, Some(Arc::clone(&sampler)))
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        assert!(backend.calls().is_empty());

        assert!(orchestrator.set_sampler(ShaderStage::Fragment, 16, None).is_err());
    }

    #[test]
    fn test_device_reset_recreates_and_repushes() {
        let (mut backend, mut orchestrator) = setup();
        let texture = GpuResource::new("albedo", RecordedSource::texture(1));
        let sampler: SharedSampler<RecordingBackend> =
            Arc::new(Mutex::new(SamplerConfiguration::new(SamplerState::default())));

        orchestrator.set_texture(ShaderStage::Fragment, 0, Some(&texture)).unwrap();
        orchestrator
            .set_sampler(ShaderStage::Fragment, 0, Some(Arc::clone(&sampler)))
            .unwrap();
        orchestrator.apply_all(&mut backend).unwrap();
        backend.take_calls();

        orchestrator.device_reset();
        assert!(!texture.has_native());
        assert!(!sampler.lock().has_native());

        orchestrator.apply_all(&mut backend).unwrap();
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateResource { .. })), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateSampler { .. })), 1);
        assert_eq!(backend.slot_calls(), 2);
    }
}
