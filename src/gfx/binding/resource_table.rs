//! Per-stage table of shader resources
//!
//! A [`ResourceBindingTable`] mirrors what one shader stage should see in its
//! read-only and read-write slots. Mutations only touch CPU state and mark
//! slots dirty; [`ResourceBindingTable::apply_all`] pushes exactly the dirty
//! slots to the device.

use std::sync::{Arc, Weak};

use log::{debug, trace};

use super::dirty_set::DirtySet;
use crate::error::{BindingError, Result};
use crate::gfx::backend::{DeviceCapabilities, DeviceId, GraphicsBackend, ShaderStage, SlotAssignment, SlotTransform};
use crate::gfx::resources::GpuResource;

/// Binding metadata produced by shader reflection for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderResourceInfo {
    /// Register number as declared by the shader
    pub binding_slot: u32,
    pub write_access: bool,
    /// Slot of the emulated append/consume counter buffer, if any
    pub counter_slot: Option<u32>,
}

impl ShaderResourceInfo {
    pub fn read(binding_slot: u32) -> Self {
        Self {
            binding_slot,
            write_access: false,
            counter_slot: None,
        }
    }

    pub fn write(binding_slot: u32) -> Self {
        Self {
            binding_slot,
            write_access: true,
            counter_slot: None,
        }
    }

    pub fn with_counter(mut self, counter_slot: u32) -> Self {
        self.counter_slot = Some(counter_slot);
        self
    }
}

/// A resource observed (not owned) by a table
pub struct ResourceBinding<B: GraphicsBackend> {
    pub resource: Weak<GpuResource<B>>,
    /// Logical slot, before any slot transform
    pub slot: u32,
    pub counter_slot: Option<u32>,
}

impl<B: GraphicsBackend> ResourceBinding<B> {
    /// The resource, if it is still alive and not disposed
    pub fn live(&self) -> Option<Arc<GpuResource<B>>> {
        self.resource.upgrade().filter(|resource| !resource.is_disposed())
    }
}

impl<B: GraphicsBackend> Clone for ResourceBinding<B> {
    fn clone(&self) -> Self {
        Self {
            resource: Weak::clone(&self.resource),
            slot: self.slot,
            counter_slot: self.counter_slot,
        }
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for ResourceBinding<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("resource", &self.live().map(|r| r.id()))
            .field("slot", &self.slot)
            .field("counter_slot", &self.counter_slot)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    ReadOnly,
    ReadWrite,
}

struct PartitionState<B: GraphicsBackend> {
    bindings: Vec<Option<ResourceBinding<B>>>,
    dirty: DirtySet,
    /// Storage indices that currently hold a view on the device
    applied: DirtySet,
}

impl<B: GraphicsBackend> PartitionState<B> {
    fn new(capacity: usize) -> Self {
        Self {
            bindings: (0..capacity).map(|_| None).collect(),
            dirty: DirtySet::with_capacity(capacity),
            applied: DirtySet::with_capacity(capacity),
        }
    }

    fn clear(&mut self) {
        self.bindings.iter_mut().for_each(|binding| *binding = None);
        self.dirty.union_with(&self.applied);
    }

    fn mark_all_bound_dirty(&mut self) {
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.is_some() {
                self.dirty.insert(index);
            }
        }
        self.dirty.union_with(&self.applied);
    }

    fn bound_count(&self) -> usize {
        self.bindings.iter().filter(|binding| binding.is_some()).count()
    }

    fn assignment(&self, index: usize) -> SlotAssignment {
        match &self.bindings[index] {
            Some(binding) => SlotAssignment {
                storage_index: index,
                logical_slot: binding.slot,
                counter_slot: binding.counter_slot,
            },
            None => SlotAssignment::direct(index),
        }
    }
}

/// Read-only and read-write resource slots of one shader stage
pub struct ResourceBindingTable<B: GraphicsBackend> {
    stage: ShaderStage,
    transform: SlotTransform,
    read: PartitionState<B>,
    write: PartitionState<B>,
    device: Option<DeviceId>,
}

impl<B: GraphicsBackend> ResourceBindingTable<B> {
    /// Creates an empty table sized from `capabilities`.
    ///
    /// # Arguments
    /// * `stage` - Stage whose slots the table mirrors
    /// * `capabilities` - Slot counts and slot transform of the target device
    pub fn new(stage: ShaderStage, capabilities: &DeviceCapabilities) -> Self {
        Self {
            stage,
            transform: capabilities.slot_transform,
            read: PartitionState::new(capabilities.max_slots_per_stage),
            write: PartitionState::new(capabilities.max_write_slots_per_stage),
            device: None,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn max_readable_resources(&self) -> usize {
        self.read.bindings.len()
    }

    pub fn max_writeable_resources(&self) -> usize {
        self.write.bindings.len()
    }

    /// Index `logical_slot` is stored at after the slot transform
    pub fn storage_index(&self, logical_slot: u32) -> usize {
        self.transform.storage_index(logical_slot)
    }

    /// Binds `resource` at the slot `info` describes and marks it dirty.
    ///
    /// Fails without touching the table when write access is requested
    /// outside compute, or when the slot or counter slot does not fit the
    /// stage's capacity.
    pub fn set_resource(&mut self, resource: &Arc<GpuResource<B>>, info: ShaderResourceInfo) -> Result<()> {
        if info.write_access && !self.stage.supports_write_access() {
            return Err(BindingError::InvalidBinding {
                stage: self.stage,
                slot: info.binding_slot,
                reason: "only compute shaders can bind read-write resources",
            });
        }

        if let Some(counter_slot) = info.counter_slot {
            if counter_slot as usize >= self.write.bindings.len() {
                return Err(BindingError::InvalidBinding {
                    stage: self.stage,
                    slot: counter_slot,
                    reason: "counter slot exceeds the stage's write capacity",
                });
            }
        }

        let index = self.storage_index(info.binding_slot);
        let partition = if info.write_access {
            &mut self.write
        } else {
            &mut self.read
        };
        let Some(entry) = partition.bindings.get_mut(index) else {
            return Err(BindingError::InvalidBinding {
                stage: self.stage,
                slot: info.binding_slot,
                reason: "slot exceeds the stage's capacity",
            });
        };

        *entry = Some(ResourceBinding {
            resource: Arc::downgrade(resource),
            slot: info.binding_slot,
            counter_slot: info.counter_slot,
        });
        partition.dirty.insert(index);
        trace!(
            "{:?} {} slot {} (storage {}) <- '{}'",
            self.stage,
            if info.write_access { "write" } else { "read" },
            info.binding_slot,
            index,
            resource.label()
        );
        Ok(())
    }

    /// Empties both partitions.
    ///
    /// Slots still holding a view on the device stay dirty, so the next
    /// `apply_all` unbinds each of them once.
    pub fn clear(&mut self) {
        self.read.clear();
        self.write.clear();
    }

    /// Marks every bound slot dirty, e.g. after the device was recreated.
    pub fn mark_all_bound_dirty(&mut self) {
        self.read.mark_all_bound_dirty();
        self.write.mark_all_bound_dirty();
    }

    pub fn bound_count(&self, partition: Partition) -> usize {
        self.partition(partition).bound_count()
    }

    pub fn binding(&self, partition: Partition, storage_index: usize) -> Option<&ResourceBinding<B>> {
        self.partition(partition).bindings.get(storage_index)?.as_ref()
    }

    /// Whether the next `apply_all` has work to do
    pub fn has_pending(&self) -> bool {
        !self.read.dirty.is_empty() || !self.write.dirty.is_empty()
    }

    fn partition(&self, partition: Partition) -> &PartitionState<B> {
        match partition {
            Partition::ReadOnly => &self.read,
            Partition::ReadWrite => &self.write,
        }
    }

    /// Pushes every dirty slot to the device, read-only slots first.
    ///
    /// Slots whose resource was dropped or disposed are cleared on the device.
    pub fn apply_all(&mut self, backend: &mut B) -> Result<()> {
        let found = backend.device_id();
        match self.device {
            Some(expected) if expected != found => return Err(BindingError::DeviceMismatch { expected, found }),
            Some(_) => {}
            None => {
                debug!("{:?} resource table bound to {:?}", self.stage, found);
                self.device = Some(found);
            }
        }

        let stage = self.stage;
        while let Some(index) = self.read.dirty.pop_first() {
            let assignment = self.read.assignment(index);
            let live = self.read.bindings[index].as_ref().and_then(ResourceBinding::live);
            let view = match live.map(|resource| resource.read_view(backend)).transpose() {
                Ok(view) => view,
                Err(BindingError::DisposedResource { .. }) => None,
                Err(err) => {
                    self.read.dirty.insert(index);
                    return Err(err);
                }
            };
            backend.set_read_view(stage, assignment, view.as_deref());
            if view.is_some() {
                self.read.applied.insert(index);
            } else {
                self.read.applied.remove(index);
            }
        }

        while let Some(index) = self.write.dirty.pop_first() {
            let assignment = self.write.assignment(index);
            let live = self.write.bindings[index].as_ref().and_then(ResourceBinding::live);
            let view = match live.map(|resource| resource.write_view(backend)).transpose() {
                Ok(view) => view,
                Err(BindingError::DisposedResource { .. }) => None,
                Err(err) => {
                    self.write.dirty.insert(index);
                    return Err(err);
                }
            };
            backend.set_write_view(stage, assignment, view.as_deref());
            if view.is_some() {
                self.write.applied.insert(index);
            } else {
                self.write.applied.remove(index);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{RecordedResource, RecordedSource};
    use crate::gfx::backend::{BackendCall, RecordingBackend, ViewDescription};
    use crate::gfx::resources::{ResourceKind, ResourceSource};

    fn texture(label: &str) -> Arc<GpuResource<RecordingBackend>> {
        GpuResource::new(label, RecordedSource::texture(1))
    }

    fn buffer(label: &str) -> Arc<GpuResource<RecordingBackend>> {
        GpuResource::new(label, RecordedSource::structured_buffer())
    }

    fn setup(stage: ShaderStage) -> (RecordingBackend, ResourceBindingTable<RecordingBackend>) {
        let backend = RecordingBackend::new(DeviceCapabilities::default());
        let table = ResourceBindingTable::new(stage, backend.capabilities());
        (backend, table)
    }

    #[test]
    fn test_apply_issues_one_call_per_dirty_slot() {
        let (mut backend, mut table) = setup(ShaderStage::Fragment);
        let a = texture("a");
        let b = texture("b");

        table.set_resource(&a, ShaderResourceInfo::read(0)).unwrap();
        table.set_resource(&b, ShaderResourceInfo::read(5)).unwrap();
        table.set_resource(&b, ShaderResourceInfo::read(5)).unwrap();
        table.apply_all(&mut backend).unwrap();
        assert_eq!(backend.slot_calls(), 2);

        backend.take_calls();
        table.apply_all(&mut backend).unwrap();
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_slots_apply_in_ascending_order() {
        let (mut backend, mut table) = setup(ShaderStage::Compute);
        let r = texture("r");
        let w = buffer("w");

        table.set_resource(&w, ShaderResourceInfo::write(1)).unwrap();
        table.set_resource(&r, ShaderResourceInfo::read(7)).unwrap();
        table.set_resource(&r, ShaderResourceInfo::read(2)).unwrap();
        table.apply_all(&mut backend).unwrap();

        let slots: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetReadView { slot, .. } => Some(("read", slot.storage_index)),
                BackendCall::SetWriteView { slot, .. } => Some(("write", slot.storage_index)),
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![("read", 2), ("read", 7), ("write", 1)]);
    }

    #[test]
    fn test_write_access_outside_compute_is_rejected() {
        let (mut backend, mut table) = setup(ShaderStage::Fragment);
        let w = buffer("w");

        let result = table.set_resource(&w, ShaderResourceInfo::write(0));
        assert!(matches!(
            result,
            Err(BindingError::InvalidBinding {
                stage: ShaderStage::Fragment,
                slot: 0,
                ..
            })
        ));
        assert_eq!(table.bound_count(Partition::ReadWrite), 0);
        assert!(!table.has_pending());

        table.apply_all(&mut backend).unwrap();
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_slot_out_of_range_is_rejected() {
        let (_, mut table) = setup(ShaderStage::Compute);
        let w = buffer("w");
        let result = table.set_resource(&w, ShaderResourceInfo::write(8));
        assert!(matches!(result, Err(BindingError::InvalidBinding { .. })));
        assert!(!table.has_pending());
    }

    #[test]
    fn test_counter_slot_out_of_range_is_rejected() {
        let (_, mut table) = setup(ShaderStage::Compute);
        let w = buffer("w");

        let result = table.set_resource(&w, ShaderResourceInfo::write(0).with_counter(8));
        assert!(matches!(result, Err(BindingError::InvalidBinding { slot: 8, .. })));
        let result = table.set_resource(&w, ShaderResourceInfo::write(0).with_counter(u32::MAX));
        assert!(matches!(result, Err(BindingError::InvalidBinding { .. })));
        assert_eq!(table.bound_count(Partition::ReadWrite), 0);
        assert!(!table.has_pending());

        table.set_resource(&w, ShaderResourceInfo::write(0).with_counter(7)).unwrap();
        assert_eq!(table.binding(Partition::ReadWrite, 0).unwrap().counter_slot, Some(7));
    }

    struct BrokenSource;

    impl ResourceSource<RecordingBackend> for BrokenSource {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Texture
        }

        fn create_native(&self, _backend: &mut RecordingBackend) -> Result<RecordedResource> {
            Err(BindingError::backend("out of memory"))
        }

        fn read_view_description(&self) -> ViewDescription {
            ViewDescription::FULL_TEXTURE
        }

        fn write_view_description(&self, mip_level: u32) -> ViewDescription {
            ViewDescription::texture_mip(mip_level)
        }
    }

    #[test]
    fn test_failed_view_creation_keeps_slot_pending() {
        let (mut backend, mut table) = setup(ShaderStage::Fragment);
        let ok = texture("ok");
        let broken = GpuResource::new("broken", BrokenSource);

        table.set_resource(&ok, ShaderResourceInfo::read(0)).unwrap();
        table.set_resource(&broken, ShaderResourceInfo::read(3)).unwrap();

        let result = table.apply_all(&mut backend);
        assert!(matches!(result, Err(BindingError::Backend { .. })));
        assert_eq!(backend.slot_calls(), 1);
        assert!(table.has_pending());

        // Still failing: the slot is retried, the applied slot is not.
        backend.take_calls();
        assert!(table.apply_all(&mut backend).is_err());
        assert_eq!(backend.slot_calls(), 0);

        table.set_resource(&ok, ShaderResourceInfo::read(3)).unwrap();
        table.apply_all(&mut backend).unwrap();
        assert_eq!(backend.slot_calls(), 1);
        assert!(!table.has_pending());
    }

    #[test]
    fn test_clear_unbinds_each_slot_once() {
        let (mut backend, mut table) = setup(ShaderStage::Compute);
        let a = texture("a");
        let w = buffer("w");

        table.set_resource(&a, ShaderResourceInfo::read(3)).unwrap();
        table.set_resource(&w, ShaderResourceInfo::write(0)).unwrap();
        table.apply_all(&mut backend).unwrap();
        backend.take_calls();

        table.clear();
        assert_eq!(table.bound_count(Partition::ReadOnly), 0);
        assert_eq!(table.bound_count(Partition::ReadWrite), 0);

        table.apply_all(&mut backend).unwrap();
        assert_eq!(
            backend.take_calls(),
            vec![
                BackendCall::SetReadView {
                    stage: ShaderStage::Compute,
                    slot: SlotAssignment::direct(3),
                    view: None,
                },
                BackendCall::SetWriteView {
                    stage: ShaderStage::Compute,
                    slot: SlotAssignment::direct(0),
                    view: None,
                },
            ]
        );

        table.apply_all(&mut backend).unwrap();
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_clear_keeps_pending_slots_dirty() {
        let (mut backend, mut table) = setup(ShaderStage::Vertex);
        let a = texture("a");

        table.set_resource(&a, ShaderResourceInfo::read(4)).unwrap();
        table.clear();
        table.apply_all(&mut backend).unwrap();

        assert_eq!(backend.slot_calls(), 1);
        assert!(matches!(
            backend.calls()[0],
            BackendCall::SetReadView { view: None, .. }
        ));
    }

    #[test]
    fn test_dropped_and_disposed_resources_clear_their_slot() {
        let (mut backend, mut table) = setup(ShaderStage::Fragment);
        let kept = texture("kept");
        let disposed = texture("disposed");
        {
            let dropped = texture("dropped");
            table.set_resource(&dropped, ShaderResourceInfo::read(0)).unwrap();
        }
        table.set_resource(&disposed, ShaderResourceInfo::read(1)).unwrap();
        table.set_resource(&kept, ShaderResourceInfo::read(2)).unwrap();
        disposed.dispose();

        table.apply_all(&mut backend).unwrap();

        let views: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetReadView { slot, view, .. } => Some((slot.storage_index, view.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(views, vec![(0, false), (1, false), (2, true)]);
    }

    #[test]
    fn test_unified_slots_unshift_write_registers() {
        let mut backend = RecordingBackend::new(DeviceCapabilities::unified_slots(16));
        let mut table = ResourceBindingTable::new(ShaderStage::Compute, backend.capabilities());
        let w = buffer("particles");

        let info = ShaderResourceInfo::write(DeviceCapabilities::WRITE_REGISTER_SHIFT + 2).with_counter(5);
        table.set_resource(&w, info).unwrap();

        let binding = table.binding(Partition::ReadWrite, 2).unwrap();
        assert_eq!(binding.slot, 18);
        assert_eq!(binding.counter_slot, Some(5));

        table.apply_all(&mut backend).unwrap();
        assert!(backend.calls().iter().any(|call| matches!(
            call,
            BackendCall::SetWriteView {
                slot: SlotAssignment {
                    storage_index: 2,
                    logical_slot: 18,
                    counter_slot: Some(5),
                },
                view: Some(_),
                ..
            }
        )));
    }

    #[test]
    fn test_mark_all_bound_dirty_repushes() {
        let (mut backend, mut table) = setup(ShaderStage::Fragment);
        let a = texture("a");
        table.set_resource(&a, ShaderResourceInfo::read(0)).unwrap();
        table.set_resource(&a, ShaderResourceInfo::read(9)).unwrap();
        table.apply_all(&mut backend).unwrap();
        backend.take_calls();

        table.mark_all_bound_dirty();
        table.apply_all(&mut backend).unwrap();
        assert_eq!(backend.slot_calls(), 2);
    }

    #[test]
    fn test_table_is_bound_to_first_device() {
        let (mut first, mut table) = setup(ShaderStage::Fragment);
        let mut second = RecordingBackend::new(DeviceCapabilities::default());

        table.apply_all(&mut first).unwrap();
        assert!(matches!(
            table.apply_all(&mut second),
            Err(BindingError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn test_table_never_extends_lifetime() {
        let (_, mut table) = setup(ShaderStage::Fragment);
        let a = texture("a");
        table.set_resource(&a, ShaderResourceInfo::read(0)).unwrap();
        assert_eq!(Arc::strong_count(&a), 1);
        drop(a);
        assert!(table.binding(Partition::ReadOnly, 0).unwrap().live().is_none());
    }

    #[test]
    fn test_capacities_follow_capabilities() {
        let caps = DeviceCapabilities::default().with_slot_counts(128, 4);
        let table: ResourceBindingTable<RecordingBackend> = ResourceBindingTable::new(ShaderStage::Compute, &caps);
        assert_eq!(table.max_readable_resources(), 128);
        assert_eq!(table.max_writeable_resources(), 4);
    }
}
