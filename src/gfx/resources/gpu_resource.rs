//! Bindable GPU resources with lazily created views
//!
//! A [`GpuResource`] is the handle content objects hand to the binding layer.
//! It owns the native resource and at most one read view and one write view,
//! all created on first use through the [`ResourceSource`] extension point.
//! Binding tables only ever hold `Weak` references to it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{BindingError, Result};
use crate::gfx::backend::{DeviceContext, DeviceId, GraphicsBackend, ViewDescription};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`GpuResource`]
///
/// Render-target hazards and reflection lookups compare resources by id,
/// never by native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    StructuredBuffer,
}

/// Creates the native objects behind a [`GpuResource`]
///
/// Implemented per concrete resource type (texture, structured buffer) and
/// per backend.
pub trait ResourceSource<B: GraphicsBackend>: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn mip_levels(&self) -> u32 {
        1
    }

    fn create_native(&self, backend: &mut B) -> Result<B::Resource>;

    fn read_view_description(&self) -> ViewDescription;

    fn write_view_description(&self, mip_level: u32) -> ViewDescription;
}

struct NativeCache<B: GraphicsBackend> {
    device: Option<DeviceId>,
    resource: Option<B::Resource>,
    read_view: Option<Arc<B::ReadView>>,
    write_view: Option<Arc<B::WriteView>>,
}

impl<B: GraphicsBackend> NativeCache<B> {
    fn empty() -> Self {
        Self {
            device: None,
            resource: None,
            read_view: None,
            write_view: None,
        }
    }

    fn bind_device(&mut self, found: DeviceId) -> Result<()> {
        match self.device {
            Some(expected) if expected != found => Err(BindingError::DeviceMismatch { expected, found }),
            _ => {
                self.device = Some(found);
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        self.write_view = None;
        self.read_view = None;
        self.resource = None;
    }
}

/// Bindable texture or structured buffer
pub struct GpuResource<B: GraphicsBackend> {
    id: ResourceId,
    label: String,
    source: Box<dyn ResourceSource<B>>,
    disposed: AtomicBool,
    cache: Mutex<NativeCache<B>>,
}

impl<B: GraphicsBackend> GpuResource<B> {
    /// Wraps a source. Nothing native is created until a view is requested.
    pub fn new(label: impl Into<String>, source: impl ResourceSource<B> + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: ResourceId::next(),
            label: label.into(),
            source: Box::new(source),
            disposed: AtomicBool::new(false),
            cache: Mutex::new(NativeCache::empty()),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ResourceKind {
        self.source.kind()
    }

    pub fn mip_levels(&self) -> u32 {
        self.source.mip_levels()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether the native resource currently exists
    pub fn has_native(&self) -> bool {
        self.cache.lock().resource.is_some()
    }

    /// Returns the read-only view, creating the native resource and the view
    /// on first use.
    pub fn read_view(&self, backend: &mut B) -> Result<Arc<B::ReadView>> {
        let mut cache = self.cache.lock();
        self.check_live()?;
        cache.bind_device(backend.device_id())?;

        if let Some(view) = &cache.read_view {
            return Ok(Arc::clone(view));
        }

        let desc = self.source.read_view_description();
        let view = {
            let resource = self.ensure_native(&mut cache, backend)?;
            Arc::new(backend.create_read_view(resource, &desc)?)
        };
        debug!("Created read view for '{}' ({:?})", self.label, self.id);
        cache.read_view = Some(Arc::clone(&view));
        Ok(view)
    }

    /// Returns the read-write view of mip 0, creating it on first use.
    pub fn write_view(&self, backend: &mut B) -> Result<Arc<B::WriteView>> {
        let mut cache = self.cache.lock();
        self.check_live()?;
        cache.bind_device(backend.device_id())?;

        if let Some(view) = &cache.write_view {
            return Ok(Arc::clone(view));
        }

        let desc = self.source.write_view_description(0);
        let view = {
            let resource = self.ensure_native(&mut cache, backend)?;
            Arc::new(backend.create_write_view(resource, &desc)?)
        };
        debug!("Created write view for '{}' ({:?})", self.label, self.id);
        cache.write_view = Some(Arc::clone(&view));
        Ok(view)
    }

    /// Drops the views and the native resource but keeps the handle usable;
    /// the next view request recreates everything.
    pub fn invalidate_on_device_reset(&self) {
        let mut cache = self.cache.lock();
        if cache.resource.is_some() {
            debug!("Invalidating native objects of '{}' ({:?})", self.label, self.id);
        }
        cache.release();
    }

    /// Destroys all native objects. Later view requests fail.
    pub fn dispose(&self) {
        let mut cache = self.cache.lock();
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!("Disposed '{}' ({:?})", self.label, self.id);
        }
        cache.release();
    }

    /// Generates the full mip chain from mip 0.
    ///
    /// Holds the device context lock for the whole operation.
    pub fn create_mipmaps(&self, context: &DeviceContext<B>) -> Result<()> {
        if self.mip_levels() <= 1 {
            warn!("'{}' has no mip storage, skipping mip generation", self.label);
            return Ok(());
        }

        let mut backend = context.lock();
        let view = self.read_view(&mut backend)?;
        backend.generate_mips(&view)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(BindingError::DisposedResource {
                id: self.id,
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    fn ensure_native<'a>(&self, cache: &'a mut NativeCache<B>, backend: &mut B) -> Result<&'a B::Resource> {
        let resource = match cache.resource.take() {
            Some(resource) => resource,
            None => {
                debug!("Creating native {:?} for '{}'", self.kind(), self.label);
                self.source.create_native(backend)?
            }
        };
        Ok(cache.resource.insert(resource))
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for GpuResource<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResource")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
