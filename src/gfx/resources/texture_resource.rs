//! Texture sources for the wgpu backend
//!
//! Describes how to create a texture, without creating it. Wrapped in a
//! [`GpuResource`](super::gpu_resource::GpuResource), the texture is
//! allocated (and its initial pixels uploaded) the first time a view is
//! requested, and again after every device reset.

use crate::error::{BindingError, Result};
use crate::gfx::backend::{ViewDescription, WgpuBackend, WgpuResource};

use super::gpu_resource::{ResourceKind, ResourceSource};

/// Creation parameters of a 2D texture
///
/// Sampling state is not part of a texture: bind a
/// [`SamplerConfiguration`](super::sampler::SamplerConfiguration) to the
/// matching sampler slot instead.
#[derive(Debug, Clone)]
pub struct TextureSource {
    label: String,
    size: wgpu::Extent3d,
    mip_level_count: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    initial_data: Option<Vec<u8>>,
}

impl TextureSource {
    /// Standard depth buffer format
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn new(label: &str, width: u32, height: u32, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> Self {
        Self {
            label: label.to_string(),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            format,
            usage,
            initial_data: None,
        }
    }

    /// Creates a depth texture usable as a depth attachment and for sampling
    ///
    /// # Arguments
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `label` - Debug label for the texture
    pub fn depth(width: u32, height: u32, label: &str) -> Self {
        Self::new(
            label,
            width,
            height,
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Creates a color texture that can be rendered to and sampled
    pub fn render_target(width: u32, height: u32, format: wgpu::TextureFormat, label: &str) -> Self {
        Self::new(
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Creates a texture compute shaders can write through a storage view
    pub fn storage(width: u32, height: u32, format: wgpu::TextureFormat, label: &str) -> Self {
        Self::new(
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Creates a texture from raw RGBA8 pixels
    ///
    /// # Arguments
    /// * `data` - Raw RGBA8 pixel data (4 bytes per pixel), uploaded to mip 0
    /// * `width` - Width of the texture in pixels
    /// * `height` - Height of the texture in pixels
    /// * `label` - Debug label for the texture
    pub fn from_rgba8(data: &[u8], width: u32, height: u32, label: &str) -> Self {
        let mut source = Self::new(
            label,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        source.initial_data = Some(data.to_vec());
        source
    }

    /// Allocates `levels` mips (clamped to the full chain) and enables the
    /// usage mip generation renders with.
    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_level_count = levels.clamp(1, Self::full_mip_count(self.size.width, self.size.height));
        if self.mip_level_count > 1 {
            self.usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        self
    }

    /// Allocates the complete mip chain down to 1x1.
    pub fn with_full_mip_chain(self) -> Self {
        let levels = Self::full_mip_count(self.size.width, self.size.height);
        self.with_mip_levels(levels)
    }

    /// Number of mips from `width`x`height` down to 1x1
    pub fn full_mip_count(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.size
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        self.usage
    }

    fn upload(&self, backend: &WgpuBackend, texture: &wgpu::Texture, data: &[u8]) -> Result<()> {
        let expected = 4 * self.size.width as usize * self.size.height as usize;
        if data.len() != expected {
            return Err(BindingError::backend(format!(
                "'{}' expects {} bytes of RGBA8 data, got {}",
                self.label,
                expected,
                data.len()
            )));
        }

        backend.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.size.width),
                rows_per_image: Some(self.size.height),
            },
            self.size,
        );
        Ok(())
    }
}

impl ResourceSource<WgpuBackend> for TextureSource {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn mip_levels(&self) -> u32 {
        self.mip_level_count
    }

    fn create_native(&self, backend: &mut WgpuBackend) -> Result<WgpuResource> {
        let texture = backend.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(&self.label),
            size: self.size,
            mip_level_count: self.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: self.usage,
            view_formats: &[],
        });

        if let Some(data) = &self.initial_data {
            self.upload(backend, &texture, data)?;
        }

        Ok(WgpuResource::Texture(texture))
    }

    fn read_view_description(&self) -> ViewDescription {
        ViewDescription::FULL_TEXTURE
    }

    fn write_view_description(&self, mip_level: u32) -> ViewDescription {
        ViewDescription::texture_mip(mip_level)
    }
}
