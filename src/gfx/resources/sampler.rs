//! Sampler state and its translation into native sampling parameters
//!
//! [`SamplerState`] is the declarative description content code builds.
//! [`SamplerConfiguration`] resolves it against a device's capabilities into
//! [`SamplerParameters`] and caches the native sampler object created from
//! them. Once activated, a configuration belongs to that device for good.

use log::debug;

use crate::error::{BindingError, Result};
use crate::gfx::backend::{DeviceCapabilities, DeviceId, GraphicsBackend, SamplerTarget};

/// Filtering state, one of nine min/mag/mip combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Linear,
    Point,
    Anisotropic,
    LinearMipPoint,
    PointMipLinear,
    MinLinearMagPointMipLinear,
    MinLinearMagPointMipPoint,
    MinPointMagLinearMipLinear,
    MinPointMagLinearMipPoint,
}

impl TryFrom<u32> for TextureFilter {
    type Error = BindingError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => TextureFilter::Linear,
            1 => TextureFilter::Point,
            2 => TextureFilter::Anisotropic,
            3 => TextureFilter::LinearMipPoint,
            4 => TextureFilter::PointMipLinear,
            5 => TextureFilter::MinLinearMagPointMipLinear,
            6 => TextureFilter::MinLinearMagPointMipPoint,
            7 => TextureFilter::MinPointMagLinearMipLinear,
            8 => TextureFilter::MinPointMagLinearMipPoint,
            _ => {
                return Err(BindingError::UnsupportedFilter {
                    value,
                    kind: "texture filter",
                })
            }
        })
    }
}

impl TextureFilter {
    /// Min and mag filter for this state. The min filter only samples
    /// between mips when the texture has them.
    pub fn filters(self, use_mipmaps: bool) -> (MinFilter, MagFilter) {
        use FilterKind::{Linear, Nearest};

        // (min, mip, mag)
        let (min, mip, mag) = match self {
            TextureFilter::Point => (Nearest, Nearest, Nearest),
            TextureFilter::Linear | TextureFilter::Anisotropic => (Linear, Linear, Linear),
            TextureFilter::PointMipLinear => (Nearest, Linear, Nearest),
            TextureFilter::LinearMipPoint => (Linear, Nearest, Linear),
            TextureFilter::MinLinearMagPointMipLinear => (Linear, Linear, Nearest),
            TextureFilter::MinLinearMagPointMipPoint => (Linear, Nearest, Nearest),
            TextureFilter::MinPointMagLinearMipLinear => (Nearest, Linear, Linear),
            TextureFilter::MinPointMagLinearMipPoint => (Nearest, Nearest, Linear),
        };

        let min_filter = match (use_mipmaps, min, mip) {
            (false, Nearest, _) => MinFilter::Nearest,
            (false, Linear, _) => MinFilter::Linear,
            (true, Nearest, Nearest) => MinFilter::NearestMipmapNearest,
            (true, Nearest, Linear) => MinFilter::NearestMipmapLinear,
            (true, Linear, Nearest) => MinFilter::LinearMipmapNearest,
            (true, Linear, Linear) => MinFilter::LinearMipmapLinear,
        };
        let mag_filter = match mag {
            Nearest => MagFilter::Nearest,
            Linear => MagFilter::Linear,
        };

        (min_filter, mag_filter)
    }
}

#[derive(Clone, Copy)]
enum FilterKind {
    Nearest,
    Linear,
}

/// Addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    Wrap,
    Clamp,
    Mirror,
    Border,
}

impl TryFrom<u32> for TextureAddressMode {
    type Error = BindingError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => TextureAddressMode::Wrap,
            1 => TextureAddressMode::Clamp,
            2 => TextureAddressMode::Mirror,
            3 => TextureAddressMode::Border,
            _ => {
                return Err(BindingError::UnsupportedWrapMode {
                    mode: format!("raw value {}", value),
                })
            }
        })
    }
}

/// Whether sampling compares against a reference depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilterMode {
    Default,
    Comparison,
}

impl TryFrom<u32> for TextureFilterMode {
    type Error = BindingError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(TextureFilterMode::Default),
            1 => Ok(TextureFilterMode::Comparison),
            _ => Err(BindingError::UnsupportedFilter {
                value,
                kind: "texture filter mode",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Always,
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

impl CompareFunction {
    pub fn to_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Always => wgpu::CompareFunction::Always,
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        }
    }
}

/// Native minification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

/// Native magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

/// Native wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
    ClampToBorder,
}

/// Sampling state resolved against one device's capabilities
///
/// `None` means the parameter is not applied on this device.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerParameters {
    pub max_anisotropy: Option<f32>,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    /// U, V, W
    pub wrap: [WrapMode; 3],
    pub border_color: Option<[f32; 4]>,
    pub lod_bias: Option<f32>,
    pub compare: Option<CompareFunction>,
    pub max_lod: f32,
    pub max_level: Option<u32>,
}

/// Declarative sampler description
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    pub filter: TextureFilter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    /// RGBA8
    pub border_color: [u8; 4],
    pub max_anisotropy: u32,
    /// Highest mip to sample; 0 means unlimited.
    pub max_mip_level: u32,
    pub mip_map_level_of_detail_bias: f32,
    pub filter_mode: TextureFilterMode,
    pub comparison_function: CompareFunction,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            border_color: [255, 255, 255, 255],
            max_anisotropy: 4,
            max_mip_level: 0,
            mip_map_level_of_detail_bias: 0.0,
            filter_mode: TextureFilterMode::Default,
            comparison_function: CompareFunction::Never,
        }
    }
}

impl SamplerState {
    fn with_filter_and_address(filter: TextureFilter, address: TextureAddressMode) -> Self {
        Self {
            filter,
            address_u: address,
            address_v: address,
            address_w: address,
            ..Self::default()
        }
    }

    pub fn linear_clamp() -> Self {
        Self::with_filter_and_address(TextureFilter::Linear, TextureAddressMode::Clamp)
    }

    pub fn linear_wrap() -> Self {
        Self::with_filter_and_address(TextureFilter::Linear, TextureAddressMode::Wrap)
    }

    pub fn point_clamp() -> Self {
        Self::with_filter_and_address(TextureFilter::Point, TextureAddressMode::Clamp)
    }

    pub fn point_wrap() -> Self {
        Self::with_filter_and_address(TextureFilter::Point, TextureAddressMode::Wrap)
    }

    pub fn anisotropic_clamp() -> Self {
        Self::with_filter_and_address(TextureFilter::Anisotropic, TextureAddressMode::Clamp)
    }

    pub fn anisotropic_wrap() -> Self {
        Self::with_filter_and_address(TextureFilter::Anisotropic, TextureAddressMode::Wrap)
    }

    /// Depth comparison sampler for shadow maps
    pub fn shadow_comparison() -> Self {
        Self {
            filter_mode: TextureFilterMode::Comparison,
            comparison_function: CompareFunction::LessEqual,
            ..Self::linear_clamp()
        }
    }
}

struct NativeSampler<S> {
    sampler: S,
    use_mipmaps: bool,
}

/// A [`SamplerState`] bound to a device, with its cached native sampler
pub struct SamplerConfiguration<B: GraphicsBackend> {
    state: SamplerState,
    device: Option<DeviceId>,
    native: Option<NativeSampler<B::Sampler>>,
    border_scratch: [f32; 4],
}

impl<B: GraphicsBackend> SamplerConfiguration<B> {
    pub fn new(state: SamplerState) -> Self {
        Self {
            state,
            device: None,
            native: None,
            border_scratch: [0.0; 4],
        }
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    /// Resolves the state into native parameters for `caps`.
    pub fn resolve(&mut self, caps: &DeviceCapabilities, use_mipmaps: bool) -> Result<SamplerParameters> {
        let state = &self.state;
        let (min_filter, mag_filter) = state.filter.filters(use_mipmaps);

        let max_anisotropy = caps.supports_anisotropic_filter.then(|| match state.filter {
            TextureFilter::Anisotropic => (state.max_anisotropy as f32).clamp(1.0, caps.max_anisotropy.max(1.0)),
            _ => 1.0,
        });

        let wrap = [
            wrap_mode(state.address_u, caps)?,
            wrap_mode(state.address_v, caps)?,
            wrap_mode(state.address_w, caps)?,
        ];

        let border_color = if caps.supports_border_color {
            for (dst, src) in self.border_scratch.iter_mut().zip(state.border_color) {
                *dst = f32::from(src) / 255.0;
            }
            Some(self.border_scratch)
        } else {
            None
        };

        let lod_bias = caps.supports_lod_bias.then_some(state.mip_map_level_of_detail_bias);

        let compare = match state.filter_mode {
            TextureFilterMode::Comparison => Some(state.comparison_function),
            TextureFilterMode::Default => None,
        };

        let max_level = if state.max_mip_level > 0 { state.max_mip_level } else { 1000 };

        Ok(SamplerParameters {
            max_anisotropy,
            min_filter,
            mag_filter,
            wrap,
            border_color,
            lod_bias,
            compare,
            max_lod: max_level as f32,
            max_level: caps.supports_texture_max_level.then_some(max_level),
        })
    }

    /// Returns the native sampler, creating it on first use. The sampler is
    /// rebuilt only when `use_mipmaps` changes.
    pub fn native_sampler(&mut self, backend: &mut B, use_mipmaps: bool) -> Result<&B::Sampler> {
        self.bind_device(backend.device_id())?;

        let stale = self.native.as_ref().map_or(true, |n| n.use_mipmaps != use_mipmaps);
        if stale {
            let params = self.resolve(backend.capabilities(), use_mipmaps)?;
            let sampler = backend.create_sampler(&params)?;
            debug!("Created sampler for {:?} (mipmaps: {})", self.state.filter, use_mipmaps);
            let native = self.native.insert(NativeSampler { sampler, use_mipmaps });
            return Ok(&native.sampler);
        }

        self.native
            .as_ref()
            .map(|n| &n.sampler)
            .ok_or_else(|| BindingError::backend("sampler cache is empty"))
    }

    /// Applies this sampler to `target`.
    ///
    /// Devices with sampler objects get the cached sampler; others get the
    /// parameters applied to the texture bound at the target.
    pub fn activate(&mut self, backend: &mut B, target: SamplerTarget, use_mipmaps: bool) -> Result<()> {
        if backend.capabilities().supports_sampler_objects {
            let sampler = self.native_sampler(backend, use_mipmaps)?;
            backend.set_sampler(target, Some(sampler));
            return Ok(());
        }

        self.bind_device(backend.device_id())?;
        let params = self.resolve(backend.capabilities(), use_mipmaps)?;
        backend.set_texture_parameters(target, &params)
    }

    /// Destroys the native sampler. The device binding is kept.
    pub fn release(&mut self) {
        self.native = None;
    }

    pub fn invalidate_on_device_reset(&mut self) {
        self.release();
    }

    fn bind_device(&mut self, found: DeviceId) -> Result<()> {
        match self.device {
            Some(expected) if expected != found => Err(BindingError::DeviceMismatch { expected, found }),
            Some(_) => Ok(()),
            None => {
                self.device = Some(found);
                Ok(())
            }
        }
    }
}

fn wrap_mode(mode: TextureAddressMode, caps: &DeviceCapabilities) -> Result<WrapMode> {
    match mode {
        TextureAddressMode::Clamp => Ok(WrapMode::ClampToEdge),
        TextureAddressMode::Wrap => Ok(WrapMode::Repeat),
        TextureAddressMode::Mirror => Ok(WrapMode::MirroredRepeat),
        TextureAddressMode::Border if caps.supports_border_color => Ok(WrapMode::ClampToBorder),
        TextureAddressMode::Border => Err(BindingError::UnsupportedWrapMode {
            mode: "Border (device has no border color support)".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::{BackendCall, RecordingBackend, ShaderStage};

    fn config(state: SamplerState) -> SamplerConfiguration<RecordingBackend> {
        SamplerConfiguration::new(state)
    }

    #[test]
    fn test_filter_table() {
        use MagFilter as Mag;
        use MinFilter as Min;

        let cases = [
            (TextureFilter::Point, Min::NearestMipmapNearest, Min::Nearest, Mag::Nearest),
            (TextureFilter::Linear, Min::LinearMipmapLinear, Min::Linear, Mag::Linear),
            (TextureFilter::Anisotropic, Min::LinearMipmapLinear, Min::Linear, Mag::Linear),
            (TextureFilter::PointMipLinear, Min::NearestMipmapLinear, Min::Nearest, Mag::Nearest),
            (TextureFilter::LinearMipPoint, Min::LinearMipmapNearest, Min::Linear, Mag::Linear),
            (TextureFilter::MinLinearMagPointMipLinear, Min::LinearMipmapLinear, Min::Linear, Mag::Nearest),
            (TextureFilter::MinLinearMagPointMipPoint, Min::LinearMipmapNearest, Min::Linear, Mag::Nearest),
            (TextureFilter::MinPointMagLinearMipLinear, Min::NearestMipmapLinear, Min::Nearest, Mag::Linear),
            (TextureFilter::MinPointMagLinearMipPoint, Min::NearestMipmapNearest, Min::Nearest, Mag::Linear),
        ];

        for (filter, mip_min, flat_min, mag) in cases {
            assert_eq!(filter.filters(true), (mip_min, mag), "{:?} with mipmaps", filter);
            assert_eq!(filter.filters(false), (flat_min, mag), "{:?} without mipmaps", filter);
        }
    }

    #[test]
    fn test_unknown_raw_values_fail() {
        assert_eq!(
            TextureFilter::try_from(42u32),
            Err(BindingError::UnsupportedFilter {
                value: 42,
                kind: "texture filter"
            })
        );
        assert_eq!(TextureFilter::try_from(2u32), Ok(TextureFilter::Anisotropic));
        assert!(matches!(
            TextureAddressMode::try_from(9u32),
            Err(BindingError::UnsupportedWrapMode { .. })
        ));
        assert!(TextureFilterMode::try_from(7u32).is_err());
    }

    #[test]
    fn test_anisotropy_is_clamped() {
        let caps = DeviceCapabilities::default().with_anisotropy(true, 8.0);
        let mut sampler = config(SamplerState {
            max_anisotropy: 32,
            ..SamplerState::anisotropic_wrap()
        });
        assert_eq!(sampler.resolve(&caps, true).unwrap().max_anisotropy, Some(8.0));

        let mut sampler = config(SamplerState {
            max_anisotropy: 0,
            ..SamplerState::anisotropic_wrap()
        });
        assert_eq!(sampler.resolve(&caps, true).unwrap().max_anisotropy, Some(1.0));
    }

    #[test]
    fn test_non_anisotropic_filters_reset_anisotropy() {
        let caps = DeviceCapabilities::default();
        let mut sampler = config(SamplerState::point_clamp());
        assert_eq!(sampler.resolve(&caps, false).unwrap().max_anisotropy, Some(1.0));

        let caps = caps.with_anisotropy(false, 16.0);
        assert_eq!(sampler.resolve(&caps, false).unwrap().max_anisotropy, None);
    }

    #[test]
    fn test_border_and_lod_bias_follow_capabilities() {
        let mut sampler = config(SamplerState {
            border_color: [255, 0, 51, 255],
            mip_map_level_of_detail_bias: -0.5,
            ..SamplerState::default()
        });

        let params = sampler.resolve(&DeviceCapabilities::default(), false).unwrap();
        assert_eq!(params.border_color, Some([1.0, 0.0, 0.2, 1.0]));
        assert_eq!(params.lod_bias, Some(-0.5));

        let limited = DeviceCapabilities::default().with_border_color(false).with_lod_bias(false);
        let params = sampler.resolve(&limited, false).unwrap();
        assert_eq!(params.border_color, None);
        assert_eq!(params.lod_bias, None);
    }

    #[test]
    fn test_border_wrap_needs_support() {
        let mut sampler = config(SamplerState {
            address_v: TextureAddressMode::Border,
            ..SamplerState::default()
        });

        let params = sampler.resolve(&DeviceCapabilities::default(), false).unwrap();
        assert_eq!(params.wrap, [WrapMode::Repeat, WrapMode::ClampToBorder, WrapMode::Repeat]);

        let limited = DeviceCapabilities::default().with_border_color(false);
        assert!(matches!(
            sampler.resolve(&limited, false),
            Err(BindingError::UnsupportedWrapMode { .. })
        ));
    }

    #[test]
    fn test_comparison_and_lod_limits() {
        let mut shadow = config(SamplerState::shadow_comparison());
        let params = shadow.resolve(&DeviceCapabilities::default(), false).unwrap();
        assert_eq!(params.compare, Some(CompareFunction::LessEqual));
        assert_eq!(params.max_lod, 1000.0);
        assert_eq!(params.max_level, Some(1000));

        let mut limited = config(SamplerState {
            max_mip_level: 3,
            ..SamplerState::default()
        });
        let caps = DeviceCapabilities::default().with_texture_max_level(false);
        let params = limited.resolve(&caps, true).unwrap();
        assert_eq!(params.compare, None);
        assert_eq!(params.max_lod, 3.0);
        assert_eq!(params.max_level, None);
    }

    #[test]
    fn test_native_sampler_is_cached() {
        let mut backend = RecordingBackend::new(DeviceCapabilities::default());
        let mut sampler = config(SamplerState::linear_clamp());

        let first = sampler.native_sampler(&mut backend, true).unwrap().id;
        let second = sampler.native_sampler(&mut backend, true).unwrap().id;
        assert_eq!(first, second);

        let rebuilt = sampler.native_sampler(&mut backend, false).unwrap().id;
        assert_ne!(first, rebuilt);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateSampler { .. })), 2);
    }

    #[test]
    fn test_sampler_belongs_to_first_device() {
        let mut first = RecordingBackend::new(DeviceCapabilities::default());
        let mut second = RecordingBackend::new(DeviceCapabilities::default());
        let mut sampler = config(SamplerState::default());

        sampler.native_sampler(&mut first, false).unwrap();
        assert_eq!(sampler.device(), Some(first.device_id()));

        let target = SamplerTarget {
            stage: ShaderStage::Fragment,
            slot: 0,
        };
        assert!(matches!(
            sampler.activate(&mut second, target, false),
            Err(BindingError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn test_activate_binds_sampler_object() {
        let mut backend = RecordingBackend::new(DeviceCapabilities::default());
        let mut sampler = config(SamplerState::point_wrap());
        let target = SamplerTarget {
            stage: ShaderStage::Fragment,
            slot: 2,
        };

        sampler.activate(&mut backend, target, false).unwrap();
        sampler.activate(&mut backend, target, false).unwrap();

        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateSampler { .. })), 1);
        assert_eq!(
            backend.count(|c| matches!(c, BackendCall::SetSampler { target: t, sampler: Some(_) } if *t == target)),
            2
        );
    }

    #[test]
    fn test_activate_without_sampler_objects_sets_texture_parameters() {
        let caps = DeviceCapabilities::unified_slots(16).with_sampler_objects(false);
        let mut backend = RecordingBackend::new(caps);
        let mut sampler = config(SamplerState::point_clamp());
        let target = SamplerTarget {
            stage: ShaderStage::Fragment,
            slot: 0,
        };

        sampler.activate(&mut backend, target, true).unwrap();

        assert!(!sampler.has_native());
        match backend.calls() {
            [BackendCall::SetTextureParameters { params, .. }] => {
                assert_eq!(params.min_filter, MinFilter::NearestMipmapNearest);
                assert_eq!(params.wrap, [WrapMode::ClampToEdge; 3]);
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_device_reset_drops_native_sampler() {
        let mut backend = RecordingBackend::new(DeviceCapabilities::default());
        let mut sampler = config(SamplerState::default());
        sampler.native_sampler(&mut backend, false).unwrap();

        sampler.invalidate_on_device_reset();
        assert!(!sampler.has_native());

        sampler.native_sampler(&mut backend, false).unwrap();
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateSampler { .. })), 2);
    }
}
