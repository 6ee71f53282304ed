//! Inpainting configuration.

use crate::error::{Error, Result};

/// Sampler used by latent-diffusion engines. `LaMa` ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdmSampler {
    Ddim,
    Plms,
}

/// How large images are brought down to a size the model can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdStrategy {
    /// Run on the full-resolution image.
    Original,
    /// Downscale so the longest side fits `hd_strategy_resize_limit`.
    Resize,
    /// Inpaint each masked region's bounding box separately.
    Crop,
}

/// Caller-supplied resize limit, validated to `[512, 2048]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeLimit(u32);

impl ResizeLimit {
    pub const MIN: u32 = 512;
    pub const MAX: u32 = 2048;
    pub const DEFAULT: u32 = 800;

    /// Validate a resize limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when `value` is outside `[512, 2048]`.
    pub fn new(value: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidParameter {
                name: "hd_strategy_resize_limit".to_string(),
                reason: format!(
                    "must be between {} and {}, got {value}",
                    Self::MIN,
                    Self::MAX
                ),
            })
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for ResizeLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<u32> for ResizeLimit {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

/// Configuration handed to the engine on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpaintConfig {
    /// Number of sampling steps for diffusion engines.
    pub ldm_steps: u32,

    /// Sampler variant for diffusion engines.
    pub ldm_sampler: LdmSampler,

    /// Large-image handling strategy.
    pub hd_strategy: HdStrategy,

    /// Context kept around each masked region with [`HdStrategy::Crop`].
    pub hd_strategy_crop_margin: u32,

    /// Longest side above which [`HdStrategy::Crop`] kicks in.
    pub hd_strategy_crop_trigger_size: u32,

    /// Longest side above which [`HdStrategy::Resize`] downscales.
    pub hd_strategy_resize_limit: u32,
}

impl InpaintConfig {
    pub const LDM_STEPS: u32 = 20;
    pub const CROP_MARGIN: u32 = 32;

    /// The fixed object-removal configuration for a given resize limit.
    ///
    /// The limit is used for both the crop trigger size and the resize limit.
    #[must_use]
    pub const fn for_resize_limit(limit: ResizeLimit) -> Self {
        Self {
            ldm_steps: Self::LDM_STEPS,
            ldm_sampler: LdmSampler::Plms,
            hd_strategy: HdStrategy::Resize,
            hd_strategy_crop_margin: Self::CROP_MARGIN,
            hd_strategy_crop_trigger_size: limit.get(),
            hd_strategy_resize_limit: limit.get(),
        }
    }
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self::for_resize_limit(ResizeLimit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_limit_bounds() {
        assert!(ResizeLimit::new(511).is_err());
        assert!(ResizeLimit::new(2049).is_err());
        assert_eq!(ResizeLimit::new(512).unwrap().get(), 512);
        assert_eq!(ResizeLimit::new(2048).unwrap().get(), 2048);
    }

    #[test]
    fn test_resize_limit_error_names_parameter() {
        let err = ResizeLimit::try_from(0).unwrap_err();
        assert!(err.to_string().contains("hd_strategy_resize_limit"));
    }

    #[test]
    fn test_config_fixed_fields() {
        let config = InpaintConfig::for_resize_limit(ResizeLimit::new(1024).unwrap());

        assert_eq!(config.ldm_steps, 20);
        assert_eq!(config.ldm_sampler, LdmSampler::Plms);
        assert_eq!(config.hd_strategy, HdStrategy::Resize);
        assert_eq!(config.hd_strategy_crop_margin, 32);
        assert_eq!(config.hd_strategy_crop_trigger_size, 1024);
        assert_eq!(config.hd_strategy_resize_limit, 1024);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(InpaintConfig::default().hd_strategy_resize_limit, 800);
    }
}
