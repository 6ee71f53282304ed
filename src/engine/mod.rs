//! The inpainting engine boundary.
//!
//! The predictor only knows the [`InpaintEngine`] trait: one call taking an
//! RGB image, a binary mask and an [`InpaintConfig`], returning pixels in the
//! engine's native BGR order. [`LamaEngine`] is the ONNX Runtime
//! implementation used by the CLI.

mod lama;

pub use lama::{fit_mask, LamaEngine, MODEL_SIZE};

use image::{GrayImage, RgbImage};
use ndarray::Array3;

use crate::error::Result;
use crate::pipeline::InpaintConfig;

/// Pixels produced by an engine, HWC layout, BGR channel order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    /// 8-bit values.
    U8(Array3<u8>),
    /// Float values, either normalized to `[0, 1]` or in `[0, 255]`.
    F32(Array3<f32>),
}

impl EngineOutput {
    /// `(height, width, channels)` of the result.
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::U8(array) => array.dim(),
            Self::F32(array) => array.dim(),
        }
    }
}

/// A model that fills the masked region of an image.
pub trait InpaintEngine {
    /// Inpaint `image` where `mask` is 255.
    ///
    /// Blocks until inference finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn inpaint(
        &mut self,
        image: &RgbImage,
        mask: &GrayImage,
        config: &InpaintConfig,
    ) -> Result<EngineOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dim() {
        assert_eq!(EngineOutput::U8(Array3::zeros((4, 7, 3))).dim(), (4, 7, 3));
        assert_eq!(EngineOutput::F32(Array3::zeros((2, 5, 3))).dim(), (2, 5, 3));
    }
}
