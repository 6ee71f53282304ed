//! Setup and predict stages.

use std::path::{Path, PathBuf};

use crate::engine::{InpaintEngine, LamaEngine};
use crate::error::Result;
use crate::image;
use crate::model::{Device, ModelCache, LAMA};

use super::config::{InpaintConfig, ResizeLimit};

/// Options for [`Predictor::setup`].
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Use this model file instead of the cached download.
    pub model_path: Option<PathBuf>,

    /// Skip the accelerator probe and run on the CPU.
    pub force_cpu: bool,
}

/// Object removal over a loaded inpainting engine.
///
/// The engine is loaded once and reused by every [`predict`](Self::predict)
/// call. `predict` takes `&mut self`, so calls against one engine are
/// serialized by the borrow checker.
pub struct Predictor<E = LamaEngine> {
    engine: E,
}

impl Predictor<LamaEngine> {
    /// Select a device and load the `LaMa` model onto it.
    ///
    /// Downloads the model into the cache on first use unless
    /// `options.model_path` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be fetched or loaded.
    pub fn setup(options: &SetupOptions) -> Result<Self> {
        tracing::info!("Loading LaMa model...");
        let device = Device::select(options.force_cpu);
        tracing::info!("Using device: {device}");

        let path = match &options.model_path {
            Some(path) => path.clone(),
            None => ModelCache::new()?.get_model_path(&LAMA)?,
        };

        let engine = LamaEngine::load(&path, device)?;
        tracing::info!("LaMa model loaded on {}", engine.device());

        Ok(Self::new(engine))
    }
}

impl<E: InpaintEngine> Predictor<E> {
    /// Wrap an already loaded engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Remove the masked objects from an image.
    ///
    /// White (> 127) mask pixels are removed, everything else is kept. The
    /// result is written as PNG to a new temporary file whose path is
    /// returned; deleting it is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`](crate::Error::InvalidParameter)
    /// if `resize_limit` is outside `[512, 2048]`, before anything is decoded
    /// or run. Decode, inference, and write failures are returned as is.
    pub fn predict<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        image_path: P,
        mask_path: Q,
        resize_limit: u32,
    ) -> Result<PathBuf> {
        let limit = ResizeLimit::new(resize_limit)?;

        let rgb = image::load_rgb(image_path.as_ref())?;
        let mask = image::load_mask(mask_path.as_ref())?;

        let (w, h) = rgb.dimensions();
        let (mw, mh) = mask.dimensions();
        tracing::info!("Processing image: ({h}, {w}, 3), mask: ({mh}, {mw})");

        let mask = image::binarize_mask(&mask);
        let config = InpaintConfig::for_resize_limit(limit);

        let output = self.engine.inpaint(&rgb, &mask, &config)?;
        tracing::debug!("Engine output: {:?}", output.dim());

        let result = image::normalize_output(output);
        let result = image::reverse_channels(&result);
        let result = image::array_to_rgb(&result)?;

        let path = image::save_temp_png(&result)?;
        tracing::info!("Inpainting completed: {}", path.display());

        Ok(path)
    }
}
