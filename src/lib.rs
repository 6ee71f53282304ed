//! # `lamaerase`
//!
//! Remove objects from a photograph given a binary mask, using the `LaMa`
//! inpainting network through ONNX Runtime.
//!
//! The crate is a thin adapter: it decodes the image and mask, binarizes the
//! mask, hands both to an [`InpaintEngine`] together with a fixed
//! [`InpaintConfig`], and writes the engine's result to a temporary PNG file.
//!
//! ## Example
//!
//! ```no_run
//! use lamaerase::{Predictor, SetupOptions};
//!
//! # fn main() -> lamaerase::Result<()> {
//! let mut predictor = Predictor::setup(&SetupOptions::default())?;
//!
//! let output = predictor.predict("photo.jpg", "mask.png", 800)?;
//! println!("{}", output.display());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use engine::{fit_mask, EngineOutput, InpaintEngine, LamaEngine};
pub use error::{Error, Result};
pub use pipeline::{HdStrategy, InpaintConfig, LdmSampler, Predictor, ResizeLimit, SetupOptions};
