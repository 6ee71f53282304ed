//! Object removal pipeline: configuration plus the setup and predict stages.

mod config;
mod predictor;

pub use config::{HdStrategy, InpaintConfig, LdmSampler, ResizeLimit};
pub use predictor::{Predictor, SetupOptions};
