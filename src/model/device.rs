//! Compute device selection.

use std::fmt;

/// Device the inpainting model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// NVIDIA GPU through the CUDA execution provider.
    Cuda,
    /// ONNX Runtime's default CPU provider.
    Cpu,
}

impl Device {
    /// Pick the best available device.
    ///
    /// Probes for the CUDA execution provider unless `force_cpu` is set.
    /// The probe only exists when the crate is built with the `cuda` feature;
    /// otherwise this always returns [`Device::Cpu`].
    #[must_use]
    pub fn select(force_cpu: bool) -> Self {
        if !force_cpu && cuda_available() {
            Self::Cuda
        } else {
            Self::Cpu
        }
    }

    /// Short lowercase name of the device.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(err) => {
            tracing::debug!("CUDA probe failed: {err}");
            false
        }
    }
}

#[cfg(not(feature = "cuda"))]
const fn cuda_available() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_cpu() {
        assert_eq!(Device::select(true), Device::Cpu);
    }

    #[test]
    fn test_display() {
        assert_eq!(Device::Cuda.to_string(), "cuda");
        assert_eq!(Device::Cpu.to_string(), "cpu");
    }
}
