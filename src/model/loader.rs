//! Model downloading and loading utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::error::{Error, Result};

use super::Device;

/// Where to fetch a model from and how to store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Model identifier used in logs and errors.
    pub name: &'static str,
    /// File name inside the cache directory.
    pub filename: &'static str,
    /// Download URL.
    pub url: &'static str,
    /// Approximate size in bytes, used when the server omits a length.
    pub approx_size: u64,
}

/// `LaMa` exported to ONNX with a fixed 512x512 input.
pub const LAMA: ModelSpec = ModelSpec {
    name: "lama",
    filename: "lama_fp32.onnx",
    url: "https://huggingface.co/Carve/LaMa-ONNX/resolve/main/lama_fp32.onnx",
    approx_size: 208_000_000, // ~208 MB
};

/// Manages the model cache directory and downloads.
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache.
    ///
    /// Uses the platform-appropriate cache directory:
    /// - Windows: `%LOCALAPPDATA%\lamaerase\models`
    /// - Linux: `~/.cache/lamaerase/models`
    /// - macOS: `~/Library/Caches/lamaerase/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("lamaerase").join("models"))
    }

    /// Create a cache rooted at an explicit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self { cache_dir })
    }

    /// Path a model is stored at, whether or not it has been downloaded.
    #[must_use]
    pub fn path_for(&self, spec: &ModelSpec) -> PathBuf {
        self.cache_dir.join(spec.filename)
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn get_model_path(&self, spec: &ModelSpec) -> Result<PathBuf> {
        let path = self.path_for(spec);

        if path.exists() {
            tracing::debug!("Using cached model {}", path.display());
        } else {
            download_file(spec.url, &path, spec.name, spec.approx_size)?;
        }

        Ok(path)
    }
}

/// Load an ONNX session from `path` on the given device.
///
/// # Errors
///
/// Returns an error if the session cannot be built or the file is not a
/// valid model.
pub fn load_session(path: &Path, name: &str, device: Device) -> Result<Session> {
    let load_err = |source: ort::Error| Error::ModelLoad {
        name: name.to_string(),
        device: device.to_string(),
        source,
    };

    let builder = Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?;

    #[cfg(feature = "cuda")]
    let builder = if device == Device::Cuda {
        use ort::execution_providers::CUDAExecutionProvider;

        builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(load_err)?
    } else {
        builder
    };

    builder.commit_from_file(path).map_err(load_err)
}

/// Download a file from a URL to a path with progress indication.
#[allow(clippy::cast_possible_truncation)]
fn download_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let total_size = response.content_length().unwrap_or(approx_size);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {name}"));

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;

    let mut downloaded = 0u64;
    let mut reader = response;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = std::io::Read::read(&mut reader, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    pb.finish_with_message(format!("Downloaded {name}"));

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_model_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path().join("models")).unwrap();

        let path = cache.path_for(&LAMA);
        fs::write(&path, b"stub").unwrap();

        // No network access happens when the file is already present.
        assert_eq!(cache.get_model_path(&LAMA).unwrap(), path);
    }

    #[test]
    fn test_with_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        ModelCache::with_dir(nested.clone()).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_lama_spec() {
        assert!(LAMA.url.ends_with(LAMA.filename));
        assert_eq!(LAMA.name, "lama");
    }
}
