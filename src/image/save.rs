//! Result conversion and saving utilities.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use ndarray::{s, Array3};

use crate::engine::EngineOutput;
use crate::error::{Error, Result};

use super::RGB_CHANNELS;

/// Convert an engine result to 8-bit values.
///
/// `u8` arrays pass through. Float arrays whose maximum is at most 1.0 are
/// treated as normalized and scaled by 255; anything else is cast directly,
/// saturating at the ends of the `u8` range. NaN does not take part in the
/// range check and becomes 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_output(output: EngineOutput) -> Array3<u8> {
    match output {
        EngineOutput::U8(array) => array,
        EngineOutput::F32(array) => {
            let non_finite = array.iter().filter(|v| !v.is_finite()).count();
            if non_finite > 0 {
                tracing::debug!("Engine output has {non_finite} non-finite value(s)");
            }

            let max = array.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if max <= 1.0 {
                array.mapv(|v| (v * 255.0) as u8)
            } else {
                array.mapv(|v| v as u8)
            }
        }
    }
}

/// Reverse the channel axis of an HWC array (BGR <-> RGB).
#[must_use]
pub fn reverse_channels(array: &Array3<u8>) -> Array3<u8> {
    array.slice(s![.., .., ..;-1]).to_owned()
}

/// Build an RGB image from an HWC array.
///
/// # Errors
///
/// Returns an error if the array does not have exactly three channels.
pub fn array_to_rgb(array: &Array3<u8>) -> Result<RgbImage> {
    let (height, width, channels) = array.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("{RGB_CHANNELS} channels"),
            actual: format!("{channels} channels"),
        });
    }

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(Error::ShapeMismatch {
            expected: "dimensions within u32".to_string(),
            actual: format!("{width}x{height}"),
        });
    };

    // `iter` walks in logical (row-major) order regardless of memory layout,
    // so reversed-stride views flatten correctly.
    let raw: Vec<u8> = array.iter().copied().collect();

    RgbImage::from_raw(w, h, raw).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{} bytes", width * height * RGB_CHANNELS),
        actual: "short buffer".to_string(),
    })
}

/// Write an image as PNG to a freshly created temporary file.
///
/// The file is kept on disk; removing it is up to the caller.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn save_temp_png(img: &RgbImage) -> Result<PathBuf> {
    save_png_in(img, &std::env::temp_dir())
}

/// Encode into a new temp file under `dir` and keep it only once the PNG is
/// fully written. On failure the file is removed when the handle drops.
fn save_png_in(img: &RgbImage, dir: &Path) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("lamaerase-")
        .suffix(".png")
        .tempfile_in(dir)?;

    img.write_to(file.as_file_mut(), ImageFormat::Png)
        .map_err(|source| Error::ImageSave {
            path: file.path().to_path_buf(),
            source,
        })?;

    let (_file, path) = file.keep().map_err(|err| Error::Io(err.error))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_u8_passthrough() {
        let array = Array3::from_shape_fn((2, 2, 3), |(y, x, c)| (y * 6 + x * 3 + c) as u8);
        let out = normalize_output(EngineOutput::U8(array.clone()));
        assert_eq!(out, array);
    }

    #[test]
    fn test_normalize_unit_floats_scaled() {
        let mut array = Array3::from_elem((1, 2, 3), 1.0_f32);
        array[[0, 0, 0]] = 0.5;

        let out = normalize_output(EngineOutput::F32(array));
        assert_eq!(out[[0, 0, 0]], 127);
        assert_eq!(out[[0, 1, 2]], 255);
    }

    #[test]
    fn test_normalize_large_floats_cast() {
        let mut array = Array3::from_elem((1, 1, 3), 200.7_f32);
        array[[0, 0, 1]] = 3.0;

        let out = normalize_output(EngineOutput::F32(array));
        assert_eq!(out.as_slice().unwrap(), &[200, 3, 200]);
    }

    #[test]
    fn test_reverse_channels() {
        let array = Array3::from_shape_vec((1, 2, 3), vec![1, 2, 3, 4, 5, 6]).unwrap();
        let reversed = reverse_channels(&array);

        assert_eq!(reversed.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_reverse_channels_self_inverse() {
        let array = Array3::from_shape_fn((4, 5, 3), |(y, x, c)| (y * 31 + x * 7 + c * 3) as u8);
        assert_eq!(reverse_channels(&reverse_channels(&array)), array);
    }

    #[test]
    fn test_array_to_rgb_layout() {
        let array = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 100 + x * 10 + c) as u8);
        let img = array_to_rgb(&array).unwrap();

        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [120, 121, 122]);
    }

    #[test]
    fn test_array_to_rgb_rejects_alpha() {
        let array = Array3::<u8>::zeros((2, 2, 4));
        assert!(matches!(
            array_to_rgb(&array),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_temp_png_persists() {
        let img = RgbImage::from_pixel(3, 3, image::Rgb([9, 8, 7]));
        let path = save_temp_png(&img).unwrap();

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded, img);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();

        // PNG cannot encode an empty image.
        let err = save_png_in(&RgbImage::new(0, 0), dir.path()).unwrap_err();

        assert!(matches!(err, Error::ImageSave { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_png_in_keeps_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));

        let path = save_png_in(&img, dir.path()).unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(image::open(&path).unwrap().to_rgb8(), img);
    }

    #[test]
    fn test_normalize_non_finite_floats_become_zero() {
        let array = Array3::from_shape_vec((1, 1, 3), vec![f32::NAN, 0.5, 1.0]).unwrap();

        let out = normalize_output(EngineOutput::F32(array));
        assert_eq!(out.as_slice().unwrap(), &[0, 127, 255]);
    }
}
