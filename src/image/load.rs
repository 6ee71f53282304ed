//! Image and mask loading utilities.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::map::map_colors;

use crate::error::{Error, Result};

use super::MASK_THRESHOLD;

/// Load an image from disk as 8-bit RGB.
///
/// Images stored in any other color representation (grayscale, RGBA, 16-bit,
/// float) are converted to RGB8. Alpha is dropped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let img = open(path)?;

    Ok(match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            tracing::debug!("Converting image from {:?} to RGB8", other.color());
            other.to_rgb8()
        }
    })
}

/// Load a mask from disk as 8-bit grayscale.
///
/// Non-grayscale masks are reduced with ITU-R 601-2 luma weights
/// (0.299, 0.587, 0.114). The mask is not binarized here; see
/// [`binarize_mask`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    let path = path.as_ref();
    let img = open(path)?;

    Ok(match img {
        DynamicImage::ImageLuma8(gray) => gray,
        other => {
            tracing::debug!("Converting mask from {:?} to L8", other.color());
            bt601_luma(&other.to_rgb8())
        }
    })
}

/// Grayscale from RGB with 601 weights in 16-bit fixed point, rounded.
#[allow(clippy::cast_possible_truncation)]
fn bt601_luma(rgb: &RgbImage) -> GrayImage {
    map_colors(rgb, |Rgb([r, g, b])| {
        let l = u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000;
        Luma([(l >> 16) as u8])
    })
}

/// Binarize a grayscale mask.
///
/// Pixels strictly greater than 127 become 255 (remove), everything else
/// becomes 0 (keep). There is no feathering of the boundary.
#[must_use]
pub fn binarize_mask(mask: &GrayImage) -> GrayImage {
    threshold(mask, MASK_THRESHOLD, ThresholdType::Binary)
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    use crate::image::{MASK_KEEP, MASK_REMOVE};

    fn gradient_mask() -> GrayImage {
        GrayImage::from_fn(16, 16, |x, y| Luma([(x * 16 + y) as u8]))
    }

    #[test]
    fn test_low_values_binarize_to_keep() {
        let mask = GrayImage::from_fn(8, 8, |x, y| Luma([((x + y * 8) * 2) as u8]));
        assert!(mask.pixels().all(|p| p[0] <= 127));

        let binary = binarize_mask(&mask);
        assert!(binary.pixels().all(|p| p[0] == MASK_KEEP));
    }

    #[test]
    fn test_high_values_binarize_to_remove() {
        let mask = GrayImage::from_fn(8, 8, |x, y| Luma([128 + (x + y * 8) as u8]));

        let binary = binarize_mask(&mask);
        assert!(binary.pixels().all(|p| p[0] == MASK_REMOVE));
    }

    #[test]
    fn test_threshold_boundary() {
        let mask = GrayImage::from_raw(4, 1, vec![126, 127, 128, 129]).unwrap();
        let binary = binarize_mask(&mask);

        assert_eq!(binary.into_raw(), vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_binarize_idempotent() {
        let once = binarize_mask(&gradient_mask());
        let twice = binarize_mask(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_load_rgba_converts_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 40]))
            .save(&path)
            .unwrap();

        let rgb = load_rgb(&path).unwrap();
        assert_eq!(rgb.dimensions(), (5, 3));
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_load_color_mask_converts_to_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let mask = load_mask(&path).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_color_mask_uses_601_luma() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("magenta.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([255, 50, 255]))
            .save(&path)
            .unwrap();

        let mask = load_mask(&path).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 135);
        assert!(binarize_mask(&mask).pixels().all(|p| p[0] == MASK_REMOVE));
    }

    #[test]
    fn test_601_luma_keeps_gray_values() {
        let rgb = image::RgbImage::from_fn(256, 1, |x, _| image::Rgb([x as u8; 3]));
        let gray = bt601_luma(&rgb);

        assert!(gray.enumerate_pixels().all(|(x, _, p)| u32::from(p[0]) == x));
    }

    #[test]
    fn test_601_luma_primaries() {
        let rgb = image::RgbImage::from_raw(3, 1, vec![255, 0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        assert_eq!(bt601_luma(&rgb).into_raw(), vec![76, 150, 29]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_rgb("does/not/exist.png").unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
