//! `LaMa` inpainting through ONNX Runtime.

use std::borrow::Cow;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::{Array3, Array4};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::{MASK_KEEP, RGB_CHANNELS};
use crate::model::{self, Device, LAMA};
use crate::pipeline::{HdStrategy, InpaintConfig};

use super::{EngineOutput, InpaintEngine};

/// Side length of the exported model's square input.
pub const MODEL_SIZE: u32 = 512;

/// `LaMa` model loaded on a device.
pub struct LamaEngine {
    session: Session,
    device: Device,
}

impl LamaEngine {
    /// Load the ONNX model at `path` on `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    pub fn load(path: &Path, device: Device) -> Result<Self> {
        tracing::info!("Loading {} from {}", LAMA.name, path.display());
        let session = model::load_session(path, LAMA.name, device)?;

        Ok(Self { session, device })
    }

    /// Device the session runs on.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    fn inpaint_rgb(
        &mut self,
        image: &RgbImage,
        mask: &GrayImage,
        config: &InpaintConfig,
    ) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let longest = width.max(height);

        match config.hd_strategy {
            HdStrategy::Resize if longest > config.hd_strategy_resize_limit => {
                let (w, h) = scaled_dims(width, height, config.hd_strategy_resize_limit);
                tracing::debug!("Resize strategy: {width}x{height} -> {w}x{h}");

                let small_image = imageops::resize(image, w, h, FilterType::CatmullRom);
                let small_mask = imageops::resize(mask, w, h, FilterType::Nearest);
                let small_result = self.run_model(&small_image, &small_mask)?;

                let result = imageops::resize(&small_result, width, height, FilterType::CatmullRom);
                Ok(composite(image, &result, mask))
            }
            HdStrategy::Crop if longest > config.hd_strategy_crop_trigger_size => {
                let boxes = crop_boxes(mask, config.hd_strategy_crop_margin);
                tracing::debug!("Crop strategy: {} region(s)", boxes.len());

                let mut result = image.clone();
                for b in boxes {
                    let patch = imageops::crop_imm(image, b.x, b.y, b.width, b.height).to_image();
                    let patch_mask =
                        imageops::crop_imm(mask, b.x, b.y, b.width, b.height).to_image();
                    let filled = self.run_model(&patch, &patch_mask)?;
                    imageops::replace(&mut result, &filled, i64::from(b.x), i64::from(b.y));
                }
                Ok(result)
            }
            _ => self.run_model(image, mask),
        }
    }

    /// One pass through the network at its native input size.
    ///
    /// Pixels outside the mask come back untouched from `image`.
    fn run_model(&mut self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();

        let model_image = imageops::resize(image, MODEL_SIZE, MODEL_SIZE, FilterType::CatmullRom);
        let model_mask = imageops::resize(mask, MODEL_SIZE, MODEL_SIZE, FilterType::Nearest);

        let image_value = Tensor::from_array(image_tensor(&model_image))
            .map_err(|source| Error::Inference { source })?;
        let mask_value = Tensor::from_array(mask_tensor(&model_mask))
            .map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![
                "image" => image_value,
                "mask" => mask_value,
            ])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "inpainted image output".to_string(),
                actual: "no output".to_string(),
            })?;

        let (shape_info, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|source| Error::Inference { source })?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

        let inpainted = tensor_to_rgb(&dims, data)?;
        let inpainted = imageops::resize(&inpainted, width, height, FilterType::CatmullRom);

        Ok(composite(image, &inpainted, mask))
    }
}

impl InpaintEngine for LamaEngine {
    fn inpaint(
        &mut self,
        image: &RgbImage,
        mask: &GrayImage,
        config: &InpaintConfig,
    ) -> Result<EngineOutput> {
        // Sampler settings only matter to diffusion models.
        tracing::debug!(
            "LaMa ignores ldm_steps={} ldm_sampler={:?}",
            config.ldm_steps,
            config.ldm_sampler
        );

        let mask = fit_mask(mask, image.dimensions());
        let result = self.inpaint_rgb(image, &mask, config)?;
        Ok(EngineOutput::U8(to_bgr_array(&result)))
    }
}

/// Rescale `mask` to `(width, height)` with nearest-neighbour sampling.
///
/// Borrows when the size already matches. Nearest sampling only copies
/// existing values, so a binary mask stays binary.
#[must_use]
pub fn fit_mask(mask: &GrayImage, (width, height): (u32, u32)) -> Cow<'_, GrayImage> {
    if mask.dimensions() == (width, height) {
        return Cow::Borrowed(mask);
    }

    tracing::debug!(
        "Resizing mask {:?} to image size {width}x{height}",
        mask.dimensions()
    );
    Cow::Owned(imageops::resize(mask, width, height, FilterType::Nearest))
}

/// A region of the image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Dimensions with the longest side scaled to `limit`, aspect ratio kept.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_dims(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let ratio = f64::from(limit) / f64::from(width.max(height));
    let scale = |v: u32| ((f64::from(v) * ratio + 0.5) as u32).max(1);
    (scale(width), scale(height))
}

/// NCHW tensor in `[0, 1]`.
fn image_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..RGB_CHANNELS {
            tensor[[0, c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

/// NCHW tensor with 1.0 where the mask marks removal.
fn mask_tensor(mask: &GrayImage) -> Array4<f32> {
    let (width, height) = mask.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] != MASK_KEEP {
            tensor[[0, 0, y as usize, x as usize]] = 1.0;
        }
    }

    tensor
}

/// Convert an NCHW `[1, 3, H, W]` model output to an RGB image.
///
/// Exported checkpoints differ in output range, so values are scaled by 255
/// only when they all fit in `[0, 1]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tensor_to_rgb(dims: &[usize], data: &[f32]) -> Result<RgbImage> {
    let &[1, channels, height, width] = dims else {
        return Err(Error::ShapeMismatch {
            expected: "[1, 3, H, W]".to_string(),
            actual: format!("{dims:?}"),
        });
    };
    if channels != RGB_CHANNELS || data.len() != channels * height * width {
        return Err(Error::ShapeMismatch {
            expected: format!("[1, 3, {height}, {width}]"),
            actual: format!("{dims:?} with {} values", data.len()),
        });
    }

    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let scale = if max <= 1.0 { 255.0 } else { 1.0 };
    let plane = height * width;

    let mut img = RgbImage::new(width as u32, height as u32);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let offset = y as usize * width + x as usize;
        for c in 0..RGB_CHANNELS {
            pixel[c] = (data[c * plane + offset] * scale).clamp(0.0, 255.0) as u8;
        }
    }

    Ok(img)
}

/// Take `inpainted` where the mask marks removal and `original` elsewhere.
fn composite(original: &RgbImage, inpainted: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut result = original.clone();

    for (x, y, pixel) in result.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] != MASK_KEEP {
            *pixel = *inpainted.get_pixel(x, y);
        }
    }

    result
}

/// HWC array in BGR order.
fn to_bgr_array(image: &RgbImage) -> Array3<u8> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn(
        (height as usize, width as usize, RGB_CHANNELS),
        |(y, x, c)| {
            #[allow(clippy::cast_possible_truncation)]
            let pixel = image.get_pixel(x as u32, y as u32);
            pixel[RGB_CHANNELS - 1 - c]
        },
    )
}

/// Bounding boxes of each connected masked region, grown by `margin`.
///
/// Boxes that hit an image edge are shifted inward to keep the same amount
/// of context where possible.
fn crop_boxes(mask: &GrayImage, margin: u32) -> Vec<CropBox> {
    let (img_w, img_h) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([MASK_KEEP]));

    // label -> (min_x, min_y, max_x, max_y), inclusive
    let mut extents: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if extents.len() < label {
            extents.resize(label, None);
        }
        let slot = &mut extents[label - 1];
        *slot = Some(match *slot {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    extents
        .into_iter()
        .flatten()
        .map(|(x0, y0, x1, y1)| {
            let (left, right) = expand_span(x0, x1 + 1, margin, img_w);
            let (top, bottom) = expand_span(y0, y1 + 1, margin, img_h);
            CropBox {
                x: left,
                y: top,
                width: right - left,
                height: bottom - top,
            }
        })
        .collect()
}

/// Grow the half-open span `[start, end)` by `margin` on both sides, centred,
/// then shift it back inside `[0, limit)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expand_span(start: u32, end: u32, margin: u32, limit: u32) -> (u32, u32) {
    let (start, end, margin, limit) = (
        i64::from(start),
        i64::from(end),
        i64::from(margin),
        i64::from(limit),
    );
    let centre = (start + end) / 2;
    let half = (end - start + margin * 2) / 2;

    let (raw_lo, raw_hi) = (centre - half, centre + half);
    let mut lo = raw_lo.max(0);
    let mut hi = raw_hi.min(limit);
    if raw_lo < 0 {
        hi += -raw_lo;
    }
    if raw_hi > limit {
        lo -= raw_hi - limit;
    }

    (lo.clamp(0, limit) as u32, hi.clamp(0, limit) as u32)
}
