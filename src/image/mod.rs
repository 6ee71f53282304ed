//! Image and mask decoding, mask binarization, and result encoding.

mod load;
mod save;

pub use load::{binarize_mask, load_mask, load_rgb};
pub use save::{array_to_rgb, normalize_output, reverse_channels, save_temp_png};

/// Mask pixels strictly above this value are marked for removal.
pub const MASK_THRESHOLD: u8 = 127;

/// Mask value for pixels the engine should replace.
pub const MASK_REMOVE: u8 = 255;

/// Mask value for pixels the engine should keep.
pub const MASK_KEEP: u8 = 0;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
