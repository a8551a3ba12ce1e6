//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP, GIF, TIFF) or an
//! already-decoded image and produces the single-channel intensity image
//! that both the preprocessor and the fill classifier read from.

use image::{DynamicImage, GrayImage};

use crate::types::ScanError;

/// Decode raw image bytes and convert to grayscale.
///
/// # Errors
///
/// Returns [`ScanError::EmptyInput`] if `bytes` is empty.
/// Returns [`ScanError::ImageLoad`] if the image format is unrecognized
/// or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(to_grayscale(&img))
}

/// Convert a decoded image of any color type to 8-bit luminance.
///
/// Alpha is dropped; color images use a weighted luminance sum.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}
