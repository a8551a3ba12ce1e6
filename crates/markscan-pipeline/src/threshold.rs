//! Local adaptive binarization.
//!
//! Each pixel is compared with a Gaussian-weighted mean of its block
//! rather than one global cutoff, so a form photographed under uneven
//! light still yields clean outlines: pixels noticeably darker than
//! their surroundings become 0, everything else 255.

use image::{GrayImage, Luma};

/// Gaussian sigma matching a square block of side `block_size`.
///
/// Same rule of thumb OpenCV uses to derive a sigma from a kernel size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn block_sigma(block_size: u32) -> f32 {
    0.3f32.mul_add(
        (block_size.saturating_sub(1) as f32).mul_add(0.5, -1.0),
        0.8,
    )
}

/// Binarize `image` against its local Gaussian-weighted mean.
///
/// A pixel becomes white (255) when it is brighter than the local mean
/// minus `offset`, black (0) otherwise. Uniform regions therefore come
/// out white for any positive offset; only ink edges and strokes turn
/// black.
#[must_use = "returns the binary map"]
pub fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let sigma = block_sigma(block_size).max(0.1);
    let local_mean = imageproc::filter::gaussian_blur_f32(image, sigma);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = i16::from(image.get_pixel(x, y).0[0]);
        let mean = i16::from(local_mean.get_pixel(x, y).0[0]);
        if value > mean - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sigma_matches_reference_values() {
        assert!((block_sigma(11) - 2.0).abs() < 1e-6);
        assert!((block_sigma(3) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let out = adaptive_threshold(&img, 11, 2);
        assert_eq!((out.width(), out.height()), (17, 31));
    }

    #[test]
    fn uniform_image_becomes_white() {
        for level in [0u8, 90, 200, 255] {
            let img = GrayImage::from_pixel(20, 20, Luma([level]));
            let out = adaptive_threshold(&img, 11, 2);
            assert!(
                out.pixels().all(|p| p.0[0] == 255),
                "uniform level {level} should binarize to white",
            );
        }
    }

    #[test]
    fn output_is_binary() {
        let img = GrayImage::from_fn(30, 30, |x, y| Luma([u8::try_from((x * 7 + y * 3) % 256).unwrap_or(0)]));
        let out = adaptive_threshold(&img, 11, 2);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn dark_stroke_on_paper_becomes_black() {
        let img = GrayImage::from_fn(30, 30, |x, _y| {
            if (14..=16).contains(&x) { Luma([20]) } else { Luma([230]) }
        });
        let out = adaptive_threshold(&img, 11, 2);
        assert_eq!(out.get_pixel(15, 15).0[0], 0, "stroke should be black");
        assert_eq!(out.get_pixel(2, 15).0[0], 255, "paper should be white");
        assert_eq!(out.get_pixel(27, 15).0[0], 255, "paper should be white");
    }

    #[test]
    fn stroke_survives_lighting_gradient() {
        // Paper brightness ramps from 140 to 240 left to right; a stroke
        // 60 levels darker than its surroundings sits in the dim half.
        let img = GrayImage::from_fn(60, 20, |x, _y| {
            let paper = 140 + x * 100 / 59;
            let v = if (10..=11).contains(&x) { paper - 60 } else { paper };
            Luma([u8::try_from(v).unwrap_or(255)])
        });
        let out = adaptive_threshold(&img, 11, 2);
        assert_eq!(out.get_pixel(10, 10).0[0], 0);
        assert_eq!(out.get_pixel(40, 10).0[0], 255);
    }
}
