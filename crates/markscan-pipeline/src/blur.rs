//! Edge-preserving bilateral smoothing.
//!
//! Scanned forms carry paper grain and sensor noise that produce
//! spurious edges. A Gaussian blur would also soften the thin printed
//! bubble outlines, so each output pixel is instead a weighted mean of
//! its neighborhood where the weight falls off both with distance and
//! with intensity difference. Flat regions are smoothed; steps between
//! ink and paper survive.

use image::{GrayImage, Luma};

/// Apply a bilateral filter to a grayscale image.
///
/// `diameter` is the side of the square neighborhood (odd values are
/// symmetric; even values are rounded down to the radius `diameter / 2`).
/// A diameter below 2 or a non-positive sigma returns the image
/// unchanged.
#[must_use = "returns the smoothed image"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn bilateral_filter(
    image: &GrayImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let radius = (diameter / 2) as i32;
    if radius == 0 || sigma_color <= 0.0 || sigma_space <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width() as i32, image.height() as i32);

    // Spatial weights for the disk-shaped neighborhood, precomputed once.
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let offsets: Vec<(i32, i32, f32)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx * dx + dy * dy <= radius * radius)
        .map(|(dx, dy)| (dx, dy, ((dx * dx + dy * dy) as f32 * space_coeff).exp()))
        .collect();

    // Range weights for every possible intensity difference.
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let range: [f32; 256] =
        std::array::from_fn(|d| ((d * d) as f32 * color_coeff).exp());

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let center = image.get_pixel(x, y).0[0];
        let (cx, cy) = (x as i32, y as i32);
        let mut sum = 0.0_f32;
        let mut norm = 0.0_f32;
        for &(dx, dy, space_weight) in &offsets {
            // Replicate the border.
            let sx = (cx + dx).clamp(0, w - 1) as u32;
            let sy = (cy + dy).clamp(0, h - 1) as u32;
            let value = image.get_pixel(sx, sy).0[0];
            let weight = space_weight * range[usize::from(center.abs_diff(value))];
            sum += weight * f32::from(value);
            norm += weight;
        }
        // `norm` includes the center pixel's weight of 1.0.
        Luma([(sum / norm).round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical black/white boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 { Luma([0]) } else { Luma([255]) }
        })
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let out = bilateral_filter(&img, 9, 75.0, 75.0);
        assert_eq!((out.width(), out.height()), (17, 31));
    }

    #[test]
    fn small_diameter_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(bilateral_filter(&img, 1, 75.0, 75.0), img);
        assert_eq!(bilateral_filter(&img, 0, 75.0, 75.0), img);
    }

    #[test]
    fn non_positive_sigma_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(bilateral_filter(&img, 9, 0.0, 75.0), img);
        assert_eq!(bilateral_filter(&img, 9, 75.0, -1.0), img);
    }

    #[test]
    fn uniform_image_unchanged() {
        let img = GrayImage::from_pixel(12, 12, Luma([128]));
        assert_eq!(bilateral_filter(&img, 9, 75.0, 75.0), img);
    }

    #[test]
    fn strong_edge_survives() {
        let out = bilateral_filter(&sharp_edge_image(), 9, 75.0, 75.0);
        // A 255-level step is far outside the range sigma: neither side
        // may drift more than a few levels toward the other.
        let dark = out.get_pixel(9, 10).0[0];
        let light = out.get_pixel(10, 10).0[0];
        assert!(dark < 10, "dark side bled to {dark}");
        assert!(light > 245, "light side bled to {light}");
    }

    #[test]
    fn small_noise_is_smoothed() {
        // Checkerboard of 120/136: a difference well inside the range sigma.
        let img = GrayImage::from_fn(15, 15, |x, y| {
            if (x + y) % 2 == 0 { Luma([120]) } else { Luma([136]) }
        });
        let out = bilateral_filter(&img, 9, 75.0, 75.0);
        let v = out.get_pixel(7, 7).0[0];
        assert!(
            (124..=132).contains(&v),
            "expected noise to average toward 128, got {v}",
        );
    }
}
