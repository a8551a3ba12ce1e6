//! Preprocessing: grayscale in, smoothed image and binary outline map out.

use image::GrayImage;

use crate::blur::bilateral_filter;
use crate::threshold::adaptive_threshold;
use crate::types::PreprocessParameters;

/// Images produced by preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessing {
    /// Bilateral-filtered grayscale.
    pub smoothed: GrayImage,
    /// Adaptive-threshold binary map (0 = ink, 255 = paper).
    pub binary: GrayImage,
}

/// Smooth `gray` and binarize it against its local mean.
#[must_use = "returns the preprocessed images"]
pub fn preprocess(gray: &GrayImage, params: &PreprocessParameters) -> Preprocessing {
    let smoothed = bilateral_filter(
        gray,
        params.bilateral_diameter,
        params.bilateral_sigma_color,
        params.bilateral_sigma_space,
    );
    let binary = adaptive_threshold(
        &smoothed,
        params.threshold_block_size,
        params.threshold_offset,
    );
    Preprocessing { smoothed, binary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_hollow_circle_mut;

    #[test]
    fn blank_page_binarizes_to_paper() {
        let gray = GrayImage::from_pixel(40, 40, Luma([240]));
        let out = preprocess(&gray, &PreprocessParameters::default());
        assert!(out.binary.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn printed_outline_survives_as_ink() {
        let mut gray = GrayImage::from_pixel(80, 80, Luma([250]));
        for r in 19..=21 {
            draw_hollow_circle_mut(&mut gray, (40, 40), r, Luma([10]));
        }
        let out = preprocess(&gray, &PreprocessParameters::default());
        assert_eq!(out.binary.get_pixel(60, 40).0[0], 0, "outline should be ink");
        assert_eq!(out.binary.get_pixel(40, 40).0[0], 255, "center should be paper");
        assert_eq!(out.smoothed.dimensions(), (80, 80));
    }
}
