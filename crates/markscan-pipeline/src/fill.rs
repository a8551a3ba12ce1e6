//! Shaded/empty classification of detected bubbles.
//!
//! Statistics are taken from the grayscale image, not the binary map,
//! over a disk slightly smaller than the detected circle so the printed
//! outline does not count as ink. A bubble is shaded only when the dark
//! pixel share, the mean and the median all agree.

use image::GrayImage;

use crate::types::{Circle, FillAnalysis, ShadingParameters};

/// Analyze every circle in order.
#[must_use = "returns one analysis per circle"]
pub fn classify_all(
    gray: &GrayImage,
    circles: &[Circle],
    params: &ShadingParameters,
) -> Vec<FillAnalysis> {
    circles
        .iter()
        .map(|circle| analyze_fill(gray, circle, params))
        .collect()
}

/// Measure the inked share of one bubble and decide whether it is shaded.
///
/// The mask radius is `max(1, radius - mask_inset)`. Only pixels inside
/// the image count; a mask with no such pixels yields
/// [`FillAnalysis::empty`].
#[must_use = "returns the fill analysis"]
pub fn analyze_fill(gray: &GrayImage, circle: &Circle, params: &ShadingParameters) -> FillAnalysis {
    let histogram = masked_histogram(gray, circle, params.mask_inset);
    let count: u64 = histogram.iter().sum();
    if count == 0 {
        return FillAnalysis::empty(circle.id);
    }

    let dark: u64 = histogram[..usize::from(params.dark_threshold)].iter().sum();
    let total: u64 = histogram
        .iter()
        .zip(0u64..)
        .map(|(&n, value)| n * value)
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let (fill_percentage, mean_intensity) = (
        dark as f64 / count as f64 * 100.0,
        total as f64 / count as f64,
    );
    let median_intensity = median(&histogram, count);

    let is_shaded = fill_percentage > params.fill_ratio_threshold * 100.0
        && mean_intensity < params.mean_intensity_threshold
        && median_intensity < params.median_intensity_threshold;

    FillAnalysis {
        circle_id: circle.id,
        fill_percentage,
        is_shaded,
        mean_intensity,
        median_intensity,
        pixel_count: usize::try_from(count).unwrap_or(usize::MAX),
    }
}

/// Intensity histogram of the in-image pixels under the shrunken disk.
fn masked_histogram(gray: &GrayImage, circle: &Circle, inset: u32) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    let radius = (i64::from(circle.radius) - i64::from(inset)).max(1);
    let (cx, cy) = (i64::from(circle.center.x), i64::from(circle.center.y));
    let (w, h) = (i64::from(gray.width()), i64::from(gray.height()));

    for y in (cy - radius).max(0)..=(cy + radius).min(h - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(w - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            // Both coordinates were clamped into the image above.
            let (Ok(px), Ok(py)) = (u32::try_from(x), u32::try_from(y)) else {
                continue;
            };
            histogram[usize::from(gray.get_pixel(px, py).0[0])] += 1;
        }
    }
    histogram
}

/// Median of a histogram holding `count > 0` samples.
///
/// For an even count this is the mean of the two middle values.
fn median(histogram: &[u64; 256], count: u64) -> f64 {
    let lower_rank = (count - 1) / 2;
    let upper_rank = count / 2;
    let (mut lower, mut upper) = (None, None);
    let mut seen = 0u64;
    for (value, &n) in (0u8..=255).zip(histogram.iter()) {
        seen += n;
        if lower.is_none() && seen > lower_rank {
            lower = Some(value);
        }
        if seen > upper_rank {
            upper = Some(value);
            break;
        }
    }
    match (lower, upper) {
        (Some(a), Some(b)) => (f64::from(a) + f64::from(b)) / 2.0,
        _ => 0.0,
    }
}
