//! Gradient Hough circle search.
//!
//! Every edge pixel votes for possible centers along its gradient
//! normal, in both directions, at each distance in the radius range.
//! Accumulator cells that are local maxima with enough votes become
//! center proposals. Proposals are taken strongest first, dropped when
//! they sit closer than `min_center_distance` to an accepted circle,
//! and given the radius that best explains the surrounding edge pixels.
//!
//! A proposal is only accepted when edge pixels cover a real share of
//! its circumference ([`MIN_ARC_COVERAGE`]). Without that check, points
//! between neighboring bubbles collect enough stray votes from the
//! surrounding outlines to pass as circles.

use image::GrayImage;

use crate::edge::{self, EdgeMap};
use crate::types::{Center, CircleCandidate, DetectionParameters};

/// Fraction of `2πr` that must be backed by edge pixels.
pub const MIN_ARC_COVERAGE: f64 = 0.4;

/// Width of the radius window, in 1-pixel bins, when scoring a radius.
const RADIUS_WINDOW: usize = 3;

/// Find circles in a binary outline map.
///
/// Returns candidates in acceptance order (strongest first). The caller
/// imposes reading order.
#[must_use = "returns the detected circles"]
pub fn detect_circles(binary: &GrayImage, params: &DetectionParameters) -> Vec<CircleCandidate> {
    let edges = edge::detect(binary, params.edge_threshold);
    find_circles(&edges, params)
}

/// Run the circle search on an already computed edge map.
#[must_use = "returns the detected circles"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn find_circles(edge_map: &EdgeMap, params: &DetectionParameters) -> Vec<CircleCandidate> {
    let (w, h) = edge_map.edges.dimensions();
    let min_r = params.min_radius;
    let max_r = params.max_radius.max(min_r);
    if w == 0 || h == 0 || max_r == 0 {
        return Vec::new();
    }

    let mut acc = Accumulator::new(w, h, params.resolution_ratio);
    for (x, y) in edge_map.edge_pixels() {
        let gx = f64::from(edge_map.gx.get_pixel(x, y).0[0]);
        let gy = f64::from(edge_map.gy.get_pixel(x, y).0[0]);
        let norm = gx.hypot(gy);
        if norm <= 0.0 {
            continue;
        }
        let (ux, uy) = (gx / norm, gy / norm);
        for sign in [1.0, -1.0] {
            acc.vote_along(f64::from(x), f64::from(y), sign * ux, sign * uy, min_r, max_r);
        }
    }

    let mut peaks = acc.peaks(params.accumulator_threshold);
    // Strongest first; ties keep raster order.
    peaks.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.index.cmp(&b.index)));

    let min_dist_sq = params.min_center_distance * params.min_center_distance;
    let mut accepted: Vec<(f64, f64, CircleCandidate)> = Vec::new();

    for peak in peaks {
        let (cx, cy) = acc.cell_center(peak.index);
        let crowded = accepted.iter().any(|&(ax, ay, _)| {
            let (dx, dy) = (ax - cx, ay - cy);
            dx.mul_add(dx, dy * dy) < min_dist_sq
        });
        if crowded {
            continue;
        }

        let Some((radius, support)) = estimate_radius(&edge_map.edges, cx, cy, min_r, max_r) else {
            continue;
        };
        let circumference = 2.0 * std::f64::consts::PI * f64::from(radius.max(1));
        if support < params.accumulator_threshold
            || f64::from(support) < MIN_ARC_COVERAGE * circumference
        {
            continue;
        }

        let candidate = CircleCandidate {
            center: Center::new(cx.round() as i32, cy.round() as i32),
            radius,
            votes: peak.votes,
        };
        accepted.push((cx, cy, candidate));
    }

    tracing::debug!(
        edge_pixels = edge_map.edge_count(),
        circles = accepted.len(),
        "hough search finished"
    );

    accepted.into_iter().map(|(_, _, c)| c).collect()
}

/// A local maximum of the accumulator.
#[derive(Debug, Clone, Copy)]
struct Peak {
    index: usize,
    votes: u32,
}

/// Vote grid at `1 / dp` of the image resolution.
struct Accumulator {
    width: usize,
    height: usize,
    dp: f64,
    votes: Vec<u32>,
}

impl Accumulator {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(image_width: u32, image_height: u32, ratio: f64) -> Self {
        let dp = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        let width = (f64::from(image_width) / dp).ceil() as usize + 1;
        let height = (f64::from(image_height) / dp).ceil() as usize + 1;
        Self {
            width,
            height,
            dp,
            votes: vec![0; width * height],
        }
    }

    /// Cell containing image point `(x, y)`, if any.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn cell_of(&self, x: f64, y: f64) -> Option<usize> {
        let (i, j) = ((x / self.dp).round(), (y / self.dp).round());
        if i < 0.0 || j < 0.0 {
            return None;
        }
        let (i, j) = (i as usize, j as usize);
        (i < self.width && j < self.height).then_some(j * self.width + i)
    }

    /// Image position represented by cell `index`.
    #[allow(clippy::cast_precision_loss)]
    fn cell_center(&self, index: usize) -> (f64, f64) {
        let (i, j) = (index % self.width, index / self.width);
        (i as f64 * self.dp, j as f64 * self.dp)
    }

    /// Cast one vote per cell along the ray from `(x, y)` in direction
    /// `(ux, uy)` for distances `min_r..=max_r`.
    fn vote_along(&mut self, x: f64, y: f64, ux: f64, uy: f64, min_r: u32, max_r: u32) {
        let mut previous = None;
        for r in min_r..=max_r {
            let r = f64::from(r);
            let Some(cell) = self.cell_of(ux.mul_add(r, x), uy.mul_add(r, y)) else {
                break;
            };
            if previous == Some(cell) {
                continue;
            }
            self.votes[cell] += 1;
            previous = Some(cell);
        }
    }

    fn get(&self, i: isize, j: isize) -> u32 {
        let (Ok(i), Ok(j)) = (usize::try_from(i), usize::try_from(j)) else {
            return 0;
        };
        if i >= self.width || j >= self.height {
            return 0;
        }
        self.votes[j * self.width + i]
    }

    /// Cells with at least `threshold` votes that beat their left and
    /// upper neighbors and are not beaten by their right and lower ones.
    #[allow(clippy::cast_possible_wrap)]
    fn peaks(&self, threshold: u32) -> Vec<Peak> {
        let threshold = threshold.max(1);
        self.votes
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v >= threshold)
            .filter(|&(index, &v)| {
                let (i, j) = ((index % self.width) as isize, (index / self.width) as isize);
                v > self.get(i - 1, j)
                    && v >= self.get(i + 1, j)
                    && v > self.get(i, j - 1)
                    && v >= self.get(i, j + 1)
            })
            .map(|(index, &votes)| Peak { index, votes })
            .collect()
    }
}

/// Pick the radius whose [`RADIUS_WINDOW`]-bin neighborhood holds the
/// most edge pixels around `(cx, cy)`.
///
/// Returns `(radius, supporting edge pixels)`, or `None` when no edge
/// pixel lies in the radius range. Ties go to the smaller radius.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn estimate_radius(
    edges: &GrayImage,
    cx: f64,
    cy: f64,
    min_r: u32,
    max_r: u32,
) -> Option<(u32, u32)> {
    let (w, h) = edges.dimensions();
    let reach = f64::from(max_r) + 1.0;
    let x0 = (cx - reach).floor().max(0.0) as u32;
    let y0 = (cy - reach).floor().max(0.0) as u32;
    let x1 = ((cx + reach).ceil() as u32).min(w - 1);
    let y1 = ((cy + reach).ceil() as u32).min(h - 1);

    let mut histogram = vec![0u32; (max_r - min_r) as usize + 1];
    for y in y0..=y1 {
        for x in x0..=x1 {
            if edges.get_pixel(x, y).0[0] != 255 {
                continue;
            }
            let d = (f64::from(x) - cx).hypot(f64::from(y) - cy).round();
            if d < f64::from(min_r) || d > f64::from(max_r) {
                continue;
            }
            histogram[d as usize - min_r as usize] += 1;
        }
    }

    let half = RADIUS_WINDOW / 2;
    let mut best: Option<(usize, u32)> = None;
    for center in 0..histogram.len() {
        let lo = center.saturating_sub(half);
        let hi = (center + half).min(histogram.len() - 1);
        let support: u32 = histogram[lo..=hi].iter().sum();
        if support > best.map_or(0, |(_, s)| s) {
            best = Some((center, support));
        }
    }

    best.map(|(bin, support)| (min_r + bin as u32, support))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_hollow_circle_mut;

    /// White canvas with black rings of the given radii around each center.
    fn rings(w: u32, h: u32, centers: &[(i32, i32)], radius: i32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        for &c in centers {
            for r in radius - 1..=radius + 1 {
                draw_hollow_circle_mut(&mut img, c, r, Luma([0]));
            }
        }
        img
    }

    #[test]
    fn blank_image_has_no_circles() {
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        assert!(detect_circles(&img, &DetectionParameters::default()).is_empty());
    }

    #[test]
    fn empty_image_has_no_circles() {
        let img = GrayImage::new(0, 0);
        assert!(detect_circles(&img, &DetectionParameters::default()).is_empty());
    }

    #[test]
    fn single_ring_is_found() {
        let img = rings(100, 100, &[(50, 50)], 25);
        let circles = detect_circles(&img, &DetectionParameters::default());
        assert_eq!(circles.len(), 1, "got {circles:?}");
        let c = circles[0];
        assert!((c.center.x - 50).abs() <= 3, "center x {}", c.center.x);
        assert!((c.center.y - 50).abs() <= 3, "center y {}", c.center.y);
        assert!((20..=30).contains(&c.radius), "radius {}", c.radius);
        assert!(c.votes >= 30);
    }

    #[test]
    fn grid_of_rings_yields_one_circle_each() {
        let centers = [(60, 60), (60, 130), (60, 200), (200, 60), (200, 130), (200, 200)];
        let img = rings(260, 260, &centers, 20);
        let circles = detect_circles(&img, &DetectionParameters::default());
        assert_eq!(circles.len(), centers.len(), "got {circles:?}");
        for &(x, y) in &centers {
            assert!(
                circles
                    .iter()
                    .any(|c| (c.center.x - x).abs() <= 3 && (c.center.y - y).abs() <= 3),
                "no circle near ({x}, {y})",
            );
        }
    }

    #[test]
    fn ring_outside_radius_range_is_ignored() {
        let img = rings(100, 100, &[(50, 50)], 25);
        let params = DetectionParameters {
            min_radius: 35,
            max_radius: 45,
            ..DetectionParameters::default()
        };
        assert!(detect_circles(&img, &params).is_empty());
    }

    #[test]
    fn min_center_distance_keeps_only_one_of_concentric_rings() {
        let mut img = rings(120, 120, &[(60, 60)], 20);
        for r in 29..=31 {
            draw_hollow_circle_mut(&mut img, (60, 60), r, Luma([0]));
        }
        let circles = detect_circles(&img, &DetectionParameters::default());
        assert_eq!(circles.len(), 1, "got {circles:?}");
    }

    #[test]
    fn unreachable_vote_threshold_finds_nothing() {
        let img = rings(100, 100, &[(50, 50)], 25);
        let params = DetectionParameters {
            accumulator_threshold: 100_000,
            ..DetectionParameters::default()
        };
        assert!(detect_circles(&img, &params).is_empty());
    }

    #[test]
    fn coarser_accumulator_still_finds_ring() {
        let img = rings(100, 100, &[(50, 50)], 25);
        let params = DetectionParameters {
            resolution_ratio: 2.0,
            ..DetectionParameters::default()
        };
        let circles = detect_circles(&img, &params);
        assert_eq!(circles.len(), 1, "got {circles:?}");
        assert!((circles[0].center.x - 50).abs() <= 4);
    }
}
