//! Edge extraction for the circle search.
//!
//! The Hough stage needs two things from the binary map: thin edge
//! pixels and the gradient direction at each of them, so votes can be
//! cast along the normal instead of in every direction. [`detect`]
//! produces both in one pass.
//!
//! This is Canny with a light pre-blur. The binary map has staircase
//! outlines whose raw Sobel directions are too coarse for voting, so the
//! map is smoothed with [`GRADIENT_SIGMA`] before gradients, non-maximum
//! suppression and hysteresis.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Minimum allowed edge threshold.
///
/// A zero low threshold marks every pixel with any gradient as a
/// potential edge and floods the accumulator with votes.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Gaussian sigma applied before taking gradients.
pub const GRADIENT_SIGMA: f32 = 1.0;

/// Thin edges plus the Sobel gradients they were derived from.
#[derive(Debug, Clone)]
pub struct EdgeMap {
    /// 255 for edge pixels, 0 elsewhere.
    pub edges: GrayImage,
    /// Horizontal Sobel response.
    pub gx: Image<Luma<i16>>,
    /// Vertical Sobel response.
    pub gy: Image<Luma<i16>>,
}

impl EdgeMap {
    /// Coordinates of every edge pixel, row by row.
    pub fn edge_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
    }

    /// Number of edge pixels.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_pixels().count()
    }
}

/// Horizontal and vertical Sobel responses of `image`.
#[must_use = "returns the gradient images"]
pub fn sobel(image: &GrayImage) -> (Image<Luma<i16>>, Image<Luma<i16>>) {
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    (gx, gy)
}

/// Detect edges using `high_threshold` and half of it as the low
/// threshold.
///
/// Gradient strength is the L1 norm `|gx| + |gy|`. Both thresholds are
/// clamped to at least [`MIN_THRESHOLD`]. Images narrower or shorter
/// than 3 pixels have no interior and yield no edges.
#[must_use = "returns the edge map"]
pub fn detect(image: &GrayImage, high_threshold: f32) -> EdgeMap {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = (high / 2.0).max(MIN_THRESHOLD);

    let (w, h) = image.dimensions();
    let mut edges = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return EdgeMap {
            edges,
            gx: Image::new(w, h),
            gy: Image::new(w, h),
        };
    }

    let smoothed = imageproc::filter::gaussian_blur_f32(image, GRADIENT_SIGMA);
    let (gx, gy) = sobel(&smoothed);

    let magnitude = Image::<Luma<f32>>::from_fn(w, h, |x, y| {
        let dx = f32::from(gx.get_pixel(x, y).0[0]);
        let dy = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([dx.abs() + dy.abs()])
    });
    let thinned = non_maximum_suppression(&magnitude, &gx, &gy);
    hysteresis(&thinned, low, high, &mut edges);

    EdgeMap { edges, gx, gy }
}

/// Keep only pixels whose magnitude is a local maximum across the edge.
fn non_maximum_suppression(
    magnitude: &Image<Luma<f32>>,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Image<Luma<f32>> {
    let (w, h) = magnitude.dimensions();
    let at = |x: u32, y: u32| magnitude.get_pixel(x, y).0[0];

    Image::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return Luma([0.0]);
        }
        let value = at(x, y);
        if value <= 0.0 {
            return Luma([0.0]);
        }
        let dx = f32::from(gx.get_pixel(x, y).0[0]);
        let dy = f32::from(gy.get_pixel(x, y).0[0]);
        let mut angle = dy.atan2(dx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        let (a, b) = if !(22.5..157.5).contains(&angle) {
            (at(x - 1, y), at(x + 1, y))
        } else if angle < 67.5 {
            (at(x + 1, y + 1), at(x - 1, y - 1))
        } else if angle < 112.5 {
            (at(x, y - 1), at(x, y + 1))
        } else {
            (at(x - 1, y + 1), at(x + 1, y - 1))
        };
        if value < a || value < b {
            Luma([0.0])
        } else {
            Luma([value])
        }
    })
}

/// Seed edges at `high` and grow them through 8-connected pixels at or
/// above `low`.
fn hysteresis(thinned: &Image<Luma<f32>>, low: f32, high: f32, out: &mut GrayImage) {
    let (w, h) = thinned.dimensions();
    let mut stack = Vec::new();

    for (x, y, p) in thinned.enumerate_pixels() {
        if p.0[0] < high || out.get_pixel(x, y).0[0] != 0 {
            continue;
        }
        out.put_pixel(x, y, Luma([255]));
        stack.push((x, y));

        while let Some((cx, cy)) = stack.pop() {
            for (dx, dy) in NEIGHBORS {
                let (Some(nx), Some(ny)) = (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                else {
                    continue;
                };
                if nx >= w || ny >= h || out.get_pixel(nx, ny).0[0] != 0 {
                    continue;
                }
                if thinned.get_pixel(nx, ny).0[0] >= low {
                    out.put_pixel(nx, ny, Luma([255]));
                    stack.push((nx, ny));
                }
            }
        }
    }
}

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
