//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`Scanner::scan`](crate::Scanner::scan) which runs the whole
//! recognition in one call, the stages here let the caller drive
//! execution one step at a time:
//!
//! ```rust
//! # use markscan_pipeline::{Scanner, ScanError};
//! # fn run(png: &[u8]) -> Result<(), ScanError> {
//! let scanner = Scanner::default();
//! let result = scanner
//!     .pipeline(png)
//!     .decode()?
//!     .preprocess()
//!     .detect_circles()
//!     .order()
//!     .classify()
//!     .identify_form()
//!     .map_menu()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state. Only
//! decoding can fail; every later condition (no circles, empty masks,
//! ambiguous selectors) has a defined fallback. Stages borrow the
//! [`Scanner`] that started them, so configuration and menu are shared,
//! never copied.
//!
//! The grayscale image is carried through classification, where fill
//! statistics are read from it, and dropped afterwards.

use chrono::Utc;
use image::DynamicImage;

use crate::Scanner;
use crate::diagnostics::StageMetrics;
use crate::edge;
use crate::fill;
use crate::form::{self, FormIdentification};
use crate::hough;
use crate::menu::{self, Mapping};
use crate::ordering;
use crate::preprocess::{self, Preprocessing};
use crate::types::{
    Circle, CircleCandidate, CircleReport, CircleRole, CircleShading, FillAnalysis, GrayImage,
    ScanError, ScanResult, ShadingReport,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending<'s> {
    scanner: &'s Scanner,
    source: &'s [u8],
}

impl<'s> Pending<'s> {
    pub(crate) const fn new(scanner: &'s Scanner, source: &'s [u8]) -> Self {
        Self { scanner, source }
    }

    /// The raw source image bytes.
    #[must_use]
    pub const fn source(&self) -> &[u8] {
        self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::EmptyInput`] if the source bytes are empty.
    /// Returns [`ScanError::ImageLoad`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded<'s>, ScanError> {
        let gray = crate::grayscale::decode_and_grayscale(self.source)?;
        Ok(Decoded {
            scanner: self.scanner,
            gray,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding and grayscale conversion.
#[must_use = "pipeline stages are consumed by advancing, call .preprocess() to continue"]
pub struct Decoded<'s> {
    scanner: &'s Scanner,
    gray: GrayImage,
    source_len: usize,
}

impl<'s> Decoded<'s> {
    /// Start from an already decoded image.
    pub(crate) fn from_image(scanner: &'s Scanner, image: &DynamicImage) -> Self {
        Self {
            scanner,
            gray: crate::grayscale::to_grayscale(image),
            source_len: 0,
        }
    }

    /// The grayscale image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (width, height) = self.gray.dimensions();
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        }
    }

    /// Smooth and binarize, advancing to [`Preprocessed`].
    pub fn preprocess(self) -> Preprocessed<'s> {
        let images = preprocess::preprocess(&self.gray, &self.scanner.config().preprocess);
        Preprocessed {
            scanner: self.scanner,
            gray: self.gray,
            images,
        }
    }
}

// ───────────────────────── Stage 2: Preprocessed ─────────────────────

/// Pipeline state after bilateral smoothing and adaptive thresholding.
#[must_use = "pipeline stages are consumed by advancing, call .detect_circles() to continue"]
pub struct Preprocessed<'s> {
    scanner: &'s Scanner,
    gray: GrayImage,
    images: Preprocessing,
}

impl<'s> Preprocessed<'s> {
    /// The grayscale image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// The smoothed grayscale image.
    #[must_use]
    pub const fn smoothed(&self) -> &GrayImage {
        &self.images.smoothed
    }

    /// The binary outline map.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.images.binary
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let params = &self.scanner.config().preprocess;
        let (w, h) = self.images.binary.dimensions();
        StageMetrics::Preprocess {
            bilateral_diameter: params.bilateral_diameter,
            threshold_block_size: params.threshold_block_size,
            ink_pixel_count: self
                .images
                .binary
                .pixels()
                .map(|p| u64::from(p.0[0] == 0))
                .sum(),
            total_pixel_count: u64::from(w) * u64::from(h),
        }
    }

    /// Run the Hough circle search, advancing to [`CirclesDetected`].
    pub fn detect_circles(self) -> CirclesDetected<'s> {
        let params = &self.scanner.config().detection;
        let edges = edge::detect(&self.images.binary, params.edge_threshold);
        let candidates = hough::find_circles(&edges, params);
        CirclesDetected {
            scanner: self.scanner,
            gray: self.gray,
            edge_pixel_count: edges.edge_count(),
            candidates,
        }
    }
}

// ───────────────────────── Stage 3: CirclesDetected ──────────────────

/// Pipeline state after circle detection, before ordering.
#[must_use = "pipeline stages are consumed by advancing, call .order() to continue"]
pub struct CirclesDetected<'s> {
    scanner: &'s Scanner,
    gray: GrayImage,
    edge_pixel_count: usize,
    candidates: Vec<CircleCandidate>,
}

impl<'s> CirclesDetected<'s> {
    /// Unordered candidates, strongest first.
    #[must_use]
    pub fn candidates(&self) -> &[CircleCandidate] {
        &self.candidates
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let params = &self.scanner.config().detection;
        StageMetrics::Detection {
            edge_pixel_count: self.edge_pixel_count,
            candidate_count: self.candidates.len(),
            min_radius: params.min_radius,
            max_radius: params.max_radius,
        }
    }

    /// Put candidates into reading order, advancing to [`Ordered`].
    pub fn order(self) -> Ordered<'s> {
        let config = self.scanner.config();
        let circles =
            ordering::order_circles(self.candidates, config.ordering, config.column_tolerance);
        tracing::debug!(circles = circles.len(), ordering = ?config.ordering, "circles ordered");
        Ordered {
            scanner: self.scanner,
            gray: self.gray,
            circles,
        }
    }
}

// ───────────────────────── Stage 4: Ordered ──────────────────────────

/// Pipeline state with numbered circles in reading order.
#[must_use = "pipeline stages are consumed by advancing, call .classify() to continue"]
pub struct Ordered<'s> {
    scanner: &'s Scanner,
    gray: GrayImage,
    circles: Vec<Circle>,
}

impl<'s> Ordered<'s> {
    /// Circles in reading order.
    #[must_use]
    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Ordering {
            strategy: format!("{:?}", self.scanner.config().ordering),
            circle_count: self.circles.len(),
        }
    }

    /// Finish as a detection-only report.
    #[must_use]
    pub fn into_circle_report(self) -> CircleReport {
        CircleReport {
            circles_found: self.circles.len(),
            circles: self.circles,
            parameters: self.scanner.config().detection.clone(),
            processed_at: Utc::now(),
        }
    }

    /// Measure every bubble, advancing to [`Classified`].
    pub fn classify(self) -> Classified<'s> {
        let fills = fill::classify_all(&self.gray, &self.circles, &self.scanner.config().shading);
        Classified {
            scanner: self.scanner,
            circles: self.circles,
            fills,
        }
    }
}

// ───────────────────────── Stage 5: Classified ───────────────────────

/// Pipeline state with a fill analysis for every circle.
#[must_use = "pipeline stages are consumed by advancing, call .identify_form() to continue"]
pub struct Classified<'s> {
    scanner: &'s Scanner,
    circles: Vec<Circle>,
    fills: Vec<FillAnalysis>,
}

impl<'s> Classified<'s> {
    /// Circles in reading order.
    #[must_use]
    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    /// One analysis per circle, in reading order.
    #[must_use]
    pub fn fills(&self) -> &[FillAnalysis] {
        &self.fills
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        #[allow(clippy::cast_precision_loss)]
        let mean_fill = if self.fills.is_empty() {
            0.0
        } else {
            self.fills.iter().map(|f| f.fill_percentage).sum::<f64>() / self.fills.len() as f64
        };
        StageMetrics::Classification {
            circle_count: self.fills.len(),
            shaded_count: self.fills.iter().filter(|f| f.is_shaded).count(),
            mean_fill_percentage: mean_fill,
        }
    }

    /// Finish as a shading-only report.
    #[must_use]
    pub fn into_shading_report(self) -> ShadingReport {
        let (shaded, empty): (Vec<CircleShading>, Vec<CircleShading>) = self
            .circles
            .iter()
            .zip(&self.fills)
            .map(|(circle, analysis)| CircleShading::new(circle, analysis))
            .partition(|c| c.is_shaded);
        ShadingReport {
            total_circles: self.circles.len(),
            shaded_circles: shaded.len(),
            empty_circles: empty.len(),
            shaded,
            empty,
            parameters: self.scanner.config().shading.clone(),
            processed_at: Utc::now(),
        }
    }

    /// Decide the form from the selector bubbles, advancing to
    /// [`FormIdentified`].
    pub fn identify_form(self) -> FormIdentified<'s> {
        let config = self.scanner.config();
        let form = form::identify_form(&self.fills, config.selector_margin, config.mode);
        FormIdentified {
            scanner: self.scanner,
            fills: self.fills,
            form,
        }
    }
}

// ───────────────────────── Stage 6: FormIdentified ───────────────────

/// Pipeline state after the form decision.
#[must_use = "pipeline stages are consumed by advancing, call .map_menu() to continue"]
pub struct FormIdentified<'s> {
    scanner: &'s Scanner,
    fills: Vec<FillAnalysis>,
    form: FormIdentification,
}

impl<'s> FormIdentified<'s> {
    /// The form decision.
    #[must_use]
    pub const fn form(&self) -> &FormIdentification {
        &self.form
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Form {
            variant: self.form.variant,
            basis: self.form.basis,
            selector_fills: self.form.selector_fills,
        }
    }

    /// Map bubbles onto the active catalog, advancing to [`Mapped`].
    pub fn map_menu(self) -> Mapped<'s> {
        let config = self.scanner.config();
        let mapping = menu::map_circles(&self.fills, &self.form, config.mode, self.scanner.menu());
        Mapped {
            scanner: self.scanner,
            total_circles: self.fills.len(),
            form: self.form,
            mapping,
        }
    }
}

// ───────────────────────── Stage 7: Mapped ───────────────────────────

/// Final pipeline state. Call [`into_result`](Self::into_result) to
/// total the order.
#[must_use = "call .into_result() to extract the ScanResult"]
pub struct Mapped<'s> {
    scanner: &'s Scanner,
    total_circles: usize,
    form: FormIdentification,
    mapping: Mapping,
}

impl Mapped<'_> {
    /// Per-bubble interpretation.
    #[must_use]
    pub const fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Mapping {
            order_line_count: self.mapping.order_lines.len(),
            out_of_catalog_count: self
                .mapping
                .display_log
                .iter()
                .filter(|e| e.role == CircleRole::OutOfCatalog)
                .count(),
            total_price: self.mapping.order_lines.iter().map(|l| l.unit_price).sum(),
        }
    }

    /// Total the order and produce the [`ScanResult`].
    #[must_use]
    pub fn into_result(self) -> ScanResult {
        let result = menu::aggregate(
            &self.form,
            self.scanner.config().mode,
            self.scanner.menu(),
            self.total_circles,
            self.mapping,
            Utc::now(),
        );
        tracing::info!(
            form = %result.detected_form,
            circles = result.total_circles,
            items = result.order_lines.len(),
            total = %result.total_price,
            "scan complete"
        );
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    fn blank_png() -> Vec<u8> {
        let img = GrayImage::from_pixel(64, 48, Luma([255]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn empty_bytes_fail_at_decode() {
        let scanner = Scanner::default();
        let result = scanner.pipeline(&[]).decode();
        assert!(matches!(result, Err(ScanError::EmptyInput)));
    }

    #[test]
    fn stages_expose_intermediates() {
        let scanner = Scanner::default();
        let png = blank_png();
        let decoded = scanner.pipeline(&png).decode().unwrap();
        assert_eq!(decoded.gray().dimensions(), (64, 48));
        assert!(matches!(
            decoded.metrics(),
            StageMetrics::Decode { width: 64, height: 48, .. }
        ));

        let pre = decoded.preprocess();
        assert_eq!(pre.binary().dimensions(), (64, 48));
        let detected = pre.detect_circles();
        assert!(detected.candidates().is_empty());
        let ordered = detected.order();
        assert!(ordered.circles().is_empty());
        let classified = ordered.classify();
        assert!(classified.fills().is_empty());
        let identified = classified.identify_form();
        assert_eq!(identified.form().basis, crate::form::FormBasis::TooFewCircles);
        let result = identified.map_menu().into_result();
        assert_eq!(result.total_circles, 0);
    }

    #[test]
    fn reports_from_blank_page_are_empty() {
        let scanner = Scanner::default();
        let png = blank_png();
        let report = scanner
            .pipeline(&png)
            .decode()
            .unwrap()
            .preprocess()
            .detect_circles()
            .order()
            .into_circle_report();
        assert_eq!(report.circles_found, 0);

        let shading = scanner
            .pipeline(&png)
            .decode()
            .unwrap()
            .preprocess()
            .detect_circles()
            .order()
            .classify()
            .into_shading_report();
        assert_eq!(shading.total_circles, 0);
        assert_eq!(shading.shaded_circles + shading.empty_circles, 0);
    }
}
