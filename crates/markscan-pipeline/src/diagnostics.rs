//! Scan diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are instrumentation for parameter tuning on real
//! forms. [`scan_with_diagnostics`] drives the staged pipeline and
//! records one [`StageDiagnostics`] per stage alongside the result.
//!
//! The library never reads the system clock for timing. Callers supply
//! a [`Clock`]; the CLI uses `std::time::Instant`, tests use a fake.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Scanner;
use crate::catalog::Price;
use crate::form::FormBasis;
use crate::types::{FormVariant, ScanError, ScanResult};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDiagnostics {
    /// Stage 0: decoding and grayscale conversion.
    pub decode: StageDiagnostics,
    /// Stage 1: bilateral filter and adaptive threshold.
    pub preprocess: StageDiagnostics,
    /// Stage 2: edge extraction and Hough search.
    pub detection: StageDiagnostics,
    /// Stage 3: reading order.
    pub ordering: StageDiagnostics,
    /// Stage 4: fill classification.
    pub classification: StageDiagnostics,
    /// Stage 5: form identification.
    pub form: StageDiagnostics,
    /// Stage 6: menu mapping and aggregation.
    pub mapping: StageDiagnostics,
    /// Total wall-clock duration of the scan (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: ScanSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decoding metrics.
    Decode {
        /// Size of the input image bytes (0 for pre-decoded images).
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Preprocessing metrics.
    Preprocess {
        /// Bilateral neighborhood diameter.
        bilateral_diameter: u32,
        /// Adaptive threshold block size.
        threshold_block_size: u32,
        /// Pixels classified as ink (0) in the binary map.
        ink_pixel_count: u64,
        /// Total pixel count.
        total_pixel_count: u64,
    },
    /// Circle detection metrics.
    Detection {
        /// Edge pixels that cast votes.
        edge_pixel_count: usize,
        /// Accepted circle candidates.
        candidate_count: usize,
        /// Smallest radius searched.
        min_radius: u32,
        /// Largest radius searched.
        max_radius: u32,
    },
    /// Ordering metrics.
    Ordering {
        /// Which ordering strategy was used.
        strategy: String,
        /// Number of numbered circles.
        circle_count: usize,
    },
    /// Fill classification metrics.
    Classification {
        /// Circles analyzed.
        circle_count: usize,
        /// Circles classified as shaded.
        shaded_count: usize,
        /// Mean fill percentage over all circles.
        mean_fill_percentage: f64,
    },
    /// Form identification metrics.
    Form {
        /// Chosen form.
        variant: FormVariant,
        /// How the form was decided.
        basis: FormBasis,
        /// Selector fill percentages, when two selectors exist.
        selector_fills: Option<(f64, f64)>,
    },
    /// Menu mapping metrics.
    Mapping {
        /// Order lines produced.
        order_line_count: usize,
        /// Bubbles past the end of the active catalog.
        out_of_catalog_count: usize,
        /// Order total.
        total_price: Price,
    },
}

/// High-level summary of a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Number of detected circles.
    pub circle_count: usize,
    /// Number of shaded circles.
    pub shaded_count: usize,
    /// Identified form.
    pub detected_form: FormVariant,
    /// Number of order lines.
    pub order_line_count: usize,
}

/// Run a full scan, timing every stage with `clock`.
///
/// # Errors
///
/// Same as [`Scanner::scan`].
pub fn scan_with_diagnostics<C: Clock>(
    scanner: &Scanner,
    image_bytes: &[u8],
    clock: &C,
) -> Result<(ScanResult, ScanDiagnostics), ScanError> {
    let total_start = clock.now();

    let start = clock.now();
    let decoded = scanner.pipeline(image_bytes).decode()?;
    let decode = stage(clock, &start, decoded.metrics());
    let (image_width, image_height) = decoded.gray().dimensions();

    let start = clock.now();
    let preprocessed = decoded.preprocess();
    let preprocess = stage(clock, &start, preprocessed.metrics());

    let start = clock.now();
    let detected = preprocessed.detect_circles();
    let detection = stage(clock, &start, detected.metrics());

    let start = clock.now();
    let ordered = detected.order();
    let ordering = stage(clock, &start, ordered.metrics());

    let start = clock.now();
    let classified = ordered.classify();
    let classification = stage(clock, &start, classified.metrics());
    let shaded_count = classified.fills().iter().filter(|f| f.is_shaded).count();

    let start = clock.now();
    let identified = classified.identify_form();
    let form = stage(clock, &start, identified.metrics());

    let start = clock.now();
    let mapped = identified.map_menu();
    let mapping_metrics = mapped.metrics();
    let result = mapped.into_result();
    let mapping = stage(clock, &start, mapping_metrics);

    let diagnostics = ScanDiagnostics {
        decode,
        preprocess,
        detection,
        ordering,
        classification,
        form,
        mapping,
        total_duration: clock.elapsed(&total_start),
        summary: ScanSummary {
            image_width,
            image_height,
            circle_count: result.total_circles,
            shaded_count,
            detected_form: result.detected_form,
            order_line_count: result.order_lines.len(),
        },
    };
    Ok((result, diagnostics))
}

fn stage<C: Clock>(clock: &C, start: &C::Instant, metrics: StageMetrics) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics,
    }
}

impl ScanDiagnostics {
    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Decode", &self.decode),
            ("Preprocess", &self.preprocess),
            ("Circle Detection", &self.detection),
            ("Ordering", &self.ordering),
            ("Classification", &self.classification),
            ("Form", &self.form),
            ("Mapping", &self.mapping),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Scan Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Circles: {}  |  Shaded: {}  |  Form: {}  |  Order lines: {}",
            self.summary.circle_count,
            self.summary.shaded_count,
            self.summary.detected_form,
            self.summary.order_line_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Preprocess {
            bilateral_diameter,
            threshold_block_size,
            ink_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *ink_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("d={bilateral_diameter} block={threshold_block_size} ink={ink_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Detection {
            edge_pixel_count,
            candidate_count,
            min_radius,
            max_radius,
        } => format!("edges={edge_pixel_count} r=[{min_radius},{max_radius}] circles={candidate_count}"),
        StageMetrics::Ordering {
            strategy,
            circle_count,
        } => format!("{strategy} {circle_count} circles"),
        StageMetrics::Classification {
            circle_count,
            shaded_count,
            mean_fill_percentage,
        } => format!("{shaded_count}/{circle_count} shaded, mean fill {mean_fill_percentage:.1}%"),
        StageMetrics::Form {
            variant,
            basis,
            selector_fills,
        } => match selector_fills {
            Some((a, b)) => format!("{variant} ({basis:?}) selectors {a:.1}% / {b:.1}%"),
            None => format!("{variant} ({basis:?})"),
        },
        StageMetrics::Mapping {
            order_line_count,
            out_of_catalog_count,
            total_price,
        } => format!("{order_line_count} lines, {out_of_catalog_count} past catalog, total {total_price}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn blank_png() -> Vec<u8> {
        let img = GrayImage::from_pixel(32, 24, Luma([255]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn blank_scan_records_every_stage() {
        let clock = TickClock { ticks: Cell::new(0) };
        let (result, diagnostics) =
            scan_with_diagnostics(&Scanner::default(), &blank_png(), &clock).unwrap();

        assert_eq!(result.total_circles, 0);
        assert_eq!(diagnostics.summary.image_width, 32);
        assert_eq!(diagnostics.summary.circle_count, 0);
        assert!(diagnostics.stages().iter().all(|(_, d)| d.duration > Duration::ZERO));
        assert!(diagnostics.total_duration > diagnostics.decode.duration);
    }

    #[test]
    fn decode_failure_is_propagated() {
        let clock = TickClock { ticks: Cell::new(0) };
        let err = scan_with_diagnostics(&Scanner::default(), &[], &clock).unwrap_err();
        assert!(matches!(err, ScanError::EmptyInput));
    }

    #[test]
    fn report_lists_all_stages() {
        let clock = TickClock { ticks: Cell::new(0) };
        let (_, diagnostics) =
            scan_with_diagnostics(&Scanner::default(), &blank_png(), &clock).unwrap();
        let report = diagnostics.report();
        for (name, _) in diagnostics.stages() {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("Unknown form"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock { ticks: Cell::new(0) };
        let (_, diagnostics) =
            scan_with_diagnostics(&Scanner::default(), &blank_png(), &clock).unwrap();
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!((json["decode"]["duration"].as_f64().unwrap() - 0.001).abs() < 1e-9);
    }
}
