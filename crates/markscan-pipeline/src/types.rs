//! Shared types for the markscan recognition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, Price};
use crate::ordering::CircleOrderingKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Integer pixel position of a circle center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Center {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Center {
    /// Create a new center.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box enclosing a circle: `(x - r, y - r, 2r, 2r)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge. May be negative for circles clipped by the image border.
    pub x: i32,
    /// Top edge. May be negative for circles clipped by the image border.
    pub y: i32,
    /// Box width (the circle diameter).
    pub width: u32,
    /// Box height (the circle diameter).
    pub height: u32,
}

/// An unordered circle proposal produced by the Hough search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleCandidate {
    /// Rounded center position.
    pub center: Center,
    /// Rounded radius in pixels.
    pub radius: u32,
    /// Accumulator votes collected by the center cell.
    pub votes: u32,
}

impl CircleCandidate {
    /// Create a candidate with zero recorded votes.
    #[must_use]
    pub const fn new(x: i32, y: i32, radius: u32) -> Self {
        Self {
            center: Center::new(x, y),
            radius,
            votes: 0,
        }
    }
}

/// A detected bubble with its position in reading order.
///
/// Ids are 1-based and positional: they are assigned after ordering and
/// are not stable across re-detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// 1-based sequence id.
    pub id: usize,
    /// Center position.
    pub center: Center,
    /// Radius in pixels.
    pub radius: u32,
    /// Enclosing box.
    pub bbox: BoundingBox,
    /// Disk area, `π·r²`.
    pub area: f64,
}

impl Circle {
    /// Build a circle record from a candidate and its sequence id.
    #[must_use]
    pub fn from_candidate(id: usize, candidate: &CircleCandidate) -> Self {
        let CircleCandidate { center, radius, .. } = *candidate;
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let radius_f = f64::from(radius);
        Self {
            id,
            center,
            radius,
            bbox: BoundingBox {
                x: center.x.saturating_sub(r),
                y: center.y.saturating_sub(r),
                width: radius.saturating_mul(2),
                height: radius.saturating_mul(2),
            },
            area: std::f64::consts::PI * radius_f * radius_f,
        }
    }
}

/// Pixel statistics and the shaded/empty decision for one circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillAnalysis {
    /// Id of the analyzed circle.
    pub circle_id: usize,
    /// Percentage (0-100) of masked pixels darker than the dark threshold.
    pub fill_percentage: f64,
    /// Whether all three shading tests passed.
    pub is_shaded: bool,
    /// Mean masked intensity (0 when the mask is empty).
    pub mean_intensity: f64,
    /// Median masked intensity (0 when the mask is empty).
    pub median_intensity: f64,
    /// Number of pixels under the mask.
    pub pixel_count: usize,
}

impl FillAnalysis {
    /// The result for a mask that covers no pixels.
    #[must_use]
    pub const fn empty(circle_id: usize) -> Self {
        Self {
            circle_id,
            fill_percentage: 0.0,
            is_shaded: false,
            mean_intensity: 0.0,
            median_intensity: 0.0,
            pixel_count: 0,
        }
    }
}

/// Which physical form layout produced the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormVariant {
    /// No form could be identified (or identification is disabled).
    #[default]
    Unknown,
    /// The first known layout, marked through the first selector bubble.
    FormA,
    /// The second known layout, marked through the second selector bubble.
    FormB,
}

impl FormVariant {
    /// Whether a concrete form was identified.
    #[must_use]
    pub const fn is_identified(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for FormVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "Unknown form",
            Self::FormA => "Form A",
            Self::FormB => "Form B",
        })
    }
}

// ───────────────────────── Configuration ─────────────────────────────

/// Parameters for the smoothing and binarization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParameters {
    /// Bilateral filter neighborhood diameter in pixels.
    pub bilateral_diameter: u32,
    /// Bilateral range sigma: how different two intensities may be and
    /// still be averaged together.
    pub bilateral_sigma_color: f32,
    /// Bilateral spatial sigma in pixels.
    pub bilateral_sigma_space: f32,
    /// Adaptive threshold block size (odd, at least 3).
    pub threshold_block_size: u32,
    /// Constant subtracted from the local weighted mean.
    pub threshold_offset: i16,
}

impl PreprocessParameters {
    /// Default bilateral neighborhood diameter.
    pub const DEFAULT_BILATERAL_DIAMETER: u32 = 9;
    /// Default bilateral range sigma.
    pub const DEFAULT_BILATERAL_SIGMA_COLOR: f32 = 75.0;
    /// Default bilateral spatial sigma.
    pub const DEFAULT_BILATERAL_SIGMA_SPACE: f32 = 75.0;
    /// Default adaptive threshold block size.
    pub const DEFAULT_THRESHOLD_BLOCK_SIZE: u32 = 11;
    /// Default adaptive threshold offset.
    pub const DEFAULT_THRESHOLD_OFFSET: i16 = 2;
}

impl Default for PreprocessParameters {
    fn default() -> Self {
        Self {
            bilateral_diameter: Self::DEFAULT_BILATERAL_DIAMETER,
            bilateral_sigma_color: Self::DEFAULT_BILATERAL_SIGMA_COLOR,
            bilateral_sigma_space: Self::DEFAULT_BILATERAL_SIGMA_SPACE,
            threshold_block_size: Self::DEFAULT_THRESHOLD_BLOCK_SIZE,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
        }
    }
}

/// Parameters for the circular Hough search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParameters {
    /// Ratio of image resolution to accumulator resolution. `1.0` means
    /// one accumulator cell per pixel, `2.0` half the resolution.
    pub resolution_ratio: f64,
    /// Minimum distance between accepted circle centers in pixels.
    pub min_center_distance: f64,
    /// Upper Canny threshold used to extract edges from the binary map.
    /// The lower threshold is half of this value.
    pub edge_threshold: f32,
    /// Minimum accumulator votes for a center cell to be considered.
    pub accumulator_threshold: u32,
    /// Smallest radius searched, in pixels.
    pub min_radius: u32,
    /// Largest radius searched, in pixels.
    pub max_radius: u32,
}

impl DetectionParameters {
    /// Default accumulator resolution ratio.
    pub const DEFAULT_RESOLUTION_RATIO: f64 = 1.0;
    /// Default minimum center distance.
    pub const DEFAULT_MIN_CENTER_DISTANCE: f64 = 30.0;
    /// Default upper edge threshold.
    pub const DEFAULT_EDGE_THRESHOLD: f32 = 50.0;
    /// Default accumulator threshold.
    pub const DEFAULT_ACCUMULATOR_THRESHOLD: u32 = 30;
    /// Default minimum radius.
    pub const DEFAULT_MIN_RADIUS: u32 = 10;
    /// Default maximum radius.
    pub const DEFAULT_MAX_RADIUS: u32 = 80;
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            resolution_ratio: Self::DEFAULT_RESOLUTION_RATIO,
            min_center_distance: Self::DEFAULT_MIN_CENTER_DISTANCE,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            accumulator_threshold: Self::DEFAULT_ACCUMULATOR_THRESHOLD,
            min_radius: Self::DEFAULT_MIN_RADIUS,
            max_radius: Self::DEFAULT_MAX_RADIUS,
        }
    }
}

/// Parameters for the filled/empty decision.
///
/// A circle is shaded only when the dark-pixel percentage, the mean and
/// the median all pass their thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingParameters {
    /// Pixels shaved off the radius before sampling, to keep the printed
    /// outline out of the statistics.
    pub mask_inset: u32,
    /// Intensities strictly below this value count as dark.
    pub dark_threshold: u8,
    /// Minimum dark-pixel fraction (0-1, exclusive).
    pub fill_ratio_threshold: f64,
    /// Mean intensity must be strictly below this value.
    pub mean_intensity_threshold: f64,
    /// Median intensity must be strictly below this value.
    pub median_intensity_threshold: f64,
}

impl ShadingParameters {
    /// Default mask inset.
    pub const DEFAULT_MASK_INSET: u32 = 5;
    /// Default dark-pixel threshold.
    pub const DEFAULT_DARK_THRESHOLD: u8 = 100;
    /// Default dark-pixel fraction.
    pub const DEFAULT_FILL_RATIO_THRESHOLD: f64 = 0.6;
    /// Default mean intensity ceiling.
    pub const DEFAULT_MEAN_INTENSITY_THRESHOLD: f64 = 120.0;
    /// Default median intensity ceiling.
    pub const DEFAULT_MEDIAN_INTENSITY_THRESHOLD: f64 = 100.0;
}

impl Default for ShadingParameters {
    fn default() -> Self {
        Self {
            mask_inset: Self::DEFAULT_MASK_INSET,
            dark_threshold: Self::DEFAULT_DARK_THRESHOLD,
            fill_ratio_threshold: Self::DEFAULT_FILL_RATIO_THRESHOLD,
            mean_intensity_threshold: Self::DEFAULT_MEAN_INTENSITY_THRESHOLD,
            median_intensity_threshold: Self::DEFAULT_MEDIAN_INTENSITY_THRESHOLD,
        }
    }
}

/// Whether the two leading bubbles select a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// The first two ordered bubbles pick Form A or Form B.
    #[default]
    FormAware,
    /// No selector bubbles: every bubble maps onto the flat catalog.
    Flat,
}

/// Configuration for the recognition pipeline.
///
/// All parameters have defaults matching the two supported physical
/// forms. Use [`ScanConfig::validate`] (called by
/// [`Scanner::new`](crate::Scanner::new)) before running scans with
/// user-supplied values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Smoothing and binarization parameters.
    pub preprocess: PreprocessParameters,
    /// Circular Hough search parameters.
    pub detection: DetectionParameters,
    /// Reading-order strategy applied to detected circles.
    pub ordering: CircleOrderingKind,
    /// Maximum x distance (exclusive) from a column's first circle for
    /// another circle to join that column.
    pub column_tolerance: u32,
    /// Filled/empty decision parameters.
    pub shading: ShadingParameters,
    /// Minimum selector fill difference, in percentage points, for a
    /// form to be considered identified.
    pub selector_margin: f64,
    /// Form-aware or flat interpretation.
    pub mode: ScanMode,
}

impl ScanConfig {
    /// Default column tolerance in pixels.
    pub const DEFAULT_COLUMN_TOLERANCE: u32 = 100;
    /// Default selector margin in percentage points.
    pub const DEFAULT_SELECTOR_MARGIN: f64 = 5.0;

    /// Configuration for single-catalog forms without selector bubbles.
    ///
    /// Circles are read in plain `(x, y)` order and mapped onto the flat
    /// catalog starting at the first circle.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            ordering: CircleOrderingKind::Lexicographic,
            mode: ScanMode::Flat,
            ..Self::default()
        }
    }

    /// Check every parameter for values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfig`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), ScanError> {
        let p = &self.preprocess;
        if p.bilateral_diameter == 0 {
            return Err(invalid("bilateral_diameter must be at least 1"));
        }
        if !(p.bilateral_sigma_color > 0.0 && p.bilateral_sigma_space > 0.0) {
            return Err(invalid("bilateral sigmas must be positive"));
        }
        if p.threshold_block_size < 3 || p.threshold_block_size % 2 == 0 {
            return Err(invalid("threshold_block_size must be odd and at least 3"));
        }

        let d = &self.detection;
        if !(d.resolution_ratio.is_finite() && d.resolution_ratio > 0.0) {
            return Err(invalid("resolution_ratio must be finite and positive"));
        }
        if !(d.min_center_distance.is_finite() && d.min_center_distance > 0.0) {
            return Err(invalid("min_center_distance must be finite and positive"));
        }
        if !(d.edge_threshold.is_finite() && d.edge_threshold > 0.0) {
            return Err(invalid("edge_threshold must be finite and positive"));
        }
        if d.accumulator_threshold == 0 {
            return Err(invalid("accumulator_threshold must be at least 1"));
        }
        if d.max_radius == 0 {
            return Err(invalid("max_radius must be at least 1"));
        }
        if d.min_radius > d.max_radius {
            return Err(invalid(&format!(
                "min_radius ({}) exceeds max_radius ({})",
                d.min_radius, d.max_radius
            )));
        }

        let s = &self.shading;
        if !(s.fill_ratio_threshold > 0.0 && s.fill_ratio_threshold <= 1.0) {
            return Err(invalid("fill_ratio_threshold must be in (0, 1]"));
        }
        if !(s.mean_intensity_threshold.is_finite() && s.mean_intensity_threshold > 0.0) {
            return Err(invalid("mean_intensity_threshold must be finite and positive"));
        }
        if !(s.median_intensity_threshold.is_finite() && s.median_intensity_threshold > 0.0) {
            return Err(invalid("median_intensity_threshold must be finite and positive"));
        }
        if !(self.selector_margin.is_finite() && self.selector_margin >= 0.0) {
            return Err(invalid("selector_margin must be finite and non-negative"));
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessParameters::default(),
            detection: DetectionParameters::default(),
            ordering: CircleOrderingKind::default(),
            column_tolerance: Self::DEFAULT_COLUMN_TOLERANCE,
            shading: ShadingParameters::default(),
            selector_margin: Self::DEFAULT_SELECTOR_MARGIN,
            mode: ScanMode::default(),
        }
    }
}

fn invalid(msg: &str) -> ScanError {
    ScanError::InvalidConfig(msg.to_owned())
}

// ───────────────────────── Results ───────────────────────────────────

/// One priced selection derived from a shaded bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Id of the bubble that produced this line.
    pub circle_id: usize,
    /// Stable catalog identifier.
    pub item: CatalogEntry,
    /// Human-readable item name (display only).
    pub label: String,
    /// Always 1: a bubble encodes presence, not a count.
    pub quantity: u32,
    /// Unit price from the price table, or the fallback price.
    pub unit_price: Price,
    /// Fill percentage copied from the circle's [`FillAnalysis`].
    pub fill_percentage: f64,
    /// `clamp(170 - fill_percentage, 70, 100)`.
    pub confidence: f64,
}

/// How a bubble was interpreted by the menu mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleRole {
    /// One of the two form selector bubbles.
    Selector,
    /// A bubble with a catalog position.
    Item,
    /// A bubble past the end of the active catalog.
    OutOfCatalog,
}

/// One line of the per-bubble interpretation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    /// Id of the bubble.
    pub circle_id: usize,
    /// How the bubble was interpreted.
    pub role: CircleRole,
    /// Selector label, item name, or `N/A`.
    pub label: String,
    /// Shading decision for the bubble.
    pub is_shaded: bool,
}

impl std::fmt::Display for DisplayEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_shaded {
            "Shaded"
        } else {
            "Not Shaded"
        };
        write!(f, "ID {}: {} ({status})", self.circle_id, self.label)
    }
}

/// The complete interpretation of one scanned form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Identified form layout.
    pub detected_form: FormVariant,
    /// Human-readable explanation of the form decision.
    pub form_label: String,
    /// Number of detected circles.
    pub total_circles: usize,
    /// Number of circles eligible for item mapping (selectors excluded).
    pub menu_circles: usize,
    /// Priced selections, in reading order.
    pub order_lines: Vec<OrderLine>,
    /// One entry per detected circle, in reading order.
    pub display_log: Vec<DisplayEntry>,
    /// Exact sum of every order line's unit price.
    pub total_price: Price,
    /// Mean order-line confidence, or 0 without order lines.
    pub confidence_score: f64,
    /// When the scan finished.
    pub processed_at: DateTime<Utc>,
    /// Item names of the catalog used for mapping.
    pub active_catalog: Vec<String>,
}

impl ScanResult {
    /// Number of selected items.
    #[must_use]
    pub fn selected_items(&self) -> usize {
        self.order_lines.len()
    }

    /// The display log rendered as text lines.
    #[must_use]
    pub fn display_lines(&self) -> Vec<String> {
        self.display_log.iter().map(ToString::to_string).collect()
    }
}

/// Output of the detection-only entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleReport {
    /// Number of detected circles.
    pub circles_found: usize,
    /// Circles in reading order.
    pub circles: Vec<Circle>,
    /// Parameters used for the search.
    pub parameters: DetectionParameters,
    /// When detection finished.
    pub processed_at: DateTime<Utc>,
}

/// One circle's geometry joined with its shading decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleShading {
    /// Circle id.
    pub id: usize,
    /// Circle center.
    pub center: Center,
    /// Circle radius.
    pub radius: u32,
    /// Dark-pixel percentage.
    pub fill_percentage: f64,
    /// Shading decision.
    pub is_shaded: bool,
}

impl CircleShading {
    /// Join a circle with its analysis.
    #[must_use]
    pub fn new(circle: &Circle, analysis: &FillAnalysis) -> Self {
        Self {
            id: circle.id,
            center: circle.center,
            radius: circle.radius,
            fill_percentage: analysis.fill_percentage,
            is_shaded: analysis.is_shaded,
        }
    }
}

/// Output of the shading-analysis entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadingReport {
    /// Number of detected circles.
    pub total_circles: usize,
    /// Number of shaded circles.
    pub shaded_circles: usize,
    /// Number of empty circles.
    pub empty_circles: usize,
    /// Shaded circles in reading order.
    pub shaded: Vec<CircleShading>,
    /// Empty circles in reading order.
    pub empty: Vec<CircleShading>,
    /// Parameters used for the decision.
    pub parameters: ShadingParameters,
    /// When the analysis finished.
    pub processed_at: DateTime<Utc>,
}

// ───────────────────────── Errors ────────────────────────────────────

/// Errors that can end a scan.
///
/// Conditions with a well-defined fallback (empty masks, no circles,
/// ambiguous selectors) are not errors and never surface here.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageLoad` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Failed to decode the input image.
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Scan configuration is invalid.
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `ScanError`.
#[derive(Serialize, Deserialize)]
enum ScanErrorProxy {
    ImageLoad(String),
    EmptyInput,
    InvalidConfig(String),
}

impl Serialize for ScanError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageLoad(e) => ScanErrorProxy::ImageLoad(e.to_string()),
            Self::EmptyInput => ScanErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => ScanErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScanError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = ScanErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed decode error cannot be rebuilt; keep its message.
            ScanErrorProxy::ImageLoad(msg) => {
                Self::ImageLoad(image::ImageError::IoError(std::io::Error::other(msg)))
            }
            ScanErrorProxy::EmptyInput => Self::EmptyInput,
            ScanErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
