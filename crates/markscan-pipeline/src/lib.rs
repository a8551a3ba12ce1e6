//! markscan-pipeline: optical mark recognition for paper order forms
//! (sans-IO).
//!
//! Reads a photographed or scanned order form and turns its shaded
//! bubbles into a priced order:
//! grayscale -> bilateral smoothing -> adaptive threshold -> Hough
//! circle search -> column-major ordering -> fill classification ->
//! form identification -> menu mapping and totals.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices or decoded images and returns structured data. File
//! handling and output formatting live in `markscan-cli`.
//!
//! A [`Scanner`] owns an immutable [`ScanConfig`] and [`Menu`] and can be
//! shared across threads; every scan keeps its working data local.

pub mod blur;
pub mod catalog;
pub mod diagnostics;
pub mod edge;
pub mod fill;
pub mod form;
pub mod grayscale;
pub mod hough;
pub mod menu;
pub mod ordering;
pub mod pipeline;
pub mod preprocess;
pub mod threshold;
pub mod types;

use image::DynamicImage;

pub use catalog::{Catalog, CatalogEntry, Menu, MenuItem, Price, PriceTable};
pub use form::{FormBasis, FormIdentification};
pub use ordering::{CircleOrdering, CircleOrderingKind};
pub use pipeline::Pending;
pub use types::{
    BoundingBox, Center, Circle, CircleCandidate, CircleReport, CircleRole, CircleShading,
    DetectionParameters, DisplayEntry, FillAnalysis, FormVariant, OrderLine,
    PreprocessParameters, ScanConfig, ScanError, ScanMode, ScanResult, ShadingParameters,
    ShadingReport,
};

/// A configured recognizer.
///
/// Construction validates the configuration; afterwards the scanner is
/// read-only and every method takes `&self`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scanner {
    config: ScanConfig,
    menu: Menu,
}

impl Scanner {
    /// Create a scanner from a configuration and menu.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfig`] if any parameter is out of
    /// range (see [`ScanConfig::validate`]).
    pub fn new(config: ScanConfig, menu: Menu) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self { config, menu })
    }

    /// The scan configuration.
    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The catalogs and prices.
    #[must_use]
    pub const fn menu(&self) -> &Menu {
        &self.menu
    }

    /// Start a staged pipeline over raw image bytes.
    pub const fn pipeline<'s>(&'s self, image_bytes: &'s [u8]) -> Pending<'s> {
        Pending::new(self, image_bytes)
    }

    /// Detect and order circles without classifying them.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::EmptyInput`] if `image_bytes` is empty.
    /// Returns [`ScanError::ImageLoad`] if the image cannot be decoded.
    pub fn detect_circles(&self, image_bytes: &[u8]) -> Result<CircleReport, ScanError> {
        Ok(self
            .pipeline(image_bytes)
            .decode()?
            .preprocess()
            .detect_circles()
            .order()
            .into_circle_report())
    }

    /// Detect circles and split them into shaded and empty.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::EmptyInput`] if `image_bytes` is empty.
    /// Returns [`ScanError::ImageLoad`] if the image cannot be decoded.
    pub fn analyze_shading(&self, image_bytes: &[u8]) -> Result<ShadingReport, ScanError> {
        Ok(self
            .pipeline(image_bytes)
            .decode()?
            .preprocess()
            .detect_circles()
            .order()
            .classify()
            .into_shading_report())
    }

    /// Run the full recognition on raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::EmptyInput`] if `image_bytes` is empty.
    /// Returns [`ScanError::ImageLoad`] if the image cannot be decoded.
    pub fn scan(&self, image_bytes: &[u8]) -> Result<ScanResult, ScanError> {
        Ok(self
            .pipeline(image_bytes)
            .decode()?
            .preprocess()
            .detect_circles()
            .order()
            .classify()
            .identify_form()
            .map_menu()
            .into_result())
    }

    /// Run the full recognition on an already decoded image.
    #[must_use]
    pub fn scan_image(&self, image: &DynamicImage) -> ScanResult {
        pipeline::Decoded::from_image(self, image)
            .preprocess()
            .detect_circles()
            .order()
            .classify()
            .identify_form()
            .map_menu()
            .into_result()
    }
}

/// Scan raw image bytes with `config` and the built-in menu.
///
/// # Errors
///
/// Returns [`ScanError::InvalidConfig`] if `config` fails validation.
/// Returns [`ScanError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`ScanError::ImageLoad`] if the image cannot be decoded.
pub fn scan(image_bytes: &[u8], config: &ScanConfig) -> Result<ScanResult, ScanError> {
    Scanner::new(config.clone(), Menu::default())?.scan(image_bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn scanner_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scanner>();
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = ScanConfig::default();
        config.detection.max_radius = 0;
        assert!(matches!(
            Scanner::new(config, Menu::default()),
            Err(ScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            scan(&[], &ScanConfig::default()),
            Err(ScanError::EmptyInput)
        ));
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let err = Scanner::default().scan(b"not an image").unwrap_err();
        assert!(matches!(err, ScanError::ImageLoad(_)));
    }

    #[test]
    fn blank_decoded_image_yields_empty_order() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            50,
            40,
            image::Luma([255]),
        ));
        let result = Scanner::default().scan_image(&image);
        assert_eq!(result.detected_form, FormVariant::Unknown);
        assert_eq!(result.total_circles, 0);
        assert!(result.order_lines.is_empty());
        assert_eq!(result.total_price, Price::ZERO);
        assert!(result.confidence_score.abs() < f64::EPSILON);
        assert_eq!(result.form_label, "Unknown form - using full list");
    }
}
