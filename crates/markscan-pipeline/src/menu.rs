//! Mapping shaded bubbles onto catalog entries, and pricing the order.

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, Menu, Price};
use crate::form::FormIdentification;
use crate::types::{
    CircleRole, DisplayEntry, FillAnalysis, FormVariant, OrderLine, ScanMode, ScanResult,
};

/// Display labels for the selector bubbles, in reading order.
pub const SELECTOR_LABELS: [&str; 2] = ["FORM_A_SELECTOR", "FORM_B_SELECTOR"];

/// Label shown for bubbles past the end of the active catalog.
pub const OUT_OF_CATALOG_LABEL: &str = "N/A";

/// Lowest confidence reported for a shaded bubble.
pub const MIN_CONFIDENCE: f64 = 70.0;
/// Highest confidence reported for a shaded bubble.
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Per-bubble interpretation before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    /// Priced selections in reading order.
    pub order_lines: Vec<OrderLine>,
    /// One entry per bubble in reading order.
    pub display_log: Vec<DisplayEntry>,
    /// Bubbles eligible for item mapping.
    pub menu_circles: usize,
}

/// Confidence of a shaded mark: `clamp(170 - fill, 70, 100)`.
#[must_use]
pub fn mark_confidence(fill_percentage: f64) -> f64 {
    (170.0 - fill_percentage).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// The catalog bubbles are mapped onto for this form decision.
#[must_use]
pub fn active_catalog<'m>(menu: &'m Menu, form: &FormIdentification, mode: ScanMode) -> &'m Catalog {
    match (mode, form.variant) {
        (ScanMode::Flat, _) => menu.flat(),
        (ScanMode::FormAware, FormVariant::FormA) => menu.form_a(),
        (ScanMode::FormAware, FormVariant::FormB) => menu.form_b(),
        (ScanMode::FormAware, FormVariant::Unknown) => menu.fallback(),
    }
}

/// Interpret every bubble against the active catalog.
///
/// `fills` must be in reading order. The first [`FormIdentification::offset`]
/// bubbles are logged as selectors; the rest map to catalog position
/// `position - offset`. Only shaded, in-catalog bubbles produce order
/// lines.
#[must_use = "returns the mapping"]
pub fn map_circles(
    fills: &[FillAnalysis],
    form: &FormIdentification,
    mode: ScanMode,
    menu: &Menu,
) -> Mapping {
    let catalog = active_catalog(menu, form, mode);
    let offset = form.offset();
    let mut order_lines = Vec::new();
    let mut display_log = Vec::with_capacity(fills.len());

    for (position, fill) in fills.iter().enumerate() {
        if position < offset {
            let label = SELECTOR_LABELS.get(position).copied().unwrap_or("SELECTOR");
            display_log.push(DisplayEntry {
                circle_id: fill.circle_id,
                role: CircleRole::Selector,
                label: label.to_owned(),
                is_shaded: fill.is_shaded,
            });
            continue;
        }

        let Some(entry) = catalog.get(position - offset) else {
            display_log.push(DisplayEntry {
                circle_id: fill.circle_id,
                role: CircleRole::OutOfCatalog,
                label: OUT_OF_CATALOG_LABEL.to_owned(),
                is_shaded: fill.is_shaded,
            });
            continue;
        };

        display_log.push(DisplayEntry {
            circle_id: fill.circle_id,
            role: CircleRole::Item,
            label: entry.label().to_owned(),
            is_shaded: fill.is_shaded,
        });

        if fill.is_shaded {
            let unit_price = menu.prices().price_of(entry);
            tracing::debug!(
                circle_id = fill.circle_id,
                item = entry.label(),
                price = %unit_price,
                "item selected"
            );
            order_lines.push(OrderLine {
                circle_id: fill.circle_id,
                item: entry,
                label: entry.label().to_owned(),
                quantity: 1,
                unit_price,
                fill_percentage: fill.fill_percentage,
                confidence: mark_confidence(fill.fill_percentage),
            });
        }
    }

    Mapping {
        order_lines,
        display_log,
        menu_circles: fills.len().saturating_sub(offset),
    }
}

/// Total the order and assemble the final result.
#[must_use = "returns the scan result"]
pub fn aggregate(
    form: &FormIdentification,
    mode: ScanMode,
    menu: &Menu,
    total_circles: usize,
    mapping: Mapping,
    processed_at: DateTime<Utc>,
) -> ScanResult {
    let Mapping {
        order_lines,
        display_log,
        menu_circles,
    } = mapping;

    let total_price: Price = order_lines.iter().map(|line| line.unit_price).sum();
    #[allow(clippy::cast_precision_loss)]
    let confidence_score = if order_lines.is_empty() {
        0.0
    } else {
        order_lines.iter().map(|line| line.confidence).sum::<f64>() / order_lines.len() as f64
    };

    ScanResult {
        detected_form: form.variant,
        form_label: form.label(menu),
        total_circles,
        menu_circles,
        order_lines,
        display_log,
        total_price,
        confidence_score,
        processed_at,
        active_catalog: active_catalog(menu, form, mode).labels(),
    }
}
