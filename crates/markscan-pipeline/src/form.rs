//! Form identification from the two selector bubbles.
//!
//! The first two bubbles in reading order mark which printed layout was
//! used: the first stands for Form A, the second for Form B. The layout
//! is chosen by comparing their fill percentages with each other, never
//! against an absolute cutoff.

use serde::{Deserialize, Serialize};

use crate::catalog::Menu;
use crate::types::{FillAnalysis, FormVariant, ScanMode};

/// Number of leading bubbles reserved for form selection.
pub const SELECTOR_COUNT: usize = 2;

/// Why the form decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormBasis {
    /// One selector is clearly fuller than the other.
    Selected,
    /// Fewer than two bubbles were detected.
    TooFewCircles,
    /// The selector fills are within the margin of each other.
    Ambiguous,
    /// Form-aware scanning is switched off.
    Disabled,
}

/// Outcome of form identification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormIdentification {
    /// Chosen layout, or [`FormVariant::Unknown`].
    pub variant: FormVariant,
    /// How the variant was reached.
    pub basis: FormBasis,
    /// Fill percentages of the Form A and Form B selectors, when present.
    pub selector_fills: Option<(f64, f64)>,
}

impl FormIdentification {
    /// Number of leading bubbles excluded from item mapping.
    #[must_use]
    pub const fn offset(&self) -> usize {
        if self.variant.is_identified() {
            SELECTOR_COUNT
        } else {
            0
        }
    }

    /// Human-readable description, naming the catalog size when a form
    /// was identified.
    #[must_use]
    pub fn label(&self, menu: &Menu) -> String {
        match (self.basis, self.variant) {
            (FormBasis::Selected, FormVariant::FormA) => {
                format!("Form A ({} menu items)", menu.form_a().len())
            }
            (FormBasis::Selected, FormVariant::FormB) => {
                format!("Form B ({} menu items)", menu.form_b().len())
            }
            (FormBasis::Disabled, _) => "Form detection disabled - using flat list".to_owned(),
            (FormBasis::Ambiguous, _) => "No clear form identifier - using full list".to_owned(),
            (FormBasis::TooFewCircles | FormBasis::Selected, _) => {
                "Unknown form - using full list".to_owned()
            }
        }
    }
}

/// Decide the form from the fill analyses of the ordered bubbles.
///
/// `fills` must be in reading order. A difference strictly greater than
/// `margin` percentage points selects the fuller selector's form.
#[must_use = "returns the form decision"]
pub fn identify_form(fills: &[FillAnalysis], margin: f64, mode: ScanMode) -> FormIdentification {
    if mode == ScanMode::Flat {
        return FormIdentification {
            variant: FormVariant::Unknown,
            basis: FormBasis::Disabled,
            selector_fills: None,
        };
    }

    let [form_a, form_b, ..] = fills else {
        tracing::info!(circles = fills.len(), "too few circles for form selection");
        return FormIdentification {
            variant: FormVariant::Unknown,
            basis: FormBasis::TooFewCircles,
            selector_fills: None,
        };
    };

    let (a, b) = (form_a.fill_percentage, form_b.fill_percentage);
    let (variant, basis) = if (a - b).abs() > margin {
        let variant = if a > b {
            FormVariant::FormA
        } else {
            FormVariant::FormB
        };
        (variant, FormBasis::Selected)
    } else {
        (FormVariant::Unknown, FormBasis::Ambiguous)
    };

    tracing::info!(
        form_a_fill = a,
        form_b_fill = b,
        form = %variant,
        "form identified"
    );

    FormIdentification {
        variant,
        basis,
        selector_fills: Some((a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fills(values: &[f64]) -> Vec<FillAnalysis> {
        values
            .iter()
            .enumerate()
            .map(|(i, &fill_percentage)| FillAnalysis {
                fill_percentage,
                is_shaded: fill_percentage > 60.0,
                ..FillAnalysis::empty(i + 1)
            })
            .collect()
    }

    fn identify(values: &[f64]) -> FormIdentification {
        identify_form(&fills(values), 5.0, ScanMode::FormAware)
    }

    #[test]
    fn no_circles_is_unknown() {
        let id = identify(&[]);
        assert_eq!(id.variant, FormVariant::Unknown);
        assert_eq!(id.basis, FormBasis::TooFewCircles);
        assert_eq!(id.offset(), 0);
        assert_eq!(id.label(&Menu::default()), "Unknown form - using full list");
    }

    #[test]
    fn single_circle_is_unknown() {
        assert_eq!(identify(&[90.0]).basis, FormBasis::TooFewCircles);
    }

    #[test]
    fn fuller_first_selector_picks_form_a() {
        let id = identify(&[80.0, 10.0, 0.0]);
        assert_eq!(id.variant, FormVariant::FormA);
        assert_eq!(id.offset(), 2);
        assert_eq!(id.selector_fills, Some((80.0, 10.0)));
        assert_eq!(id.label(&Menu::default()), "Form A (41 menu items)");
    }

    #[test]
    fn swapping_selectors_swaps_the_form() {
        let id = identify(&[10.0, 80.0]);
        assert_eq!(id.variant, FormVariant::FormB);
        assert_eq!(id.label(&Menu::default()), "Form B (38 menu items)");
    }

    #[test]
    fn close_fills_are_ambiguous() {
        let id = identify(&[50.0, 53.0]);
        assert_eq!(id.variant, FormVariant::Unknown);
        assert_eq!(id.basis, FormBasis::Ambiguous);
        assert_eq!(id.offset(), 0);
        assert_eq!(
            id.label(&Menu::default()),
            "No clear form identifier - using full list"
        );
    }

    #[test]
    fn difference_equal_to_margin_is_ambiguous() {
        assert_eq!(identify(&[15.0, 10.0]).variant, FormVariant::Unknown);
        assert_eq!(identify(&[15.5, 10.0]).variant, FormVariant::FormA);
    }

    #[test]
    fn both_selectors_empty_is_ambiguous() {
        assert_eq!(identify(&[0.0, 0.0]).basis, FormBasis::Ambiguous);
    }

    #[test]
    fn flat_mode_disables_identification() {
        let id = identify_form(&fills(&[90.0, 0.0]), 5.0, ScanMode::Flat);
        assert_eq!(id.variant, FormVariant::Unknown);
        assert_eq!(id.basis, FormBasis::Disabled);
        assert_eq!(
            id.label(&Menu::default()),
            "Form detection disabled - using flat list"
        );
    }
}
