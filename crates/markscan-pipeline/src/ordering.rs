//! Reading order: turn unordered circle candidates into numbered bubbles.
//!
//! This module defines the [`CircleOrdering`] trait for pluggable ordering
//! strategies and the [`CircleOrderingKind`] enum for selecting which one
//! to use at runtime.
//!
//! # Strategy pattern
//!
//! Printed forms are laid out in columns, and a bubble's position in
//! reading order is what ties it to a catalog entry. Column-major order
//! matches the multi-column forms; plain lexicographic `(x, y)` order is
//! kept for single-column layouts that never needed grouping.

use serde::{Deserialize, Serialize};

use crate::types::{Circle, CircleCandidate};

/// Selects how detected circles are put into reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleOrderingKind {
    /// Group into columns left to right, then read each column top to
    /// bottom.
    #[default]
    ColumnMajor,
    /// Sort by `x`, then `y`, with no column grouping.
    Lexicographic,
}

/// Trait for circle ordering strategies.
///
/// Input: candidates in any order. Output: the same candidates in
/// reading order. `column_tolerance` is the largest horizontal distance,
/// in pixels, at which two circles still share a column; strategies that
/// do not group by column ignore it.
pub trait CircleOrdering {
    /// Put `candidates` into reading order.
    fn order(&self, candidates: Vec<CircleCandidate>, column_tolerance: u32) -> Vec<CircleCandidate>;
}

impl CircleOrdering for CircleOrderingKind {
    fn order(&self, candidates: Vec<CircleCandidate>, column_tolerance: u32) -> Vec<CircleCandidate> {
        match *self {
            Self::ColumnMajor => group_columns(candidates, column_tolerance)
                .into_iter()
                .flatten()
                .collect(),
            Self::Lexicographic => sorted_by_position(candidates),
        }
    }
}

/// Order `candidates` with `kind` and number them `1..=N`.
#[must_use = "returns the ordered circles"]
pub fn order_circles(
    candidates: Vec<CircleCandidate>,
    kind: CircleOrderingKind,
    column_tolerance: u32,
) -> Vec<Circle> {
    kind.order(candidates, column_tolerance)
        .iter()
        .enumerate()
        .map(|(i, candidate)| Circle::from_candidate(i + 1, candidate))
        .collect()
}

/// Split candidates into columns, left to right, each sorted top to
/// bottom.
///
/// Candidates are scanned by ascending `x`. A candidate joins the current
/// column when its `x` is strictly within `column_tolerance` of the
/// column's first member; otherwise it starts a new column. Rows within
/// a column are ordered by `y`, then radius, then `x`.
#[must_use]
pub fn group_columns(
    candidates: Vec<CircleCandidate>,
    column_tolerance: u32,
) -> Vec<Vec<CircleCandidate>> {
    let tolerance = i64::from(column_tolerance);
    let mut columns: Vec<Vec<CircleCandidate>> = Vec::new();

    for candidate in sorted_by_position(candidates) {
        let joins_current = columns.last().is_some_and(|column| {
            let first_x = column.first().map_or(candidate.center.x, |c| c.center.x);
            (i64::from(candidate.center.x) - i64::from(first_x)).abs() < tolerance
        });
        match columns.last_mut() {
            Some(column) if joins_current => column.push(candidate),
            _ => columns.push(vec![candidate]),
        }
    }

    for column in &mut columns {
        column.sort_by_key(|c| (c.center.y, c.radius));
    }
    columns
}

/// Sort by `(x, y, radius)`.
fn sorted_by_position(mut candidates: Vec<CircleCandidate>) -> Vec<CircleCandidate> {
    candidates.sort_by_key(|c| (c.center.x, c.center.y, c.radius));
    candidates
}
