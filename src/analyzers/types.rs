//! Data types used by the rating pipeline.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use crate::parser::SheetError;
use crate::stats::{BaselineSummary, ReferenceStats};

/// Brush number.
pub type EntityId = u32;

/// Every brush that gets a row in a [`RateTable`].
pub const ENTITY_IDS: RangeInclusive<EntityId> = 1..=32;

/// Measurement group. The groups read their difference in opposite directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Upper,
    Lower,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Upper, Group::Lower];

    /// Prefix used for this group's per-sheet column labels.
    pub fn label(self) -> &'static str {
        match self {
            Group::Upper => "Upper",
            Group::Lower => "Lower",
        }
    }

    pub fn column_label(self, sheet: &str) -> String {
        format!("{}_{}", self.label(), sheet)
    }

    pub fn average_label(self) -> String {
        format!("Avg Rate ({})", self.label())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an extracted cell carries no rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The sheet's elapsed hours were zero or negative.
    NonPositiveHours,
    /// The rate fell outside the reference band.
    Outlier,
}

/// One extracted (brush, sheet, group) cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RateCell {
    Valid(f64),
    Missing(MissingReason),
}

impl RateCell {
    pub fn rate(&self) -> Option<f64> {
        match self {
            RateCell::Valid(rate) => Some(*rate),
            RateCell::Missing(_) => None,
        }
    }

    /// Value used when tabulating: missing becomes zero.
    pub fn tabulated(&self) -> f64 {
        self.rate().unwrap_or(0.0)
    }
}

/// Everything extracted from one sheet.
///
/// A brush that has no row in the sheet has no entry in the group's map,
/// which is different from an entry holding [`RateCell::Missing`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetRates {
    pub sheet: String,
    pub elapsed_hours: f64,
    pub upper: BTreeMap<EntityId, RateCell>,
    pub lower: BTreeMap<EntityId, RateCell>,
}

impl SheetRates {
    pub fn cells(&self, group: Group) -> &BTreeMap<EntityId, RateCell> {
        match group {
            Group::Upper => &self.upper,
            Group::Lower => &self.lower,
        }
    }

    pub fn cell(&self, group: Group, entity: EntityId) -> Option<RateCell> {
        self.cells(group).get(&entity).copied()
    }
}

/// A sheet left out of the run and the reason why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    #[serde(rename = "reason", serialize_with = "serialize_display")]
    pub error: SheetError,
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// One brush's tabulated rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRow {
    pub entity: EntityId,
    /// One value per table column; missing cells are `0.0`.
    pub values: Vec<f64>,
    /// Mean of the strictly positive values, NaN if there are none.
    pub average: f64,
}

/// Per-brush rates for one group, one column per contributing sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateTable {
    pub group: Group,
    pub columns: Vec<String>,
    pub rows: Vec<RateRow>,
    pub highlight_min: f64,
}

impl RateTable {
    pub fn row(&self, entity: EntityId) -> Option<&RateRow> {
        self.rows.iter().find(|r| r.entity == entity)
    }

    /// Tabulated value at (`entity`, `column`). `None` only if either is unknown.
    pub fn value(&self, entity: EntityId, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(entity).map(|r| r.values[idx])
    }

    /// Average rate for `entity`; NaN if it has no positive observations.
    pub fn average(&self, entity: EntityId) -> f64 {
        self.row(entity).map_or(f64::NAN, |r| r.average)
    }

    /// Whether `entity`'s average should be drawn attention to.
    pub fn is_highlighted(&self, entity: EntityId) -> bool {
        self.average(entity) > self.highlight_min
    }

    /// `(brush, average)` pairs in brush order, for plotting.
    pub fn average_series(&self) -> Vec<(EntityId, f64)> {
        self.rows.iter().map(|r| (r.entity, r.average)).collect()
    }
}

/// Complete result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct WearReport {
    pub generated_at: DateTime<Utc>,
    pub threshold: f64,
    pub baseline_upper: BaselineSummary,
    pub baseline_lower: BaselineSummary,
    pub upper: RateTable,
    pub lower: RateTable,
    pub sheets: Vec<String>,
    pub skipped: Vec<SkippedSheet>,
}

impl WearReport {
    pub fn table(&self, group: Group) -> &RateTable {
        match group {
            Group::Upper => &self.upper,
            Group::Lower => &self.lower,
        }
    }

    pub fn reference(&self, group: Group) -> ReferenceStats {
        match group {
            Group::Upper => self.baseline_upper.stats,
            Group::Lower => self.baseline_lower.stats,
        }
    }
}
