use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::analyzers::types::{
    ENTITY_IDS, EntityId, Group, MissingReason, RateCell, SheetRates,
};
use crate::parser::{GroupRow, RawSheet, SheetError, SheetReading};
use crate::stats::ReferenceStats;

/// Turns sheets into per-brush rate cells, filtered against fixed reference stats.
#[derive(Debug, Clone, Copy)]
pub struct RateExtractor {
    upper: ReferenceStats,
    lower: ReferenceStats,
    threshold: f64,
}

impl RateExtractor {
    pub fn new(upper: ReferenceStats, lower: ReferenceStats, threshold: f64) -> Self {
        Self {
            upper,
            lower,
            threshold,
        }
    }

    pub fn reference(&self, group: Group) -> ReferenceStats {
        match group {
            Group::Upper => self.upper,
            Group::Lower => self.lower,
        }
    }

    /// Extracts rates from a raw sheet.
    ///
    /// # Errors
    ///
    /// Returns a [`SheetError`] if the elapsed hours cannot be read; the
    /// sheet then contributes nothing.
    pub fn extract(&self, raw: &RawSheet) -> Result<SheetRates, SheetError> {
        let reading = SheetReading::from_raw(raw)?;
        Ok(self.extract_reading(&reading))
    }

    /// Extracts rates from an already coerced sheet.
    pub fn extract_reading(&self, reading: &SheetReading) -> SheetRates {
        let upper = self.group_cells(reading, Group::Upper);
        let lower = self.group_cells(reading, Group::Lower);

        debug!(
            sheet = %reading.name,
            elapsed_hours = reading.elapsed_hours,
            upper = upper.len(),
            lower = lower.len(),
            "Sheet extracted"
        );

        SheetRates {
            sheet: reading.name.clone(),
            elapsed_hours: reading.elapsed_hours,
            upper,
            lower,
        }
    }

    fn group_cells(&self, reading: &SheetReading, group: Group) -> BTreeMap<EntityId, RateCell> {
        let index = index_rows(reading.rows(group));
        let stats = self.reference(group);

        ENTITY_IDS
            .filter_map(|entity| {
                let row = index.get(&entity)?;
                Some((
                    entity,
                    rate_cell(row, group, reading.elapsed_hours, stats, self.threshold),
                ))
            })
            .collect()
    }
}

/// Maps each brush to its first row in the sheet.
fn index_rows(rows: &[GroupRow]) -> HashMap<EntityId, &GroupRow> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index.entry(row.entity).or_insert(row);
    }
    index
}

fn rate_cell(
    row: &GroupRow,
    group: Group,
    elapsed_hours: f64,
    stats: ReferenceStats,
    threshold: f64,
) -> RateCell {
    if elapsed_hours <= 0.0 {
        return RateCell::Missing(MissingReason::NonPositiveHours);
    }

    let rate = row.consumed(group) / elapsed_hours;
    if stats.accepts(Some(rate), threshold) {
        RateCell::Valid(rate)
    } else {
        RateCell::Missing(MissingReason::Outlier)
    }
}
