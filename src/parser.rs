//! CSV parser for measurement sheets.
//!
//! Sheets are read without a header row. Row 0 carries the elapsed hours in column 7;
//! every following row may hold one lower-group reading in columns 0..=2
//! (brush, previous, current) and one upper-group reading in columns 4..=6
//! (brush, current, previous). Column 3 is a spacer.

use anyhow::Result;
use csv::ReaderBuilder;
use thiserror::Error;

use crate::analyzers::types::{EntityId, Group};

/// Row and column of the elapsed-hours cell.
pub const HOURS_CELL: (usize, usize) = (0, 7);

const LOWER_COLUMNS: [usize; 3] = [0, 1, 2];
const UPPER_COLUMNS: [usize; 3] = [4, 5, 6];

/// Reasons a whole sheet is left out of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("elapsed hours cell is empty")]
    MissingElapsedHours,
    #[error("elapsed hours cell is not a number: {0:?}")]
    InvalidElapsedHours(String),
}

/// A sheet as read from its source: a ragged grid of optional text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Trimmed text of a cell, or `None` if it is outside the grid or blank.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Numeric value of a cell, or `None` if it is blank or not a finite number.
    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col).and_then(parse_number)
    }
}

/// Decodes CSV bytes into a [`RawSheet`].
///
/// # Errors
///
/// Returns an error if the bytes are not valid UTF-8 CSV.
pub fn parse_sheet(name: &str, bytes: &[u8]) -> Result<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = field.trim();
                    (!field.is_empty()).then(|| field.to_string())
                })
                .collect(),
        );
    }

    Ok(RawSheet::new(name, rows))
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One coerced reading for a brush within a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupRow {
    pub entity: EntityId,
    pub previous: f64,
    pub current: f64,
}

impl GroupRow {
    /// Material consumed between the two readings.
    pub fn consumed(&self, group: Group) -> f64 {
        match group {
            Group::Upper => self.current - self.previous,
            Group::Lower => self.previous - self.current,
        }
    }
}

/// A sheet whose elapsed hours parsed and whose rows are coerced to numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetReading {
    pub name: String,
    pub elapsed_hours: f64,
    pub upper: Vec<GroupRow>,
    pub lower: Vec<GroupRow>,
}

impl SheetReading {
    /// Reads the elapsed hours and both groups' rows from `raw`.
    ///
    /// Rows with a blank or non-numeric cell, or a non-integral brush
    /// number, are dropped from that group only.
    pub fn from_raw(raw: &RawSheet) -> Result<Self, SheetError> {
        let (row, col) = HOURS_CELL;
        let text = raw.cell(row, col).ok_or(SheetError::MissingElapsedHours)?;
        let elapsed_hours =
            parse_number(text).ok_or_else(|| SheetError::InvalidElapsedHours(text.to_string()))?;

        Ok(Self {
            name: raw.name.clone(),
            elapsed_hours,
            upper: group_rows(raw, Group::Upper),
            lower: group_rows(raw, Group::Lower),
        })
    }

    pub fn rows(&self, group: Group) -> &[GroupRow] {
        match group {
            Group::Upper => &self.upper,
            Group::Lower => &self.lower,
        }
    }
}

fn group_rows(raw: &RawSheet, group: Group) -> Vec<GroupRow> {
    let [id_col, a_col, b_col] = match group {
        Group::Upper => UPPER_COLUMNS,
        Group::Lower => LOWER_COLUMNS,
    };

    (HOURS_CELL.0 + 1..raw.rows.len())
        .filter_map(|row| {
            let id = raw.number(row, id_col)?;
            let a = raw.number(row, a_col)?;
            let b = raw.number(row, b_col)?;
            if id.fract() != 0.0 || id < 0.0 || id > u32::MAX as f64 {
                return None;
            }

            let (previous, current) = match group {
                Group::Upper => (b, a),
                Group::Lower => (a, b),
            };
            Some(GroupRow {
                entity: id as EntityId,
                previous,
                current,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
No,Previous,Current,,No,Current,Previous,12
1,20.0,19.5,,1,18.0,17.0
2,21.0,,,2,16.0,15.5
x,1,2,,3,abc,1
4.5,10,9,,4,10,8
";

    #[test]
    fn test_parse_sheet_keeps_blank_cells_as_none() {
        let raw = parse_sheet("Sheet1", SAMPLE.as_bytes()).unwrap();

        assert_eq!(raw.name, "Sheet1");
        assert_eq!(raw.rows.len(), 5);
        assert_eq!(raw.cell(0, 7), Some("12"));
        assert_eq!(raw.cell(2, 2), None);
        assert_eq!(raw.cell(99, 0), None);
        assert_eq!(raw.number(1, 1), Some(20.0));
        assert_eq!(raw.number(3, 0), None);
    }

    #[test]
    fn test_parse_sheet_empty_bytes() {
        let raw = parse_sheet("Sheet1", &[]).unwrap();
        assert!(raw.rows.is_empty());
    }

    #[test]
    fn test_parse_sheet_invalid_utf8() {
        let result = parse_sheet("Sheet1", &[0xFF, 0xFE, b',', 0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reading_from_raw() {
        let raw = parse_sheet("Sheet1", SAMPLE.as_bytes()).unwrap();
        let reading = SheetReading::from_raw(&raw).unwrap();

        assert_eq!(reading.elapsed_hours, 12.0);
        assert_eq!(
            reading.lower,
            vec![GroupRow {
                entity: 1,
                previous: 20.0,
                current: 19.5
            }]
        );
        assert_eq!(reading.upper.len(), 3);
        assert_eq!(
            reading.upper[2],
            GroupRow {
                entity: 4,
                previous: 8.0,
                current: 10.0
            }
        );
    }

    #[test]
    fn test_missing_hours() {
        let raw = parse_sheet("Sheet1", b"1,2,3,,1,2,3\n1,2,3,,1,2,3\n").unwrap();
        assert_eq!(
            SheetReading::from_raw(&raw),
            Err(SheetError::MissingElapsedHours)
        );
    }

    #[test]
    fn test_non_numeric_hours() {
        let raw = parse_sheet("Sheet1", b",,,,,,,soon\n").unwrap();
        assert_eq!(
            SheetReading::from_raw(&raw),
            Err(SheetError::InvalidElapsedHours("soon".to_string()))
        );

        let raw = parse_sheet("Sheet1", b",,,,,,,NaN\n").unwrap();
        assert!(SheetReading::from_raw(&raw).is_err());
    }

    #[test]
    fn test_consumed_direction() {
        let row = GroupRow {
            entity: 5,
            previous: 8.0,
            current: 10.0,
        };
        assert_eq!(row.consumed(Group::Upper), 2.0);
        assert_eq!(row.consumed(Group::Lower), -2.0);
    }
}
