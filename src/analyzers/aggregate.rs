use crate::analyzers::types::{ENTITY_IDS, Group, RateRow, RateTable, SheetRates};

/// Builds the rate table for `group` from every sheet's extracted cells.
///
/// Columns follow the order of `sheets` and only include sheets that
/// produced at least one cell for the group. Every brush gets a row.
/// Missing and absent cells both become `0.0`, so only strictly positive
/// values count towards the average.
pub fn aggregate_group(group: Group, sheets: &[SheetRates], highlight_min: f64) -> RateTable {
    let contributing: Vec<&SheetRates> = sheets
        .iter()
        .filter(|s| !s.cells(group).is_empty())
        .collect();

    let columns = contributing
        .iter()
        .map(|s| group.column_label(&s.sheet))
        .collect();

    let rows = ENTITY_IDS
        .map(|entity| {
            let values: Vec<f64> = contributing
                .iter()
                .map(|s| s.cell(group, entity).map_or(0.0, |c| c.tabulated()))
                .collect();

            RateRow {
                entity,
                average: positive_mean(&values),
                values,
            }
        })
        .collect();

    RateTable {
        group,
        columns,
        rows,
        highlight_min,
    }
}

/// Mean of the strictly positive values; NaN if there are none.
fn positive_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| **v > 0.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
