//! Output formatting and persistence for wear reports.
//!
//! Supports pretty-printing, JSON export, fixed-width text tables
//! and CSV export. Undefined averages are written as `NaN` in text and CSV
//! and as `null` in JSON.

use anyhow::Result;
use csv::WriterBuilder;
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::analyzers::types::{Group, RateTable, WearReport};
use crate::stats::BaselineSummary;

/// Marker appended to highlighted averages in text output.
const HIGHLIGHT_MARK: char = '*';

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &WearReport) {
    debug!("{:#?}", report);
}

/// Formats a rate with six decimals.
pub fn format_rate(value: f64) -> String {
    format!("{value:.6}")
}

/// Renders a table as fixed-width text, one line per brush.
///
/// Highlighted averages are followed by `*`.
pub fn render_table(table: &RateTable) -> String {
    let average_label = table.group.average_label();
    let widths: Vec<usize> = table.columns.iter().map(|c| c.len().max(10)).collect();
    let average_width = average_label.len().max(10);

    let mut out = String::new();
    let _ = write!(out, "{:>5}", "No");
    for (column, &width) in table.columns.iter().zip(&widths) {
        let _ = write!(out, "  {column:>width$}");
    }
    let _ = writeln!(out, "  {average_label:>average_width$}");

    for row in &table.rows {
        let _ = write!(out, "{:>5}", row.entity);
        for (value, &width) in row.values.iter().zip(&widths) {
            let _ = write!(out, "  {:>width$}", format_rate(*value));
        }
        let mark = if table.is_highlighted(row.entity) {
            HIGHLIGHT_MARK
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "  {:>average_width$}{mark}",
            format_rate(row.average)
        );
    }

    out
}

/// Renders a baseline's reference stats and filtered mean.
pub fn render_baseline(group: Group, summary: &BaselineSummary, threshold: f64) -> String {
    let (low, high) = summary.stats.bounds(threshold);
    format!(
        "{group}: mean={} std_dev={} bounds=[{}, {}] kept={}/{} filtered_mean={}",
        format_rate(summary.stats.mean),
        format_rate(summary.stats.std_dev),
        format_rate(low),
        format_rate(high),
        summary.filtered.len() - summary.rejected(),
        summary.filtered.len(),
        format_rate(summary.filtered_mean),
    )
}

/// Writes a table to a CSV file, replacing it if it exists.
///
/// The header is `No`, one column per sheet, then the average column.
pub fn write_table_csv(path: &Path, table: &RateTable) -> Result<()> {
    debug!(path = %path.display(), group = %table.group, "Writing CSV table");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let mut header = Vec::with_capacity(table.columns.len() + 2);
    header.push("No".to_string());
    header.extend(table.columns.iter().cloned());
    header.push(table.group.average_label());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.entity.to_string());
        record.extend(row.values.iter().map(|v| format_rate(*v)));
        record.push(format_rate(row.average));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the full report as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &WearReport) -> Result<()> {
    debug!(path = %path.display(), "Writing JSON report");
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
