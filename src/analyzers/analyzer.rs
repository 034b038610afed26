use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::analyzers::aggregate::aggregate_group;
use crate::analyzers::extract::RateExtractor;
use crate::analyzers::types::{Group, SheetRates, SkippedSheet, WearReport};
use crate::config::EngineConfig;
use crate::parser::RawSheet;
use crate::stats::{BaselineSummary, ReferenceStats};

/// Runs the extraction and aggregation pass for a fixed configuration.
///
/// Reference stats are computed once from the configured baselines when
/// the engine is built and are never recomputed from the sheets.
#[derive(Debug, Clone)]
pub struct WearRateEngine {
    config: EngineConfig,
    baseline_upper: BaselineSummary,
    baseline_lower: BaselineSummary,
    extractor: RateExtractor,
}

impl WearRateEngine {
    pub fn new(config: EngineConfig) -> Self {
        let baseline_upper = BaselineSummary::new(config.baseline(Group::Upper), config.threshold);
        let baseline_lower = BaselineSummary::new(config.baseline(Group::Lower), config.threshold);

        for (group, summary) in [(Group::Upper, &baseline_upper), (Group::Lower, &baseline_lower)] {
            if summary.stats.is_undefined() {
                warn!(%group, "Baseline is empty, every rate in this group will be filtered out");
            }
        }

        let extractor = RateExtractor::new(
            baseline_upper.stats,
            baseline_lower.stats,
            config.threshold,
        );

        Self {
            config,
            baseline_upper,
            baseline_lower,
            extractor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reference(&self, group: Group) -> ReferenceStats {
        self.extractor.reference(group)
    }

    pub fn baseline(&self, group: Group) -> &BaselineSummary {
        match group {
            Group::Upper => &self.baseline_upper,
            Group::Lower => &self.baseline_lower,
        }
    }

    /// Rates every sheet whose name matches the configured prefix, in the
    /// order given, and builds both tables.
    ///
    /// Sheets with unreadable elapsed hours are recorded in
    /// [`WearReport::skipped`]; they never stop the run. Sheets sharing a
    /// name share one column: a later sheet's cells replace the earlier
    /// sheet's cells for the same brush. The report is stamped with
    /// `generated_at`, so identical input always gives an identical report.
    #[tracing::instrument(skip_all, fields(sheets = sheets.len()))]
    pub fn run(&self, sheets: &[RawSheet], generated_at: DateTime<Utc>) -> WearReport {
        let mut extracted: Vec<SheetRates> = Vec::new();
        let mut skipped = Vec::new();

        for raw in sheets {
            if !self.config.accepts_sheet(&raw.name) {
                debug!(sheet = %raw.name, prefix = %self.config.sheet_prefix, "Sheet name does not match, ignoring");
                continue;
            }

            match self.extractor.extract(raw) {
                Ok(rates) => merge_sheet(&mut extracted, rates),
                Err(e) => {
                    warn!(sheet = %raw.name, error = %e, "Skipping sheet");
                    skipped.push(SkippedSheet {
                        sheet: raw.name.clone(),
                        error: e,
                    });
                }
            }
        }

        let upper = aggregate_group(Group::Upper, &extracted, self.config.highlight_min);
        let lower = aggregate_group(Group::Lower, &extracted, self.config.highlight_min);

        info!(
            rated = extracted.len(),
            skipped = skipped.len(),
            upper_columns = upper.columns.len(),
            lower_columns = lower.columns.len(),
            "Rating pass complete"
        );

        WearReport {
            generated_at,
            threshold: self.config.threshold,
            baseline_upper: self.baseline_upper.clone(),
            baseline_lower: self.baseline_lower.clone(),
            upper,
            lower,
            sheets: extracted.into_iter().map(|s| s.sheet).collect(),
            skipped,
        }
    }
}

/// Adds `rates` to `extracted`, folding it into an earlier sheet of the same name.
fn merge_sheet(extracted: &mut Vec<SheetRates>, rates: SheetRates) {
    let Some(earlier) = extracted.iter_mut().find(|s| s.sheet == rates.sheet) else {
        extracted.push(rates);
        return;
    };

    warn!(sheet = %rates.sheet, "Duplicate sheet name, later cells replace earlier ones");
    earlier.elapsed_hours = rates.elapsed_hours;
    earlier.upper.extend(rates.upper);
    earlier.lower.extend(rates.lower);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{SheetError, parse_sheet};

    fn sheet(name: &str, csv: &str) -> RawSheet {
        parse_sheet(name, csv.as_bytes()).unwrap()
    }

    fn run(engine: &WearRateEngine, sheets: &[RawSheet]) -> WearReport {
        engine.run(sheets, DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn test_reference_stats_come_from_config() {
        let engine = WearRateEngine::new(EngineConfig {
            baseline_upper: vec![1.0, 3.0],
            baseline_lower: vec![],
            ..Default::default()
        });

        assert_eq!(engine.reference(Group::Upper).mean, 2.0);
        assert_eq!(engine.reference(Group::Upper).std_dev, 1.0);
        assert!(engine.reference(Group::Lower).is_undefined());
    }

    #[test]
    fn test_run_filters_by_sheet_name() {
        let engine = WearRateEngine::new(EngineConfig::default());
        let report = run(&engine, &[
            sheet("Summary", ",,,,,,,2\n,,,,5,10,8\n"),
            sheet("sheet1", ",,,,,,,2\n,,,,5,10,8\n"),
        ]);

        assert_eq!(report.sheets, vec!["sheet1"]);
        assert_eq!(report.upper.columns, vec!["Upper_sheet1"]);
        assert_eq!(report.upper.value(5, "Upper_sheet1"), Some(1.0));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_run_records_skipped_sheets() {
        let engine = WearRateEngine::new(EngineConfig::default());
        let report = run(&engine, &[
            sheet("Sheet1", ",,,,,,,\n,,,,5,10,8\n"),
            sheet("Sheet2", ",,,,,,,n/a\n,,,,5,10,8\n"),
        ]);

        assert!(report.sheets.is_empty());
        assert!(report.upper.columns.is_empty());
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].error, SheetError::MissingElapsedHours);
        assert_eq!(
            report.skipped[1].error,
            SheetError::InvalidElapsedHours("n/a".to_string())
        );
    }

    #[test]
    fn test_empty_baseline_filters_every_rate() {
        let engine = WearRateEngine::new(EngineConfig {
            baseline_upper: vec![],
            ..Default::default()
        });
        let report = run(&engine, &[sheet("Sheet1", ",,,,,,,2\n,,,,5,10,8\n")]);

        assert_eq!(report.upper.value(5, "Upper_Sheet1"), Some(0.0));
        assert!(report.upper.average(5).is_nan());
    }

    #[test]
    fn test_duplicate_sheet_names_share_one_column() {
        let engine = WearRateEngine::new(EngineConfig::default());
        let report = run(
            &engine,
            &[
                sheet("Sheet1", ",,,,,,,2\n,,,,5,10,8\n,,,,6,10,9\n"),
                sheet("Sheet1", ",,,,,,,2\n,,,,5,10,9\n"),
            ],
        );

        assert_eq!(report.sheets, vec!["Sheet1"]);
        assert_eq!(report.upper.columns, vec!["Upper_Sheet1"]);
        assert_eq!(report.upper.row(5).unwrap().values, vec![0.5]);
        assert_eq!(report.upper.average(5), 0.5);
        assert_eq!(report.upper.value(6, "Upper_Sheet1"), Some(0.5));
    }

    #[test]
    fn test_run_is_stamped_by_caller() {
        let engine = WearRateEngine::new(EngineConfig::default());
        let sheets = [sheet("Sheet1", ",,,,,,,2\n,,,,5,10,8\n")];

        let first = serde_json::to_string(&run(&engine, &sheets)).unwrap();
        let second = serde_json::to_string(&run(&engine, &sheets)).unwrap();
        assert_eq!(first, second);
        assert_eq!(run(&engine, &sheets).generated_at, DateTime::<Utc>::UNIX_EPOCH);
    }
}
