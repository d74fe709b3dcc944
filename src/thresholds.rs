//! Threshold-exceedance analysis.
//!
//! For each aggregated (group, month) series, counts the hours whose
//! generation strictly exceeds `level × monthly reference peak` for every
//! configured level. The strict comparison matters: threshold levels
//! commonly coincide with real samples at the month's peak hour, and a
//! sample exactly equal to the threshold does not count.

use tracing::warn;

use crate::errors::ConfigError;
use crate::grid::{MonthlyHourlyGrid, MonthlyPeaks};
use crate::models::{GenerationRecord, SkippedGroup, ThresholdResult};

/// Default threshold levels, as fractions of the monthly reference peak.
pub const DEFAULT_LEVELS: [f64; 3] = [0.50, 0.65, 0.80];

/// The threshold rows plus the (group, month) keys that were left out
/// because their month has no reference peak.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTable {
    pub rows: Vec<ThresholdResult>,
    pub skipped: Vec<SkippedGroup>,
}

impl ThresholdTable {
    /// Total hours above threshold per level, across all rows, in the
    /// configured level order.
    pub fn totals_per_level(&self, levels: &[f64]) -> Vec<(f64, u32)> {
        levels
            .iter()
            .map(|&level| {
                let total = self
                    .rows
                    .iter()
                    .filter(|row| row.level == level)
                    .map(|row| row.hours_above)
                    .sum();
                (level, total)
            })
            .collect()
    }
}

/// Validates that every threshold level is a fraction in (0, 1].
pub fn validate_levels(levels: &[f64]) -> Result<(), ConfigError> {
    for &level in levels {
        if !level.is_finite() || level <= 0.0 || level > 1.0 {
            return Err(ConfigError::InvalidThresholdLevel { level });
        }
    }
    Ok(())
}

/// Computes the threshold-exceedance table.
///
/// Records sharing (group, month) are first combined by element-wise
/// summation; each combined series then yields one row per level, in the
/// caller's level order, so charts render thresholds consistently. Rows
/// iterate in group order then calendar order. Groups whose month has no
/// reference peak are recorded in `skipped` instead of erroring; the
/// reference simply does not cover them.
///
/// The percentage denominator is the series' own present-sample count,
/// so sparse inputs are not silently misrepresented against a
/// hard-coded 24.
pub fn compute_threshold_table(
    records: &[GenerationRecord],
    peaks: &MonthlyPeaks,
    levels: &[f64],
) -> Result<ThresholdTable, ConfigError> {
    validate_levels(levels)?;

    let grid = MonthlyHourlyGrid::from_records(records);
    let mut table = ThresholdTable::default();

    for ((group, month), series) in grid.iter() {
        let Some(monthly_peak) = peaks.get(*month) else {
            warn!(
                group = group.as_ref().map(|g| g.as_str()).unwrap_or("-"),
                month = %month,
                "no reference peak for month, skipping group"
            );
            table.skipped.push(SkippedGroup {
                group: group.clone(),
                month: *month,
            });
            continue;
        };

        let total_hours = series.sample_count();
        for &level in levels {
            let threshold_value = level * monthly_peak;
            let hours_above = series
                .iter()
                .filter_map(|(_, sample)| sample)
                .filter(|&value| value > threshold_value)
                .count() as u32;
            let percent_above = if total_hours > 0 {
                hours_above as f64 / total_hours as f64 * 100.0
            } else {
                0.0
            };
            table.rows.push(ThresholdResult {
                group: group.clone(),
                month: *month,
                level,
                threshold_value,
                hours_above,
                percent_above,
            });
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationRecord, GroupKey, HourlySeries, Month, HOURS_PER_DAY};
    use approx::assert_relative_eq;

    fn reference_june() -> Vec<GenerationRecord> {
        // Peak 30 at midday, zero at night.
        let mut values = [0.0; HOURS_PER_DAY];
        for (i, v) in values.iter_mut().enumerate() {
            *v = match i {
                9 => 10.0,
                10 => 20.0,
                11 => 30.0,
                12 => 20.0,
                13 => 10.0,
                _ => 0.0,
            };
        }
        vec![GenerationRecord {
            group: None,
            month: Month::June,
            hourly: HourlySeries::from_values(values),
        }]
    }

    fn group_record(group: &str, month: Month, values: [f64; HOURS_PER_DAY]) -> GenerationRecord {
        GenerationRecord {
            group: Some(GroupKey::from(group)),
            month,
            hourly: HourlySeries::from_values(values),
        }
    }

    #[test]
    fn threshold_value_is_level_times_peak_exactly() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        let table = compute_threshold_table(&reference, &peaks, &DEFAULT_LEVELS).unwrap();
        for row in &table.rows {
            assert_eq!(row.threshold_value, row.level * 30.0);
        }
    }

    #[test]
    fn hours_above_is_monotone_in_level() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        let table = compute_threshold_table(&reference, &peaks, &DEFAULT_LEVELS).unwrap();
        let counts: Vec<u32> = table.rows.iter().map(|row| row.hours_above).collect();
        assert_eq!(counts.len(), 3);
        assert!(counts[0] >= counts[1] && counts[1] >= counts[2]);
    }

    #[test]
    fn sample_equal_to_threshold_does_not_count() {
        // Monthly peak 37.5 makes the 80% threshold exactly 30.0; the
        // single sample sitting exactly on it must not be counted.
        let mut reference_values = [0.0; HOURS_PER_DAY];
        reference_values[11] = 37.5;
        let reference = vec![GenerationRecord {
            group: None,
            month: Month::June,
            hourly: HourlySeries::from_values(reference_values),
        }];
        let peaks = MonthlyPeaks::from_records(&reference);

        let mut comparison = HourlySeries::empty();
        comparison.accumulate(12, 30.0);
        let records = vec![GenerationRecord {
            group: Some(GroupKey::from("55")),
            month: Month::June,
            hourly: comparison,
        }];

        let table = compute_threshold_table(&records, &peaks, &[0.8]).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].threshold_value, 30.0);
        assert_eq!(table.rows[0].hours_above, 0);
    }

    #[test]
    fn percent_uses_actual_sample_count() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);

        // Sparse series: only 4 samples, 2 of them above the 50% level.
        let mut sparse = HourlySeries::empty();
        sparse.accumulate(10, 16.0);
        sparse.accumulate(11, 20.0);
        sparse.accumulate(12, 10.0);
        sparse.accumulate(13, 1.0);
        let records = vec![GenerationRecord {
            group: Some(GroupKey::from("sparse")),
            month: Month::June,
            hourly: sparse,
        }];

        let table = compute_threshold_table(&records, &peaks, &[0.5]).unwrap();
        let row = &table.rows[0];
        assert_eq!(row.hours_above, 2);
        assert_relative_eq!(row.percent_above, 50.0);
        assert_relative_eq!(
            row.percent_above,
            row.hours_above as f64 / 4.0 * 100.0
        );
    }

    #[test]
    fn month_without_reference_peak_is_skipped_observably() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        let records = vec![
            group_record("55", Month::June, [10.0; HOURS_PER_DAY]),
            group_record("55", Month::November, [10.0; HOURS_PER_DAY]),
        ];
        let table = compute_threshold_table(&records, &peaks, &DEFAULT_LEVELS).unwrap();
        assert!(table.rows.iter().all(|row| row.month == Month::June));
        assert_eq!(
            table.skipped,
            vec![SkippedGroup {
                group: Some(GroupKey::from("55")),
                month: Month::November,
            }]
        );
    }

    #[test]
    fn records_sharing_a_key_are_combined_before_counting() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        // Two faces at 8.0 each: individually below the 50% threshold of
        // 15.0, combined above it.
        let records = vec![
            group_record("55", Month::June, [8.0; HOURS_PER_DAY]),
            group_record("55", Month::June, [8.0; HOURS_PER_DAY]),
        ];
        let table = compute_threshold_table(&records, &peaks, &[0.5]).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].hours_above, 24);
    }

    #[test]
    fn level_order_is_preserved_in_output() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        let levels = [0.8, 0.5, 0.65];
        let table = compute_threshold_table(&reference, &peaks, &levels).unwrap();
        let seen: Vec<f64> = table.rows.iter().map(|row| row.level).collect();
        assert_eq!(seen, levels.to_vec());
    }

    #[test]
    fn out_of_range_level_is_a_configuration_error() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let result = compute_threshold_table(&reference, &peaks, &[bad]);
            assert!(matches!(
                result,
                Err(ConfigError::InvalidThresholdLevel { .. })
            ));
        }
    }

    #[test]
    fn totals_per_level_sum_rows() {
        let reference = reference_june();
        let peaks = MonthlyPeaks::from_records(&reference);
        let records = vec![
            group_record("a", Month::June, [16.0; HOURS_PER_DAY]),
            group_record("b", Month::June, [25.0; HOURS_PER_DAY]),
        ];
        let table = compute_threshold_table(&records, &peaks, &[0.5, 0.8]).unwrap();
        // 50% threshold 15.0: both groups above for all 24 hours.
        // 80% threshold 24.0: only "b" above.
        assert_eq!(
            table.totals_per_level(&[0.5, 0.8]),
            vec![(0.5, 48), (0.8, 24)]
        );
    }
}
