//! Cross-source scale reconciliation.
//!
//! Two datasets measured in different units or magnitudes are aligned by
//! a single multiplicative factor derived from their peaks. The factor
//! is applied once, upstream of the threshold engine, never per group:
//! it is one global correction.

use tracing::info;

use crate::grid::{MonthlyHourlyGrid, MonthlyPeaks};
use crate::models::{GenerationRecord, ScalingReport};

/// Derives the factor that brings the comparison dataset onto the
/// reference dataset's scale.
///
/// reference_peak is the max over months of the reference monthly peaks;
/// comparison_peak is the max over months of the per-month sum of the
/// aggregated hourly series (monthly totals, not per-hour maxima). A
/// zero comparison peak yields factor 1.0 instead of a division fault,
/// and so does an empty reference.
pub fn compute_scale_factor(
    reference: &MonthlyPeaks,
    comparison: &[GenerationRecord],
) -> ScalingReport {
    let reference_peak = reference.overall_peak().unwrap_or(0.0);

    let grid = MonthlyHourlyGrid::from_records(comparison);
    let comparison_peak = grid
        .monthly_totals()
        .values()
        .copied()
        .fold(0.0, f64::max);

    let factor = if comparison_peak == 0.0 || reference_peak == 0.0 {
        1.0
    } else {
        reference_peak / comparison_peak
    };

    info!(
        factor,
        reference_peak, comparison_peak, "derived cross-source scaling factor"
    );

    ScalingReport {
        factor,
        reference_peak,
        comparison_peak,
    }
}

/// Multiplies every hourly sample of every record by `factor`.
pub fn apply_scale(records: &mut [GenerationRecord], factor: f64) {
    for record in records.iter_mut() {
        record.hourly.scale(factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKey, HourlySeries, Month, HOURS_PER_DAY};
    use approx::assert_relative_eq;

    fn reference_with_peaks(peaks: &[(Month, f64)]) -> MonthlyPeaks {
        let records: Vec<GenerationRecord> = peaks
            .iter()
            .map(|&(month, peak)| {
                let mut series = HourlySeries::empty();
                series.accumulate(12, peak);
                GenerationRecord {
                    group: None,
                    month,
                    hourly: series,
                }
            })
            .collect();
        MonthlyPeaks::from_records(&records)
    }

    fn comparison_record(group: &str, month: Month, value: f64) -> GenerationRecord {
        GenerationRecord {
            group: Some(GroupKey::from(group)),
            month,
            hourly: HourlySeries::from_values([value; HOURS_PER_DAY]),
        }
    }

    #[test]
    fn factor_is_reference_peak_over_comparison_monthly_total_peak() {
        let reference = reference_with_peaks(&[(Month::June, 600.0), (Month::July, 450.0)]);
        // June monthly total = (1.0 + 4.0) * 24 = 120; July = 2.0 * 24 = 48.
        let comparison = vec![
            comparison_record("east", Month::June, 1.0),
            comparison_record("west", Month::June, 4.0),
            comparison_record("east", Month::July, 2.0),
        ];
        let report = compute_scale_factor(&reference, &comparison);
        assert_relative_eq!(report.reference_peak, 600.0);
        assert_relative_eq!(report.comparison_peak, 120.0);
        assert_relative_eq!(report.factor, 5.0);
        assert!(report.factor > 0.0);
    }

    #[test]
    fn all_zero_comparison_yields_factor_one() {
        let reference = reference_with_peaks(&[(Month::June, 600.0)]);
        let comparison = vec![comparison_record("east", Month::June, 0.0)];
        let report = compute_scale_factor(&reference, &comparison);
        assert_eq!(report.factor, 1.0);
        assert_eq!(report.comparison_peak, 0.0);
    }

    #[test]
    fn empty_comparison_yields_factor_one() {
        let reference = reference_with_peaks(&[(Month::June, 600.0)]);
        let report = compute_scale_factor(&reference, &[]);
        assert_eq!(report.factor, 1.0);
    }

    #[test]
    fn empty_reference_yields_factor_one() {
        let reference = MonthlyPeaks::from_records(&[]);
        let comparison = vec![comparison_record("east", Month::June, 3.0)];
        let report = compute_scale_factor(&reference, &comparison);
        assert_eq!(report.factor, 1.0);
        assert_eq!(report.reference_peak, 0.0);
    }

    #[test]
    fn apply_scale_multiplies_every_sample_once() {
        let mut records = vec![
            comparison_record("east", Month::June, 2.0),
            comparison_record("west", Month::July, 3.0),
        ];
        apply_scale(&mut records, 5.0);
        assert_eq!(records[0].hourly.get(1), Some(10.0));
        assert_eq!(records[1].hourly.get(24), Some(15.0));
    }
}
