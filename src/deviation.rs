//! Deviation statistics between a modeled and a measured curve.
//!
//! Differences with magnitude at or below epsilon are excluded from the
//! statistical pool. The epsilon gate filters measurement noise, not
//! data: curves agree to within resolution for most night hours, and an
//! excluded pair is recoverable by rerunning with a smaller epsilon.

use std::collections::BTreeMap;

use crate::errors::ConfigError;
use crate::grid::MonthlyHourlyGrid;
use crate::models::{DeviationSample, GroupKey, HourStats, HourlySeries, Month, HOURS_PER_DAY};

/// Default negligibility gate, in the same unit as the generation values.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// One observed value per (hour-of-day, group). Ordered so output tables
/// are deterministic.
pub type HourlyObservations = BTreeMap<(u8, GroupKey), f64>;

/// Computes per-hour deviation statistics between measured and modeled
/// observations.
///
/// For each hour 1..=24 and each group present in both inputs, the
/// signed difference measured − modeled is retained when its magnitude
/// strictly exceeds `epsilon` (a difference of exactly epsilon is
/// dropped). Groups missing from either side are skipped for that hour
/// only. Every hour appears in the returned stats; hours whose retained
/// pool is empty carry the explicit no-data marker instead of a silent
/// zero.
pub fn compute_hour_deviation(
    measured: &HourlyObservations,
    modeled: &HourlyObservations,
    epsilon: f64,
) -> Result<(Vec<DeviationSample>, Vec<HourStats>), ConfigError> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(ConfigError::InvalidEpsilon { epsilon });
    }

    let mut samples = Vec::new();
    let mut pools: BTreeMap<u8, Vec<f64>> = BTreeMap::new();

    for ((hour, group), measured_value) in measured {
        let Some(modeled_value) = modeled.get(&(*hour, group.clone())) else {
            continue;
        };
        let difference = measured_value - modeled_value;
        if difference.abs() > epsilon {
            samples.push(DeviationSample {
                hour: *hour,
                group: group.clone(),
                difference,
            });
            pools.entry(*hour).or_default().push(difference);
        }
    }

    let stats = (1..=HOURS_PER_DAY as u8)
        .map(|hour| match pools.get(&hour) {
            Some(pool) => HourStats {
                hour,
                samples: pool.len(),
                mean: Some(mean(pool)),
                median: Some(median(pool)),
            },
            None => HourStats {
                hour,
                samples: 0,
                mean: None,
                median: None,
            },
        })
        .collect();

    Ok((samples, stats))
}

/// Per-month hourly deviation between a comparison grid and a reference
/// grid: for every month present in both, the combined comparison
/// profile minus the combined reference profile, hour by hour. Hours
/// missing from either profile stay missing in the result.
pub fn monthly_profile_deviation(
    reference: &MonthlyHourlyGrid,
    comparison: &MonthlyHourlyGrid,
) -> BTreeMap<Month, HourlySeries> {
    let mut curves = BTreeMap::new();
    for month in comparison.months() {
        let Some(comparison_profile) = comparison.month_profile(month) else {
            continue;
        };
        let Some(reference_profile) = reference.month_profile(month) else {
            continue;
        };
        let mut diff = HourlySeries::empty();
        for (hour, sample) in comparison_profile.iter() {
            if let (Some(c), Some(r)) = (sample, reference_profile.get(hour)) {
                diff.accumulate(hour, c - r);
            }
        }
        curves.insert(month, diff);
    }
    curves
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median over a non-empty pool; an even-sized pool averages the two
/// central values.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
