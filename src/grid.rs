//! The monthly/hourly grid and its aggregation.
//!
//! Grouping uses an explicit ordered map keyed by (group, month), so
//! iteration order is group order then calendar order and never depends
//! on insertion order or hashing. Aggregation is element-wise summation
//! across records sharing a key, which models combining several physical
//! systems (e.g. east and west faces) into one plant.

use std::collections::BTreeMap;

use crate::models::{GenerationRecord, GroupKey, HourlySeries, Month};

/// Composite key of one aggregated series.
pub type SeriesKey = (Option<GroupKey>, Month);

/// Aggregated generation series per (group, month).
#[derive(Debug, Clone, Default)]
pub struct MonthlyHourlyGrid {
    cells: BTreeMap<SeriesKey, HourlySeries>,
}

impl MonthlyHourlyGrid {
    /// Folds records into the grid, summing hourly samples of records
    /// that share (group, month). Summation over `f64` is commutative,
    /// so the combined series does not depend on record order.
    pub fn from_records(records: &[GenerationRecord]) -> Self {
        let mut cells: BTreeMap<SeriesKey, HourlySeries> = BTreeMap::new();
        for record in records {
            cells
                .entry((record.group.clone(), record.month))
                .or_default()
                .add_series(&record.hourly);
        }
        MonthlyHourlyGrid { cells }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, group: Option<&GroupKey>, month: Month) -> Option<&HourlySeries> {
        self.cells.get(&(group.cloned(), month))
    }

    /// Iterates cells in (group, calendar month) order.
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &HourlySeries)> {
        self.cells.iter()
    }

    /// Months present in the grid, in calendar order.
    pub fn months(&self) -> Vec<Month> {
        let mut months: Vec<Month> = self.cells.keys().map(|(_, month)| *month).collect();
        months.sort();
        months.dedup();
        months
    }

    /// Per-month generation totals summed over all groups and hours.
    pub fn monthly_totals(&self) -> BTreeMap<Month, f64> {
        let mut totals: BTreeMap<Month, f64> = BTreeMap::new();
        for ((_, month), series) in &self.cells {
            *totals.entry(*month).or_insert(0.0) += series.total();
        }
        totals
    }

    /// Total generation over every group, month, and hour.
    pub fn annual_total(&self) -> f64 {
        self.monthly_totals().values().sum()
    }

    /// Combined hourly profile of one month, summed across all groups.
    /// Returns `None` if the month is absent from the grid.
    pub fn month_profile(&self, month: Month) -> Option<HourlySeries> {
        let mut profile = HourlySeries::empty();
        let mut present = false;
        for ((_, cell_month), series) in &self.cells {
            if *cell_month == month {
                profile.add_series(series);
                present = true;
            }
        }
        present.then_some(profile)
    }
}

/// Per-month peak generation of a designated reference dataset: the max
/// over that month's raw hourly samples. Computed once and immutable;
/// months absent from the reference stay absent and are skipped by the
/// threshold engine rather than treated as zero.
#[derive(Debug, Clone, Default)]
pub struct MonthlyPeaks {
    peaks: BTreeMap<Month, f64>,
}

impl MonthlyPeaks {
    pub fn from_records(reference: &[GenerationRecord]) -> Self {
        let mut peaks: BTreeMap<Month, f64> = BTreeMap::new();
        for record in reference {
            if let Some(record_max) = record.hourly.max_sample() {
                peaks
                    .entry(record.month)
                    .and_modify(|peak| *peak = peak.max(record_max))
                    .or_insert(record_max);
            }
        }
        MonthlyPeaks { peaks }
    }

    pub fn get(&self, month: Month) -> Option<f64> {
        self.peaks.get(&month).copied()
    }

    /// Maximum peak across all months, if any month is present.
    pub fn overall_peak(&self) -> Option<f64> {
        self.peaks
            .values()
            .copied()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Month, f64)> + '_ {
        self.peaks.iter().map(|(month, peak)| (*month, *peak))
    }
}
