//! Shared domain model for the PV generation analytics.
//!
//! This module defines the types every other module works in terms of:
//! the calendar-ordered [`Month`], opaque [`GroupKey`]s, the 24-slot
//! [`HourlySeries`], and the derived result rows. It contains parsing
//! helpers but no I/O.

use std::fmt;

/// Number of hourly samples in one daily generation profile.
pub const HOURS_PER_DAY: usize = 24;

// ---------------------------------------------------------------------------
// Month
// ---------------------------------------------------------------------------

/// Calendar month. The variant order is calendar order, so the derived
/// `Ord` gives every downstream table and report a fixed month ordering
/// regardless of input file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    /// All twelve months in calendar order.
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// 1-based calendar index (January = 1).
    pub fn index(self) -> u32 {
        self as u32 + 1
    }

    pub fn from_index(index: u32) -> Option<Month> {
        match index {
            1..=12 => Some(Month::ALL[(index - 1) as usize]),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    /// Parses a month from a full English name (case-insensitive) or a
    /// 1-12 index. Input files use both conventions.
    pub fn parse(value: &str) -> Option<Month> {
        let trimmed = value.trim();
        if let Ok(index) = trimmed.parse::<u32>() {
            return Month::from_index(index);
        }
        Month::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Group keys
// ---------------------------------------------------------------------------

/// Categorical identifier distinguishing independent generation series,
/// e.g. an orientation/tilt combination or a device ID. The analytics
/// never interpret the key; callers supply canonical labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(label: impl Into<String>) -> Self {
        GroupKey(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(label: &str) -> Self {
        GroupKey(label.to_string())
    }
}

// ---------------------------------------------------------------------------
// Hourly series
// ---------------------------------------------------------------------------

/// One daily generation profile: exactly 24 samples indexed by
/// hour-of-day 1..=24. Samples are optional because long-format and
/// measured inputs can be sparse; a missing hour is distinct from a
/// zero sample and never counts toward sample totals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HourlySeries {
    samples: [Option<f64>; HOURS_PER_DAY],
}

impl HourlySeries {
    pub fn empty() -> Self {
        HourlySeries::default()
    }

    pub fn from_values(values: [f64; HOURS_PER_DAY]) -> Self {
        let mut series = HourlySeries::empty();
        for (slot, value) in series.samples.iter_mut().zip(values) {
            *slot = Some(value);
        }
        series
    }

    /// Adds `value` into the sample for `hour` (1..=24), summing with any
    /// sample already present.
    pub fn accumulate(&mut self, hour: u8, value: f64) {
        assert!(
            (1..=HOURS_PER_DAY as u8).contains(&hour),
            "hour-of-day out of range: {hour}"
        );
        let slot = &mut self.samples[(hour - 1) as usize];
        *slot = Some(slot.unwrap_or(0.0) + value);
    }

    /// Element-wise summation with another series. A present sample plus
    /// a missing one stays present; two missing samples stay missing.
    pub fn add_series(&mut self, other: &HourlySeries) {
        for (slot, sample) in self.samples.iter_mut().zip(other.samples) {
            if let Some(value) = sample {
                *slot = Some(slot.unwrap_or(0.0) + value);
            }
        }
    }

    pub fn get(&self, hour: u8) -> Option<f64> {
        assert!(
            (1..=HOURS_PER_DAY as u8).contains(&hour),
            "hour-of-day out of range: {hour}"
        );
        self.samples[(hour - 1) as usize]
    }

    /// Iterates (hour-of-day, sample) pairs in hour order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Option<f64>)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, sample)| (i as u8 + 1, *sample))
    }

    /// Number of hours carrying a sample.
    pub fn sample_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    /// Sum of all present samples.
    pub fn total(&self) -> f64 {
        self.samples.iter().flatten().sum()
    }

    /// Largest present sample, if any.
    pub fn max_sample(&self) -> Option<f64> {
        self.samples
            .iter()
            .flatten()
            .copied()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Multiplies every present sample by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for slot in self.samples.iter_mut() {
            if let Some(value) = slot.as_mut() {
                *value *= factor;
            }
        }
    }
}

/// One input row normalized onto the monthly/hourly grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub group: Option<GroupKey>,
    pub month: Month,
    pub hourly: HourlySeries,
}

// ---------------------------------------------------------------------------
// Result rows
// ---------------------------------------------------------------------------

/// One threshold-exceedance row: how many aggregated hourly samples of a
/// (group, month) series strictly exceed `level` times the month's
/// reference peak.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub group: Option<GroupKey>,
    pub month: Month,
    /// Fraction of the monthly reference peak, in (0, 1].
    pub level: f64,
    pub threshold_value: f64,
    pub hours_above: u32,
    pub percent_above: f64,
}

impl ThresholdResult {
    /// Percentage label for reports and charts, e.g. "50%".
    pub fn level_label(&self) -> String {
        format!("{}%", (self.level * 100.0).round() as u32)
    }
}

/// A (group, month) series left out of a threshold table because the
/// month has no reference peak. Exposed so callers can tell "zero hours
/// above threshold" apart from "month skipped".
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedGroup {
    pub group: Option<GroupKey>,
    pub month: Month,
}

/// Scaling factor between two datasets plus the peaks it was derived
/// from, kept for diagnostic logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingReport {
    pub factor: f64,
    pub reference_peak: f64,
    pub comparison_peak: f64,
}

/// A retained (non-negligible) signed difference between a measured and
/// a modeled value at one hour for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationSample {
    pub hour: u8,
    pub group: GroupKey,
    pub difference: f64,
}

/// Per-hour central tendency of the retained deviation samples. An hour
/// whose retained pool is empty reports `None` for both statistics; this
/// is the explicit no-data marker, distinguishable from a computed mean
/// of exactly 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct HourStats {
    pub hour: u8,
    pub samples: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

impl HourStats {
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parses a decimal that may use a comma as the decimal separator
/// ("12,5"), as some exported measurement files do.
pub fn parse_comma_decimal(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.replace(',', ".").parse::<f64>()
}
