//! CSV ingestion: normalizes delimited input files onto the grid model.
//!
//! Two generation layouts are supported and detected from the header
//! row, the same way the source files ship them:
//!
//!   - wide: optional grouping columns (`ID`, `Orientation`, `Tilt`),
//!     a `Month` column, and `Hour 1`..`Hour 24` numeric columns;
//!   - long: `Month`, `Hour`, `Generation` columns plus an optional
//!     `ID` column.
//!
//! Values may use a comma decimal separator. German orientation labels
//! are normalized to English here, at the boundary; the analytics only
//! ever see canonical keys.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use csv::StringRecord;

use crate::errors::IngestError;
use crate::models::{
    parse_comma_decimal, GenerationRecord, GroupKey, HourlySeries, Month, HOURS_PER_DAY,
};

/// How wide-layout rows are folded into group keys.
#[derive(Debug, Clone)]
pub enum GroupingMode {
    /// All rows form a single ungrouped series per month.
    Ungrouped,
    /// One series per device ID (requires an `ID` column).
    ById,
    /// One series per tilt value (requires a `Tilt` column), optionally
    /// restricted to rows whose orientation is in the filter. Rows of
    /// the same tilt but different orientations share a key, so east
    /// and west faces combine into one plant downstream.
    ByTilt { orientations: Option<Vec<String>> },
}

/// Reads a generation CSV, detecting the layout from its header row.
pub fn read_generation_csv(
    path: &Path,
    grouping: &GroupingMode,
) -> Result<Vec<GenerationRecord>, IngestError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;

    let hour_columns = wide_hour_columns(&headers);
    if !hour_columns.is_empty() {
        read_wide(&mut reader, &headers, &hour_columns, grouping, path)
    } else if find_column(&headers, "Hour").is_some() && find_column(&headers, "Generation").is_some()
    {
        read_long(&mut reader, &headers, grouping, path)
    } else {
        Err(IngestError::UnrecognizedLayout {
            path: PathBuf::from(path),
        })
    }
}

fn read_wide(
    reader: &mut csv::Reader<File>,
    headers: &StringRecord,
    hour_columns: &[(usize, u8)],
    grouping: &GroupingMode,
    path: &Path,
) -> Result<Vec<GenerationRecord>, IngestError> {
    let month_col = require_column(headers, "Month", path)?;
    let id_col = find_column(headers, "ID");
    let orientation_col = find_column(headers, "Orientation");
    let tilt_col = find_column(headers, "Tilt");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let line = row_line(&row);

        let group = match grouping {
            GroupingMode::Ungrouped => None,
            GroupingMode::ById => {
                let col = id_col.ok_or_else(|| missing_column("ID", path))?;
                Some(GroupKey::new(field(&row, col).to_string()))
            }
            GroupingMode::ByTilt { orientations } => {
                let col = tilt_col.ok_or_else(|| missing_column("Tilt", path))?;
                if let Some(wanted) = orientations {
                    let orientation_col =
                        orientation_col.ok_or_else(|| missing_column("Orientation", path))?;
                    let orientation = canonical_orientation(field(&row, orientation_col));
                    if !wanted.iter().any(|w| orientation.eq_ignore_ascii_case(w)) {
                        continue;
                    }
                }
                Some(GroupKey::new(field(&row, col).to_string()))
            }
        };

        let month = parse_month(field(&row, month_col), line, path)?;

        let mut hourly = HourlySeries::empty();
        for &(col, hour) in hour_columns {
            let raw = field(&row, col);
            if raw.is_empty() {
                continue;
            }
            let value = parse_comma_decimal(raw).map_err(|_| IngestError::BadNumber {
                value: raw.to_string(),
                column: headers.get(col).unwrap_or("").to_string(),
                line,
                path: PathBuf::from(path),
            })?;
            hourly.accumulate(hour, value);
        }

        records.push(GenerationRecord {
            group,
            month,
            hourly,
        });
    }
    Ok(records)
}

fn read_long(
    reader: &mut csv::Reader<File>,
    headers: &StringRecord,
    grouping: &GroupingMode,
    path: &Path,
) -> Result<Vec<GenerationRecord>, IngestError> {
    let month_col = require_column(headers, "Month", path)?;
    let hour_col = require_column(headers, "Hour", path)?;
    let generation_col = require_column(headers, "Generation", path)?;
    let id_col = find_column(headers, "ID");

    // Long rows arrive one sample at a time; fold them into one sparse
    // series per (group, month) before handing them downstream.
    let mut series: BTreeMap<(Option<GroupKey>, Month), HourlySeries> = BTreeMap::new();

    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let line = row_line(&row);

        let group = match grouping {
            GroupingMode::Ungrouped => None,
            GroupingMode::ById => {
                let col = id_col.ok_or_else(|| missing_column("ID", path))?;
                Some(GroupKey::new(field(&row, col).to_string()))
            }
            GroupingMode::ByTilt { .. } => return Err(missing_column("Tilt", path)),
        };

        let month = parse_month(field(&row, month_col), line, path)?;

        let hour_raw = field(&row, hour_col);
        let hour = hour_raw
            .parse::<u8>()
            .ok()
            .filter(|h| (1..=HOURS_PER_DAY as u8).contains(h))
            .ok_or_else(|| IngestError::BadHour {
                value: hour_raw.to_string(),
                line,
                path: PathBuf::from(path),
            })?;

        let raw = field(&row, generation_col);
        if raw.is_empty() {
            continue;
        }
        let value = parse_comma_decimal(raw).map_err(|_| IngestError::BadNumber {
            value: raw.to_string(),
            column: "Generation".to_string(),
            line,
            path: PathBuf::from(path),
        })?;

        series
            .entry((group, month))
            .or_default()
            .accumulate(hour, value);
    }

    Ok(series
        .into_iter()
        .map(|((group, month), hourly)| GenerationRecord {
            group,
            month,
            hourly,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Measured-device readings
// ---------------------------------------------------------------------------

/// One timestamped power reading of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredReading {
    pub timestamp: NaiveDateTime,
    pub device: GroupKey,
    pub value: f64,
}

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Reads a measured-power CSV: a `DateTime` column followed by one
/// numeric column per device ID. Empty cells are skipped.
pub fn read_measured_csv(path: &Path) -> Result<Vec<MeasuredReading>, IngestError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let datetime_col = require_column(&headers, "DateTime", path)?;

    let device_columns: Vec<(usize, GroupKey)> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != datetime_col)
        .map(|(i, name)| (i, GroupKey::new(name.trim().to_string())))
        .collect();

    let mut readings = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let line = row_line(&row);

        let raw_ts = field(&row, datetime_col);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| IngestError::BadTimestamp {
            value: raw_ts.to_string(),
            line,
            path: PathBuf::from(path),
        })?;

        for (col, device) in &device_columns {
            let raw = field(&row, *col);
            if raw.is_empty() {
                continue;
            }
            let value = parse_comma_decimal(raw).map_err(|_| IngestError::BadNumber {
                value: raw.to_string(),
                column: device.as_str().to_string(),
                line,
                path: PathBuf::from(path),
            })?;
            readings.push(MeasuredReading {
                timestamp,
                device: device.clone(),
                value,
            });
        }
    }
    Ok(readings)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

/// Folds timestamped readings into the typical diurnal profile per
/// device and month, in two stages: readings are first averaged within
/// each (device, date, hour) to smooth intra-hour variation, then the
/// hourly means are averaged per (device, month, hour) across all days
/// and years. Clock hours 0..=23 map to hour-of-day 1..=24.
pub fn mean_hourly_by_month(
    readings: &[MeasuredReading],
) -> BTreeMap<(GroupKey, Month), HourlySeries> {
    // Stage 1: hourly means per calendar day.
    let mut hourly: BTreeMap<(GroupKey, NaiveDate, u8), (f64, u32)> = BTreeMap::new();
    for reading in readings {
        let hour = reading.timestamp.hour() as u8 + 1;
        let key = (reading.device.clone(), reading.timestamp.date(), hour);
        let slot = hourly.entry(key).or_insert((0.0, 0));
        slot.0 += reading.value;
        slot.1 += 1;
    }

    // Stage 2: mean of the hourly means per (device, month, hour).
    let mut monthly: BTreeMap<(GroupKey, Month, u8), (f64, u32)> = BTreeMap::new();
    for ((device, date, hour), (sum, count)) in hourly {
        let Some(month) = Month::from_index(date.month()) else {
            continue;
        };
        let slot = monthly.entry((device, month, hour)).or_insert((0.0, 0));
        slot.0 += sum / count as f64;
        slot.1 += 1;
    }

    let mut grids: BTreeMap<(GroupKey, Month), HourlySeries> = BTreeMap::new();
    for ((device, month, hour), (sum, count)) in monthly {
        grids
            .entry((device, month))
            .or_default()
            .accumulate(hour, sum / count as f64);
    }
    grids
}

// ---------------------------------------------------------------------------
// Orientation labels
// ---------------------------------------------------------------------------

/// Normalizes German orientation labels from provider metadata to the
/// English names used everywhere downstream. Unknown labels pass
/// through unchanged.
pub fn canonical_orientation(label: &str) -> String {
    let trimmed = label.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "nord" => "North",
        "ost" => "East",
        "süd" | "sued" => "South",
        "west" => "West",
        "nord-ost" => "North-East",
        "süd-ost" | "sued-ost" => "South-East",
        "süd-west" | "sued-west" => "South-West",
        "nord-west" => "North-West",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

// ---------------------------------------------------------------------------
// Reader plumbing
// ---------------------------------------------------------------------------

/// Opens a CSV reader with the delimiter sniffed from the header line;
/// provider exports use commas, metadata exports semicolons.
fn open_reader(path: &Path) -> Result<csv::Reader<File>, IngestError> {
    let delimiter = sniff_delimiter(path)?;
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: PathBuf::from(path),
        source: e,
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file))
}

fn sniff_delimiter(path: &Path) -> Result<u8, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: PathBuf::from(path),
        source: e,
    })?;
    let mut header_line = String::new();
    BufReader::new(file)
        .read_line(&mut header_line)
        .map_err(|e| IngestError::Io {
            path: PathBuf::from(path),
            source: e,
        })?;
    if header_line.matches(';').count() > header_line.matches(',').count() {
        Ok(b';')
    } else {
        Ok(b',')
    }
}

fn read_headers(
    reader: &mut csv::Reader<File>,
    path: &Path,
) -> Result<StringRecord, IngestError> {
    reader
        .headers()
        .map(|h| h.clone())
        .map_err(|e| csv_error(path, e))
}

/// Column positions of `Hour 1`..`Hour 24` headers.
fn wide_hour_columns(headers: &StringRecord) -> Vec<(usize, u8)> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(i, header)| {
            let trimmed = header.trim();
            let rest = trimmed
                .strip_prefix("Hour")
                .or_else(|| trimmed.strip_prefix("hour"))?;
            let hour = rest.trim().parse::<u8>().ok()?;
            (1..=HOURS_PER_DAY as u8).contains(&hour).then_some((i, hour))
        })
        .collect()
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn require_column(
    headers: &StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, IngestError> {
    find_column(headers, name).ok_or_else(|| missing_column(name, path))
}

fn missing_column(name: &str, path: &Path) -> IngestError {
    IngestError::MissingColumn {
        column: name.to_string(),
        path: PathBuf::from(path),
    }
}

fn csv_error(path: &Path, source: csv::Error) -> IngestError {
    IngestError::Csv {
        path: PathBuf::from(path),
        source,
    }
}

fn field<'r>(row: &'r StringRecord, col: usize) -> &'r str {
    row.get(col).unwrap_or("").trim()
}

fn row_line(row: &StringRecord) -> u64 {
    row.position().map(|p| p.line()).unwrap_or(0)
}

fn parse_month(raw: &str, line: u64, path: &Path) -> Result<Month, IngestError> {
    Month::parse(raw).ok_or_else(|| IngestError::BadMonth {
        value: raw.to_string(),
        line,
        path: PathBuf::from(path),
    })
}
