//! Fleet metadata: distribution of PV systems by orientation and tilt.
//!
//! The metadata export is semicolon-delimited and carries one row per
//! registered system. Azimuth and tilt are banded into the canonical
//! group labels the rest of the tooling works with.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::IngestError;
use crate::models::parse_comma_decimal;

/// One registered PV system.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMetadata {
    pub id: String,
    pub azimuth: f64,
    pub tilt: f64,
    pub dc_capacity_w: Option<f64>,
}

/// Compass orientation band of a system, from its azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Orientation {
    North,
    East,
    South,
    West,
}

impl Orientation {
    /// Bands an azimuth in degrees: South 135-225, East 45-135,
    /// West 225-315, North otherwise (wrapping through 0/360).
    pub fn from_azimuth(azimuth: f64) -> Orientation {
        let azimuth = azimuth.rem_euclid(360.0);
        if (135.0..=225.0).contains(&azimuth) {
            Orientation::South
        } else if (45.0..135.0).contains(&azimuth) {
            Orientation::East
        } else if (225.0..=315.0).contains(&azimuth) {
            Orientation::West
        } else {
            Orientation::North
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::North => "North",
            Orientation::East => "East",
            Orientation::South => "South",
            Orientation::West => "West",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tilt band of a system. Bands are contiguous, so every tilt angle
/// lands in exactly one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TiltBand {
    Below20,
    From20To40,
    From40To60,
    Above60,
}

impl TiltBand {
    pub fn from_tilt(tilt: f64) -> TiltBand {
        if tilt < 20.0 {
            TiltBand::Below20
        } else if tilt < 40.0 {
            TiltBand::From20To40
        } else if tilt < 60.0 {
            TiltBand::From40To60
        } else {
            TiltBand::Above60
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TiltBand::Below20 => "< 20 deg",
            TiltBand::From20To40 => "20 - 40 deg",
            TiltBand::From40To60 => "40 - 60 deg",
            TiltBand::Above60 => "> 60 deg",
        }
    }
}

impl fmt::Display for TiltBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-band system counts plus the fleet's mean DC capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetDistribution {
    pub orientation_counts: BTreeMap<Orientation, u32>,
    pub tilt_counts: BTreeMap<TiltBand, u32>,
    pub mean_dc_capacity_w: Option<f64>,
}

/// Reads the semicolon-delimited metadata export: `ID`, `azimuth`,
/// `tilt`, and optional `estimated_dc_capacity` columns.
pub fn read_metadata_csv(path: &Path) -> Result<Vec<SystemMetadata>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: PathBuf::from(path),
        source: e,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map(|h| h.clone())
        .map_err(|e| IngestError::Csv {
            path: PathBuf::from(path),
            source: e,
        })?;

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| IngestError::MissingColumn {
                column: name.to_string(),
                path: PathBuf::from(path),
            })
    };
    let id_col = column("ID")?;
    let azimuth_col = column("azimuth")?;
    let tilt_col = column("tilt")?;
    let capacity_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("estimated_dc_capacity"));

    let mut systems = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::Csv {
            path: PathBuf::from(path),
            source: e,
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let numeric = |col: usize, name: &str| {
            let raw = row.get(col).unwrap_or("").trim();
            parse_comma_decimal(raw).map_err(|_| IngestError::BadNumber {
                value: raw.to_string(),
                column: name.to_string(),
                line,
                path: PathBuf::from(path),
            })
        };

        let dc_capacity_w = match capacity_col {
            Some(col) => {
                let raw = row.get(col).unwrap_or("").trim();
                if raw.is_empty() {
                    None
                } else {
                    Some(numeric(col, "estimated_dc_capacity")?)
                }
            }
            None => None,
        };

        systems.push(SystemMetadata {
            id: row.get(id_col).unwrap_or("").trim().to_string(),
            azimuth: numeric(azimuth_col, "azimuth")?,
            tilt: numeric(tilt_col, "tilt")?,
            dc_capacity_w,
        });
    }
    Ok(systems)
}

/// Counts systems per orientation and tilt band and averages the DC
/// capacity over the systems that report one.
pub fn summarize_fleet(systems: &[SystemMetadata]) -> FleetDistribution {
    let mut distribution = FleetDistribution::default();
    let mut capacity_sum = 0.0;
    let mut capacity_count = 0u32;

    for system in systems {
        *distribution
            .orientation_counts
            .entry(Orientation::from_azimuth(system.azimuth))
            .or_insert(0) += 1;
        *distribution
            .tilt_counts
            .entry(TiltBand::from_tilt(system.tilt))
            .or_insert(0) += 1;
        if let Some(capacity) = system.dc_capacity_w {
            capacity_sum += capacity;
            capacity_count += 1;
        }
    }

    if capacity_count > 0 {
        distribution.mean_dc_capacity_w = Some(capacity_sum / capacity_count as f64);
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azimuth_bands_match_compass_sectors() {
        assert_eq!(Orientation::from_azimuth(180.0), Orientation::South);
        assert_eq!(Orientation::from_azimuth(135.0), Orientation::South);
        assert_eq!(Orientation::from_azimuth(225.0), Orientation::South);
        assert_eq!(Orientation::from_azimuth(90.0), Orientation::East);
        assert_eq!(Orientation::from_azimuth(270.0), Orientation::West);
        assert_eq!(Orientation::from_azimuth(0.0), Orientation::North);
        assert_eq!(Orientation::from_azimuth(340.0), Orientation::North);
        assert_eq!(Orientation::from_azimuth(360.0), Orientation::North);
    }

    #[test]
    fn tilt_bands_are_contiguous() {
        assert_eq!(TiltBand::from_tilt(10.0), TiltBand::Below20);
        assert_eq!(TiltBand::from_tilt(20.0), TiltBand::From20To40);
        assert_eq!(TiltBand::from_tilt(39.9), TiltBand::From20To40);
        // Exactly 40 lands in the 40-60 band, not past 60.
        assert_eq!(TiltBand::from_tilt(40.0), TiltBand::From40To60);
        assert_eq!(TiltBand::from_tilt(60.0), TiltBand::Above60);
        assert_eq!(TiltBand::from_tilt(85.0), TiltBand::Above60);
    }

    #[test]
    fn fleet_summary_counts_and_averages() {
        let systems = vec![
            SystemMetadata {
                id: "a".into(),
                azimuth: 180.0,
                tilt: 30.0,
                dc_capacity_w: Some(1000.0),
            },
            SystemMetadata {
                id: "b".into(),
                azimuth: 90.0,
                tilt: 30.0,
                dc_capacity_w: Some(3000.0),
            },
            SystemMetadata {
                id: "c".into(),
                azimuth: 185.0,
                tilt: 70.0,
                dc_capacity_w: None,
            },
        ];
        let distribution = summarize_fleet(&systems);
        assert_eq!(distribution.orientation_counts[&Orientation::South], 2);
        assert_eq!(distribution.orientation_counts[&Orientation::East], 1);
        assert_eq!(distribution.tilt_counts[&TiltBand::From20To40], 2);
        assert_eq!(distribution.tilt_counts[&TiltBand::Above60], 1);
        assert_eq!(distribution.mean_dc_capacity_w, Some(2000.0));
    }
}
