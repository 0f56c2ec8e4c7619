//! Sensor wire protocol.
//!
//! The wearable streams comma-separated ASCII records:
//!
//! | Shape                                               | Fields |
//! |-----------------------------------------------------|--------|
//! | `STATS,rms1,rms2,mean1,mean2,imbalance,pitch,roll`  | 8      |
//! | `STATS,rms1,rms2,mean1,mean2,imbalance`             | 6      |
//! | `ch1,ch2,pitch,roll`                                | 4      |
//! | `ch1,ch2`                                           | 2      |
//!
//! Any other field count is not an error; the record is simply ignored.

use emg_types::StatsSample;
use thiserror::Error;

pub const STATS_PREFIX: &str = "STATS";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("field {index} is not a finite number: {value:?}")]
    NotANumber { index: usize, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorRecord {
    Raw {
        ch1: f64,
        ch2: f64,
        orientation: Option<Orientation>,
    },
    Stats(StatsSample),
}

impl SensorRecord {
    /// Whether the record carried pitch/roll from the IMU.
    pub fn has_orientation(&self) -> bool {
        match self {
            SensorRecord::Raw { orientation, .. } => orientation.is_some(),
            SensorRecord::Stats(stats) => stats.pitch.is_some(),
        }
    }
}

/// Parses one record. `Ok(None)` means the shape is not one we accept.
pub fn parse_record(line: &str) -> Result<Option<SensorRecord>, ProtocolError> {
    let parts: Vec<&str> = line.trim().split(',').collect();

    if line.trim_start().starts_with(STATS_PREFIX) {
        let stats = match parts.len() {
            8 => {
                let v = numbers(&parts, 1..8)?;
                StatsSample {
                    rms1: v[0],
                    rms2: v[1],
                    mean1: v[2],
                    mean2: v[3],
                    imbalance: v[4],
                    pitch: Some(v[5]),
                    roll: Some(v[6]),
                }
            }
            6 => {
                let v = numbers(&parts, 1..6)?;
                StatsSample {
                    rms1: v[0],
                    rms2: v[1],
                    mean1: v[2],
                    mean2: v[3],
                    imbalance: v[4],
                    pitch: None,
                    roll: None,
                }
            }
            _ => return Ok(None),
        };
        return Ok(Some(SensorRecord::Stats(stats)));
    }

    let record = match parts.len() {
        4 => {
            let v = numbers(&parts, 0..4)?;
            SensorRecord::Raw {
                ch1: v[0],
                ch2: v[1],
                orientation: Some(Orientation {
                    pitch: v[2],
                    roll: v[3],
                }),
            }
        }
        2 => {
            let v = numbers(&parts, 0..2)?;
            SensorRecord::Raw {
                ch1: v[0],
                ch2: v[1],
                orientation: None,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(record))
}

fn numbers(parts: &[&str], range: std::ops::Range<usize>) -> Result<Vec<f64>, ProtocolError> {
    range
        .map(|index| {
            let field = parts[index].trim();
            field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ProtocolError::NotANumber {
                    index,
                    value: field.to_string(),
                })
        })
        .collect()
}
