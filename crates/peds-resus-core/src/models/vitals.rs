//! Vital sign reference models.

use serde::{Deserialize, Serialize};

/// Normal vital-sign ranges for one age band.
///
/// Bands are ordered by age, contiguous and non-overlapping over 0-216 months.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalAgeBand {
    /// Stable identifier (collection key)
    pub id: String,
    /// Display label (e.g., "Toddler (1-2 yr)")
    pub label: String,
    /// Whole-month bounds, both inclusive
    pub age_range_months: (u32, u32),
    pub heart_rate: VitalRange,
    pub respiratory_rate: VitalRange,
    pub systolic_bp: VitalRange,
    pub diastolic_bp: VitalRange,
    pub oxygen_saturation: VitalRange,
}

/// Thresholds for one vital sign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalRange {
    /// Values below this are low
    pub low: f64,
    /// Typical value for the band
    pub normal: f64,
    /// Values above this are high
    pub high: f64,
    pub units: String,
}

/// Vital signs that can be classified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VitalSign {
    HeartRate,
    RespiratoryRate,
    SystolicBp,
    DiastolicBp,
    OxygenSaturation,
}

impl VitalSign {
    pub const ALL: [VitalSign; 5] = [
        VitalSign::HeartRate,
        VitalSign::RespiratoryRate,
        VitalSign::SystolicBp,
        VitalSign::DiastolicBp,
        VitalSign::OxygenSaturation,
    ];
}

/// Classification of a measured value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VitalStatus {
    Low,
    Normal,
    High,
}

/// A measured value, classified against its age band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalClassification {
    pub sign: VitalSign,
    pub value: f64,
    pub status: VitalStatus,
    pub band_id: String,
    pub band_label: String,
    /// The thresholds the value was compared against
    pub range: VitalRange,
}

impl VitalAgeBand {
    /// Check whether an age (months, possibly fractional) falls in this band.
    ///
    /// Whole-month bands are treated as `[min, max + 1)` so that adjacent bands
    /// also cover the fractional ages between them.
    pub fn contains(&self, age_months: f64) -> bool {
        let (min, max) = self.age_range_months;
        age_months >= f64::from(min) && age_months < f64::from(max) + 1.0
    }

    /// Thresholds for a vital sign.
    pub fn range(&self, sign: VitalSign) -> &VitalRange {
        match sign {
            VitalSign::HeartRate => &self.heart_rate,
            VitalSign::RespiratoryRate => &self.respiratory_rate,
            VitalSign::SystolicBp => &self.systolic_bp,
            VitalSign::DiastolicBp => &self.diastolic_bp,
            VitalSign::OxygenSaturation => &self.oxygen_saturation,
        }
    }
}

impl VitalRange {
    /// Compare a value against the thresholds.
    pub fn classify(&self, value: f64) -> VitalStatus {
        if value < self.low {
            VitalStatus::Low
        } else if value > self.high {
            VitalStatus::High
        } else {
            VitalStatus::Normal
        }
    }

    /// Range rendered for display, e.g. "100-160 bpm".
    pub fn display(&self) -> String {
        format!("{}-{} {}", self.low, self.high, self.units)
    }
}
