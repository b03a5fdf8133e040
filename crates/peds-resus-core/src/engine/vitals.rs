//! Vital sign classification against age bands.

use super::ResolutionError;
use crate::models::{VitalAgeBand, VitalClassification, VitalSign};

/// Band covering an age in months, if any.
///
/// Bands are whole-month and contiguous, so each covers `[min, max + 1)`.
pub fn find_band(bands: &[VitalAgeBand], age_months: f64) -> Option<&VitalAgeBand> {
    bands.iter().find(|band| band.contains(age_months))
}

/// Classify a measured value as low, normal or high for the patient's age.
pub fn classify_vital(
    bands: &[VitalAgeBand],
    age_months: Option<f64>,
    sign: VitalSign,
    value: f64,
) -> Result<VitalClassification, ResolutionError> {
    let age = age_months.ok_or(ResolutionError::NoPatientAge)?;
    if !value.is_finite() {
        return Err(ResolutionError::InvalidInput(format!(
            "vital sign value must be a finite number, got {}",
            value
        )));
    }
    let band = find_band(bands, age).ok_or(ResolutionError::NoAgeBand(age))?;
    let range = band.range(sign);

    Ok(VitalClassification {
        sign,
        value,
        status: range.classify(value),
        band_id: band.id.clone(),
        band_label: band.label.clone(),
        range: range.clone(),
    })
}
