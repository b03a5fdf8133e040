//! Medication dose resolution.
//!
//! For each dosing entry, in declaration order:
//! 1. The first age override whose inclusive window contains the patient age
//!    replaces the basis entirely.
//! 2. Otherwise a per-kg basis scales with weight; the representative dose is
//!    the midpoint of the per-kg range.
//! 3. Otherwise a fixed basis is used as-is.
//! 4. Entries with none of the above are not calculable.
//!
//! Every amount is then capped at the entry's `max_dose` and rounded to two
//! decimals.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{round_to, ResolutionError};
use crate::models::{
    validate_age, validate_weight, Concentration, DoseBasis, DoseResult, DoseSource,
    DosingEntry, MedicationRule,
};

/// Decimal places kept for doses and volumes.
const DOSE_DECIMALS: u32 = 2;

/// Resolution outcome for one dosing entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryDose {
    pub indication: String,
    pub route: String,
    #[serde(with = "outcome_serde")]
    pub outcome: Result<DoseResult, ResolutionError>,
}

impl EntryDose {
    /// Dose line for display, or the reason it could not be computed.
    pub fn display(&self) -> String {
        match &self.outcome {
            Ok(dose) => dose.display(),
            Err(e) => e.to_string(),
        }
    }
}

/// Resolve every dosing entry of a medication for one patient.
///
/// Fails as a whole only when the patient values themselves are unusable;
/// per-entry problems are reported in each [`EntryDose`].
pub fn resolve_dose(
    rule: &MedicationRule,
    weight_kg: Option<f64>,
    age_months: Option<f64>,
) -> Result<Vec<EntryDose>, ResolutionError> {
    let weight = weight_kg.ok_or_else(|| {
        ResolutionError::InvalidInput("patient weight is required".to_string())
    })?;
    validate_weight(weight)?;
    if let Some(age) = age_months {
        validate_age(age)?;
    }

    Ok(rule
        .dosing
        .iter()
        .map(|entry| {
            let concentration = entry
                .concentration
                .as_ref()
                .or(rule.concentration.as_ref());
            let outcome = resolve_entry(entry, concentration, weight, age_months);
            if let Err(e) = &outcome {
                warn!(
                    "Dose for {} ({}) not calculable: {}",
                    rule.id, entry.indication, e
                );
            }
            EntryDose {
                indication: entry.indication.clone(),
                route: entry.route.clone(),
                outcome,
            }
        })
        .collect())
}

/// Resolve one dosing entry. `weight_kg` must already be validated.
pub fn resolve_entry(
    entry: &DosingEntry,
    concentration: Option<&Concentration>,
    weight_kg: f64,
    age_months: Option<f64>,
) -> Result<DoseResult, ResolutionError> {
    let (source, calculated, low, high, notes) =
        if let Some(over) = entry.matching_override(age_months) {
            (
                DoseSource::AgeOverride,
                over.dose,
                over.dose,
                over.dose_max.unwrap_or(over.dose),
                over.notes.clone().or_else(|| entry.notes.clone()),
            )
        } else {
            match &entry.basis {
                Some(DoseBasis::PerKg {
                    min_per_kg,
                    max_per_kg,
                }) => {
                    let max_per_kg = max_per_kg.unwrap_or(*min_per_kg);
                    (
                        DoseSource::PerKg,
                        (min_per_kg + max_per_kg) / 2.0 * weight_kg,
                        min_per_kg * weight_kg,
                        max_per_kg * weight_kg,
                        entry.notes.clone(),
                    )
                }
                Some(DoseBasis::Fixed { dose, max }) => (
                    DoseSource::Fixed,
                    *dose,
                    *dose,
                    max.unwrap_or(*dose),
                    entry.notes.clone(),
                ),
                None => {
                    return Err(ResolutionError::IncompleteRule(format!(
                        "'{}' has no dose basis",
                        entry.indication
                    )))
                }
            }
        };

    let mut clamped = false;
    let mut cap = |value: f64| match entry.max_dose {
        Some(ceiling) if value > ceiling => {
            clamped = true;
            ceiling
        }
        _ => value,
    };
    let calculated = round_to(cap(calculated), DOSE_DECIMALS);
    let low = round_to(cap(low), DOSE_DECIMALS);
    let high = round_to(cap(high), DOSE_DECIMALS);

    let unit = entry.dose_unit.clone();
    let volume_ml = concentration
        .filter(|c| c.amount > 0.0 && c.unit.eq_ignore_ascii_case(&unit))
        .map(|c| round_to(calculated / c.amount, DOSE_DECIMALS));

    Ok(DoseResult {
        calculated_dose: format_amount(calculated, &unit),
        min_dose: Some(format_amount(low, &unit)),
        max_dose: Some(format_amount(high, &unit)),
        calculated_value: calculated,
        min_value: Some(low),
        max_value: Some(high),
        unit,
        volume_ml,
        source,
        clamped,
        notes,
    })
}

fn format_amount(value: f64, unit: &str) -> String {
    format!("{:.2} {}", value, unit)
}

/// Serialize a per-entry outcome as `{"ok": ...}` or `{"error": "..."}`.
mod outcome_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::engine::ResolutionError;
    use crate::models::DoseResult;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum Outcome {
        Ok(DoseResult),
        Error(String),
    }

    pub fn serialize<S: Serializer>(
        outcome: &Result<DoseResult, ResolutionError>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let outcome = match outcome {
            Ok(dose) => Outcome::Ok(dose.clone()),
            Err(e) => Outcome::Error(e.to_string()),
        };
        outcome.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Result<DoseResult, ResolutionError>, D::Error> {
        Ok(match Outcome::deserialize(deserializer)? {
            Outcome::Ok(dose) => Ok(dose),
            Outcome::Error(message) => Err(ResolutionError::IncompleteRule(message)),
        })
    }
}
