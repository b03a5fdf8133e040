//! Medication rule models.

use serde::{Deserialize, Serialize};

/// A medication and its dosing entries, as authored in the rule tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationRule {
    /// Stable identifier (collection key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Drug class (e.g., "resuscitation", "sedation")
    pub category: String,
    /// Stock concentration, used for draw-up volumes
    #[serde(default)]
    pub concentration: Option<Concentration>,
    /// One entry per indication
    pub dosing: Vec<DosingEntry>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
}

/// Amount of drug per mL of the stock solution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concentration {
    /// Amount per mL (e.g., 0.1 for 0.1 mg/mL)
    pub amount: f64,
    /// Unit of `amount` (e.g., "mg", "mcg", "mEq")
    pub unit: String,
    /// Label as printed on the vial (e.g., "1 mg/10 mL")
    #[serde(default)]
    pub label: Option<String>,
}

/// Dosing for one indication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosingEntry {
    /// Clinical indication (e.g., "Cardiac arrest")
    pub indication: String,
    /// Route of administration (e.g., "IV/IO")
    pub route: String,
    /// Unit of every computed amount (e.g., "mg")
    pub dose_unit: String,
    /// Absolute per-dose ceiling, in `dose_unit`
    #[serde(default)]
    pub max_dose: Option<f64>,
    /// Stock used for this indication when it differs from the medication's
    #[serde(default)]
    pub concentration: Option<Concentration>,
    /// How the dose is computed. Reference-only entries have none.
    #[serde(default)]
    pub basis: Option<DoseBasis>,
    /// Age-specific fixed doses, checked in declaration order
    #[serde(default)]
    pub age_overrides: Vec<AgeOverride>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// How a dosing entry turns patient weight into an amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum DoseBasis {
    /// Weight-based range; `max_per_kg` defaults to `min_per_kg`.
    PerKg {
        min_per_kg: f64,
        #[serde(default)]
        max_per_kg: Option<f64>,
    },
    /// Weight-independent amount, optionally up to `max`.
    Fixed {
        dose: f64,
        #[serde(default)]
        max: Option<f64>,
    },
}

/// Fixed dose that replaces the basis for patients inside an age window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgeOverride {
    /// Inclusive lower bound in months
    pub min_age_months: f64,
    /// Inclusive upper bound in months
    pub max_age_months: f64,
    /// Standard dose for the window
    pub dose: f64,
    /// Optional upper end of the dose range
    #[serde(default)]
    pub dose_max: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AgeOverride {
    /// Check whether an age falls inside this override's window.
    pub fn applies_to(&self, age_months: f64) -> bool {
        age_months >= self.min_age_months && age_months <= self.max_age_months
    }
}

impl DosingEntry {
    /// First override matching the age, in declaration order.
    pub fn matching_override(&self, age_months: Option<f64>) -> Option<&AgeOverride> {
        let age = age_months?;
        self.age_overrides.iter().find(|o| o.applies_to(age))
    }

    /// True when neither a basis nor any override is declared.
    pub fn is_reference_only(&self) -> bool {
        self.basis.is_none() && self.age_overrides.is_empty()
    }
}

/// Where a resolved dose came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseSource {
    PerKg,
    Fixed,
    AgeOverride,
}

/// A dose resolved for one patient. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseResult {
    /// Representative dose, formatted (e.g., "1.00 mg")
    pub calculated_dose: String,
    /// Low end of the range, formatted
    pub min_dose: Option<String>,
    /// High end of the range, formatted
    pub max_dose: Option<String>,
    /// Representative dose, rounded to 2 decimals
    pub calculated_value: f64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Unit for every amount above
    pub unit: String,
    /// Volume of stock solution to draw up, in mL
    pub volume_ml: Option<f64>,
    pub source: DoseSource,
    /// True when any amount was cut to the entry's ceiling
    pub clamped: bool,
    /// Notes carried over from the entry or override
    pub notes: Option<String>,
}

impl DoseResult {
    /// Single-line rendering, e.g. "1.00 mg (0.50 mg - 1.00 mg)".
    pub fn display(&self) -> String {
        match (&self.min_dose, &self.max_dose) {
            (Some(min), Some(max)) if min != max => {
                format!("{} ({} - {})", self.calculated_dose, min, max)
            }
            _ => self.calculated_dose.clone(),
        }
    }
}
