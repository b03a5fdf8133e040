//! Clinical resolution engine.
//!
//! Pure functions combining a rule record with patient values:
//! - [`dose`]: medication doses per dosing entry
//! - [`equipment`]: equipment sizes from charts or formulas
//! - [`vitals`]: vital-sign classification against age bands
//! - [`search`]: medication lookup by name
//!
//! Nothing here touches storage; callers load rules through the cache first.

pub mod dose;
pub mod equipment;
pub mod formula;
pub mod search;
pub mod vitals;

pub use dose::{resolve_dose, resolve_entry, EntryDose};
pub use equipment::resolve_size;
pub use formula::{Bindings, Expression, FormulaError, Variable};
pub use search::{search_medications, MedicationMatch};
pub use vitals::{classify_vital, find_band};

use thiserror::Error;

use crate::models::{PatientError, PatientField};

/// Resolution errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not calculable: {0}")]
    IncompleteRule(String),

    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("Patient {0} is required")]
    MissingPatientData(PatientField),

    #[error("No size matches {field} {value}")]
    NoMatchingSize { field: PatientField, value: f64 },

    #[error("Patient age is required")]
    NoPatientAge,

    #[error("No age band covers {0} months")]
    NoAgeBand(f64),
}

impl From<PatientError> for ResolutionError {
    fn from(e: PatientError) -> Self {
        ResolutionError::InvalidInput(e.to_string())
    }
}

/// Round to a number of decimal places.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
