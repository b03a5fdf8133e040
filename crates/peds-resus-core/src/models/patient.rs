//! Patient context models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for patient weight in kg (inclusive).
pub const MAX_WEIGHT_KG: f64 = 150.0;

/// Upper bound for patient age in months (inclusive, 18 years).
pub const MAX_AGE_MONTHS: f64 = 216.0;

/// Upper bound for patient length in cm (inclusive).
pub const MAX_LENGTH_CM: f64 = 250.0;

/// Out-of-range patient values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatientError {
    #[error("weight must be in (0, 150] kg, got {0}")]
    WeightOutOfRange(f64),

    #[error("age must be in [0, 216] months, got {0}")]
    AgeOutOfRange(f64),

    #[error("length must be in (0, 250] cm, got {0}")]
    LengthOutOfRange(f64),
}

/// Patient measurement a resolver may require.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatientField {
    Weight,
    Age,
    Length,
}

impl std::fmt::Display for PatientField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatientField::Weight => write!(f, "weight"),
            PatientField::Age => write!(f, "age"),
            PatientField::Length => write!(f, "length"),
        }
    }
}

/// The current patient, one per session.
///
/// Every field is optional; resolvers decide which ones they need. Values are
/// only accepted through the validating setters, so a context held by the
/// application never carries an out-of-range measurement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientContext {
    /// Weight in kg, in (0, 150]
    weight_kg: Option<f64>,
    /// Age in months, in [0, 216]
    age_months: Option<f64>,
    /// Length (height) in cm
    length_cm: Option<f64>,
    /// Last modification timestamp (RFC 3339)
    #[serde(default)]
    updated_at: Option<String>,
}

impl PatientContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from raw values, validating each one.
    pub fn with_values(
        weight_kg: Option<f64>,
        age_months: Option<f64>,
        length_cm: Option<f64>,
    ) -> Result<Self, PatientError> {
        let mut ctx = Self::new();
        ctx.set_weight(weight_kg)?;
        ctx.set_age(age_months)?;
        ctx.set_length(length_cm)?;
        Ok(ctx)
    }

    pub fn weight_kg(&self) -> Option<f64> {
        self.weight_kg
    }

    pub fn age_months(&self) -> Option<f64> {
        self.age_months
    }

    pub fn length_cm(&self) -> Option<f64> {
        self.length_cm
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// Age in whole years, rounded down.
    pub fn age_years(&self) -> Option<f64> {
        self.age_months.map(|m| (m / 12.0).floor())
    }

    /// Set or clear the weight.
    pub fn set_weight(&mut self, weight_kg: Option<f64>) -> Result<(), PatientError> {
        if let Some(w) = weight_kg {
            validate_weight(w)?;
        }
        self.weight_kg = weight_kg;
        self.touch();
        Ok(())
    }

    /// Set or clear the age.
    pub fn set_age(&mut self, age_months: Option<f64>) -> Result<(), PatientError> {
        if let Some(a) = age_months {
            validate_age(a)?;
        }
        self.age_months = age_months;
        self.touch();
        Ok(())
    }

    /// Set or clear the length.
    pub fn set_length(&mut self, length_cm: Option<f64>) -> Result<(), PatientError> {
        if let Some(l) = length_cm {
            validate_length(l)?;
        }
        self.length_cm = length_cm;
        self.touch();
        Ok(())
    }

    /// Forget every measurement.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when no measurement is set.
    pub fn is_empty(&self) -> bool {
        self.weight_kg.is_none() && self.age_months.is_none() && self.length_cm.is_none()
    }

    /// Value of a single field.
    pub fn get(&self, field: PatientField) -> Option<f64> {
        match field {
            PatientField::Weight => self.weight_kg,
            PatientField::Age => self.age_months,
            PatientField::Length => self.length_cm,
        }
    }

    /// Re-check invariants on a context that came from outside (e.g. disk).
    pub fn validate(&self) -> Result<(), PatientError> {
        if let Some(w) = self.weight_kg {
            validate_weight(w)?;
        }
        if let Some(a) = self.age_months {
            validate_age(a)?;
        }
        if let Some(l) = self.length_cm {
            validate_length(l)?;
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

/// Check a weight against (0, 150] kg.
pub fn validate_weight(weight_kg: f64) -> Result<(), PatientError> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 || weight_kg > MAX_WEIGHT_KG {
        return Err(PatientError::WeightOutOfRange(weight_kg));
    }
    Ok(())
}

/// Check an age against [0, 216] months.
pub fn validate_age(age_months: f64) -> Result<(), PatientError> {
    if !age_months.is_finite() || !(0.0..=MAX_AGE_MONTHS).contains(&age_months) {
        return Err(PatientError::AgeOutOfRange(age_months));
    }
    Ok(())
}

/// Check a length against (0, 250] cm.
pub fn validate_length(length_cm: f64) -> Result<(), PatientError> {
    if !length_cm.is_finite() || length_cm <= 0.0 || length_cm > MAX_LENGTH_CM {
        return Err(PatientError::LengthOutOfRange(length_cm));
    }
    Ok(())
}
