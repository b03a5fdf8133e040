//! Bundled rule tables.
//!
//! Static clinical reference data compiled into the library. These are the
//! seed sources for the offline cache and the fallback whenever the store
//! has nothing to offer. Tables are validated on load; a table that fails
//! validation is never handed to the engine.

mod validate;

pub use validate::{lint, validate, RuleWarning};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{AlgorithmRule, EquipmentRule, MedicationRule, VitalAgeBand, VitalSign};

const MEDICATIONS_JSON: &str = include_str!("../../data/medications.json");
const EQUIPMENT_JSON: &str = include_str!("../../data/equipment.json");
const VITAL_BANDS_JSON: &str = include_str!("../../data/vital_bands.json");
const ALGORITHMS_JSON: &str = include_str!("../../data/algorithms.json");

/// Rule table load and validation errors.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to parse {table}: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate id '{id}' in {table}")]
    DuplicateId { table: &'static str, id: String },

    #[error("Vital bands do not cover 0-216 months: {0}")]
    BandCoverage(String),

    #[error("Vital band '{band}' {sign:?} thresholds are not ordered low <= normal <= high")]
    BandThresholds { band: String, sign: VitalSign },

    #[error("Medication '{id}': {reason}")]
    InvalidMedication { id: String, reason: String },

    #[error("Equipment '{id}': {reason}")]
    InvalidEquipment { id: String, reason: String },
}

/// The full set of rule tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTables {
    pub medications: Vec<MedicationRule>,
    pub equipment: Vec<EquipmentRule>,
    pub vital_bands: Vec<VitalAgeBand>,
    pub algorithms: Vec<AlgorithmRule>,
}

impl RuleTables {
    /// Load and validate the tables compiled into the library.
    pub fn bundled() -> Result<Self, RuleError> {
        Self::from_json(
            MEDICATIONS_JSON,
            EQUIPMENT_JSON,
            VITAL_BANDS_JSON,
            ALGORITHMS_JSON,
        )
    }

    /// Load and validate tables from JSON sources.
    pub fn from_json(
        medications: &str,
        equipment: &str,
        vital_bands: &str,
        algorithms: &str,
    ) -> Result<Self, RuleError> {
        let tables = Self {
            medications: parse("medications", medications)?,
            equipment: parse("equipment", equipment)?,
            vital_bands: parse("vital_bands", vital_bands)?,
            algorithms: parse("algorithms", algorithms)?,
        };
        validate(&tables)?;

        for warning in lint(&tables) {
            tracing::warn!("Rule table warning: {}", warning);
        }
        tracing::debug!(
            "Loaded rule tables: {} medications, {} equipment, {} vital bands, {} algorithms",
            tables.medications.len(),
            tables.equipment.len(),
            tables.vital_bands.len(),
            tables.algorithms.len()
        );
        Ok(tables)
    }

    pub fn medication(&self, id: &str) -> Option<&MedicationRule> {
        self.medications.iter().find(|m| m.id == id)
    }

    pub fn equipment_item(&self, id: &str) -> Option<&EquipmentRule> {
        self.equipment.iter().find(|e| e.id == id)
    }

    pub fn algorithm(&self, id: &str) -> Option<&AlgorithmRule> {
        self.algorithms.iter().find(|a| a.id == id)
    }
}

fn parse<T: DeserializeOwned>(table: &'static str, json: &str) -> Result<Vec<T>, RuleError> {
    serde_json::from_str(json).map_err(|source| RuleError::Parse { table, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_tables_load() {
        let tables = RuleTables::bundled().unwrap();
        assert!(!tables.medications.is_empty());
        assert!(!tables.equipment.is_empty());
        assert!(!tables.vital_bands.is_empty());
        assert!(!tables.algorithms.is_empty());
    }

    #[test]
    fn test_lookup_by_id() {
        let tables = RuleTables::bundled().unwrap();
        assert_eq!(tables.medication("epinephrine").unwrap().name, "Epinephrine");
        assert!(tables.equipment_item("ett-uncuffed").unwrap().critical);
        assert!(tables.algorithm("pulseless-arrest").is_some());
        assert!(tables.medication("unknown").is_none());
    }

    #[test]
    fn test_algorithm_medications_exist() {
        let tables = RuleTables::bundled().unwrap();
        for algorithm in &tables.algorithms {
            for step in &algorithm.steps {
                for id in &step.medication_ids {
                    assert!(
                        tables.medication(id).is_some(),
                        "{} step {} references unknown medication {}",
                        algorithm.id,
                        step.order,
                        id
                    );
                }
            }
        }
    }

    #[test]
    fn test_malformed_equation_rejected_at_load() {
        let equipment = r#"[{
            "id": "bad",
            "name": "Bad",
            "category": "airway",
            "sizing": {"method": "formula", "formula": {"equation": "age; drop", "unit": "mm"}}
        }]"#;
        let result = RuleTables::from_json("[]", equipment, VITAL_BANDS_JSON, "[]");
        assert!(matches!(
            result,
            Err(RuleError::Parse {
                table: "equipment",
                ..
            })
        ));
    }
}
