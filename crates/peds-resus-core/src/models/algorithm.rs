//! Resuscitation algorithm models.

use serde::{Deserialize, Serialize};

/// A step-by-step resuscitation algorithm (e.g., pulseless arrest).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmRule {
    /// Stable identifier (collection key)
    pub id: String,
    pub name: String,
    pub category: String,
    pub steps: Vec<AlgorithmStep>,
}

/// One step of an algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmStep {
    /// Position in the algorithm, starting at 1
    pub order: u32,
    pub title: String,
    pub detail: String,
    #[serde(default)]
    pub time_critical: bool,
    /// Medications referenced by this step
    #[serde(default)]
    pub medication_ids: Vec<String>,
}

impl AlgorithmRule {
    /// Steps sorted by `order`.
    pub fn ordered_steps(&self) -> Vec<&AlgorithmStep> {
        let mut steps: Vec<_> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }
}
