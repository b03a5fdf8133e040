//! Equipment sizing models.

use serde::{Deserialize, Serialize};

use crate::engine::formula::Expression;

/// A piece of resuscitation equipment and how to size it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquipmentRule {
    /// Stable identifier (collection key)
    pub id: String,
    pub name: String,
    /// Grouping (e.g., "airway", "vascular access")
    pub category: String,
    /// Needed in the first minutes of a resuscitation
    #[serde(default)]
    pub critical: bool,
    pub sizing: Sizing,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Sizing method with exactly the data that method needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Sizing {
    /// Chart keyed on weight in kg
    Weight { size_chart: Vec<ChartEntry> },
    /// Chart keyed on age in months
    Age { size_chart: Vec<ChartEntry> },
    /// Chart keyed on length in cm
    Length { size_chart: Vec<ChartEntry> },
    /// Arithmetic over weight and/or age
    Formula { formula: FormulaSpec },
}

impl Sizing {
    /// Chart entries for chart-based methods.
    pub fn chart(&self) -> Option<&[ChartEntry]> {
        match self {
            Sizing::Weight { size_chart }
            | Sizing::Age { size_chart }
            | Sizing::Length { size_chart } => Some(size_chart),
            Sizing::Formula { .. } => None,
        }
    }

    /// Short method name, for logs.
    pub fn method_name(&self) -> &'static str {
        match self {
            Sizing::Weight { .. } => "weight",
            Sizing::Age { .. } => "age",
            Sizing::Length { .. } => "length",
            Sizing::Formula { .. } => "formula",
        }
    }
}

/// One row of a size chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartEntry {
    pub range: Range,
    /// Size as displayed (e.g., "3.5 mm", "Miller 1")
    pub size: String,
    #[serde(default)]
    pub size_details: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub alternative_sizes: Vec<String>,
}

/// Value range a chart row applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Range {
    /// `[min, max]`, both inclusive
    Between(f64, f64),
    /// Strictly greater than the threshold
    Above(f64),
    /// Strictly less than the threshold
    Below(f64),
}

impl Range {
    /// Check whether a value falls inside the range.
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Range::Between(min, max) => value >= min && value <= max,
            Range::Above(threshold) => value > threshold,
            Range::Below(threshold) => value < threshold,
        }
    }
}

/// Formula-based sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormulaSpec {
    /// Equation over `weight` (kg) and `age` (months)
    pub equation: Expression,
    #[serde(default)]
    pub requires_weight: bool,
    #[serde(default)]
    pub requires_age: bool,
    /// Unit of the result (e.g., "mm", "cm")
    pub unit: String,
    /// Decimal places kept after rounding
    #[serde(default)]
    pub precision: u32,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Which bound a formula result was clamped to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClampBound {
    Min,
    Max,
}

/// A size resolved for one patient. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SizeResult {
    /// Size as displayed; numeric for formula sizing
    pub size: String,
    /// Unit for formula sizing
    pub unit: Option<String>,
    pub size_details: Option<String>,
    /// Equation used, for formula sizing
    pub formula: Option<String>,
    pub notes: Option<String>,
    pub alternative_sizes: Vec<String>,
    /// Bound applied to a formula result, if any
    pub clamped: Option<ClampBound>,
}

impl SizeResult {
    /// Size with unit, e.g. "4.5 mm".
    pub fn display(&self) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", self.size, unit),
            _ => self.size.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains() {
        let between = Range::Between(3.0, 5.0);
        assert!(between.contains(3.0));
        assert!(between.contains(5.0));
        assert!(!between.contains(5.01));

        assert!(Range::Above(36.0).contains(36.5));
        assert!(!Range::Above(36.0).contains(36.0));

        assert!(Range::Below(3.0).contains(2.9));
        assert!(!Range::Below(3.0).contains(3.0));
    }

    #[test]
    fn test_equipment_json_shape() {
        let json = r#"{
            "id": "ett-uncuffed",
            "name": "Endotracheal tube (uncuffed)",
            "category": "airway",
            "critical": true,
            "sizing": {
                "method": "formula",
                "formula": {
                    "equation": "(age/48)+4",
                    "requires_age": true,
                    "unit": "mm",
                    "precision": 1,
                    "min": 3.5
                }
            }
        }"#;
        let rule: EquipmentRule = serde_json::from_str(json).unwrap();
        assert!(rule.critical);
        match &rule.sizing {
            Sizing::Formula { formula } => {
                assert_eq!(formula.equation.source(), "(age/48)+4");
                assert!(formula.requires_age);
                assert!(!formula.requires_weight);
                assert_eq!(formula.max, None);
            }
            other => panic!("unexpected sizing: {:?}", other),
        }
    }

    #[test]
    fn test_chart_json_shape() {
        let json = r#"{
            "method": "weight",
            "size_chart": [
                {"range": {"below": 3}, "size": "Miller 00"},
                {"range": {"between": [3, 10]}, "size": "Miller 1"},
                {"range": {"above": 10}, "size": "Miller 2", "alternative_sizes": ["Mac 2"]}
            ]
        }"#;
        let sizing: Sizing = serde_json::from_str(json).unwrap();
        let chart = sizing.chart().unwrap();
        assert_eq!(chart.len(), 3);
        assert_eq!(chart[1].range, Range::Between(3.0, 10.0));
        assert_eq!(chart[2].alternative_sizes, vec!["Mac 2"]);
    }

    #[test]
    fn test_malformed_equation_rejected_on_load() {
        let json = r#"{
            "method": "formula",
            "formula": {"equation": "alert(1)", "unit": "mm", "precision": 1}
        }"#;
        assert!(serde_json::from_str::<Sizing>(json).is_err());
    }

    #[test]
    fn test_display() {
        let r = SizeResult {
            size: "4.5".into(),
            unit: Some("mm".into()),
            size_details: None,
            formula: Some("(age/48)+4".into()),
            notes: None,
            alternative_sizes: vec![],
            clamped: None,
        };
        assert_eq!(r.display(), "4.5 mm");
    }
}
