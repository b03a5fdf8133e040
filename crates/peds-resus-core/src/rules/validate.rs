//! Load-time checks on rule tables.
//!
//! [`validate`] rejects tables the engine cannot rely on. [`lint`] reports
//! authoring defects the engine tolerates (reference-only dosing entries,
//! overlapping chart rows) so they can be fixed at the source.

use std::collections::HashSet;
use std::fmt;

use super::{RuleError, RuleTables};
use crate::engine::Variable;
use crate::models::{
    DoseBasis, EquipmentRule, MedicationRule, Range, Sizing, VitalSign, MAX_AGE_MONTHS,
};

/// A tolerated authoring defect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWarning {
    pub table: &'static str,
    pub id: String,
    pub message: String,
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.table, self.id, self.message)
    }
}

/// Check every invariant the engine depends on.
pub fn validate(tables: &RuleTables) -> Result<(), RuleError> {
    unique_ids("medications", tables.medications.iter().map(|m| m.id.as_str()))?;
    unique_ids("equipment", tables.equipment.iter().map(|e| e.id.as_str()))?;
    unique_ids("vital_bands", tables.vital_bands.iter().map(|b| b.id.as_str()))?;
    unique_ids("algorithms", tables.algorithms.iter().map(|a| a.id.as_str()))?;

    for medication in &tables.medications {
        validate_medication(medication)?;
    }
    for item in &tables.equipment {
        validate_equipment(item)?;
    }
    validate_bands(tables)?;
    Ok(())
}

fn unique_ids<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(RuleError::DuplicateId {
                table,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_medication(medication: &MedicationRule) -> Result<(), RuleError> {
    let invalid = |reason: String| RuleError::InvalidMedication {
        id: medication.id.clone(),
        reason,
    };

    let concentrations = medication
        .concentration
        .iter()
        .chain(medication.dosing.iter().filter_map(|e| e.concentration.as_ref()));
    for concentration in concentrations {
        if !(concentration.amount > 0.0) {
            return Err(invalid("concentration must be positive".into()));
        }
    }

    for entry in &medication.dosing {
        if let Some(ceiling) = entry.max_dose {
            if !(ceiling > 0.0) {
                return Err(invalid(format!("{}: max_dose must be positive", entry.indication)));
            }
        }
        match &entry.basis {
            Some(DoseBasis::PerKg {
                min_per_kg,
                max_per_kg,
            }) => {
                let max = max_per_kg.unwrap_or(*min_per_kg);
                if !(*min_per_kg > 0.0) || max < *min_per_kg {
                    return Err(invalid(format!(
                        "{}: per-kg range must satisfy 0 < min <= max",
                        entry.indication
                    )));
                }
            }
            Some(DoseBasis::Fixed { dose, max }) => {
                if !(*dose > 0.0) || max.map_or(false, |m| m < *dose) {
                    return Err(invalid(format!(
                        "{}: fixed dose must satisfy 0 < dose <= max",
                        entry.indication
                    )));
                }
            }
            None => {}
        }
        for over in &entry.age_overrides {
            let window_ok = over.min_age_months >= 0.0
                && over.min_age_months <= over.max_age_months
                && over.max_age_months <= MAX_AGE_MONTHS;
            let dose_ok = over.dose > 0.0 && over.dose_max.map_or(true, |m| m >= over.dose);
            if !window_ok || !dose_ok {
                return Err(invalid(format!(
                    "{}: age override {}-{} months is malformed",
                    entry.indication, over.min_age_months, over.max_age_months
                )));
            }
        }
    }
    Ok(())
}

fn validate_equipment(item: &EquipmentRule) -> Result<(), RuleError> {
    let invalid = |reason: String| RuleError::InvalidEquipment {
        id: item.id.clone(),
        reason,
    };

    match &item.sizing {
        Sizing::Formula { formula } => {
            if formula.equation.uses(Variable::Weight) && !formula.requires_weight {
                return Err(invalid("equation uses weight but does not require it".into()));
            }
            if formula.equation.uses(Variable::Age) && !formula.requires_age {
                return Err(invalid("equation uses age but does not require it".into()));
            }
            if let (Some(min), Some(max)) = (formula.min, formula.max) {
                if min > max {
                    return Err(invalid(format!("clamp bounds {} > {}", min, max)));
                }
            }
        }
        sizing => {
            let chart = sizing.chart().unwrap_or_default();
            if chart.is_empty() {
                return Err(invalid("size chart is empty".into()));
            }
            for row in chart {
                if let Range::Between(min, max) = row.range {
                    if min > max {
                        return Err(invalid(format!("chart range {}-{} is inverted", min, max)));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_bands(tables: &RuleTables) -> Result<(), RuleError> {
    let bands = &tables.vital_bands;
    let mut expected_min = 0u32;
    for band in bands {
        let (min, max) = band.age_range_months;
        if min != expected_min {
            return Err(RuleError::BandCoverage(format!(
                "band '{}' starts at {} months, expected {}",
                band.id, min, expected_min
            )));
        }
        if max < min {
            return Err(RuleError::BandCoverage(format!(
                "band '{}' ends before it starts",
                band.id
            )));
        }
        for sign in VitalSign::ALL {
            let range = band.range(sign);
            if !(range.low <= range.normal && range.normal <= range.high) {
                return Err(RuleError::BandThresholds {
                    band: band.id.clone(),
                    sign,
                });
            }
        }
        expected_min = max + 1;
    }
    if f64::from(expected_min) != MAX_AGE_MONTHS + 1.0 {
        return Err(RuleError::BandCoverage(format!(
            "bands end at {} months",
            expected_min.saturating_sub(1)
        )));
    }
    Ok(())
}

/// Report tolerated authoring defects.
pub fn lint(tables: &RuleTables) -> Vec<RuleWarning> {
    let mut warnings = Vec::new();

    for medication in &tables.medications {
        for entry in &medication.dosing {
            if entry.is_reference_only() {
                warnings.push(RuleWarning {
                    table: "medications",
                    id: medication.id.clone(),
                    message: format!(
                        "'{}' declares no dose style and will not be calculated",
                        entry.indication
                    ),
                });
            }
        }
    }

    for item in &tables.equipment {
        let Some(chart) = item.sizing.chart() else {
            continue;
        };
        for (i, a) in chart.iter().enumerate() {
            for b in &chart[i + 1..] {
                if ranges_overlap(a.range, b.range) {
                    warnings.push(RuleWarning {
                        table: "equipment",
                        id: item.id.clone(),
                        message: format!(
                            "chart rows '{}' and '{}' overlap; the earlier row wins",
                            a.size, b.size
                        ),
                    });
                }
            }
        }
    }

    warnings
}

/// Interval view of a range: (low, low inclusive, high, high inclusive).
fn bounds(range: Range) -> (f64, bool, f64, bool) {
    match range {
        Range::Between(min, max) => (min, true, max, true),
        Range::Above(x) => (x, false, f64::INFINITY, false),
        Range::Below(x) => (f64::NEG_INFINITY, false, x, false),
    }
}

fn ranges_overlap(a: Range, b: Range) -> bool {
    let (a_lo, a_lo_inc, a_hi, a_hi_inc) = bounds(a);
    let (b_lo, b_lo_inc, b_hi, b_hi_inc) = bounds(b);
    // a ends before b starts, or b ends before a starts
    let a_before_b = a_hi < b_lo || (a_hi == b_lo && !(a_hi_inc && b_lo_inc));
    let b_before_a = b_hi < a_lo || (b_hi == a_lo && !(b_hi_inc && a_lo_inc));
    !a_before_b && !b_before_a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartEntry, VitalAgeBand, VitalRange};

    fn range(low: f64, normal: f64, high: f64) -> VitalRange {
        VitalRange {
            low,
            normal,
            high,
            units: "x".into(),
        }
    }

    fn band(id: &str, min: u32, max: u32) -> VitalAgeBand {
        VitalAgeBand {
            id: id.into(),
            label: id.into(),
            age_range_months: (min, max),
            heart_rate: range(1.0, 2.0, 3.0),
            respiratory_rate: range(1.0, 2.0, 3.0),
            systolic_bp: range(1.0, 2.0, 3.0),
            diastolic_bp: range(1.0, 2.0, 3.0),
            oxygen_saturation: range(1.0, 2.0, 3.0),
        }
    }

    fn tables_with_bands(vital_bands: Vec<VitalAgeBand>) -> RuleTables {
        RuleTables {
            medications: vec![],
            equipment: vec![],
            vital_bands,
            algorithms: vec![],
        }
    }

    #[test]
    fn test_bundled_tables_valid() {
        let tables = RuleTables::bundled().unwrap();
        assert!(validate(&tables).is_ok());
    }

    #[test]
    fn test_band_gap_rejected() {
        let tables = tables_with_bands(vec![band("a", 0, 10), band("b", 12, 216)]);
        assert!(matches!(validate(&tables), Err(RuleError::BandCoverage(_))));
    }

    #[test]
    fn test_band_overlap_rejected() {
        let tables = tables_with_bands(vec![band("a", 0, 12), band("b", 12, 216)]);
        assert!(matches!(validate(&tables), Err(RuleError::BandCoverage(_))));
    }

    #[test]
    fn test_band_short_of_216_rejected() {
        let tables = tables_with_bands(vec![band("a", 0, 200)]);
        assert!(matches!(validate(&tables), Err(RuleError::BandCoverage(_))));
    }

    #[test]
    fn test_band_thresholds_ordered() {
        let mut b = band("a", 0, 216);
        b.heart_rate = range(100.0, 90.0, 160.0);
        let tables = tables_with_bands(vec![b]);
        assert!(matches!(
            validate(&tables),
            Err(RuleError::BandThresholds {
                sign: VitalSign::HeartRate,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut tables = RuleTables::bundled().unwrap();
        let dup = tables.medications[0].clone();
        tables.medications.push(dup);
        assert!(matches!(
            validate(&tables),
            Err(RuleError::DuplicateId {
                table: "medications",
                ..
            })
        ));
    }

    #[test]
    fn test_undeclared_formula_variable_rejected() {
        let mut tables = RuleTables::bundled().unwrap();
        let item = tables
            .equipment
            .iter_mut()
            .find(|e| e.id == "ett-uncuffed")
            .unwrap();
        if let Sizing::Formula { formula } = &mut item.sizing {
            formula.requires_age = false;
        }
        assert!(matches!(
            validate(&tables),
            Err(RuleError::InvalidEquipment { .. })
        ));
    }

    #[test]
    fn test_lint_reports_reference_only_entries() {
        let tables = RuleTables::bundled().unwrap();
        let warnings = lint(&tables);
        assert!(warnings
            .iter()
            .any(|w| w.id == "calcium-chloride" && w.message.contains("no dose style")));
    }

    #[test]
    fn test_lint_reports_chart_overlap() {
        let row = |range, size: &str| ChartEntry {
            range,
            size: size.into(),
            size_details: None,
            notes: None,
            alternative_sizes: vec![],
        };
        let tables = RuleTables {
            medications: vec![],
            equipment: vec![EquipmentRule {
                id: "blade".into(),
                name: "Blade".into(),
                category: "airway".into(),
                critical: false,
                sizing: Sizing::Weight {
                    size_chart: vec![
                        row(Range::Between(5.0, 10.0), "1"),
                        row(Range::Between(10.0, 20.0), "2"),
                        row(Range::Above(20.0), "3"),
                    ],
                },
                notes: None,
            }],
            vital_bands: vec![],
            algorithms: vec![],
        };
        let warnings = lint(&tables);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("'1' and '2'"));
    }

    #[test]
    fn test_bundled_charts_do_not_overlap() {
        let tables = RuleTables::bundled().unwrap();
        assert!(lint(&tables).iter().all(|w| w.table != "equipment"));
    }
}
