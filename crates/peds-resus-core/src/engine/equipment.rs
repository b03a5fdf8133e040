//! Equipment size resolution.

use tracing::warn;

use super::{round_to, Bindings, ResolutionError};
use crate::models::{
    ChartEntry, ClampBound, EquipmentRule, FormulaSpec, PatientContext, PatientField, SizeResult,
    Sizing,
};

/// Resolve the size of one piece of equipment for a patient.
///
/// Chart methods return the first entry whose range contains the patient
/// value; overlapping entries therefore resolve to the earlier one.
pub fn resolve_size(
    rule: &EquipmentRule,
    patient: &PatientContext,
) -> Result<SizeResult, ResolutionError> {
    match &rule.sizing {
        Sizing::Weight { size_chart } => from_chart(size_chart, PatientField::Weight, patient),
        Sizing::Age { size_chart } => from_chart(size_chart, PatientField::Age, patient),
        Sizing::Length { size_chart } => from_chart(size_chart, PatientField::Length, patient),
        Sizing::Formula { formula } => from_formula(formula, patient).map_err(|e| {
            warn!("Formula sizing for {} failed: {}", rule.id, e);
            e
        }),
    }
}

fn from_chart(
    chart: &[ChartEntry],
    field: PatientField,
    patient: &PatientContext,
) -> Result<SizeResult, ResolutionError> {
    let value = patient
        .get(field)
        .ok_or(ResolutionError::MissingPatientData(field))?;

    let entry = chart
        .iter()
        .find(|entry| entry.range.contains(value))
        .ok_or(ResolutionError::NoMatchingSize { field, value })?;

    Ok(SizeResult {
        size: entry.size.clone(),
        unit: None,
        size_details: entry.size_details.clone(),
        formula: None,
        notes: entry.notes.clone(),
        alternative_sizes: entry.alternative_sizes.clone(),
        clamped: None,
    })
}

fn from_formula(
    spec: &FormulaSpec,
    patient: &PatientContext,
) -> Result<SizeResult, ResolutionError> {
    if spec.requires_weight && patient.weight_kg().is_none() {
        return Err(ResolutionError::MissingPatientData(PatientField::Weight));
    }
    if spec.requires_age && patient.age_months().is_none() {
        return Err(ResolutionError::MissingPatientData(PatientField::Age));
    }

    let raw = spec.equation.evaluate(Bindings {
        weight: patient.weight_kg(),
        age: patient.age_months(),
    })?;

    let mut value = round_to(raw, spec.precision);
    let mut clamped = None;
    let mut notes = None;
    if let Some(min) = spec.min {
        if value < min {
            value = min;
            clamped = Some(ClampBound::Min);
            notes = Some(clamp_note("minimum", min, spec));
        }
    }
    if let Some(max) = spec.max {
        if value > max {
            value = max;
            clamped = Some(ClampBound::Max);
            notes = Some(clamp_note("maximum", max, spec));
        }
    }

    Ok(SizeResult {
        size: format!("{:.*}", spec.precision as usize, value),
        unit: Some(spec.unit.clone()),
        size_details: None,
        formula: Some(spec.equation.source().to_string()),
        notes,
        alternative_sizes: Vec::new(),
        clamped,
    })
}

fn clamp_note(bound: &str, limit: f64, spec: &FormulaSpec) -> String {
    format!(
        "clamped to {} {:.*} {}",
        bound, spec.precision as usize, limit, spec.unit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Expression, FormulaError};
    use crate::models::Range;

    fn formula_rule(equation: &str, min: Option<f64>, max: Option<f64>) -> EquipmentRule {
        let expr = Expression::parse(equation).unwrap();
        EquipmentRule {
            id: "ett".into(),
            name: "ETT".into(),
            category: "airway".into(),
            critical: true,
            sizing: Sizing::Formula {
                formula: FormulaSpec {
                    requires_weight: expr.uses(crate::engine::Variable::Weight),
                    requires_age: expr.uses(crate::engine::Variable::Age),
                    equation: expr,
                    unit: "mm".into(),
                    precision: 1,
                    min,
                    max,
                },
            },
            notes: None,
        }
    }

    fn chart_rule(sizing: Sizing) -> EquipmentRule {
        EquipmentRule {
            id: "blade".into(),
            name: "Laryngoscope blade".into(),
            category: "airway".into(),
            critical: false,
            sizing,
            notes: None,
        }
    }

    fn entry(range: Range, size: &str) -> ChartEntry {
        ChartEntry {
            range,
            size: size.into(),
            size_details: None,
            notes: None,
            alternative_sizes: vec![],
        }
    }

    fn patient(weight: Option<f64>, age: Option<f64>) -> PatientContext {
        PatientContext::with_values(weight, age, None).unwrap()
    }

    #[test]
    fn test_formula_scenario() {
        let rule = formula_rule("(age/48)+4", Some(3.5), None);
        let size = resolve_size(&rule, &patient(None, Some(24.0))).unwrap();
        assert_eq!(size.size, "4.5");
        assert_eq!(size.unit.as_deref(), Some("mm"));
        assert_eq!(size.formula.as_deref(), Some("(age/48)+4"));
        assert_eq!(size.clamped, None);
        assert_eq!(size.display(), "4.5 mm");
    }

    #[test]
    fn test_formula_clamped_to_minimum() {
        let rule = formula_rule("(age/48)+3", Some(3.5), None);
        let size = resolve_size(&rule, &patient(None, Some(0.0))).unwrap();
        assert_eq!(size.size, "3.5");
        assert_eq!(size.clamped, Some(ClampBound::Min));
        assert_eq!(size.notes.as_deref(), Some("clamped to minimum 3.5 mm"));
    }

    #[test]
    fn test_formula_clamped_to_maximum() {
        let rule = formula_rule("(age/48)+4", None, Some(7.0));
        let size = resolve_size(&rule, &patient(None, Some(216.0))).unwrap();
        assert_eq!(size.size, "7.0");
        assert_eq!(size.clamped, Some(ClampBound::Max));
    }

    #[test]
    fn test_formula_missing_input() {
        let rule = formula_rule("(age/48)+4", None, None);
        assert_eq!(
            resolve_size(&rule, &patient(Some(10.0), None)),
            Err(ResolutionError::MissingPatientData(PatientField::Age))
        );
    }

    #[test]
    fn test_formula_division_by_zero() {
        let rule = formula_rule("4/(age-age)", None, None);
        assert_eq!(
            resolve_size(&rule, &patient(None, Some(24.0))),
            Err(ResolutionError::Formula(FormulaError::NonFinite))
        );
    }

    #[test]
    fn test_chart_first_match_wins() {
        // Overlapping rows: 10 kg is in both
        let rule = chart_rule(Sizing::Weight {
            size_chart: vec![
                entry(Range::Between(5.0, 10.0), "Miller 1"),
                entry(Range::Between(10.0, 20.0), "Miller 2"),
            ],
        });
        for _ in 0..3 {
            let size = resolve_size(&rule, &patient(Some(10.0), None)).unwrap();
            assert_eq!(size.size, "Miller 1");
        }
    }

    #[test]
    fn test_chart_no_match() {
        let rule = chart_rule(Sizing::Weight {
            size_chart: vec![entry(Range::Below(3.0), "Miller 00")],
        });
        assert!(matches!(
            resolve_size(&rule, &patient(Some(12.0), None)),
            Err(ResolutionError::NoMatchingSize {
                field: PatientField::Weight,
                ..
            })
        ));
    }

    #[test]
    fn test_chart_requires_value() {
        let rule = chart_rule(Sizing::Length {
            size_chart: vec![entry(Range::Above(0.0), "Any")],
        });
        assert_eq!(
            resolve_size(&rule, &patient(Some(12.0), Some(24.0))),
            Err(ResolutionError::MissingPatientData(PatientField::Length))
        );
    }

    #[test]
    fn test_age_chart_alternatives_carried() {
        let mut row = entry(Range::Above(96.0), "Mac 3");
        row.alternative_sizes = vec!["Miller 2".into()];
        row.size_details = Some("curved".into());
        let rule = chart_rule(Sizing::Age {
            size_chart: vec![row],
        });
        let size = resolve_size(&rule, &patient(None, Some(120.0))).unwrap();
        assert_eq!(size.alternative_sizes, vec!["Miller 2"]);
        assert_eq!(size.size_details.as_deref(), Some("curved"));
        assert_eq!(size.unit, None);
    }
}
