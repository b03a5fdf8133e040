//! End-to-end resolution scenarios.
//!
//! Rules are authored as JSON, the same way the bundled tables are.

use peds_resus_core::engine::{classify_vital, resolve_dose, resolve_size, ResolutionError};
use peds_resus_core::models::{
    ClampBound, DoseSource, EquipmentRule, MedicationRule, PatientContext, PatientField,
    VitalSign, VitalStatus,
};
use peds_resus_core::rules::RuleTables;
use serde_json::json;

fn medication(dosing: serde_json::Value) -> MedicationRule {
    serde_json::from_value(json!({
        "id": "test-med",
        "name": "Test Medication",
        "category": "test",
        "dosing": dosing,
    }))
    .unwrap()
}

fn equipment(sizing: serde_json::Value) -> EquipmentRule {
    serde_json::from_value(json!({
        "id": "test-equipment",
        "name": "Test Equipment",
        "category": "test",
        "sizing": sizing,
    }))
    .unwrap()
}

fn patient(weight: Option<f64>, age: Option<f64>, length: Option<f64>) -> PatientContext {
    PatientContext::with_values(weight, age, length).unwrap()
}

// =========================================================================
// Doses
// =========================================================================

#[test]
fn test_per_kg_dose_without_ceiling() {
    let rule = medication(json!([{
        "indication": "Test",
        "route": "IV",
        "dose_unit": "mg",
        "basis": {"style": "per_kg", "min_per_kg": 0.1, "max_per_kg": 0.1}
    }]));

    let doses = resolve_dose(&rule, Some(10.0), None).unwrap();
    let dose = doses[0].outcome.as_ref().unwrap();
    assert_eq!(dose.calculated_dose, "1.00 mg");
    assert_eq!(dose.source, DoseSource::PerKg);
    assert!(!dose.clamped);
}

#[test]
fn test_dose_clamped_to_ceiling() {
    let rule = medication(json!([{
        "indication": "Test",
        "route": "IV",
        "dose_unit": "mg",
        "max_dose": 1.0,
        "basis": {"style": "per_kg", "min_per_kg": 0.01, "max_per_kg": 0.01}
    }]));

    let doses = resolve_dose(&rule, Some(150.0), None).unwrap();
    let dose = doses[0].outcome.as_ref().unwrap();
    assert_eq!(dose.calculated_dose, "1.00 mg");
    assert_eq!(dose.calculated_value, 1.0);
    assert!(dose.clamped);
}

#[test]
fn test_age_override_takes_precedence() {
    let rule = medication(json!([{
        "indication": "Test",
        "route": "IV",
        "dose_unit": "mg",
        "basis": {"style": "per_kg", "min_per_kg": 0.5},
        "age_overrides": [
            {"min_age_months": 0, "max_age_months": 12, "dose": 2.0}
        ]
    }]));

    let infant = resolve_dose(&rule, Some(8.0), Some(6.0)).unwrap();
    let dose = infant[0].outcome.as_ref().unwrap();
    assert_eq!(dose.source, DoseSource::AgeOverride);
    assert_eq!(dose.calculated_dose, "2.00 mg");

    let toddler = resolve_dose(&rule, Some(8.0), Some(13.0)).unwrap();
    let dose = toddler[0].outcome.as_ref().unwrap();
    assert_eq!(dose.source, DoseSource::PerKg);
    assert_eq!(dose.calculated_dose, "4.00 mg");
}

#[test]
fn test_entry_without_basis_is_not_calculable() {
    let rule = medication(json!([
        {"indication": "Reference", "route": "IV", "dose_unit": "mg"},
        {
            "indication": "Usable",
            "route": "IV",
            "dose_unit": "mg",
            "basis": {"style": "fixed", "dose": 5.0}
        }
    ]));

    let doses = resolve_dose(&rule, Some(20.0), None).unwrap();
    assert!(matches!(
        doses[0].outcome,
        Err(ResolutionError::IncompleteRule(_))
    ));
    assert!(doses[0].display().starts_with("Not calculable"));
    assert_eq!(doses[1].outcome.as_ref().unwrap().calculated_dose, "5.00 mg");
}

#[test]
fn test_out_of_range_patient_rejected() {
    let rule = medication(json!([{
        "indication": "Test",
        "route": "IV",
        "dose_unit": "mg",
        "basis": {"style": "per_kg", "min_per_kg": 0.1}
    }]));

    for weight in [0.0, -3.0, 150.5, f64::NAN] {
        assert!(matches!(
            resolve_dose(&rule, Some(weight), None),
            Err(ResolutionError::InvalidInput(_))
        ));
    }
    assert!(matches!(
        resolve_dose(&rule, Some(10.0), Some(217.0)),
        Err(ResolutionError::InvalidInput(_))
    ));
    assert!(resolve_dose(&rule, None, None).is_err());
}

#[test]
fn test_bundled_epinephrine_arrest_dose() {
    let tables = RuleTables::bundled().unwrap();
    let epi = tables.medication("epinephrine").unwrap();

    let doses = resolve_dose(epi, Some(10.0), Some(24.0)).unwrap();
    let arrest = doses
        .iter()
        .find(|d| d.indication.to_lowercase().contains("arrest"))
        .unwrap();
    let dose = arrest.outcome.as_ref().unwrap();
    assert_eq!(dose.calculated_dose, "0.10 mg");
    // 0.1 mg/mL stock
    assert_eq!(dose.volume_ml, Some(1.0));
}

#[test]
fn test_bundled_medications_resolve_across_patients() {
    let tables = RuleTables::bundled().unwrap();
    for weight in [3.0, 10.0, 25.0, 70.0] {
        for rule in &tables.medications {
            let doses = resolve_dose(rule, Some(weight), Some(60.0)).unwrap();
            assert_eq!(doses.len(), rule.dosing.len());
            for (entry, dose) in rule.dosing.iter().zip(&doses) {
                if let (Some(ceiling), Ok(result)) = (entry.max_dose, &dose.outcome) {
                    assert!(result.calculated_value <= ceiling + 1e-9, "{}", rule.id);
                }
            }
        }
    }
}

// =========================================================================
// Equipment
// =========================================================================

#[test]
fn test_formula_scenario_unclamped() {
    let rule = equipment(json!({
        "method": "formula",
        "formula": {
            "equation": "(age/48)+4",
            "requires_age": true,
            "unit": "mm",
            "precision": 1,
            "min": 3.5
        }
    }));

    let size = resolve_size(&rule, &patient(None, Some(24.0), None)).unwrap();
    assert_eq!(size.size, "4.5");
    assert_eq!(size.unit.as_deref(), Some("mm"));
    assert_eq!(size.display(), "4.5 mm");
    assert_eq!(size.clamped, None);
}

#[test]
fn test_formula_clamps_and_requires_inputs() {
    let rule = equipment(json!({
        "method": "formula",
        "formula": {
            "equation": "weight*2",
            "requires_weight": true,
            "unit": "J",
            "precision": 0,
            "max": 200
        }
    }));

    let size = resolve_size(&rule, &patient(Some(120.0), None, None)).unwrap();
    assert_eq!(size.size, "200");
    assert_eq!(size.clamped, Some(ClampBound::Max));

    assert_eq!(
        resolve_size(&rule, &patient(None, Some(24.0), None)),
        Err(ResolutionError::MissingPatientData(PatientField::Weight))
    );
}

#[test]
fn test_unsafe_formula_rejected_at_load() {
    let result: Result<EquipmentRule, _> = serde_json::from_value(json!({
        "id": "bad",
        "name": "Bad",
        "category": "test",
        "sizing": {
            "method": "formula",
            "formula": {"equation": "weight; drop()", "unit": "mm"}
        }
    }));
    assert!(result.is_err());
}

#[test]
fn test_overlapping_chart_first_match_wins() {
    let rule = equipment(json!({
        "method": "weight",
        "size_chart": [
            {"range": {"between": [5, 15]}, "size": "first"},
            {"range": {"between": [10, 20]}, "size": "second"}
        ]
    }));
    let p = patient(Some(12.0), None, None);

    for _ in 0..10 {
        assert_eq!(resolve_size(&rule, &p).unwrap().size, "first");
    }
    assert_eq!(
        resolve_size(&rule, &patient(Some(18.0), None, None))
            .unwrap()
            .size,
        "second"
    );
}

#[test]
fn test_chart_without_matching_row() {
    let rule = equipment(json!({
        "method": "length",
        "size_chart": [{"range": {"between": [46, 60]}, "size": "Grey"}]
    }));

    assert_eq!(
        resolve_size(&rule, &PatientContext::new()),
        Err(ResolutionError::MissingPatientData(PatientField::Length))
    );
    assert!(matches!(
        resolve_size(&rule, &patient(None, None, Some(120.0))),
        Err(ResolutionError::NoMatchingSize {
            field: PatientField::Length,
            ..
        })
    ));
}

// =========================================================================
// Vital signs
// =========================================================================

#[test]
fn test_vital_band_coverage_for_whole_months() {
    let tables = RuleTables::bundled().unwrap();
    for age in 0..=216u32 {
        let matching = tables
            .vital_bands
            .iter()
            .filter(|b| b.contains(age as f64))
            .count();
        assert_eq!(matching, 1, "age {} months", age);
    }
}

#[test]
fn test_vital_classification() {
    let tables = RuleTables::bundled().unwrap();
    let bands = &tables.vital_bands;

    let normal = classify_vital(bands, Some(24.0), VitalSign::HeartRate, 120.0).unwrap();
    assert_eq!(normal.status, VitalStatus::Normal);
    assert_eq!(normal.band_id, "toddler");

    let low = classify_vital(bands, Some(24.0), VitalSign::HeartRate, 60.0).unwrap();
    assert_eq!(low.status, VitalStatus::Low);

    assert_eq!(
        classify_vital(bands, None, VitalSign::HeartRate, 120.0),
        Err(ResolutionError::NoPatientAge)
    );
}
