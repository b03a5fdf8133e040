//! Pediatric Resuscitation Reference Core
//!
//! Offline-first bedside reference for pediatric emergencies: weight- and
//! age-based drug doses, equipment sizes, vital sign ranges and a CPR timer.
//!
//! # Architecture
//!
//! ```text
//!   Bundled rule tables (compiled in, validated at load)
//!                 │
//!                 ▼
//!   ┌──────────────────────────┐      store fails     ┌──────────────────┐
//!   │   OfflineCache::ensure   │ ───────────────────▶ │  degraded mode:  │
//!   │ seed once, then read the │                      │  bundled tables  │
//!   │   on-device SQLite store │                      └──────────────────┘
//!   └────────────┬─────────────┘
//!                │ rule records
//!                ▼
//!   ┌──────────────────────────┐
//!   │  engine: doses, sizes,   │ ◀── PatientContext (weight, age, length)
//!   │  vital classification    │
//!   └──────────────────────────┘
//! ```
//!
//! # Core Principle
//!
//! **Every number shown at the bedside is recomputed from the rule tables and
//! the current patient.** Results are never stored.
//!
//! # Modules
//!
//! - [`models`]: Domain types (MedicationRule, EquipmentRule, VitalAgeBand, etc.)
//! - [`db`]: SQLite object store with per-collection locking
//! - [`cache`]: Offline cache that seeds and reads rule tables
//! - [`rules`]: Bundled rule tables and load-time validation
//! - [`engine`]: Dose, equipment and vital sign resolution
//! - [`cpr`]: CPR session timer and ticker
//! - [`patient_store`]: Patient context persistence
//! - [`app`]: Explicit application state

pub mod app;
pub mod cache;
pub mod config;
pub mod cpr;
pub mod db;
pub mod engine;
pub mod logging;
pub mod models;
pub mod patient_store;
pub mod rules;

// Re-export commonly used types
pub use app::{AppError, AppState, EquipmentSize};
pub use cache::{CacheRecord, CacheStatus, OfflineCache};
pub use config::Config;
pub use cpr::{CprEventKind, CprSession, CprSnapshot, CprState, CprTimer};
pub use db::{Collection, Database, ObjectStore, StoreError};
pub use engine::{EntryDose, MedicationMatch, ResolutionError};
pub use models::{
    AlgorithmRule, DoseResult, EquipmentRule, MedicationRule, PatientContext, SizeResult,
    VitalAgeBand, VitalClassification, VitalSign, VitalStatus,
};
pub use patient_store::PatientStore;
pub use rules::RuleTables;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PedsResusError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not calculable: {0}")]
    NotCalculable(String),

    #[error("Rule table error: {0}")]
    RuleError(String),
}

impl From<AppError> for PedsResusError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Rules(e) => PedsResusError::RuleError(e.to_string()),
            AppError::Patient(e) => PedsResusError::InvalidInput(e.to_string()),
            AppError::Resolution(e) => e.into(),
            AppError::NotFound { .. } => PedsResusError::NotFound(e.to_string()),
        }
    }
}

impl From<ResolutionError> for PedsResusError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::InvalidInput(msg) => PedsResusError::InvalidInput(msg),
            other => PedsResusError::NotCalculable(other.to_string()),
        }
    }
}

impl From<StoreError> for PedsResusError {
    fn from(e: StoreError) -> Self {
        PedsResusError::StorageError(e.to_string())
    }
}

impl From<config::ConfigError> for PedsResusError {
    fn from(e: config::ConfigError) -> Self {
        PedsResusError::StorageError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the log subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(level: String) -> bool {
    logging::init_with_level(&level)
}

/// Open the core with on-device storage under `data_dir`.
///
/// Other settings come from the config file when one exists. Logging starts
/// at the configured level unless the host already installed a subscriber.
#[uniffi::export]
pub fn open_core(data_dir: String) -> Result<Arc<PedsResusCore>, PedsResusError> {
    let (mut config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    logging::init_from_config(&config.logging);
    if let Some(e) = load_error {
        tracing::warn!("Ignoring unreadable config file: {}", e);
    }
    config.storage.data_dir = data_dir.into();
    let app = AppState::open(config)?;
    Ok(Arc::new(PedsResusCore { app }))
}

/// Open the core without persistence (for testing).
#[uniffi::export]
pub fn open_core_in_memory() -> Result<Arc<PedsResusCore>, PedsResusError> {
    let app = AppState::in_memory()?;
    Ok(Arc::new(PedsResusCore { app }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe application handle for FFI.
#[derive(uniffi::Object)]
pub struct PedsResusCore {
    app: AppState,
}

impl PedsResusCore {
    /// The state behind the handle.
    pub fn app(&self) -> &AppState {
        &self.app
    }
}

#[uniffi::export]
impl PedsResusCore {
    // =========================================================================
    // Status
    // =========================================================================

    /// Platform connectivity signal. Advisory only.
    pub fn set_offline(&self, offline: bool) {
        self.app.set_offline(offline);
    }

    pub fn is_offline(&self) -> bool {
        self.app.is_offline()
    }

    /// Whether rule tables are served from persistent storage.
    pub fn cache_status(&self) -> FfiCacheStatus {
        self.app.cache_status().into()
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn get_patient(&self) -> FfiPatient {
        self.app.patient().into()
    }

    /// Replace the patient. Nothing changes if any value is out of range.
    pub fn set_patient(&self, patient: FfiPatient) -> Result<FfiPatient, PedsResusError> {
        let updated = self
            .app
            .set_patient(patient.weight_kg, patient.age_months, patient.length_cm)?;
        Ok(updated.into())
    }

    pub fn set_weight(&self, weight_kg: Option<f64>) -> Result<FfiPatient, PedsResusError> {
        Ok(self.app.set_weight(weight_kg)?.into())
    }

    pub fn set_age(&self, age_months: Option<f64>) -> Result<FfiPatient, PedsResusError> {
        Ok(self.app.set_age(age_months)?.into())
    }

    pub fn set_length(&self, length_cm: Option<f64>) -> Result<FfiPatient, PedsResusError> {
        Ok(self.app.set_length(length_cm)?.into())
    }

    pub fn clear_patient(&self) {
        self.app.clear_patient();
    }

    // =========================================================================
    // Medication Operations
    // =========================================================================

    pub fn list_medications(&self) -> Vec<FfiMedication> {
        self.app
            .medications()
            .into_iter()
            .map(|m| m.into())
            .collect()
    }

    /// Search medications by name or common shorthand.
    pub fn search_medications(&self, query: String, limit: u32) -> Vec<FfiMedicationMatch> {
        self.app
            .search_medications(&query, limit as usize)
            .into_iter()
            .map(|m| m.into())
            .collect()
    }

    /// Doses for every indication of a medication, for the current patient.
    pub fn resolve_medication(
        &self,
        medication_id: String,
    ) -> Result<Vec<FfiEntryDose>, PedsResusError> {
        let doses = self.app.resolve_medication(&medication_id)?;
        Ok(doses.into_iter().map(|d| d.into()).collect())
    }

    // =========================================================================
    // Equipment Operations
    // =========================================================================

    pub fn resolve_equipment(&self, equipment_id: String) -> Result<FfiSize, PedsResusError> {
        Ok(self.app.resolve_equipment(&equipment_id)?.into())
    }

    /// Every equipment item sized for the current patient, critical first.
    pub fn equipment_sizes(&self) -> Vec<FfiEquipmentSize> {
        self.app
            .equipment_sizes()
            .into_iter()
            .map(|s| s.into())
            .collect()
    }

    // =========================================================================
    // Vital Sign Operations
    // =========================================================================

    pub fn classify_vital(
        &self,
        sign: FfiVitalSign,
        value: f64,
    ) -> Result<FfiVitalClassification, PedsResusError> {
        Ok(self.app.classify_vital(sign.into(), value)?.into())
    }

    /// Label of the age band for the current patient, if an age is set.
    pub fn current_vital_band(&self) -> Option<String> {
        self.app.current_vital_band().map(|b| b.label)
    }

    // =========================================================================
    // Algorithm Operations
    // =========================================================================

    pub fn get_algorithm(&self, algorithm_id: String) -> Result<FfiAlgorithm, PedsResusError> {
        Ok(self.app.algorithm(&algorithm_id)?.into())
    }

    // =========================================================================
    // CPR Operations
    // =========================================================================

    pub fn cpr_start(&self) -> bool {
        self.app.cpr().start()
    }

    pub fn cpr_pause(&self) -> bool {
        self.app.cpr().pause()
    }

    pub fn cpr_reset(&self) {
        self.app.cpr().reset();
    }

    /// Record an event. Ignored unless the session is running.
    pub fn cpr_record(&self, kind: FfiCprEventKind) -> bool {
        self.app.cpr().record(kind.into()).is_some()
    }

    pub fn cpr_snapshot(&self) -> FfiCprSnapshot {
        self.app.cpr().snapshot().into()
    }

    /// Deliver a snapshot to `listener` every tick while CPR runs.
    /// Replaces any earlier listener.
    pub fn set_cpr_listener(&self, listener: Box<dyn CprListener>) {
        let listener: Arc<dyn CprListener> = Arc::from(listener);
        self.app
            .set_cpr_listener(Some(Arc::new(move |snap: CprSnapshot| {
                listener.on_tick(snap.into())
            })));
    }

    pub fn clear_cpr_listener(&self) {
        self.app.set_cpr_listener(None);
    }
}

/// Host-side receiver for CPR ticks. Called on the ticker thread.
#[uniffi::export(callback_interface)]
pub trait CprListener: Send + Sync {
    fn on_tick(&self, snapshot: FfiCprSnapshot);
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe cache status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCacheStatus {
    pub available: bool,
    pub reason: Option<String>,
}

impl From<CacheStatus> for FfiCacheStatus {
    fn from(status: CacheStatus) -> Self {
        match status {
            CacheStatus::Available => Self {
                available: true,
                reason: None,
            },
            CacheStatus::Unavailable { reason } => Self {
                available: false,
                reason: Some(reason),
            },
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub weight_kg: Option<f64>,
    pub age_months: Option<f64>,
    pub length_cm: Option<f64>,
    pub updated_at: Option<String>,
}

impl From<PatientContext> for FfiPatient {
    fn from(patient: PatientContext) -> Self {
        Self {
            weight_kg: patient.weight_kg(),
            age_months: patient.age_months(),
            length_cm: patient.length_cm(),
            updated_at: patient.updated_at().map(str::to_string),
        }
    }
}

/// FFI-safe medication summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub id: String,
    pub name: String,
    pub category: String,
    pub concentration: Option<String>,
    pub indications: Vec<String>,
}

impl From<MedicationRule> for FfiMedication {
    fn from(rule: MedicationRule) -> Self {
        Self {
            concentration: rule.concentration.map(|c| {
                c.label
                    .unwrap_or_else(|| format!("{} {}/mL", c.amount, c.unit))
            }),
            indications: rule.dosing.into_iter().map(|d| d.indication).collect(),
            id: rule.id,
            name: rule.name,
            category: rule.category,
        }
    }
}

/// FFI-safe search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicationMatch {
    pub id: String,
    pub name: String,
    pub score: f64,
}

impl From<MedicationMatch> for FfiMedicationMatch {
    fn from(m: MedicationMatch) -> Self {
        Self {
            id: m.id,
            name: m.name,
            score: m.score,
        }
    }
}

/// FFI-safe dose for one indication. Exactly one of `dose` and `error` is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEntryDose {
    pub indication: String,
    pub route: String,
    pub dose: Option<FfiDose>,
    pub error: Option<String>,
}

impl From<EntryDose> for FfiEntryDose {
    fn from(entry: EntryDose) -> Self {
        let (dose, error) = match entry.outcome {
            Ok(dose) => (Some(dose.into()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            indication: entry.indication,
            route: entry.route,
            dose,
            error,
        }
    }
}

/// FFI-safe resolved dose.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDose {
    pub display: String,
    pub calculated_dose: String,
    pub min_dose: Option<String>,
    pub max_dose: Option<String>,
    pub calculated_value: f64,
    pub unit: String,
    pub volume_ml: Option<f64>,
    pub source: String,
    pub clamped: bool,
    pub notes: Option<String>,
}

impl From<DoseResult> for FfiDose {
    fn from(dose: DoseResult) -> Self {
        Self {
            display: dose.display(),
            source: format!("{:?}", dose.source),
            calculated_dose: dose.calculated_dose,
            min_dose: dose.min_dose,
            max_dose: dose.max_dose,
            calculated_value: dose.calculated_value,
            unit: dose.unit,
            volume_ml: dose.volume_ml,
            clamped: dose.clamped,
            notes: dose.notes,
        }
    }
}

/// FFI-safe equipment size.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSize {
    pub display: String,
    pub size: String,
    pub unit: Option<String>,
    pub size_details: Option<String>,
    pub formula: Option<String>,
    pub notes: Option<String>,
    pub alternative_sizes: Vec<String>,
    pub clamped: bool,
}

impl From<SizeResult> for FfiSize {
    fn from(size: SizeResult) -> Self {
        Self {
            display: size.display(),
            size: size.size,
            unit: size.unit,
            size_details: size.size_details,
            formula: size.formula,
            notes: size.notes,
            alternative_sizes: size.alternative_sizes,
            clamped: size.clamped.is_some(),
        }
    }
}

/// FFI-safe equipment row. Exactly one of `size` and `error` is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEquipmentSize {
    pub id: String,
    pub name: String,
    pub critical: bool,
    pub size: Option<FfiSize>,
    pub error: Option<String>,
}

impl From<EquipmentSize> for FfiEquipmentSize {
    fn from(item: EquipmentSize) -> Self {
        let (size, error) = match item.outcome {
            Ok(size) => (Some(size.into()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            id: item.id,
            name: item.name,
            critical: item.critical,
            size,
            error,
        }
    }
}

/// FFI-safe vital sign.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiVitalSign {
    HeartRate,
    RespiratoryRate,
    SystolicBp,
    DiastolicBp,
    OxygenSaturation,
}

impl From<FfiVitalSign> for VitalSign {
    fn from(sign: FfiVitalSign) -> Self {
        match sign {
            FfiVitalSign::HeartRate => VitalSign::HeartRate,
            FfiVitalSign::RespiratoryRate => VitalSign::RespiratoryRate,
            FfiVitalSign::SystolicBp => VitalSign::SystolicBp,
            FfiVitalSign::DiastolicBp => VitalSign::DiastolicBp,
            FfiVitalSign::OxygenSaturation => VitalSign::OxygenSaturation,
        }
    }
}

/// FFI-safe vital classification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVitalClassification {
    pub value: f64,
    /// "low", "normal" or "high"
    pub status: String,
    pub band_label: String,
    pub low: f64,
    pub normal: f64,
    pub high: f64,
    pub units: String,
}

impl From<VitalClassification> for FfiVitalClassification {
    fn from(c: VitalClassification) -> Self {
        let status = match c.status {
            VitalStatus::Low => "low",
            VitalStatus::Normal => "normal",
            VitalStatus::High => "high",
        };
        Self {
            value: c.value,
            status: status.to_string(),
            band_label: c.band_label,
            low: c.range.low,
            normal: c.range.normal,
            high: c.range.high,
            units: c.range.units,
        }
    }
}

/// FFI-safe algorithm.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlgorithm {
    pub id: String,
    pub name: String,
    pub category: String,
    pub steps: Vec<FfiAlgorithmStep>,
}

/// FFI-safe algorithm step.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlgorithmStep {
    pub order: u32,
    pub title: String,
    pub detail: String,
    pub time_critical: bool,
    pub medication_ids: Vec<String>,
}

impl From<AlgorithmRule> for FfiAlgorithm {
    fn from(rule: AlgorithmRule) -> Self {
        let steps = rule
            .ordered_steps()
            .into_iter()
            .map(|s| FfiAlgorithmStep {
                order: s.order,
                title: s.title.clone(),
                detail: s.detail.clone(),
                time_critical: s.time_critical,
                medication_ids: s.medication_ids.clone(),
            })
            .collect();
        Self {
            id: rule.id,
            name: rule.name,
            category: rule.category,
            steps,
        }
    }
}

/// FFI-safe CPR event kind.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiCprEventKind {
    Compression,
    Epinephrine,
    Shock,
}

impl From<FfiCprEventKind> for CprEventKind {
    fn from(kind: FfiCprEventKind) -> Self {
        match kind {
            FfiCprEventKind::Compression => CprEventKind::Compression,
            FfiCprEventKind::Epinephrine => CprEventKind::Epinephrine,
            FfiCprEventKind::Shock => CprEventKind::Shock,
        }
    }
}

/// FFI-safe CPR snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCprSnapshot {
    /// "idle", "running" or "paused"
    pub state: String,
    pub elapsed_ms: u64,
    pub compressions: u32,
    pub epinephrine_doses: u32,
    pub shocks: u32,
    pub compression_rate: Option<f64>,
    pub since_last_epinephrine_ms: Option<u64>,
    pub since_last_shock_ms: Option<u64>,
}

impl From<CprSnapshot> for FfiCprSnapshot {
    fn from(snap: CprSnapshot) -> Self {
        let state = match snap.state {
            CprState::Idle => "idle",
            CprState::Running => "running",
            CprState::Paused => "paused",
        };
        Self {
            state: state.to_string(),
            elapsed_ms: snap.elapsed_ms,
            compressions: snap.compressions as u32,
            epinephrine_doses: snap.epinephrine_doses as u32,
            shocks: snap.shocks as u32,
            compression_rate: snap.compression_rate,
            since_last_epinephrine_ms: snap.since_last_epinephrine_ms,
            since_last_shock_ms: snap.since_last_shock_ms,
        }
    }
}
