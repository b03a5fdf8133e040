//! Application state.
//!
//! One [`AppState`] per running app, passed by reference to whatever needs it.
//! It owns the current patient, the offline cache and the CPR session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheStatus, OfflineCache};
use crate::config::Config;
use crate::cpr::{CprSession, TickCallback};
use crate::engine::{self, EntryDose, MedicationMatch, ResolutionError};
use crate::models::{
    AlgorithmRule, EquipmentRule, MedicationRule, PatientContext, PatientError, SizeResult,
    VitalAgeBand, VitalClassification, VitalSign,
};
use crate::patient_store::PatientStore;
use crate::rules::{RuleError, RuleTables};

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Rule tables: {0}")]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },
}

pub type AppResult<T> = Result<T, AppError>;

/// Size resolution for one equipment item.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentSize {
    pub id: String,
    pub name: String,
    pub critical: bool,
    pub outcome: Result<SizeResult, ResolutionError>,
}

/// Explicit application state.
pub struct AppState {
    config: Config,
    rules: RuleTables,
    cache: OfflineCache,
    patient: Mutex<PatientContext>,
    /// None keeps the patient in memory only
    patient_store: Option<PatientStore>,
    cpr: CprSession,
    offline: AtomicBool,
}

impl AppState {
    /// Open on-device state: the rule cache, the stored patient and a CPR
    /// session, all as configured.
    pub fn open(config: Config) -> AppResult<Self> {
        let rules = RuleTables::bundled()?;
        let cache = OfflineCache::open(&config.storage);
        let store = PatientStore::new(config.storage.patient_path());
        info!("Opening app state in {:?}", config.storage.data_dir);
        Ok(Self::with_parts(config, rules, cache, Some(store)))
    }

    /// State with an in-memory cache and no patient persistence.
    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::with_parts(
            Config::default(),
            RuleTables::bundled()?,
            OfflineCache::in_memory(),
            None,
        ))
    }

    /// Assemble state from parts. A stored patient is loaded right away.
    pub fn with_parts(
        config: Config,
        rules: RuleTables,
        cache: OfflineCache,
        patient_store: Option<PatientStore>,
    ) -> Self {
        let patient = patient_store
            .as_ref()
            .map(PatientStore::load)
            .unwrap_or_default();
        let cpr = CprSession::system(&config.cpr);
        Self {
            config,
            rules,
            cache,
            patient: Mutex::new(patient),
            patient_store,
            cpr,
            offline: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The bundled rule tables.
    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    pub fn cpr(&self) -> &CprSession {
        &self.cpr
    }

    /// Receive CPR snapshots every `cpr.tick_interval_ms` while the timer
    /// runs. `None` detaches the current listener.
    pub fn set_cpr_listener(&self, listener: Option<TickCallback>) {
        self.cpr.set_ticker(listener);
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Record the platform connectivity signal. Advisory only.
    pub fn set_offline(&self, offline: bool) {
        let was = self.offline.swap(offline, Ordering::SeqCst);
        if was != offline {
            info!("Connectivity changed: offline={}", offline);
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Patient
    // =========================================================================

    /// A copy of the current patient.
    pub fn patient(&self) -> PatientContext {
        self.lock_patient().clone()
    }

    pub fn set_weight(&self, weight_kg: Option<f64>) -> AppResult<PatientContext> {
        self.update_patient(|p| p.set_weight(weight_kg))
    }

    pub fn set_age(&self, age_months: Option<f64>) -> AppResult<PatientContext> {
        self.update_patient(|p| p.set_age(age_months))
    }

    pub fn set_length(&self, length_cm: Option<f64>) -> AppResult<PatientContext> {
        self.update_patient(|p| p.set_length(length_cm))
    }

    /// Replace every measurement at once. Nothing changes if any value is
    /// out of range.
    pub fn set_patient(
        &self,
        weight_kg: Option<f64>,
        age_months: Option<f64>,
        length_cm: Option<f64>,
    ) -> AppResult<PatientContext> {
        let next = PatientContext::with_values(weight_kg, age_months, length_cm)?;
        let mut patient = self.lock_patient();
        *patient = next;
        self.persist(&patient);
        Ok(patient.clone())
    }

    /// Forget the current patient.
    pub fn clear_patient(&self) {
        let mut patient = self.lock_patient();
        patient.clear();
        self.persist(&patient);
    }

    /// Apply a validated change, then persist. A rejected change leaves the
    /// patient untouched.
    fn update_patient<F>(&self, f: F) -> AppResult<PatientContext>
    where
        F: FnOnce(&mut PatientContext) -> Result<(), PatientError>,
    {
        let mut patient = self.lock_patient();
        let mut next = patient.clone();
        f(&mut next)?;
        *patient = next;
        self.persist(&patient);
        Ok(patient.clone())
    }

    fn persist(&self, patient: &PatientContext) {
        let Some(store) = &self.patient_store else {
            return;
        };
        if let Err(e) = store.save(patient) {
            warn!("Failed to persist patient context: {}", e);
        }
    }

    fn lock_patient(&self) -> MutexGuard<'_, PatientContext> {
        self.patient.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Rule tables through the cache
    // =========================================================================

    pub fn medications(&self) -> Vec<MedicationRule> {
        self.cache.ensure(&self.rules.medications)
    }

    pub fn equipment(&self) -> Vec<EquipmentRule> {
        self.cache.ensure(&self.rules.equipment)
    }

    pub fn vital_bands(&self) -> Vec<VitalAgeBand> {
        self.cache.ensure(&self.rules.vital_bands)
    }

    pub fn algorithms(&self) -> Vec<AlgorithmRule> {
        self.cache.ensure(&self.rules.algorithms)
    }

    // =========================================================================
    // Resolution for the current patient
    // =========================================================================

    /// Doses of one medication for the current patient.
    pub fn resolve_medication(&self, medication_id: &str) -> AppResult<Vec<EntryDose>> {
        let rule = self
            .medications()
            .into_iter()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| AppError::NotFound {
                kind: "medication",
                id: medication_id.to_string(),
            })?;
        let patient = self.patient();
        Ok(engine::resolve_dose(
            &rule,
            patient.weight_kg(),
            patient.age_months(),
        )?)
    }

    /// Size of one equipment item for the current patient.
    pub fn resolve_equipment(&self, equipment_id: &str) -> AppResult<SizeResult> {
        let rule = self
            .equipment()
            .into_iter()
            .find(|e| e.id == equipment_id)
            .ok_or_else(|| AppError::NotFound {
                kind: "equipment",
                id: equipment_id.to_string(),
            })?;
        Ok(engine::resolve_size(&rule, &self.patient())?)
    }

    /// Sizes of every equipment item, critical items first.
    pub fn equipment_sizes(&self) -> Vec<EquipmentSize> {
        let patient = self.patient();
        let mut sizes: Vec<EquipmentSize> = self
            .equipment()
            .into_iter()
            .map(|rule| EquipmentSize {
                outcome: engine::resolve_size(&rule, &patient),
                id: rule.id,
                name: rule.name,
                critical: rule.critical,
            })
            .collect();
        // Stable: table order within each group
        sizes.sort_by_key(|s| !s.critical);
        sizes
    }

    /// Classify a measured vital sign for the current patient's age.
    pub fn classify_vital(&self, sign: VitalSign, value: f64) -> AppResult<VitalClassification> {
        let bands = self.vital_bands();
        Ok(engine::classify_vital(
            &bands,
            self.patient().age_months(),
            sign,
            value,
        )?)
    }

    /// The age band for the current patient, if an age is set.
    pub fn current_vital_band(&self) -> Option<VitalAgeBand> {
        let age = self.patient().age_months()?;
        engine::find_band(&self.vital_bands(), age).cloned()
    }

    pub fn search_medications(&self, query: &str, limit: usize) -> Vec<MedicationMatch> {
        engine::search_medications(&self.medications(), query, limit)
    }

    pub fn algorithm(&self, algorithm_id: &str) -> AppResult<AlgorithmRule> {
        self.algorithms()
            .into_iter()
            .find(|a| a.id == algorithm_id)
            .ok_or_else(|| AppError::NotFound {
                kind: "algorithm",
                id: algorithm_id.to_string(),
            })
    }
}
