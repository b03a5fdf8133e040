//! Durable persistence of the patient context.
//!
//! The context is a single JSON document. Reads take a shared lock; writes go
//! to a locked temp file in the same directory, are synced, then renamed over
//! the existing file so a crash never leaves a half-written file behind.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::PatientContext;

/// Patient file errors.
#[derive(Error, Debug)]
pub enum PatientStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type PatientStoreResult<T> = Result<T, PatientStoreError>;

/// Patient context file on disk.
#[derive(Debug, Clone)]
pub struct PatientStore {
    path: PathBuf,
}

impl PatientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored context.
    ///
    /// A missing file gives an empty context. So does an unreadable, corrupt
    /// or out-of-range one, with a warning.
    pub fn load(&self) -> PatientContext {
        if !self.path.exists() {
            info!("No patient file at {:?}, starting empty", self.path);
            return PatientContext::new();
        }
        match self.read() {
            Ok(ctx) => match ctx.validate() {
                Ok(()) => {
                    debug!("Loaded patient context from {:?}", self.path);
                    ctx
                }
                Err(e) => {
                    warn!("Discarding stored patient context {:?}: {}", self.path, e);
                    PatientContext::new()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read patient file {:?}: {}. Starting empty.",
                    self.path, e
                );
                PatientContext::new()
            }
        }
    }

    fn read(&self) -> PatientStoreResult<PatientContext> {
        let file = File::open(&self.path)?;
        file.lock_shared().map_err(|source| PatientStoreError::Lock {
            path: self.path.clone(),
            source,
        })?;

        let mut contents = String::new();
        let read = BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        read?;

        Ok(serde_json::from_str(&contents)?)
    }

    /// Atomically replace the stored context.
    pub fn save(&self, ctx: &PatientContext) -> PatientStoreResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file()
            .lock_exclusive()
            .map_err(|source| PatientStoreError::Lock {
                path: temp.path().to_path_buf(),
                source,
            })?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, ctx)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Saved patient context to {:?}", self.path);
        Ok(())
    }

    /// Remove the stored context. A missing file is not an error.
    pub fn remove(&self) -> PatientStoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
