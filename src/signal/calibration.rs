/// Persistence of per-axis gyro bias
///
/// The store is injected so tests and alternate backends don't touch the
/// working directory.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CalibrationError;

pub trait CalibrationStore: Send + Sync {
    /// Stored bias for `axis`, None if it was never calibrated
    fn load(&self, axis: &str) -> Result<Option<f64>, CalibrationError>;

    fn save(&self, axis: &str, bias: f64) -> Result<(), CalibrationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationFile {
    bias: f64,
}

/// One `.cal_gyro_<axis>` JSON file per axis inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, axis: &str) -> PathBuf {
        self.dir.join(format!(".cal_gyro_{}", axis))
    }
}

impl CalibrationStore for FileStore {
    fn load(&self, axis: &str) -> Result<Option<f64>, CalibrationError> {
        let path = self.path_for(axis);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CalibrationError::LoadFailed {
                    axis: axis.to_string(),
                    source: Box::new(e),
                })
            }
        };

        let file: CalibrationFile =
            serde_json::from_str(&contents).map_err(|e| CalibrationError::LoadFailed {
                axis: axis.to_string(),
                source: Box::new(e),
            })?;
        tracing::debug!("Loaded {} bias {} from {}", axis, file.bias, path.display());
        Ok(Some(file.bias))
    }

    fn save(&self, axis: &str, bias: f64) -> Result<(), CalibrationError> {
        let path = self.path_for(axis);
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            CalibrationError::SaveFailed {
                axis: axis.to_string(),
                source,
            }
        };

        let contents =
            serde_json::to_string(&CalibrationFile { bias }).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(&path, contents).map_err(|e| save_failed(Box::new(e)))?;

        tracing::info!("Saved {} bias {} to {}", axis, bias, path.display());
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, axis: &str) -> Option<f64> {
        self.values.lock().get(axis).copied()
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&self, axis: &str) -> Result<Option<f64>, CalibrationError> {
        Ok(self.get(axis))
    }

    fn save(&self, axis: &str, bias: f64) -> Result<(), CalibrationError> {
        self.values.lock().insert(axis.to_string(), bias);
        Ok(())
    }
}
