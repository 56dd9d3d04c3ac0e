use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Tunable policy of the excitement detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcitementConfig {
    /// Number of recent samples kept in history
    pub history_len: usize,

    /// Width of the regression window in seconds
    pub window_seconds: f64,

    /// Slope (rate units per second) above which the rate is climbing
    pub climb_slope: f64,

    /// Slope below which (negated) the rate is falling
    pub fall_slope: f64,

    /// Slopes within (-coast_slope, +coast_slope) count as flat
    pub coast_slope: f64,

    /// Window variance below which the rate counts as flat
    pub coast_variance: f64,

    pub climb_min_duration: f64,
    pub climb_min_height: f64,
    pub fall_min_duration: f64,
    pub fall_min_height: f64,
    pub coast_min_duration: f64,
    pub coast_min_height: f64,

    /// Added to the mid rate of the last coast when it is the only reference
    pub coast_threshold_offset: f64,

    /// Require the current rate to exceed the previous one to be interesting
    pub require_rising_rate: bool,
}

impl Default for ExcitementConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            window_seconds: 10.0,
            climb_slope: 0.3,
            fall_slope: 0.3,
            coast_slope: 0.1,
            coast_variance: 1.0,
            climb_min_duration: 3.0,
            climb_min_height: 6.0,
            fall_min_duration: 3.0,
            fall_min_height: 6.0,
            coast_min_duration: 8.0,
            coast_min_height: 0.0,
            coast_threshold_offset: 1.0,
            require_rising_rate: true,
        }
    }
}

/// Gyroscope analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GyroConfig {
    /// Raw samples collected before the bias is computed
    pub calibration_samples: usize,

    /// Headband gyro sample rate in Hz
    pub sample_rate: f64,

    /// FFT window length
    pub fft_window: usize,

    /// Minimum FFT power for a head shake to be reported
    pub shake_power_threshold: f64,

    /// Max degrees per second used to normalize swing intensity, per axis
    pub max_dps: [f64; 3],

    /// Directory holding per-axis calibration files
    pub calibration_dir: PathBuf,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 128,
            sample_rate: 52.0,
            fft_window: 64,
            shake_power_threshold: 500.0,
            max_dps: [100.0, 200.0, 200.0],
            calibration_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub excitement: ExcitementConfig,

    pub gyro: GyroConfig,

    /// Fixed backoff between reconnection attempts, in milliseconds
    pub retry_backoff_ms: u64,

    /// Timeout for cross-hub calls, in milliseconds
    pub call_timeout_ms: u64,

    /// Unix socket of a parent process to export methods to
    pub controller: Option<PathBuf>,

    /// Websocket address of the haptics server
    pub haptics_iface: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excitement: ExcitementConfig::default(),
            gyro: GyroConfig::default(),
            retry_backoff_ms: 300,
            call_timeout_ms: 2000,
            controller: None,
            haptics_iface: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the platform config directory.
    /// Falls back to defaults if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };

        if !config_path.exists() {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::LoadFailed {
            path: config_path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: config_path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", config_path.display());
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |e: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: e,
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_err(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| save_err(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_err(Box::new(e)))?;

        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pulsebus").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.excitement.history_len < 2 {
            return Err(ConfigError::Invalid(
                "excitement.history_len must be at least 2".to_string(),
            ));
        }
        if self.excitement.window_seconds <= 0.0 {
            return Err(ConfigError::Invalid(
                "excitement.window_seconds must be positive".to_string(),
            ));
        }
        if self.gyro.calibration_samples == 0 {
            return Err(ConfigError::Invalid(
                "gyro.calibration_samples must be positive".to_string(),
            ));
        }
        if self.gyro.fft_window < 2 || self.gyro.sample_rate <= 0.0 {
            return Err(ConfigError::Invalid(
                "gyro.fft_window and gyro.sample_rate must be positive".to_string(),
            ));
        }
        if self.gyro.max_dps.iter().any(|dps| *dps <= 0.0) {
            return Err(ConfigError::Invalid(
                "gyro.max_dps entries must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
