//! Predictor configuration
//!
//! All fields have defaults, so a partial JSON document (or `{}`) is a valid
//! configuration.

use crate::capture::input::buffer::{DEFAULT_CAPACITY, DEFAULT_SAMPLING_INTERVAL_MS};
use crate::capture::input::types::Viewport;
use crate::processing::prediction::{
    AMPLIFICATION_EXPONENT, DEFAULT_DISTANCE_WEIGHT, DEFAULT_TRAJECTORY_WEIGHT, DISTANCE_SCALE_PX,
    MOTION_GATE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Largest accepted amplification exponent
pub const MAX_AMPLIFICATION_EXPONENT: i32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferConfig {
    /// Number of samples in a full window
    pub capacity: usize,
    /// Minimum milliseconds between accepted samples
    pub sampling_interval_ms: f64,
    /// Initial viewport used for normalization
    pub viewport: Viewport,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            viewport: Viewport::default(),
        }
    }
}

impl BufferConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "capacity must be at least 1".to_string(),
            ));
        }
        if !self.sampling_interval_ms.is_finite() || self.sampling_interval_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sampling interval must be a non-negative number, got {}",
                self.sampling_interval_ms
            )));
        }
        if !self.viewport.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "viewport must be positive, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub distance_weight: f64,
    pub trajectory_weight: f64,
    /// Distance decay scale in pixels
    pub distance_scale: f64,
    pub amplification_exponent: i32,
    /// Pixel speed (px/ms) at which trajectory scoring kicks in
    pub motion_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            distance_weight: DEFAULT_DISTANCE_WEIGHT,
            trajectory_weight: DEFAULT_TRAJECTORY_WEIGHT,
            distance_scale: DISTANCE_SCALE_PX,
            amplification_exponent: AMPLIFICATION_EXPONENT,
            motion_threshold: MOTION_GATE_THRESHOLD,
        }
    }
}

/// Check that a scoring weight lies in `[0, 1]`.
///
/// Raw scores are combinations of terms in `[0, 1]`, so bounded weights keep
/// them small enough that amplification cannot overflow.
pub fn validate_weight(name: &str, weight: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(ConfigError::Invalid(format!(
            "{} must be between 0 and 1, got {}",
            name, weight
        )));
    }
    Ok(())
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        validate_weight("distanceWeight", self.distance_weight)?;
        validate_weight("trajectoryWeight", self.trajectory_weight)?;

        if !self.distance_scale.is_finite() || self.distance_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "distance scale must be positive, got {}",
                self.distance_scale
            )));
        }
        if !(1..=MAX_AMPLIFICATION_EXPONENT).contains(&self.amplification_exponent) {
            return Err(ConfigError::Invalid(format!(
                "amplification exponent must be between 1 and {}, got {}",
                MAX_AMPLIFICATION_EXPONENT, self.amplification_exponent
            )));
        }
        if !self.motion_threshold.is_finite() || self.motion_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "motion threshold must be non-negative, got {}",
                self.motion_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictorConfig {
    pub buffer: BufferConfig,
    pub engine: EngineConfig,
}

impl PredictorConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;

        tracing::debug!("Loaded predictor config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.buffer.validate()?;
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PredictorConfig::default();
        assert_eq!(config.buffer.capacity, 16);
        assert_eq!(config.buffer.sampling_interval_ms, 16.0);
        assert_eq!(config.engine.distance_weight, 0.7);
        assert_eq!(config.engine.trajectory_weight, 0.3);
        assert_eq!(config.engine.distance_scale, 150.0);
        assert_eq!(config.engine.amplification_exponent, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PredictorConfig::from_json_str(
            r#"{ "buffer": { "capacity": 8 }, "engine": { "trajectoryWeight": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.buffer.capacity, 8);
        assert_eq!(config.buffer.sampling_interval_ms, 16.0);
        assert_eq!(config.engine.trajectory_weight, 0.5);
        assert_eq!(config.engine.distance_weight, 0.7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            r#"{ "buffer": { "capacity": 0 } }"#,
            r#"{ "buffer": { "samplingIntervalMs": -1.0 } }"#,
            r#"{ "buffer": { "viewport": { "width": 0.0, "height": 10.0 } } }"#,
            r#"{ "engine": { "distanceWeight": -0.1 } }"#,
            r#"{ "engine": { "trajectoryWeight": 1e100 } }"#,
            r#"{ "engine": { "distanceScale": 0.0 } }"#,
            r#"{ "engine": { "amplificationExponent": 0 } }"#,
            r#"{ "engine": { "amplificationExponent": 400 } }"#,
        ];

        for case in cases {
            let result = PredictorConfig::from_json_str(case);
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "Expected {} to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PredictorConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "engine": {{ "distanceWeight": 0.6 }} }}"#).unwrap();

        let config = PredictorConfig::load(file.path()).unwrap();
        assert_eq!(config.engine.distance_weight, 0.6);

        let missing = PredictorConfig::load(Path::new("/nonexistent/predictor.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
