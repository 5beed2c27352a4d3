use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const ENV_TARGET_SAMPLES: &str = "FACE_CAPTURE_TARGET_SAMPLES";
pub const ENV_MIN_VALID_SAMPLES: &str = "FACE_CAPTURE_MIN_VALID_SAMPLES";
pub const ENV_MAX_CAPTURE_TIME_MS: &str = "FACE_CAPTURE_MAX_TIME_MS";
pub const ENV_MIN_DETECTION_CONFIDENCE: &str = "FACE_CAPTURE_MIN_CONFIDENCE";
pub const ENV_MAX_Z_DIFF_FOR_FRONTAL: &str = "FACE_CAPTURE_MAX_Z_DIFF";

/// Tunables of one capture session. All thresholds are hand tuned, not
/// derived from a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Valid samples after which the capture finishes early.
    pub target_samples: usize,
    /// Valid samples required to produce a result.
    pub min_valid_samples: usize,
    pub max_capture_time_ms: u64,
    /// Frames whose detection confidence falls below this are ignored.
    pub min_detection_confidence: f32,
    /// Largest iris depth difference still treated as a frontal pose.
    pub max_z_diff_for_frontal: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig::face_analysis()
    }
}

impl CaptureConfig {
    /// face_analysis is the preset of the combined DP and face shape capture.
    pub fn face_analysis() -> Self {
        CaptureConfig {
            target_samples: 100,
            min_valid_samples: 60,
            max_capture_time_ms: 5000,
            min_detection_confidence: 0.85,
            max_z_diff_for_frontal: 0.03,
        }
    }

    /// pupil_meter is the preset of the DP only measurement screen, which
    /// stops at 90 samples.
    pub fn pupil_meter() -> Self {
        CaptureConfig {
            target_samples: 90,
            ..CaptureConfig::face_analysis()
        }
    }

    /// from_env overrides the `face_analysis` preset with the
    /// `FACE_CAPTURE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// from_lookup reads overrides through `lookup`. Missing, unparsable or
    /// zero values keep the preset value.
    ///
    /// # Arguments
    /// * `lookup` - returns the raw value of a variable name
    ///
    /// # Returns
    /// * `Result<CaptureConfig, ConfigError>`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CaptureConfig::face_analysis();
        let config = CaptureConfig {
            target_samples: read_override(&lookup, ENV_TARGET_SAMPLES, defaults.target_samples),
            min_valid_samples: read_override(&lookup, ENV_MIN_VALID_SAMPLES, defaults.min_valid_samples),
            max_capture_time_ms: read_override(&lookup, ENV_MAX_CAPTURE_TIME_MS, defaults.max_capture_time_ms),
            min_detection_confidence: read_override(
                &lookup,
                ENV_MIN_DETECTION_CONFIDENCE,
                defaults.min_detection_confidence,
            ),
            max_z_diff_for_frontal: read_override(
                &lookup,
                ENV_MAX_Z_DIFF_FOR_FRONTAL,
                defaults.max_z_diff_for_frontal,
            ),
        };
        config.validate()?;
        debug!(?config, "capture configuration loaded");
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: CaptureConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_samples == 0 {
            return Err(ConfigError::Validation("target_samples must be positive".to_string()));
        }
        if self.min_valid_samples == 0 {
            return Err(ConfigError::Validation("min_valid_samples must be positive".to_string()));
        }
        if self.min_valid_samples > self.target_samples {
            return Err(ConfigError::Validation(format!(
                "min_valid_samples ({}) exceeds target_samples ({})",
                self.min_valid_samples, self.target_samples
            )));
        }
        if self.max_capture_time_ms == 0 {
            return Err(ConfigError::Validation("max_capture_time_ms must be positive".to_string()));
        }
        if !(self.min_detection_confidence > 0.0 && self.min_detection_confidence <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "min_detection_confidence must be in (0, 1], got {}",
                self.min_detection_confidence
            )));
        }
        if !(self.max_z_diff_for_frontal > 0.0 && self.max_z_diff_for_frontal.is_finite()) {
            return Err(ConfigError::Validation(format!(
                "max_z_diff_for_frontal must be positive, got {}",
                self.max_z_diff_for_frontal
            )));
        }
        Ok(())
    }
}

trait Override: Sized + Copy {
    fn parse_override(raw: &str) -> Option<Self>;
}

impl Override for usize {
    fn parse_override(raw: &str) -> Option<Self> {
        raw.parse().ok().filter(|v| *v != 0)
    }
}

impl Override for u64 {
    fn parse_override(raw: &str) -> Option<Self> {
        raw.parse().ok().filter(|v| *v != 0)
    }
}

impl Override for f32 {
    fn parse_override(raw: &str) -> Option<Self> {
        raw.parse::<f32>().ok().filter(|v| *v != 0.0 && v.is_finite())
    }
}

fn read_override<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: Override,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match T::parse_override(raw.trim()) {
        Some(value) => value,
        None => {
            warn!(key, raw = raw.as_str(), "ignoring invalid capture override");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use crate::config::config::*;

    #[test]
    fn test_presets() {
        let face = CaptureConfig::face_analysis();
        let pupil = CaptureConfig::pupil_meter();
        assert_eq!(face.target_samples, 100);
        assert_eq!(pupil.target_samples, 90);
        assert_eq!(pupil.min_valid_samples, 60);
        assert_eq!(CaptureConfig::default(), face);
        assert!(face.validate().is_ok());
        assert!(pupil.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_TARGET_SAMPLES, "120"),
            (ENV_MAX_CAPTURE_TIME_MS, " 8000 "),
            (ENV_MIN_DETECTION_CONFIDENCE, "not-a-number"),
            (ENV_MAX_Z_DIFF_FOR_FRONTAL, "0"),
        ]);
        let config = CaptureConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.target_samples, 120);
        assert_eq!(config.min_valid_samples, 60);
        assert_eq!(config.max_capture_time_ms, 8000);
        assert_eq!(config.min_detection_confidence, 0.85);
        assert_eq!(config.max_z_diff_for_frontal, 0.03);
    }

    #[test]
    fn test_from_lookup_rejects_inconsistent_counts() {
        let config = CaptureConfig::from_lookup(|key| match key {
            ENV_TARGET_SAMPLES => Some("10".to_string()),
            _ => None,
        });
        assert!(matches!(config, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_from_json_str() {
        let raw = r#"{"target_samples":3,"min_valid_samples":2,"max_capture_time_ms":1000,"min_detection_confidence":0.9,"max_z_diff_for_frontal":0.05}"#;
        let config = CaptureConfig::from_json_str(raw).unwrap();
        assert_eq!(config.target_samples, 3);
        assert_eq!(config.max_z_diff_for_frontal, 0.05);

        assert!(matches!(CaptureConfig::from_json_str("{"), Err(ConfigError::Json(_))));

        let raw = r#"{"target_samples":3,"min_valid_samples":2,"max_capture_time_ms":1000,"min_detection_confidence":1.5,"max_z_diff_for_frontal":0.05}"#;
        assert!(matches!(CaptureConfig::from_json_str(raw), Err(ConfigError::Validation(_))));
    }
}
