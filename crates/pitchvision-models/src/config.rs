//! Pipeline run configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence threshold applied to classes without an explicit entry.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

fn default_max_samples() -> u32 {
    5
}

fn default_sample_stride() -> u32 {
    30
}

fn default_bootstrap_min_players() -> usize {
    14
}

/// Configuration error for invalid pipeline parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_samples must be at least 1")]
    InvalidMaxSamples,

    #[error("sample_stride must be at least 1")]
    InvalidSampleStride,

    #[error("bootstrap_min_players must be at least 1")]
    InvalidBootstrapMinPlayers,

    #[error("confidence threshold for class '{class}' is {value}, must be in [0, 1]")]
    InvalidThreshold { class: String, value: f32 },
}

/// Immutable configuration for one annotation run.
///
/// Supplied by the caller and never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-class confidence thresholds. Classes without an entry fall back
    /// to [`DEFAULT_CONFIDENCE_THRESHOLD`].
    #[serde(default)]
    pub class_thresholds: HashMap<String, f32>,

    /// Maximum number of frames to annotate (default: 5).
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,

    /// Decode-order spacing between sampled frames (default: 30).
    #[serde(default = "default_sample_stride")]
    pub sample_stride: u32,

    /// Display names for the two teams, in (team A, team B) order.
    pub team_names: (String, String),

    /// Display names for the referees, in (main, side) order.
    pub referee_names: (String, String),

    /// Minimum player detections required in a single frame before the
    /// team color model bootstraps (default: 14).
    #[serde(default = "default_bootstrap_min_players")]
    pub bootstrap_min_players: usize,
}

impl PipelineConfig {
    /// Create a config with default sampling parameters.
    pub fn new(
        team_names: (impl Into<String>, impl Into<String>),
        referee_names: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            class_thresholds: HashMap::new(),
            max_samples: default_max_samples(),
            sample_stride: default_sample_stride(),
            team_names: (team_names.0.into(), team_names.1.into()),
            referee_names: (referee_names.0.into(), referee_names.1.into()),
            bootstrap_min_players: default_bootstrap_min_players(),
        }
    }

    /// Confidence threshold for a class label.
    pub fn threshold_for(&self, label: &str) -> f32 {
        self.class_thresholds
            .get(label)
            .copied()
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD)
    }

    /// Validate parameter ranges before starting a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples < 1 {
            return Err(ConfigError::InvalidMaxSamples);
        }
        if self.sample_stride < 1 {
            return Err(ConfigError::InvalidSampleStride);
        }
        if self.bootstrap_min_players < 1 {
            return Err(ConfigError::InvalidBootstrapMinPlayers);
        }
        for (class, &value) in &self.class_thresholds {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::InvalidThreshold {
                    class: class.clone(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PipelineConfig {
        PipelineConfig::new(("Home", "Away"), ("Main Referee", "Side Referee"))
    }

    #[test]
    fn test_defaults() {
        let config = test_config();
        assert_eq!(config.max_samples, 5);
        assert_eq!(config.sample_stride, 30);
        assert_eq!(config.bootstrap_min_players, 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_fallback() {
        let mut config = test_config();
        config.class_thresholds.insert("ball".to_string(), 0.7);
        assert_eq!(config.threshold_for("ball"), 0.7);
        assert_eq!(config.threshold_for("player"), DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_rejects_zero_samples() {
        let mut config = test_config();
        config.max_samples = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxSamples));
    }

    #[test]
    fn test_rejects_zero_stride() {
        let mut config = test_config();
        config.sample_stride = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleStride));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = test_config();
        config.class_thresholds.insert("ball".to_string(), 1.5);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                class: "ball".to_string(),
                value: 1.5,
            })
        );
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let json = r#"{
            "team_names": ["Home", "Away"],
            "referee_names": ["Main", "Side"]
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_samples, 5);
        assert_eq!(config.sample_stride, 30);
        assert_eq!(config.bootstrap_min_players, 14);
        assert!(config.class_thresholds.is_empty());
    }
}
