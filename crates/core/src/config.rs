//! Pipeline configuration.
//!
//! All heuristic thresholds are product-tunable. Defaults are the shipped
//! values; deployments override them through a TOML fragment.

use serde::Deserialize;
use thiserror::Error;

/// Classification confidence at or above which the result is trusted for
/// automatic downstream routing. Below it the call is still classified but
/// flagged low-confidence for human review.
pub const CLASSIFICATION_USABLE_THRESHOLD: f64 = 0.6;

/// Deadline applied around every agent execution.
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for one pipeline deployment.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub agent_timeout_ms: u64,
    pub classification_usable_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: DEFAULT_AGENT_TIMEOUT_MS,
            classification_usable_threshold: CLASSIFICATION_USABLE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "agent_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        let threshold = self.classification_usable_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                field: "classification_usable_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PipelineConfig, CLASSIFICATION_USABLE_THRESHOLD};

    #[test]
    fn defaults_carry_shipped_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.classification_usable_threshold, CLASSIFICATION_USABLE_THRESHOLD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_fragment_overrides_defaults() {
        let config = PipelineConfig::from_toml_str(
            "agent_timeout_ms = 5000\nclassification_usable_threshold = 0.7\n",
        )
        .expect("fragment should parse");

        assert_eq!(config.agent_timeout_ms, 5000);
        assert_eq!(config.classification_usable_threshold, 0.7);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let result = PipelineConfig::from_toml_str("classification_usable_threshold = 1.3\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "classification_usable_threshold", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml_str("agent_deadline_ms = 5000\n").is_err());
    }
}
