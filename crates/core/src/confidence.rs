//! Confidence scoring shared by every analyzer.
//!
//! The continuous score drives ranking; the discretized level drives business
//! rules (only `High` speaker roles are trusted for CRM auto-population).
//! Thresholds are product-tunable constants, not statistically derived.

use serde::{Deserialize, Serialize};

/// Scores at or below this are `Low`.
pub const LOW_CEILING: f64 = 0.5;
/// Scores above `LOW_CEILING` and at or below this are `Medium`.
pub const MEDIUM_CEILING: f64 = 0.75;

/// Discretized confidence bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_value(value: f64) -> Self {
        if value > MEDIUM_CEILING {
            ConfidenceLevel::High
        } else if value > LOW_CEILING {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// A continuous confidence value in `[0, 1]` with its discretized level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub value: f64,
    pub level: ConfidenceLevel,
}

impl ConfidenceScore {
    /// Clamp into `[0, 1]` and discretize.
    pub fn from_value(value: f64) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self { value, level: ConfidenceLevel::from_value(value) }
    }

    pub fn low() -> Self {
        Self::from_value(0.0)
    }

    pub fn is_high(&self) -> bool {
        self.level == ConfidenceLevel::High
    }
}
