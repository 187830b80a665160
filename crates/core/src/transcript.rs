//! Normalized diarized transcript model.
//!
//! Utterances arrive time-ordered from the transcription collaborator and are
//! immutable once a call's transcription completes. Ordering matters: every
//! downstream heuristic reads conversational turn-taking out of the sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a recorded call, assigned by the call-processing job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

/// Identifier of the brokerage organization that owns the call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

/// A single recognized word with timing and recognition confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
}

/// One diarized speech segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// Diarization label, e.g. `"A"` / `"B"`. Unique per speaker within a call.
    pub speaker_label: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Recognition confidence for the whole segment, in `[0, 1]`.
    pub confidence: f64,
    pub words: Vec<Word>,
}

impl Utterance {
    /// Convenience constructor for an utterance without word-level timings.
    pub fn new(
        speaker_label: impl Into<String>,
        text: impl Into<String>,
        start_ms: u64,
        end_ms: u64,
    ) -> Self {
        Self {
            text: text.into(),
            speaker_label: speaker_label.into(),
            start_ms,
            end_ms,
            confidence: 1.0,
            words: Vec::new(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Identifies the call for logging and persistence; carried unchanged through
/// the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub call_id: CallId,
    pub organization_id: OrgId,
    pub call_date: DateTime<Utc>,
}

/// Input contract from the transcription collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallInput {
    pub transcript_text: String,
    pub utterances: Vec<Utterance>,
    pub metadata: CallMetadata,
}

impl CallInput {
    /// Distinct speaker labels in first-appearance order.
    pub fn speaker_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for utterance in &self.utterances {
            if !labels.contains(&utterance.speaker_label) {
                labels.push(utterance.speaker_label.clone());
            }
        }
        labels
    }
}
