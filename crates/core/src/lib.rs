//! Domain model for the call-understanding pipeline.
//!
//! Leaf types only: the diarized transcript, confidence scoring, the typed
//! analysis results agents produce, and deployment configuration. No async,
//! no I/O; everything here is shared data the pipeline crate builds on.

pub mod analysis;
pub mod confidence;
pub mod config;
pub mod transcript;

pub use analysis::{
    CallType, ClassificationResult, EntityExtractionOutput, ExtractedLoad, FieldValue,
    LoadExtractionOutput, RateMention, RateNegotiationOutput, SpeakerAssignment, SpeakerRole,
    SpeakerRoleMap,
};
pub use confidence::{ConfidenceLevel, ConfidenceScore};
pub use config::{ConfigError, PipelineConfig};
pub use transcript::{CallId, CallInput, CallMetadata, OrgId, Utterance, Word};
