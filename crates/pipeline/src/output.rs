//! Agent identity, execution status, and typed outputs.
//!
//! Retrieval is compile-time checked: each payload type knows which agent
//! produces it (`TypedPayload`), so a caller asking the context for a
//! `ClassificationResult` can never receive a differently shaped value.

use serde::{Deserialize, Serialize};

use loadcall_core::{
    ClassificationResult, EntityExtractionOutput, LoadExtractionOutput, RateNegotiationOutput,
    SpeakerRoleMap,
};

/// The five analyzers the pipeline knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    Classification,
    SpeakerIdentification,
    RateNegotiation,
    LoadExtraction,
    EntityExtraction,
}

impl AgentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Classification => "classification",
            AgentId::SpeakerIdentification => "speaker_identification",
            AgentId::RateNegotiation => "rate_negotiation",
            AgentId::LoadExtraction => "load_extraction",
            AgentId::EntityExtraction => "entity_extraction",
        }
    }

    pub const ALL: [AgentId; 5] = [
        AgentId::Classification,
        AgentId::SpeakerIdentification,
        AgentId::RateNegotiation,
        AgentId::LoadExtraction,
        AgentId::EntityExtraction,
    ];
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Lifecycle state of one agent invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

/// Typed payload, one variant per agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentPayload {
    Classification(ClassificationResult),
    SpeakerRoles(SpeakerRoleMap),
    RateNegotiation(RateNegotiationOutput),
    LoadExtraction(LoadExtractionOutput),
    EntityExtraction(EntityExtractionOutput),
}

/// Links a payload type to the agent that produces it.
pub trait TypedPayload: Sized {
    const AGENT: AgentId;

    fn from_payload(payload: &AgentPayload) -> Option<&Self>;
    fn into_payload(self) -> AgentPayload;
}

impl TypedPayload for ClassificationResult {
    const AGENT: AgentId = AgentId::Classification;

    fn from_payload(payload: &AgentPayload) -> Option<&Self> {
        match payload {
            AgentPayload::Classification(result) => Some(result),
            _ => None,
        }
    }

    fn into_payload(self) -> AgentPayload {
        AgentPayload::Classification(self)
    }
}

impl TypedPayload for SpeakerRoleMap {
    const AGENT: AgentId = AgentId::SpeakerIdentification;

    fn from_payload(payload: &AgentPayload) -> Option<&Self> {
        match payload {
            AgentPayload::SpeakerRoles(map) => Some(map),
            _ => None,
        }
    }

    fn into_payload(self) -> AgentPayload {
        AgentPayload::SpeakerRoles(self)
    }
}

impl TypedPayload for RateNegotiationOutput {
    const AGENT: AgentId = AgentId::RateNegotiation;

    fn from_payload(payload: &AgentPayload) -> Option<&Self> {
        match payload {
            AgentPayload::RateNegotiation(output) => Some(output),
            _ => None,
        }
    }

    fn into_payload(self) -> AgentPayload {
        AgentPayload::RateNegotiation(self)
    }
}

impl TypedPayload for LoadExtractionOutput {
    const AGENT: AgentId = AgentId::LoadExtraction;

    fn from_payload(payload: &AgentPayload) -> Option<&Self> {
        match payload {
            AgentPayload::LoadExtraction(output) => Some(output),
            _ => None,
        }
    }

    fn into_payload(self) -> AgentPayload {
        AgentPayload::LoadExtraction(self)
    }
}

impl TypedPayload for EntityExtractionOutput {
    const AGENT: AgentId = AgentId::EntityExtraction;

    fn from_payload(payload: &AgentPayload) -> Option<&Self> {
        match payload {
            AgentPayload::EntityExtraction(output) => Some(output),
            _ => None,
        }
    }

    fn into_payload(self) -> AgentPayload {
        AgentPayload::EntityExtraction(self)
    }
}

/// One agent invocation's recorded result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentId,
    pub status: AgentStatus,
    pub payload: Option<AgentPayload>,
    pub execution_time_ms: u64,
    pub tokens_used: Option<u64>,
    pub error: Option<String>,
}

impl AgentOutput {
    pub fn pending(agent: AgentId) -> Self {
        Self {
            agent,
            status: AgentStatus::Pending,
            payload: None,
            execution_time_ms: 0,
            tokens_used: None,
            error: None,
        }
    }

    pub fn running(agent: AgentId) -> Self {
        Self { status: AgentStatus::Running, ..Self::pending(agent) }
    }

    pub fn completed(agent: AgentId, payload: AgentPayload, execution_time_ms: u64) -> Self {
        Self {
            agent,
            status: AgentStatus::Completed,
            payload: Some(payload),
            execution_time_ms,
            tokens_used: None,
            error: None,
        }
    }

    pub fn failed(agent: AgentId, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            agent,
            status: AgentStatus::Failed,
            payload: None,
            execution_time_ms,
            tokens_used: None,
            error: Some(error.into()),
        }
    }

    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}
