//! Call-understanding pipeline - analyzer agents and their orchestration
//!
//! This crate turns a diarized call transcript into typed, confidence-scored
//! analysis results:
//! - Classifies the call (carrier quote, new booking, check call, ...)
//! - Assigns a business role to each diarized speaker
//! - Extracts rates, loads, and entities per the detected call type
//!
//! # Architecture
//!
//! A run is a dependency-ordered sequence of phases:
//! 1. **Classification** (`agents::classification`) - always first; every
//!    routing decision depends on the detected call type
//! 2. **Foundation** (`agents::speaker`) - speaker role assignment
//! 3. **Extraction** (`agents::rate`, `agents::load`, `agents::entity`) -
//!    call-type routed, agents within the phase run concurrently
//!
//! # Key Types
//!
//! - `AgentCoordinator` - Owns the registry and agent instances, runs calls
//! - `AgentContext` - Per-call accumulator agents read from and write to
//! - `Agent` / `ErasedAgent` - Typed analyzer trait plus its dyn adapter
//!
//! # Degradation Principle
//!
//! Failures are recorded, never propagated: a failed agent lands on its own
//! output and the rest of the run continues, so the caller always receives
//! whatever analysis was possible.

pub mod agents;
pub mod context;
pub mod coordinator;
pub mod output;
pub mod registry;
pub mod routing;

pub use agents::{Agent, AgentError, ErasedAgent};
pub use context::{AgentContext, ContextSnapshot, ExecutionSummary};
pub use coordinator::{AgentCoordinator, CancelFlag, PipelineError};
pub use output::{AgentId, AgentOutput, AgentPayload, AgentStatus, TypedPayload};
pub use registry::{AgentDescriptor, AgentRegistry};
pub use routing::{build_execution_plan, critical_agents, ExecutionPlan, Phase, PlanError};
