//! Routing strategy: call type -> ordered execution phases.
//!
//! Pure and deterministic. Classification runs before any plan exists (the
//! plan depends on its result), so plans start at the foundation phase.
//! Agents inside one phase are independently executable; a later phase may
//! read only earlier phases' outputs.

use std::collections::BTreeSet;

use thiserror::Error;

use loadcall_core::CallType;

use crate::output::AgentId;
use crate::registry::AgentRegistry;

/// A batch of agents that may run concurrently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase {
    pub name: &'static str,
    pub agents: Vec<AgentId>,
}

/// Ordered phases for one call type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub call_type: CallType,
    pub phases: Vec<Phase>,
}

impl ExecutionPlan {
    /// Agent ids in dispatch order, flattened across phases.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.phases.iter().flat_map(|phase| phase.agents.iter().copied()).collect()
    }
}

/// A plan referencing an unregistered agent is a configuration defect, not a
/// runtime condition; it aborts the pipeline before any agent runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("execution plan for {call_type} references unregistered agent {agent}")]
    UnknownAgent { call_type: CallType, agent: AgentId },
}

/// Build and validate the plan for a detected call type.
pub fn build_execution_plan(
    call_type: CallType,
    registry: &AgentRegistry,
) -> Result<ExecutionPlan, PlanError> {
    let phases = phase_layout(call_type);
    for phase in &phases {
        for agent in &phase.agents {
            if !registry.has(*agent) {
                return Err(PlanError::UnknownAgent { call_type, agent: *agent });
            }
        }
    }
    Ok(ExecutionPlan { call_type, phases })
}

/// Agents whose failure halts all subsequent phases for this call type.
/// Classification is always critical; speaker identification is critical for
/// types whose extraction maps fields by role.
pub fn critical_agents(call_type: CallType) -> BTreeSet<AgentId> {
    let mut critical = BTreeSet::from([AgentId::Classification]);
    if matches!(call_type, CallType::CarrierQuote | CallType::NewBooking) {
        critical.insert(AgentId::SpeakerIdentification);
    }
    critical
}

fn phase_layout(call_type: CallType) -> Vec<Phase> {
    let foundation = Phase { name: "foundation", agents: vec![AgentId::SpeakerIdentification] };

    match call_type {
        // No business content; further analysis would waste cost.
        CallType::WrongNumber => vec![foundation],
        CallType::CarrierQuote | CallType::NewBooking => vec![
            foundation,
            Phase {
                name: "extraction",
                agents: vec![
                    AgentId::RateNegotiation,
                    AgentId::LoadExtraction,
                    AgentId::EntityExtraction,
                ],
            },
        ],
        CallType::CheckCall | CallType::Other => vec![
            foundation,
            Phase { name: "extraction", agents: vec![AgentId::EntityExtraction] },
        ],
    }
}
