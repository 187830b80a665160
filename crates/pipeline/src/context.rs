//! Per-call accumulator for agent results.
//!
//! One context belongs to exactly one pipeline run; it is never shared across
//! concurrent calls. Clones are shallow and share the same output map, which
//! sits behind a mutex so concurrent agent completions can record results
//! safely.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use loadcall_core::{CallInput, CallMetadata, ClassificationResult, SpeakerRoleMap, Utterance};

use crate::output::{AgentId, AgentOutput, AgentStatus, TypedPayload};

/// Counts reported to the caller so degraded runs are visible, not silent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_agents: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

/// Self-contained deep copy of the accumulated output map, used for
/// checkpoint/retry without re-running completed agents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    outputs: BTreeMap<AgentId, AgentOutput>,
}

#[derive(Clone)]
pub struct AgentContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    transcript_text: String,
    utterances: Vec<Utterance>,
    metadata: CallMetadata,
    outputs: Mutex<BTreeMap<AgentId, AgentOutput>>,
}

impl AgentContext {
    pub fn new(input: CallInput) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                transcript_text: input.transcript_text,
                utterances: input.utterances,
                metadata: input.metadata,
                outputs: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn transcript_text(&self) -> &str {
        &self.inner.transcript_text
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.inner.utterances
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.inner.metadata
    }

    /// Record (or overwrite) the result for an agent. Last write wins.
    pub fn add_output(&self, output: AgentOutput) {
        self.lock_outputs().insert(output.agent, output);
    }

    /// Typed payload retrieval; `None` when the agent has not completed.
    /// Never panics on a missing key.
    pub fn output_of<T>(&self) -> Option<T>
    where
        T: TypedPayload + Clone,
    {
        let outputs = self.lock_outputs();
        let output = outputs.get(&T::AGENT)?;
        if output.status != AgentStatus::Completed {
            return None;
        }
        output.payload.as_ref().and_then(T::from_payload).cloned()
    }

    /// The raw recorded output regardless of status.
    pub fn raw_output(&self, agent: AgentId) -> Option<AgentOutput> {
        self.lock_outputs().get(&agent).cloned()
    }

    /// The full agent-name -> output map handed to the CRM-persistence caller.
    pub fn outputs(&self) -> BTreeMap<AgentId, AgentOutput> {
        self.lock_outputs().clone()
    }

    /// True only for `Completed`; `Failed`, `Running`, and `Pending` all
    /// report false.
    pub fn has_completed(&self, agent: AgentId) -> bool {
        self.lock_outputs()
            .get(&agent)
            .map(|output| output.status == AgentStatus::Completed)
            .unwrap_or(false)
    }

    /// Convenience accessor for the top-level classification result.
    pub fn classification(&self) -> Option<ClassificationResult> {
        self.output_of::<ClassificationResult>()
    }

    /// Convenience accessor for the top-level speaker role map.
    pub fn speaker_roles(&self) -> Option<SpeakerRoleMap> {
        self.output_of::<SpeakerRoleMap>()
    }

    pub fn execution_summary(&self) -> ExecutionSummary {
        let outputs = self.lock_outputs();
        let mut summary = ExecutionSummary { total_agents: outputs.len(), ..Default::default() };
        for output in outputs.values() {
            match output.status {
                AgentStatus::Completed => summary.completed += 1,
                AgentStatus::Failed => summary.failed += 1,
                AgentStatus::Pending | AgentStatus::Running => summary.pending += 1,
            }
        }
        summary
    }

    /// Sum of tokens across all recorded outputs, for external cost accounting.
    pub fn total_tokens_used(&self) -> u64 {
        self.lock_outputs().values().filter_map(|output| output.tokens_used).sum()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot { outputs: self.lock_outputs().clone() }
    }

    /// Replace the output map with a previously captured snapshot.
    pub fn restore_from_snapshot(&self, snapshot: ContextSnapshot) {
        *self.lock_outputs() = snapshot.outputs;
    }

    fn lock_outputs(&self) -> MutexGuard<'_, BTreeMap<AgentId, AgentOutput>> {
        match self.inner.outputs.lock() {
            Ok(guard) => guard,
            // A panicked agent task cannot leave the map half-written; each
            // insert is a single operation, so the poisoned value is intact.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use loadcall_core::{
        CallId, CallInput, CallMetadata, CallType, ClassificationResult, ConfidenceScore, OrgId,
        RateNegotiationOutput,
    };

    use crate::output::{AgentId, AgentOutput, AgentPayload, TypedPayload};

    use super::AgentContext;

    #[test]
    fn output_of_returns_none_for_missing_or_failed_agents() {
        let context = context_fixture();
        assert!(context.output_of::<ClassificationResult>().is_none());

        context.add_output(AgentOutput::failed(AgentId::Classification, "boom", 5));
        assert!(context.output_of::<ClassificationResult>().is_none());
        assert!(!context.has_completed(AgentId::Classification));
    }

    #[test]
    fn add_output_is_last_write_wins() {
        let context = context_fixture();
        context.add_output(AgentOutput::failed(AgentId::Classification, "first attempt", 5));
        context.add_output(AgentOutput::completed(
            AgentId::Classification,
            classification_fixture().into_payload(),
            9,
        ));

        assert!(context.has_completed(AgentId::Classification));
        let summary = context.execution_summary();
        assert_eq!(summary.total_agents, 1);
        assert_eq!(summary.completed, 1);
    }

    #[test]
    fn summary_counts_completed_and_failed_separately() {
        let context = context_fixture();
        context.add_output(AgentOutput::completed(
            AgentId::Classification,
            classification_fixture().into_payload(),
            12,
        ));
        context.add_output(AgentOutput::failed(AgentId::RateNegotiation, "timeout", 30_000));

        let summary = context.execution_summary();
        assert_eq!(summary.total_agents, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 0);
    }

    #[test]
    fn tokens_are_summed_across_outputs() {
        let context = context_fixture();
        context.add_output(
            AgentOutput::completed(
                AgentId::Classification,
                classification_fixture().into_payload(),
                12,
            )
            .with_tokens_used(150),
        );
        context.add_output(
            AgentOutput::completed(
                AgentId::RateNegotiation,
                AgentPayload::RateNegotiation(RateNegotiationOutput {
                    mentioned_rates: Vec::new(),
                    opening_rate: None,
                    agreed_rate: None,
                    rate_agreed: false,
                }),
                7,
            )
            .with_tokens_used(90),
        );

        assert_eq!(context.total_tokens_used(), 240);
    }

    #[test]
    fn snapshot_restore_reproduces_completion_state_on_fresh_context() {
        let context = context_fixture();
        context.add_output(AgentOutput::completed(
            AgentId::Classification,
            classification_fixture().into_payload(),
            12,
        ));
        context.add_output(AgentOutput::failed(AgentId::LoadExtraction, "bad payload", 4));
        let snapshot = context.snapshot();

        let fresh = context_fixture();
        fresh.restore_from_snapshot(snapshot);

        for agent in AgentId::ALL {
            assert_eq!(fresh.has_completed(agent), context.has_completed(agent), "{agent}");
            assert_eq!(fresh.raw_output(agent), context.raw_output(agent), "{agent}");
        }
        assert_eq!(
            fresh.output_of::<ClassificationResult>(),
            context.output_of::<ClassificationResult>()
        );
    }

    #[test]
    fn clones_share_the_output_map() {
        let context = context_fixture();
        let clone = context.clone();

        clone.add_output(AgentOutput::completed(
            AgentId::Classification,
            classification_fixture().into_payload(),
            3,
        ));

        assert!(context.has_completed(AgentId::Classification));
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let context = context_fixture();
        context.add_output(AgentOutput::completed(
            AgentId::Classification,
            classification_fixture().into_payload(),
            12,
        ));

        let snapshot = context.snapshot();
        let encoded = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        let decoded = serde_json::from_str(&encoded).expect("snapshot should deserialize");
        assert_eq!(snapshot, decoded);
    }

    fn context_fixture() -> AgentContext {
        AgentContext::new(CallInput {
            transcript_text: String::new(),
            utterances: Vec::new(),
            metadata: CallMetadata {
                call_id: CallId("call-ctx-1".to_string()),
                organization_id: OrgId("org-1".to_string()),
                call_date: Utc::now(),
            },
        })
    }

    fn classification_fixture() -> ClassificationResult {
        ClassificationResult {
            primary_type: CallType::CarrierQuote,
            sub_types: BTreeSet::new(),
            confidence: ConfidenceScore::from_value(0.8),
            indicators: vec!["got a truck".to_string()],
            multi_load_call: false,
        }
    }
}
