//! Pipeline orchestration: classification first, then call-type routed phases.
//!
//! The coordinator owns the registry, the agent instances, and the tunables.
//! Classification always runs first because every plan depends on its result.
//! Agents inside a phase run concurrently under a per-agent deadline; a
//! failure lands on that agent's own output and the rest of the phase keeps
//! going. Only a critical-agent failure halts the remaining phases, and even
//! then the accumulated context is returned so partial results reach the
//! caller.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use loadcall_core::{CallInput, CallType, PipelineConfig};

use crate::agents::classification::ClassificationAgent;
use crate::agents::entity::EntityExtractionAgent;
use crate::agents::load::LoadExtractionAgent;
use crate::agents::rate::RateNegotiationAgent;
use crate::agents::speaker::SpeakerIdentificationAgent;
use crate::agents::{Agent, AgentError, ErasedAgent};
use crate::context::AgentContext;
use crate::output::{AgentId, AgentOutput};
use crate::registry::{AgentDescriptor, AgentRegistry};
use crate::routing::{build_execution_plan, critical_agents, PlanError, Phase};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Cooperative cancellation handle, checked at phase boundaries. Agents
/// already in flight finish; agents not yet started are recorded as failed.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct AgentCoordinator {
    registry: AgentRegistry,
    config: PipelineConfig,
    agents: BTreeMap<AgentId, Arc<dyn ErasedAgent>>,
}

impl AgentCoordinator {
    /// Coordinator with the builtin analyzer set installed.
    pub fn new(config: PipelineConfig) -> Self {
        let mut coordinator =
            Self { registry: AgentRegistry::with_builtin_agents(), config, agents: BTreeMap::new() };
        coordinator.install(ClassificationAgent);
        coordinator.install(SpeakerIdentificationAgent);
        coordinator.install(RateNegotiationAgent);
        coordinator.install(LoadExtractionAgent);
        coordinator.install(EntityExtractionAgent);
        coordinator
    }

    /// Install (or replace) an agent implementation along with its descriptor.
    pub fn install<A: Agent>(&mut self, agent: A) {
        self.registry.register(A::descriptor());
        self.agents.insert(A::ID, Arc::new(agent));
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Descriptors that would run for a call of the given type, in dispatch
    /// order, classification included.
    pub fn get_agents_for_call_type(
        &self,
        call_type: CallType,
    ) -> Result<Vec<AgentDescriptor>, PipelineError> {
        let mut descriptors = Vec::new();
        if let Some(classification) = self.registry.get(AgentId::Classification) {
            descriptors.push(classification.clone());
        }
        let plan = build_execution_plan(call_type, &self.registry)?;
        for agent in plan.agent_ids() {
            if let Some(descriptor) = self.registry.get(agent) {
                descriptors.push(descriptor.clone());
            }
        }
        Ok(descriptors)
    }

    /// Concurrency batches for a call type. The first batch is always the
    /// classification alone.
    pub fn get_execution_order(
        &self,
        call_type: CallType,
    ) -> Result<Vec<Vec<AgentId>>, PipelineError> {
        let plan = build_execution_plan(call_type, &self.registry)?;
        let mut order = vec![vec![AgentId::Classification]];
        order.extend(plan.phases.iter().map(|phase| phase.agents.clone()));
        Ok(order)
    }

    pub async fn run(&self, input: CallInput) -> Result<AgentContext, PipelineError> {
        self.run_with_cancel(input, CancelFlag::new()).await
    }

    /// Process one call end to end. Always returns the context, however
    /// degraded; only a plan configuration defect is a hard error.
    pub async fn run_with_cancel(
        &self,
        input: CallInput,
        cancel: CancelFlag,
    ) -> Result<AgentContext, PipelineError> {
        let context = AgentContext::new(input);
        self.run_on_context(&context, cancel).await?;
        Ok(context)
    }

    /// Drive the pipeline over a caller-supplied context, e.g. one restored
    /// from a snapshot for a checkpoint/retry.
    pub async fn run_on_context(
        &self,
        context: &AgentContext,
        cancel: CancelFlag,
    ) -> Result<(), PipelineError> {
        let run_id = Uuid::new_v4();
        let call_id = context.metadata().call_id.0.clone();
        tracing::info!(
            event_name = "pipeline.run.start",
            %run_id,
            call_id = %call_id,
            utterances = context.utterances().len(),
        );

        if cancel.is_cancelled() {
            context.add_output(AgentOutput::failed(AgentId::Classification, "run cancelled", 0));
            tracing::warn!(event_name = "pipeline.run.cancelled", %run_id, call_id = %call_id);
            return Ok(());
        }

        self.execute_phase(
            &Phase { name: "classification", agents: vec![AgentId::Classification] },
            context,
        )
        .await;

        let Some(classification) = context.classification() else {
            tracing::error!(
                event_name = "pipeline.classification.failed",
                %run_id,
                call_id = %call_id,
            );
            return Ok(());
        };

        if classification.confidence.value < self.config.classification_usable_threshold {
            tracing::warn!(
                event_name = "pipeline.classification.low_confidence",
                %run_id,
                call_id = %call_id,
                call_type = %classification.primary_type,
                confidence = classification.confidence.value,
            );
        }

        let call_type = classification.primary_type;
        let plan = build_execution_plan(call_type, &self.registry)?;
        let critical = critical_agents(call_type);

        for (index, phase) in plan.phases.iter().enumerate() {
            if cancel.is_cancelled() {
                self.fail_remaining(&plan.phases[index..], context, "run cancelled");
                tracing::warn!(event_name = "pipeline.run.cancelled", %run_id, call_id = %call_id);
                break;
            }

            self.execute_phase(phase, context).await;

            let critical_failure = phase
                .agents
                .iter()
                .find(|agent| critical.contains(*agent) && !context.has_completed(**agent));
            if let Some(failed_agent) = critical_failure {
                tracing::error!(
                    event_name = "pipeline.run.halted",
                    %run_id,
                    call_id = %call_id,
                    agent = %failed_agent,
                );
                self.fail_remaining(
                    &plan.phases[index + 1..],
                    context,
                    &format!("halted: critical agent {failed_agent} failed"),
                );
                break;
            }
        }

        let summary = context.execution_summary();
        tracing::info!(
            event_name = "pipeline.run.finish",
            %run_id,
            call_id = %call_id,
            call_type = %call_type,
            completed = summary.completed,
            failed = summary.failed,
        );
        Ok(())
    }

    async fn execute_phase(&self, phase: &Phase, context: &AgentContext) {
        let mut join_set = JoinSet::new();

        for agent_id in &phase.agents {
            let Some(agent) = self.agents.get(agent_id) else {
                context.add_output(AgentOutput::failed(*agent_id, "agent not installed", 0));
                continue;
            };

            if let Some(missing) = self.missing_dependency(*agent_id, context) {
                context.add_output(AgentOutput::failed(
                    *agent_id,
                    format!("dependency {missing} did not complete"),
                    0,
                ));
                tracing::warn!(
                    event_name = "pipeline.agent.skipped",
                    agent = %agent_id,
                    missing = %missing,
                );
                continue;
            }

            context.add_output(AgentOutput::running(*agent_id));
            let agent = Arc::clone(agent);
            let context = context.clone();
            let deadline = Duration::from_millis(self.config.agent_timeout_ms);
            join_set.spawn(async move { run_agent(agent, context, deadline).await });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(join_error) = joined {
                tracing::error!(event_name = "pipeline.agent.panicked", error = %join_error);
            }
        }
    }

    fn missing_dependency(&self, agent: AgentId, context: &AgentContext) -> Option<AgentId> {
        let descriptor = self.registry.get(agent)?;
        descriptor.dependencies.iter().copied().find(|dependency| !context.has_completed(*dependency))
    }

    fn fail_remaining(&self, phases: &[Phase], context: &AgentContext, reason: &str) {
        for phase in phases {
            for agent in &phase.agents {
                if context.raw_output(*agent).is_none() {
                    context.add_output(AgentOutput::failed(*agent, reason, 0));
                }
            }
        }
    }
}

async fn run_agent(agent: Arc<dyn ErasedAgent>, context: AgentContext, deadline: Duration) {
    let agent_id = agent.id();
    let started = Instant::now();
    let outcome = tokio::time::timeout(deadline, agent.execute(&context)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let output = match outcome {
        Ok(Ok(payload)) => {
            tracing::debug!(
                event_name = "pipeline.agent.completed",
                agent = %agent_id,
                elapsed_ms,
            );
            AgentOutput::completed(agent_id, payload, elapsed_ms)
        }
        Ok(Err(error)) => {
            tracing::warn!(
                event_name = "pipeline.agent.failed",
                agent = %agent_id,
                error = %error,
                elapsed_ms,
            );
            AgentOutput::failed(agent_id, error.to_string(), elapsed_ms)
        }
        Err(_) => {
            tracing::warn!(
                event_name = "pipeline.agent.timeout",
                agent = %agent_id,
                deadline_ms = deadline.as_millis() as u64,
            );
            let error = AgentError::Timeout(deadline.as_millis() as u64);
            AgentOutput::failed(agent_id, error.to_string(), elapsed_ms)
        }
    };

    context.add_output(output);
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use loadcall_core::{
        CallId, CallInput, CallMetadata, CallType, OrgId, PipelineConfig, RateNegotiationOutput,
        SpeakerRoleMap, Utterance,
    };

    use crate::agents::{Agent, AgentError};
    use crate::context::AgentContext;
    use crate::output::{AgentId, AgentStatus};
    use crate::registry::AgentDescriptor;

    use super::{AgentCoordinator, CancelFlag};

    struct FailingRateAgent;

    #[async_trait]
    impl Agent for FailingRateAgent {
        type Output = RateNegotiationOutput;

        const ID: AgentId = AgentId::RateNegotiation;

        fn descriptor() -> AgentDescriptor {
            AgentDescriptor::new(
                AgentId::RateNegotiation,
                &[AgentId::Classification, AgentId::SpeakerIdentification],
                "rate_negotiation_output",
            )
        }

        async fn run(&self, _context: &AgentContext) -> Result<Self::Output, AgentError> {
            Err(AgentError::Invalid("synthetic failure".to_string()))
        }
    }

    struct StalledSpeakerAgent;

    #[async_trait]
    impl Agent for StalledSpeakerAgent {
        type Output = SpeakerRoleMap;

        const ID: AgentId = AgentId::SpeakerIdentification;

        fn descriptor() -> AgentDescriptor {
            AgentDescriptor::new(
                AgentId::SpeakerIdentification,
                &[AgentId::Classification],
                "speaker_role_map",
            )
        }

        async fn run(&self, _context: &AgentContext) -> Result<Self::Output, AgentError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(SpeakerRoleMap::new())
        }
    }

    #[tokio::test]
    async fn carrier_quote_run_completes_every_planned_agent() {
        let coordinator = AgentCoordinator::new(PipelineConfig::default());
        let context =
            coordinator.run(carrier_quote_input()).await.expect("plan should validate");

        for agent in AgentId::ALL {
            assert!(context.has_completed(agent), "{agent} should complete");
        }
        let summary = context.execution_summary();
        assert_eq!(summary.completed, AgentId::ALL.len());
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn wrong_number_run_skips_extraction_agents() {
        let coordinator = AgentCoordinator::new(PipelineConfig::default());
        let context = coordinator
            .run(input_from(&[
                ("A", "Hello, is this Bob?"),
                ("B", "No, you have the wrong number."),
                ("A", "Sorry, I didn't mean to call this line."),
            ]))
            .await
            .expect("plan should validate");

        assert!(context.has_completed(AgentId::Classification));
        assert!(context.raw_output(AgentId::RateNegotiation).is_none());
        assert!(context.raw_output(AgentId::LoadExtraction).is_none());
        assert!(context.raw_output(AgentId::EntityExtraction).is_none());
        assert_eq!(context.execution_summary().total_agents, 2);
    }

    #[tokio::test]
    async fn one_failing_agent_does_not_take_down_its_phase() {
        let mut coordinator = AgentCoordinator::new(PipelineConfig::default());
        coordinator.install(FailingRateAgent);

        let context =
            coordinator.run(carrier_quote_input()).await.expect("plan should validate");

        let rate = context.raw_output(AgentId::RateNegotiation).expect("rate output recorded");
        assert_eq!(rate.status, AgentStatus::Failed);
        assert_eq!(rate.error.as_deref(), Some("invalid input: synthetic failure"));

        assert!(context.has_completed(AgentId::LoadExtraction));
        assert!(context.has_completed(AgentId::EntityExtraction));
    }

    #[tokio::test]
    async fn stalled_agent_is_failed_at_the_deadline() {
        let config = PipelineConfig { agent_timeout_ms: 20, ..PipelineConfig::default() };
        let mut coordinator = AgentCoordinator::new(config);
        coordinator.install(StalledSpeakerAgent);

        let context =
            coordinator.run(carrier_quote_input()).await.expect("plan should validate");

        let speaker =
            context.raw_output(AgentId::SpeakerIdentification).expect("speaker output recorded");
        assert_eq!(speaker.status, AgentStatus::Failed);
        assert!(speaker.error.as_deref().unwrap_or_default().contains("timed out"));
    }

    #[tokio::test]
    async fn critical_speaker_failure_halts_extraction_for_carrier_quotes() {
        let config = PipelineConfig { agent_timeout_ms: 20, ..PipelineConfig::default() };
        let mut coordinator = AgentCoordinator::new(config);
        coordinator.install(StalledSpeakerAgent);

        let context =
            coordinator.run(carrier_quote_input()).await.expect("plan should validate");

        let load = context.raw_output(AgentId::LoadExtraction).expect("halt recorded");
        assert_eq!(load.status, AgentStatus::Failed);
        assert!(load.error.as_deref().unwrap_or_default().contains("speaker_identification"));
    }

    #[tokio::test]
    async fn pre_cancelled_run_records_nothing_but_the_cancellation() {
        let coordinator = AgentCoordinator::new(PipelineConfig::default());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let context = coordinator
            .run_with_cancel(carrier_quote_input(), cancel)
            .await
            .expect("cancellation is not an error");

        let summary = context.execution_summary();
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 1);
        let classification =
            context.raw_output(AgentId::Classification).expect("cancellation recorded");
        assert_eq!(classification.error.as_deref(), Some("run cancelled"));
    }

    #[tokio::test]
    async fn execution_order_always_opens_with_classification_alone() {
        let coordinator = AgentCoordinator::new(PipelineConfig::default());

        for call_type in [CallType::CarrierQuote, CallType::CheckCall, CallType::WrongNumber] {
            let order = coordinator.get_execution_order(call_type).expect("order");
            assert_eq!(order[0], vec![AgentId::Classification], "{call_type}");
        }

        let order = coordinator.get_execution_order(CallType::CarrierQuote).expect("order");
        assert!(order[1].contains(&AgentId::SpeakerIdentification));
    }

    #[tokio::test]
    async fn agents_for_call_type_resolve_against_the_registry() {
        let coordinator = AgentCoordinator::new(PipelineConfig::default());
        let descriptors =
            coordinator.get_agents_for_call_type(CallType::WrongNumber).expect("descriptors");

        let ids: Vec<AgentId> = descriptors.iter().map(|descriptor| descriptor.id).collect();
        assert_eq!(ids, vec![AgentId::Classification, AgentId::SpeakerIdentification]);
    }

    fn carrier_quote_input() -> CallInput {
        input_from(&[
            ("A", "Morning, this is Mike with Swift Trucking, I've got a truck empty in Dallas."),
            ("B", "I've got one going to Atlanta, it pays $2,400, picks up tomorrow morning."),
            ("A", "What's it paying after fuel? Can you do twenty-six hundred? Our MC is 987654."),
            ("B", "Best I can do is $2,500 all in."),
            ("A", "Alright, book it."),
        ])
    }

    fn input_from(lines: &[(&str, &str)]) -> CallInput {
        let utterances: Vec<Utterance> = lines
            .iter()
            .enumerate()
            .map(|(index, (speaker, text))| {
                let start = index as u64 * 2_000;
                Utterance::new(*speaker, *text, start, start + 1_900)
            })
            .collect();
        let transcript_text =
            lines.iter().map(|(_, text)| *text).collect::<Vec<_>>().join(" ");

        CallInput {
            transcript_text,
            utterances,
            metadata: CallMetadata {
                call_id: CallId("call-coord-1".to_string()),
                organization_id: OrgId("org-freightco".to_string()),
                call_date: Utc::now(),
            },
        }
    }
}
