//! Agent trait and the builtin analyzer implementations.
//!
//! Each agent is a single-responsibility analyzer: it reads the context,
//! produces exactly one typed output, and never decides routing; that is the
//! coordinator's job. Failures are values (`AgentError`), absorbed into the
//! context as `Failed` outputs, never propagated as panics or pipeline aborts.

pub mod classification;
pub mod entity;
mod lexicon;
pub mod load;
pub mod rate;
pub mod speaker;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::AgentContext;
use crate::output::{AgentId, AgentPayload, TypedPayload};
use crate::registry::AgentDescriptor;

/// Why one agent invocation failed. Recorded on its own AgentOutput; sibling
/// agents and unrelated later phases keep running.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("dependency {0} has not completed")]
    MissingDependency(AgentId),
    #[error("timed out after {0}ms")]
    Timeout(u64),
    #[error("invalid input: {0}")]
    Invalid(String),
}

/// A typed analyzer. The associated `Output` ties the implementation to its
/// payload variant at compile time, so the coordinator dispatches without
/// runtime type probing.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    type Output: TypedPayload + Send;

    const ID: AgentId;

    /// Registry entry declaring dependencies and the produced payload.
    fn descriptor() -> AgentDescriptor;

    async fn run(&self, context: &AgentContext) -> Result<Self::Output, AgentError>;
}

/// Object-safe adapter over [`Agent`] used by the coordinator for dispatch.
#[async_trait]
pub trait ErasedAgent: Send + Sync {
    fn id(&self) -> AgentId;

    async fn execute(&self, context: &AgentContext) -> Result<AgentPayload, AgentError>;
}

#[async_trait]
impl<A> ErasedAgent for A
where
    A: Agent,
{
    fn id(&self) -> AgentId {
        A::ID
    }

    async fn execute(&self, context: &AgentContext) -> Result<AgentPayload, AgentError> {
        Ok(self.run(context).await?.into_payload())
    }
}
