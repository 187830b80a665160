//! Static catalog of available agents and their declared dependencies.
//!
//! The registry holds no per-call state. It is constructed once at process
//! start and shared by reference with every pipeline run; it exists for plan
//! validation and construction, not for runtime dispatch.

use std::collections::{BTreeMap, BTreeSet};

use crate::output::AgentId;

/// Capability entry: what an agent needs and what it produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub dependencies: BTreeSet<AgentId>,
    pub produces: &'static str,
}

impl AgentDescriptor {
    pub fn new(id: AgentId, dependencies: &[AgentId], produces: &'static str) -> Self {
        Self { id, dependencies: dependencies.iter().copied().collect(), produces }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AgentRegistry {
    entries: BTreeMap<AgentId, AgentDescriptor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shipped with the pipeline.
    pub fn with_builtin_agents() -> Self {
        let mut registry = Self::new();
        registry.initialize();
        registry
    }

    /// Seed the builtin descriptors. Idempotent: entries already present
    /// (including replacements installed via `register`) are left untouched.
    pub fn initialize(&mut self) {
        for descriptor in builtin_descriptors() {
            self.entries.entry(descriptor.id).or_insert(descriptor);
        }
    }

    /// Add or replace an entry by agent id.
    pub fn register(&mut self, descriptor: AgentDescriptor) {
        self.entries.insert(descriptor.id, descriptor);
    }

    pub fn has(&self, id: AgentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentDescriptor> {
        self.entries.get(&id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset hook for tests. Production code never clears the catalog; after
    /// a clear, `initialize()` must run before any plan can be built.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn builtin_descriptors() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new(AgentId::Classification, &[], "classification_result"),
        AgentDescriptor::new(
            AgentId::SpeakerIdentification,
            &[AgentId::Classification],
            "speaker_role_map",
        ),
        AgentDescriptor::new(
            AgentId::RateNegotiation,
            &[AgentId::Classification, AgentId::SpeakerIdentification],
            "rate_negotiation_output",
        ),
        AgentDescriptor::new(AgentId::LoadExtraction, &[AgentId::Classification], "load_extraction_output"),
        AgentDescriptor::new(
            AgentId::EntityExtraction,
            &[AgentId::Classification],
            "entity_extraction_output",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use crate::output::AgentId;

    use super::{AgentDescriptor, AgentRegistry};

    #[test]
    fn builtin_catalog_covers_all_agents() {
        let registry = AgentRegistry::with_builtin_agents();
        for agent in AgentId::ALL {
            assert!(registry.has(agent), "{agent} missing from builtin catalog");
        }
        assert_eq!(registry.len(), AgentId::ALL.len());
    }

    #[test]
    fn initialize_is_idempotent_and_preserves_replacements() {
        let mut registry = AgentRegistry::with_builtin_agents();
        let replacement =
            AgentDescriptor::new(AgentId::EntityExtraction, &[], "entity_extraction_output");
        registry.register(replacement.clone());

        registry.initialize();
        registry.initialize();

        assert_eq!(registry.len(), AgentId::ALL.len());
        assert_eq!(registry.get(AgentId::EntityExtraction), Some(&replacement));
    }

    #[test]
    fn clear_empties_catalog_until_reinitialized() {
        let mut registry = AgentRegistry::with_builtin_agents();
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.has(AgentId::Classification));

        registry.initialize();
        assert!(registry.has(AgentId::Classification));
    }

    #[test]
    fn classification_has_no_dependencies_and_speaker_requires_it() {
        let registry = AgentRegistry::with_builtin_agents();
        let classification =
            registry.get(AgentId::Classification).expect("classification registered");
        assert!(classification.dependencies.is_empty());

        let speaker =
            registry.get(AgentId::SpeakerIdentification).expect("speaker identification registered");
        assert!(speaker.dependencies.contains(&AgentId::Classification));
    }
}
