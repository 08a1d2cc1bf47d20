//! Ordered agent roster

use std::collections::HashMap;
use std::sync::Arc;

use relay_agent::AgentRunner;

use crate::error::WorkflowError;

/// Agents of a workflow, in execution order, addressable by name
#[derive(Clone, Default)]
pub struct AgentRoster {
    agents: Vec<Arc<dyn AgentRunner>>,
    index: HashMap<String, usize>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, agent: Arc<dyn AgentRunner>) -> Result<(), WorkflowError> {
        let name = agent.name().to_string();
        if self.index.contains_key(&name) {
            return Err(WorkflowError::DuplicateAgentName(name));
        }
        self.index.insert(name, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn AgentRunner>, WorkflowError> {
        let position = self
            .index
            .remove(name)
            .ok_or_else(|| WorkflowError::AgentNotFound(name.to_string()))?;
        let removed = self.agents.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(removed)
    }

    /// Exact name lookup
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentRunner>> {
        self.index.get(name).map(|&i| &self.agents[i])
    }

    /// Resolve a name as a manager would write it: exact match first, then a
    /// case-insensitive match if exactly one agent qualifies. Never a
    /// substring match.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn AgentRunner>> {
        let name = name.trim();
        if let Some(agent) = self.get(name) {
            return Some(agent);
        }

        let mut matches = self
            .agents
            .iter()
            .filter(|agent| agent.name().eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(agent), None) => Some(agent),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AgentRunner>> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::FnAgent;

    fn agent(name: &str) -> Arc<dyn AgentRunner> {
        Arc::new(FnAgent::new(name, |input| async move { Ok(input) }))
    }

    fn roster(names: &[&str]) -> AgentRoster {
        let mut roster = AgentRoster::new();
        for name in names {
            roster.insert(agent(name)).unwrap();
        }
        roster
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut roster = roster(&["writer"]);
        assert_eq!(
            roster.insert(agent("writer")).unwrap_err(),
            WorkflowError::DuplicateAgentName("writer".into())
        );
    }

    #[test]
    fn test_remove_keeps_order_and_index() {
        let mut roster = roster(&["a", "b", "c"]);
        roster.remove("a").unwrap();
        assert_eq!(roster.names(), vec!["b", "c"]);
        assert_eq!(roster.get("c").unwrap().name(), "c");
        assert_eq!(
            roster.remove("a").err(),
            Some(WorkflowError::AgentNotFound("a".into()))
        );
    }

    #[test]
    fn test_resolve_exact_then_case_insensitive_never_substring() {
        let roster = roster(&["Researcher", "writer"]);
        assert_eq!(roster.resolve("Researcher").unwrap().name(), "Researcher");
        assert_eq!(roster.resolve("researcher").unwrap().name(), "Researcher");
        assert_eq!(roster.resolve(" WRITER ").unwrap().name(), "writer");
        assert!(roster.resolve("Research").is_none());
        assert!(roster.resolve("the writer").is_none());
    }

    #[test]
    fn test_resolve_ambiguous_case_insensitive_is_none() {
        let roster = roster(&["Writer", "WRITER"]);
        assert!(roster.resolve("writer").is_none());
        assert_eq!(roster.resolve("WRITER").unwrap().name(), "WRITER");
    }
}
