//! Workflow definitions and execution
//!
//! A workflow is an ordered roster of agents plus a mode:
//! - `sequential`: every agent runs once, each consuming the previous output
//! - `supervised`: a manager agent delegates sub-tasks to the roster
//!
//! Both modes share one iteration bound. Runs never return errors; every
//! run-time failure is captured in the [`WorkflowResult`].

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_agent::AgentRunner;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::result::{ResultAggregator, WorkflowResult, WorkflowSummary};
use crate::roster::AgentRoster;
use crate::sequential;
use crate::supervised::{DecisionParserRegistry, Supervisor, SupervisorSettings};

/// Default bound on steps per run
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Sequential,
    Supervised,
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowMode::Sequential => f.write_str("sequential"),
            WorkflowMode::Supervised => f.write_str("supervised"),
        }
    }
}

impl FromStr for WorkflowMode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(WorkflowMode::Sequential),
            "supervised" => Ok(WorkflowMode::Supervised),
            other => Err(WorkflowError::UnknownMode(other.to_string())),
        }
    }
}

enum Kind {
    Sequential,
    Supervised {
        manager: Arc<dyn AgentRunner>,
        settings: SupervisorSettings,
        parsers: DecisionParserRegistry,
    },
}

/// Decrements the active run count when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicUsize);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A validated workflow
pub struct Workflow {
    name: String,
    description: Option<String>,
    kind: Kind,
    roster: Mutex<AgentRoster>,
    active_runs: AtomicUsize,
    max_iterations: usize,
    logging: bool,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("max_iterations", &self.max_iterations)
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn mode(&self) -> WorkflowMode {
        match self.kind {
            Kind::Sequential => WorkflowMode::Sequential,
            Kind::Supervised { .. } => WorkflowMode::Supervised,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn manager(&self) -> Option<&Arc<dyn AgentRunner>> {
        match &self.kind {
            Kind::Supervised { manager, .. } => Some(manager),
            Kind::Sequential => None,
        }
    }

    fn roster(&self) -> MutexGuard<'_, AgentRoster> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.roster().names()
    }

    pub fn is_running(&self) -> bool {
        self.active_runs.load(Ordering::SeqCst) > 0
    }

    /// Execute the workflow on a task
    ///
    /// The roster is snapshotted at the start; mutation is refused until the
    /// run finishes.
    pub async fn run(&self, task: &str) -> WorkflowResult {
        let (snapshot, _guard) = {
            let roster = self.roster();
            self.active_runs.fetch_add(1, Ordering::SeqCst);
            (roster.clone(), RunGuard(&self.active_runs))
        };

        let mode = self.mode();
        if self.logging {
            tracing::info!(
                workflow = %self.name,
                %mode,
                agents = snapshot.len(),
                max_iterations = self.max_iterations,
                "workflow started"
            );
        }

        let mut steps = ResultAggregator::new();
        let outcome = match &self.kind {
            Kind::Sequential => {
                sequential::execute(
                    &self.name,
                    &snapshot,
                    task,
                    self.max_iterations,
                    self.logging,
                    &mut steps,
                )
                .await
            }
            Kind::Supervised {
                manager,
                settings,
                parsers,
            } => {
                let supervisor = Supervisor {
                    workflow: &self.name,
                    manager: manager.as_ref(),
                    workers: &snapshot,
                    bound: self.max_iterations,
                    settings,
                    parsers,
                    logging: self.logging,
                };
                supervisor.run(task, &mut steps).await
            }
        };

        let result = steps.finish(&self.name, mode, outcome);
        if self.logging {
            match result.error() {
                None => tracing::info!(
                    workflow = %self.name,
                    steps = result.steps().len(),
                    "workflow completed"
                ),
                Some(error) => tracing::info!(
                    workflow = %self.name,
                    steps = result.steps().len(),
                    %error,
                    "workflow failed"
                ),
            }
        }
        result
    }

    /// Append an agent to the roster
    pub fn add_agent(&self, agent: Arc<dyn AgentRunner>) -> Result<(), WorkflowError> {
        let mut roster = self.roster();
        if self.is_running() {
            return Err(WorkflowError::RunInProgress(self.name.clone()));
        }
        if self.manager().is_some_and(|m| m.name() == agent.name()) {
            return Err(WorkflowError::ManagerIsWorker(agent.name().to_string()));
        }
        roster.insert(agent)
    }

    /// Remove an agent by name; a workflow never becomes empty
    pub fn remove_agent(&self, name: &str) -> Result<Arc<dyn AgentRunner>, WorkflowError> {
        let mut roster = self.roster();
        if self.is_running() {
            return Err(WorkflowError::RunInProgress(self.name.clone()));
        }
        if !roster.contains(name) {
            return Err(WorkflowError::AgentNotFound(name.to_string()));
        }
        if roster.len() == 1 {
            return Err(WorkflowError::EmptyWorkflow(self.name.clone()));
        }
        roster.remove(name)
    }

    pub fn summary(&self) -> WorkflowSummary {
        let agents = self.agent_names();
        let manager_name = self.manager().map(|m| m.name().to_string());
        WorkflowSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            mode: self.mode(),
            agent_count: agents.len(),
            agents,
            has_manager: manager_name.is_some(),
            manager_name,
            max_iterations: self.max_iterations,
        }
    }
}

/// Builder for [`Workflow`]; `build` validates the whole configuration
pub struct WorkflowBuilder {
    name: String,
    description: Option<String>,
    mode: WorkflowMode,
    agents: Vec<Arc<dyn AgentRunner>>,
    manager: Option<Arc<dyn AgentRunner>>,
    max_iterations: usize,
    logging: bool,
    settings: SupervisorSettings,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            mode: WorkflowMode::Sequential,
            agents: Vec::new(),
            manager: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            logging: false,
            settings: SupervisorSettings::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mode(mut self, mode: WorkflowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_agent(mut self, agent: Arc<dyn AgentRunner>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn AgentRunner>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn with_manager(mut self, manager: Arc<dyn AgentRunner>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Log workflow and step lifecycle at info level
    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_supervisor_settings(mut self, settings: SupervisorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Workflow, WorkflowError> {
        if self.max_iterations == 0 {
            return Err(WorkflowError::InvalidIterationBound);
        }
        if self.agents.is_empty() {
            return Err(WorkflowError::EmptyWorkflow(self.name));
        }

        let mut roster = AgentRoster::new();
        for agent in self.agents {
            roster.insert(agent)?;
        }

        let kind = match (self.mode, self.manager) {
            (WorkflowMode::Sequential, None) => Kind::Sequential,
            (WorkflowMode::Sequential, Some(_)) => {
                return Err(WorkflowError::UnexpectedManager(self.name))
            }
            (WorkflowMode::Supervised, None) => return Err(WorkflowError::MissingManager(self.name)),
            (WorkflowMode::Supervised, Some(manager)) => {
                if roster.contains(manager.name()) {
                    return Err(WorkflowError::ManagerIsWorker(manager.name().to_string()));
                }
                if self.settings.max_consecutive_unparseable == 0 {
                    return Err(WorkflowError::InvalidParseThreshold);
                }
                Kind::Supervised {
                    manager,
                    settings: self.settings,
                    parsers: DecisionParserRegistry::new(),
                }
            }
        };

        Ok(Workflow {
            name: self.name,
            description: self.description,
            kind,
            roster: Mutex::new(roster),
            active_runs: AtomicUsize::new(0),
            max_iterations: self.max_iterations,
            logging: self.logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::FnAgent;

    fn echo(name: &str) -> Arc<dyn AgentRunner> {
        Arc::new(FnAgent::new(name, |input| async move { Ok(input) }))
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Supervised".parse::<WorkflowMode>(), Ok(WorkflowMode::Supervised));
        assert_eq!(WorkflowMode::Sequential.to_string(), "sequential");
        assert_eq!(
            "parallel".parse::<WorkflowMode>(),
            Err(WorkflowError::UnknownMode("parallel".into()))
        );
    }

    #[test]
    fn test_build_validation() {
        let err = |builder: WorkflowBuilder| builder.build().err();

        assert_eq!(
            err(Workflow::builder("w")),
            Some(WorkflowError::EmptyWorkflow("w".into()))
        );
        assert_eq!(
            err(Workflow::builder("w").with_agent(echo("a")).with_max_iterations(0)),
            Some(WorkflowError::InvalidIterationBound)
        );
        assert_eq!(
            err(Workflow::builder("w").with_agent(echo("a")).with_agent(echo("a"))),
            Some(WorkflowError::DuplicateAgentName("a".into()))
        );
        assert_eq!(
            err(Workflow::builder("w")
                .with_mode(WorkflowMode::Supervised)
                .with_agent(echo("a"))),
            Some(WorkflowError::MissingManager("w".into()))
        );
        assert_eq!(
            err(Workflow::builder("w").with_agent(echo("a")).with_manager(echo("m"))),
            Some(WorkflowError::UnexpectedManager("w".into()))
        );
        assert_eq!(
            err(Workflow::builder("w")
                .with_mode(WorkflowMode::Supervised)
                .with_agent(echo("a"))
                .with_manager(echo("a"))),
            Some(WorkflowError::ManagerIsWorker("a".into()))
        );
        assert_eq!(
            err(Workflow::builder("w")
                .with_mode(WorkflowMode::Supervised)
                .with_agent(echo("a"))
                .with_manager(echo("m"))
                .with_supervisor_settings(SupervisorSettings {
                    max_consecutive_unparseable: 0,
                    ..Default::default()
                })),
            Some(WorkflowError::InvalidParseThreshold)
        );
    }

    #[test]
    fn test_add_and_remove_between_runs() {
        let workflow = Workflow::builder("w")
            .with_mode(WorkflowMode::Supervised)
            .with_agent(echo("a"))
            .with_manager(echo("boss"))
            .build()
            .unwrap();

        workflow.add_agent(echo("b")).unwrap();
        assert_eq!(
            workflow.add_agent(echo("b")).err(),
            Some(WorkflowError::DuplicateAgentName("b".into()))
        );
        assert_eq!(
            workflow.add_agent(echo("boss")).err(),
            Some(WorkflowError::ManagerIsWorker("boss".into()))
        );
        assert_eq!(workflow.agent_names(), vec!["a", "b"]);

        workflow.remove_agent("a").unwrap();
        assert_eq!(
            workflow.remove_agent("a").err(),
            Some(WorkflowError::AgentNotFound("a".into()))
        );
        assert_eq!(
            workflow.remove_agent("b").err(),
            Some(WorkflowError::EmptyWorkflow("w".into()))
        );
    }

    #[test]
    fn test_summary() {
        let workflow = Workflow::builder("research")
            .with_description("Research then write")
            .with_mode(WorkflowMode::Supervised)
            .with_agents([echo("researcher"), echo("writer")])
            .with_manager(echo("lead"))
            .with_max_iterations(6)
            .build()
            .unwrap();

        let summary = workflow.summary();
        assert_eq!(summary.name, "research");
        assert_eq!(summary.description.as_deref(), Some("Research then write"));
        assert_eq!(summary.mode, WorkflowMode::Supervised);
        assert_eq!(summary.agent_count, 2);
        assert_eq!(summary.agents, vec!["researcher", "writer"]);
        assert!(summary.has_manager);
        assert_eq!(summary.manager_name.as_deref(), Some("lead"));
        assert_eq!(summary.max_iterations, 6);
    }

    #[test]
    fn test_run_from_blocking_context() {
        let workflow = Workflow::builder("w").with_agent(echo("a")).build().unwrap();
        let result = tokio_test::block_on(workflow.run("hi"));
        assert_eq!(result.final_output(), Some("hi"));
    }

    #[tokio::test]
    async fn test_run_releases_the_roster() {
        let workflow = Workflow::builder("w").with_agent(echo("a")).build().unwrap();
        let result = workflow.run("hello").await;

        assert!(result.is_success());
        assert!(!workflow.is_running());
        workflow.add_agent(echo("b")).unwrap();
    }
}
