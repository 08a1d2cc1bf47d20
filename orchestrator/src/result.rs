//! Run results
//!
//! Executors append a [`StepRecord`] per executed step through a
//! [`ResultAggregator`], then hand it their terminal [`Outcome`] to produce
//! the immutable [`WorkflowResult`].

use relay_agent::AgentError;
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowMode;

/// A failure captured during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    #[error("agent '{agent}' could not invoke its model: {message}")]
    ModelInvocation { agent: String, message: String },

    #[error("agent '{agent}' failed executing a tool: {message}")]
    ToolExecution { agent: String, message: String },

    #[error("manager delegated to unknown agent '{requested}' (available: {})", .available.join(", "))]
    ManagerDelegation {
        requested: String,
        available: Vec<String>,
    },

    #[error("manager output unparseable {attempts} time(s) in a row: {reason}")]
    ManagerParse { attempts: usize, reason: String },

    #[error("iteration limit of {limit} reached before the workflow completed")]
    IterationLimitExceeded { limit: usize },
}

impl RunError {
    /// Classify an agent failure
    pub fn from_agent(agent: &str, error: &AgentError) -> Self {
        match error {
            AgentError::ModelInvocation(e) => RunError::ModelInvocation {
                agent: agent.to_string(),
                message: e.to_string(),
            },
            AgentError::ToolExecution { .. } => RunError::ToolExecution {
                agent: agent.to_string(),
                message: error.to_string(),
            },
        }
    }
}

/// One executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub agent: String,
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

/// Terminal state of an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(String),
    Failed(RunError),
}

/// Result of one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowResult {
    workflow: String,
    mode: WorkflowMode,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RunError>,
    steps: Vec<StepRecord>,
}

impl WorkflowResult {
    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Present iff the run succeeded
    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    /// Present iff the run failed
    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }
}

/// Collects step records in execution order
#[derive(Debug, Default)]
pub struct ResultAggregator {
    steps: Vec<StepRecord>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; indices are assigned here, starting at 0
    pub fn record(
        &mut self,
        agent: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        error: Option<RunError>,
    ) -> usize {
        let index = self.steps.len();
        self.steps.push(StepRecord {
            index,
            agent: agent.into(),
            input: input.into(),
            output: output.into(),
            error,
        });
        index
    }

    pub fn record_success(
        &mut self,
        agent: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> usize {
        self.record(agent, input, output, None)
    }

    pub fn record_failure(
        &mut self,
        agent: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        error: RunError,
    ) -> usize {
        self.record(agent, input, output, Some(error))
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn finish(self, workflow: &str, mode: WorkflowMode, outcome: Outcome) -> WorkflowResult {
        let (success, final_output, error) = match outcome {
            Outcome::Completed(output) => (true, Some(output), None),
            Outcome::Failed(error) => (false, None, Some(error)),
        };
        WorkflowResult {
            workflow: workflow.to_string(),
            mode,
            success,
            final_output,
            error,
            steps: self.steps,
        }
    }
}

/// Static description of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: Option<String>,
    pub mode: WorkflowMode,
    pub agent_count: usize,
    pub agents: Vec<String>,
    pub has_manager: bool,
    pub manager_name: Option<String>,
    pub max_iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::{LlmError, ToolError};

    #[test]
    fn test_indices_are_gap_free() {
        let mut agg = ResultAggregator::new();
        assert_eq!(agg.record_success("a", "in", "out"), 0);
        assert_eq!(
            agg.record_failure(
                "b",
                "out",
                "",
                RunError::IterationLimitExceeded { limit: 2 }
            ),
            1
        );
        let indices: Vec<_> = agg.history().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_finish_sets_exactly_one_of_output_and_error() {
        let ok = ResultAggregator::new().finish(
            "w",
            WorkflowMode::Sequential,
            Outcome::Completed("done".into()),
        );
        assert!(ok.is_success());
        assert_eq!(ok.final_output(), Some("done"));
        assert!(ok.error().is_none());

        let failed = ResultAggregator::new().finish(
            "w",
            WorkflowMode::Supervised,
            Outcome::Failed(RunError::IterationLimitExceeded { limit: 1 }),
        );
        assert!(!failed.is_success());
        assert!(failed.final_output().is_none());
        assert_eq!(
            failed.error(),
            Some(&RunError::IterationLimitExceeded { limit: 1 })
        );
    }

    #[test]
    fn test_agent_errors_are_classified() {
        let model = AgentError::ModelInvocation(LlmError::Other("down".into()));
        assert!(matches!(
            RunError::from_agent("a", &model),
            RunError::ModelInvocation { ref agent, .. } if agent == "a"
        ));

        let tool = AgentError::ToolExecution {
            tool: "t".into(),
            source: ToolError::Fatal("boom".into()),
        };
        match RunError::from_agent("a", &tool) {
            RunError::ToolExecution { message, .. } => assert!(message.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_result_serializes_error_kind() {
        let mut agg = ResultAggregator::new();
        agg.record_failure(
            "boss",
            "ctx",
            "???",
            RunError::ManagerParse {
                attempts: 1,
                reason: "no decision".into(),
            },
        );
        let result = agg.finish(
            "w",
            WorkflowMode::Supervised,
            Outcome::Failed(RunError::ManagerDelegation {
                requested: "ghost".into(),
                available: vec!["a".into(), "b".into()],
            }),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "supervised");
        assert_eq!(json["error"]["kind"], "manager_delegation");
        assert_eq!(json["steps"][0]["error"]["kind"], "manager_parse");
        assert!(json.get("final_output").is_none());
        assert_eq!(
            result.error().unwrap().to_string(),
            "manager delegated to unknown agent 'ghost' (available: a, b)"
        );
    }
}
