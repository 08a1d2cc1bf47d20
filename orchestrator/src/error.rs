//! Configuration and misuse errors
//!
//! These are returned eagerly by [`WorkflowBuilder::build`] and the roster
//! mutators. Failures that happen while a workflow runs are never returned
//! as errors; they are captured in the [`WorkflowResult`].
//!
//! [`WorkflowBuilder::build`]: crate::WorkflowBuilder::build
//! [`WorkflowResult`]: crate::WorkflowResult

/// Errors that can occur when configuring a workflow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow '{0}' has no agents")]
    EmptyWorkflow(String),

    #[error("agent name '{0}' is used more than once")]
    DuplicateAgentName(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("supervised workflow '{0}' requires a manager agent")]
    MissingManager(String),

    #[error("sequential workflow '{0}' does not take a manager agent")]
    UnexpectedManager(String),

    #[error("manager '{0}' cannot also be a worker")]
    ManagerIsWorker(String),

    #[error("iteration bound must be greater than zero")]
    InvalidIterationBound,

    #[error("unparseable decision threshold must be greater than zero")]
    InvalidParseThreshold,

    #[error("workflow '{0}' is running; agents cannot be added or removed until it finishes")]
    RunInProgress(String),

    #[error("unknown workflow mode '{0}' (expected 'sequential' or 'supervised')")]
    UnknownMode(String),
}
