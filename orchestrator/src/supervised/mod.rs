//! Supervised executor
//!
//! A manager agent drives the run. Each turn it receives the task, the team,
//! the history so far and the remaining budget, and answers with one
//! decision: delegate a sub-task to a worker, or complete the task.
//!
//! The loop ends on the first of:
//! - a `Complete` decision (success)
//! - a manager or worker failure, or a delegation to an unknown worker
//! - too many unparseable decisions in a row
//! - an exhausted iteration budget
//!
//! Worker runs and unparseable decisions consume budget; a `Complete` does not.

use relay_agent::AgentRunner;

use crate::result::{Outcome, ResultAggregator, RunError};
use crate::roster::AgentRoster;

mod context;
mod decision;

pub use context::HistoryPolicy;
pub use decision::{
    Decision, DecisionParser, DecisionParserRegistry, JsonDecisionParser, ParseAttempt,
    TaggedDecisionParser,
};

/// Tuning for the supervised loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Unparseable decisions in a row that end the run
    pub max_consecutive_unparseable: usize,
    pub history: HistoryPolicy,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_consecutive_unparseable: 2,
            history: HistoryPolicy::default(),
        }
    }
}

/// One supervised run over a fixed roster snapshot
pub(crate) struct Supervisor<'a> {
    pub workflow: &'a str,
    pub manager: &'a dyn AgentRunner,
    pub workers: &'a AgentRoster,
    pub bound: usize,
    pub settings: &'a SupervisorSettings,
    pub parsers: &'a DecisionParserRegistry,
    pub logging: bool,
}

impl Supervisor<'_> {
    pub async fn run(&self, task: &str, steps: &mut ResultAggregator) -> Outcome {
        let manager = self.manager.name();
        let mut remaining = self.bound;
        let mut unparseable = 0usize;

        while remaining > 0 {
            let context = context::render(
                task,
                self.workers,
                steps.history(),
                remaining,
                &self.settings.history,
            );

            let response = match self.manager.run(&context).await {
                Ok(response) => response,
                Err(e) => {
                    let error = RunError::from_agent(manager, &e);
                    steps.record_failure(manager, context, "", error.clone());
                    return Outcome::Failed(error);
                }
            };

            match self.parsers.parse(&response) {
                Decision::Complete { output } => {
                    if self.logging {
                        tracing::info!(workflow = self.workflow, manager, "manager completed the task");
                    }
                    return Outcome::Completed(output);
                }

                Decision::Delegate { agent, input } => {
                    unparseable = 0;

                    let Some(worker) = self.workers.resolve(&agent) else {
                        let error = RunError::ManagerDelegation {
                            requested: agent,
                            available: self.workers.names(),
                        };
                        steps.record_failure(manager, context, response, error.clone());
                        return Outcome::Failed(error);
                    };

                    remaining -= 1;
                    if self.logging {
                        tracing::info!(
                            workflow = self.workflow,
                            step = steps.len(),
                            agent = worker.name(),
                            remaining,
                            "delegating"
                        );
                    }

                    match worker.run(&input).await {
                        Ok(output) => {
                            steps.record_success(worker.name(), input, output);
                        }
                        Err(e) => {
                            let error = RunError::from_agent(worker.name(), &e);
                            steps.record_failure(worker.name(), input, "", error.clone());
                            return Outcome::Failed(error);
                        }
                    }
                }

                Decision::Unparseable { reason } => {
                    unparseable += 1;
                    remaining -= 1;
                    tracing::warn!(
                        workflow = self.workflow,
                        manager,
                        attempts = unparseable,
                        %reason,
                        "manager response unparseable"
                    );

                    let error = RunError::ManagerParse {
                        attempts: unparseable,
                        reason,
                    };
                    steps.record_failure(manager, context, response, error.clone());
                    if unparseable >= self.settings.max_consecutive_unparseable {
                        return Outcome::Failed(error);
                    }
                }
            }
        }

        Outcome::Failed(RunError::IterationLimitExceeded { limit: self.bound })
    }
}
