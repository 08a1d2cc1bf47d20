//! Sequential executor
//!
//! Agents run once each, in roster order. The task is the first agent's
//! input; every later agent receives its predecessor's output. The first
//! failure ends the run. The iteration bound caps the number of steps.

use crate::result::{Outcome, ResultAggregator, RunError};
use crate::roster::AgentRoster;

/// Execution state
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// About to run the agent at this position
    Running(usize),
    Completed,
    Failed(RunError),
}

pub(crate) async fn execute(
    workflow: &str,
    roster: &AgentRoster,
    task: &str,
    bound: usize,
    logging: bool,
    steps: &mut ResultAggregator,
) -> Outcome {
    let agents: Vec<_> = roster.iter().collect();
    let mut carried = task.to_string();
    let mut state = State::Running(0);

    loop {
        state = match state {
            State::Running(i) if i >= agents.len() => State::Completed,
            State::Running(i) if i >= bound => {
                tracing::warn!(
                    workflow,
                    limit = bound,
                    skipped = agents.len() - i,
                    "iteration limit reached before every agent ran"
                );
                State::Failed(RunError::IterationLimitExceeded { limit: bound })
            }
            State::Running(i) => {
                let agent = agents[i];
                if logging {
                    tracing::info!(workflow, step = i, agent = agent.name(), "step started");
                }

                match agent.run(&carried).await {
                    Ok(output) => {
                        steps.record_success(agent.name(), carried.as_str(), output.as_str());
                        if logging {
                            tracing::info!(workflow, step = i, agent = agent.name(), "step completed");
                        }
                        carried = output;
                        State::Running(i + 1)
                    }
                    Err(e) => {
                        let error = RunError::from_agent(agent.name(), &e);
                        steps.record_failure(agent.name(), carried.as_str(), "", error.clone());
                        State::Failed(error)
                    }
                }
            }
            State::Completed => return Outcome::Completed(carried),
            State::Failed(error) => return Outcome::Failed(error),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::{AgentError, FnAgent, ToolError};
    use std::sync::Arc;

    fn suffix_agent(name: &str) -> Arc<FnAgent> {
        let suffix = format!("+{name}");
        Arc::new(FnAgent::new(name, move |input| {
            let suffix = suffix.clone();
            async move { Ok(format!("{input}{suffix}")) }
        }))
    }

    fn roster(names: &[&str]) -> AgentRoster {
        let mut roster = AgentRoster::new();
        for name in names {
            roster.insert(suffix_agent(name)).unwrap();
        }
        roster
    }

    #[tokio::test]
    async fn test_outputs_chain_in_order() {
        let mut steps = ResultAggregator::new();
        let outcome = execute("w", &roster(&["a", "b", "c"]), "t", 10, false, &mut steps).await;

        assert_eq!(outcome, Outcome::Completed("t+a+b+c".into()));
        let inputs: Vec<_> = steps.history().iter().map(|s| s.input.as_str()).collect();
        assert_eq!(inputs, vec!["t", "t+a", "t+a+b"]);
    }

    #[tokio::test]
    async fn test_bound_equal_to_agent_count_runs_all() {
        let mut steps = ResultAggregator::new();
        let outcome = execute("w", &roster(&["a", "b"]), "t", 2, false, &mut steps).await;
        assert_eq!(outcome, Outcome::Completed("t+a+b".into()));
    }

    #[tokio::test]
    async fn test_bound_below_agent_count_fails_after_bound_steps() {
        let mut steps = ResultAggregator::new();
        let outcome = execute("w", &roster(&["a", "b", "c"]), "t", 2, false, &mut steps).await;

        assert_eq!(
            outcome,
            Outcome::Failed(RunError::IterationLimitExceeded { limit: 2 })
        );
        assert_eq!(steps.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_stops_the_chain() {
        let mut roster = roster(&["a"]);
        roster
            .insert(Arc::new(FnAgent::new("broken", |_| async move {
                Err(AgentError::ToolExecution {
                    tool: "search".into(),
                    source: ToolError::Fatal("quota exceeded".into()),
                })
            })))
            .unwrap();
        roster.insert(suffix_agent("never")).unwrap();

        let mut steps = ResultAggregator::new();
        let outcome = execute("w", &roster, "t", 10, false, &mut steps).await;

        assert!(matches!(
            outcome,
            Outcome::Failed(RunError::ToolExecution { ref agent, .. }) if agent == "broken"
        ));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps.history()[1].input, "t+a");
        assert!(steps.history()[1].error.is_some());
    }
}
