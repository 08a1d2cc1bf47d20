//! Manager context rendering

use std::fmt::Write;

use relay_agent::text::truncate_chars;

use crate::prompts::DECISION_PROTOCOL;
use crate::result::StepRecord;
use crate::roster::AgentRoster;

/// How much of the history the manager sees
///
/// Every step keeps its agent name. The `window` most recent steps show input
/// and output up to `recent_chars`; older steps are cut to `summary_chars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    pub window: usize,
    pub recent_chars: usize,
    pub summary_chars: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            window: 3,
            recent_chars: 2000,
            summary_chars: 200,
        }
    }
}

/// Render the text handed to the manager for one decision
pub(crate) fn render(
    task: &str,
    workers: &AgentRoster,
    history: &[StepRecord],
    remaining: usize,
    policy: &HistoryPolicy,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "## Task\n{}\n", task.trim());

    out.push_str("## Team\n");
    for worker in workers.iter() {
        match worker.description() {
            Some(description) if !description.trim().is_empty() => {
                let _ = writeln!(out, "- {}: {}", worker.name(), description.trim());
            }
            _ => {
                let _ = writeln!(out, "- {}", worker.name());
            }
        }
    }

    out.push_str("\n## Progress so far\n");
    if history.is_empty() {
        out.push_str("No steps yet.\n");
    }
    let recent_from = history.len().saturating_sub(policy.window);
    for (position, step) in history.iter().enumerate() {
        let limit = if position >= recent_from {
            policy.recent_chars
        } else {
            policy.summary_chars
        };
        let _ = writeln!(out, "Step {} ({}):", step.index + 1, step.agent);
        let _ = writeln!(out, "  input: {}", truncate_chars(step.input.trim(), limit));
        if !step.output.trim().is_empty() {
            let _ = writeln!(out, "  output: {}", truncate_chars(step.output.trim(), limit));
        }
        if let Some(error) = &step.error {
            let _ = writeln!(out, "  error: {}", error);
        }
    }

    let _ = writeln!(out, "\n## Budget\n{remaining} step(s) remaining.\n");
    out.push_str(DECISION_PROTOCOL);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RunError;
    use relay_agent::FnAgent;
    use std::sync::Arc;

    fn workers() -> AgentRoster {
        let mut roster = AgentRoster::new();
        roster
            .insert(Arc::new(
                FnAgent::new("researcher", |i| async move { Ok(i) }).with_description("Finds facts"),
            ))
            .unwrap();
        roster
            .insert(Arc::new(FnAgent::new("writer", |i| async move { Ok(i) })))
            .unwrap();
        roster
    }

    fn step(index: usize, output: &str) -> StepRecord {
        StepRecord {
            index,
            agent: "researcher".into(),
            input: format!("input {index}"),
            output: output.into(),
            error: None,
        }
    }

    #[test]
    fn test_first_context_lists_team_and_budget() {
        let ctx = render("Write a report", &workers(), &[], 5, &HistoryPolicy::default());
        assert!(ctx.starts_with("## Task\nWrite a report\n"));
        assert!(ctx.contains("- researcher: Finds facts\n"));
        assert!(ctx.contains("- writer\n"));
        assert!(ctx.contains("No steps yet."));
        assert!(ctx.contains("5 step(s) remaining."));
        assert!(ctx.ends_with(DECISION_PROTOCOL));
    }

    #[test]
    fn test_older_steps_are_summarised() {
        let long = "x".repeat(50);
        let history = vec![step(0, &long), step(1, &long), step(2, &long)];
        let policy = HistoryPolicy {
            window: 1,
            recent_chars: 40,
            summary_chars: 10,
        };

        let ctx = render("t", &workers(), &history, 2, &policy);
        assert_eq!(ctx.matches(&format!("output: {}…", "x".repeat(10))).count(), 2);
        assert_eq!(ctx.matches(&format!("output: {}…", "x".repeat(40))).count(), 1);
        assert!(ctx.contains("Step 3 (researcher):"));
    }

    #[test]
    fn test_errors_are_shown() {
        let mut failed = step(0, "gibberish");
        failed.agent = "boss".into();
        failed.error = Some(RunError::ManagerParse {
            attempts: 1,
            reason: "no delegate or complete decision found".into(),
        });

        let ctx = render("t", &workers(), &[failed], 1, &HistoryPolicy::default());
        assert!(ctx.contains("Step 1 (boss):"));
        assert!(ctx.contains("error: manager output unparseable 1 time(s) in a row"));
    }
}
