//! Manager decision protocol

pub const DECISION_PROTOCOL: &str = r#"## How to respond
Reply with exactly ONE decision and nothing else.

To hand a sub-task to a team member:
{"action": "delegate", "agent": "<team member name>", "input": "<what they should do>"}

When the task is finished:
{"action": "complete", "output": "<final answer for the user>"}

Rules:
- Use a name exactly as listed under "Team".
- Give each team member everything it needs in "input"; it cannot see this conversation.
- Complete as soon as the progress so far answers the task.
- Never include more than one decision in a reply."#;
