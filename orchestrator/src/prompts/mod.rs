//! Text shown to manager agents
//!
//! The manager's own system instruction comes from its prompt (by default the
//! `manager_template`). The decision protocol is appended to every context
//! the supervised executor renders, so it applies whatever prompt is used.

mod manager;

pub use manager::DECISION_PROTOCOL;
