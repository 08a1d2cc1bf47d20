/// Built-in prompt templates by identifier
pub(crate) fn template_text(identifier: &str) -> Option<&'static str> {
    let text = match identifier {
        "basic_prompt_template" => "You are {name}. {description}",
        "tool_aware_template" => "You are {name}. {description} You have access to tools: {tools}.",
        "connector_aware_template" => {
            "You are {name}. {description} You are connected to: {connectors}."
        }
        "fully_aware_template" => {
            "You are {name}. {description}\n\
             You can use the following tools: {tools}.\n\
             You are integrated with: {connectors}."
        }
        "manager_template" => {
            "You are {name}, the manager of a team of agents. {description}\n\
             You never do the work yourself: at every step you either hand one \
             sub-task to a team member or declare the task complete."
        }
        _ => return None,
    };
    Some(text)
}

/// Identifiers of all built-in templates
pub const TEMPLATE_NAMES: &[&str] = &[
    "basic_prompt_template",
    "tool_aware_template",
    "connector_aware_template",
    "fully_aware_template",
    "manager_template",
];

/// Instruction used when an agent is built without a prompt
pub(crate) const DEFAULT_INSTRUCTION: &str = "You are a smart AI agent designed to assist with various tasks.\n\
The following tools are at your disposal: {tools}.\n\
Your role is to perform the following task as described by the user: {description}\n\
Provide a detailed response based on the tools and your understanding of the problem.";
