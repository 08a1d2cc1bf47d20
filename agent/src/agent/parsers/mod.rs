//! Tool call parsers for models that write calls into their content
//!
//! Native `tool_calls` are always preferred. When a model prints the call as
//! text instead, the registry tries each parser in priority order and
//! returns the first hit together with the parser name for logging.

use crate::llm::ToolCall;

mod json_call;
mod xml_function;

pub use json_call::JsonCallParser;
pub use xml_function::XmlFunctionParser;

/// Trait for parsing tool calls from content
pub trait ToolCallParser: Send + Sync {
    /// Returns `Some(ToolCall)` if the content matches this parser's format
    fn parse(&self, content: &str) -> Option<ToolCall>;

    /// Parser name for logging/debugging
    fn name(&self) -> &'static str;

    /// Priority (higher = try first)
    fn priority(&self) -> u32;
}

/// Registry of tool call parsers
pub struct ToolCallParserRegistry {
    parsers: Vec<Box<dyn ToolCallParser>>,
}

impl Default for ToolCallParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallParserRegistry {
    /// Create a new registry with all built-in parsers
    pub fn new() -> Self {
        let mut parsers: Vec<Box<dyn ToolCallParser>> =
            vec![Box::new(JsonCallParser), Box::new(XmlFunctionParser)];

        parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        Self { parsers }
    }

    /// Try to parse content as a tool call
    pub fn parse(&self, content: &str) -> Option<(ToolCall, &'static str)> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        self.parsers
            .iter()
            .find_map(|parser| parser.parse(content).map(|call| (call, parser.name())))
    }

    /// Get list of registered parser names (for debugging)
    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let registry = ToolCallParserRegistry::new();
        assert_eq!(
            registry.parser_names(),
            vec!["JsonCallParser", "XmlFunctionParser"]
        );
    }

    #[test]
    fn test_registry_rejects_plain_text() {
        let registry = ToolCallParserRegistry::new();

        assert!(registry.parse("The answer is 4.").is_none());
        assert!(registry.parse("").is_none());
        assert!(registry.parse("{ incomplete").is_none());
    }

    #[test]
    fn test_registry_dispatches_by_format() {
        let registry = ToolCallParserRegistry::new();

        let (call, parser) = registry
            .parse(r#"{"name": "date", "arguments": {}}"#)
            .unwrap();
        assert_eq!(call.name(), "date");
        assert_eq!(parser, "JsonCallParser");

        let (call, parser) = registry
            .parse("<function=calculator><parameter=expression>2*3</parameter></function>")
            .unwrap();
        assert_eq!(call.name(), "calculator");
        assert_eq!(parser, "XmlFunctionParser");
    }
}
