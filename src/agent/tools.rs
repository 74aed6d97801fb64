//! Tool calls embedded in model responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call extracted from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Extracts tool calls from model responses.
pub trait ToolCallParser: Send + Sync {
    /// The first tool call in `response`, if any.
    fn parse(&self, response: &str) -> Option<ToolCall>;
}

/// Finds JSON tool calls, either bare in the text or in a ```json block.
///
/// Accepted shapes are `{"tool": ..., "arguments": {...}}` and
/// `{"name": ..., "parameters" | "args" | "arguments": {...}}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonToolCallParser;

impl ToolCallParser for JsonToolCallParser {
    fn parse(&self, response: &str) -> Option<ToolCall> {
        json_objects(response)
            .into_iter()
            .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
            .find_map(as_tool_call)
            .or_else(|| self.parse_code_block(response))
    }
}

impl JsonToolCallParser {
    fn parse_code_block(&self, response: &str) -> Option<ToolCall> {
        const OPEN: &str = "```json";
        let start = response.find(OPEN)? + OPEN.len();
        let rest = &response[start..];
        let end = rest.find("```")?;
        serde_json::from_str::<Value>(rest[..end].trim())
            .ok()
            .and_then(as_tool_call)
    }
}

fn as_tool_call(value: Value) -> Option<ToolCall> {
    let object = value.as_object()?;

    if let Some(name) = object.get("tool").and_then(Value::as_str) {
        let arguments = object
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        return Some(ToolCall {
            name: name.to_string(),
            arguments,
        });
    }

    // A bare "name" is too common in ordinary JSON to count on its own.
    let name = object.get("name").and_then(Value::as_str)?;
    let arguments = ["parameters", "args", "arguments"]
        .iter()
        .find_map(|key| object.get(*key))?
        .clone();
    Some(ToolCall {
        name: name.to_string(),
        arguments,
    })
}

/// Top-level balanced `{...}` spans, skipping braces inside strings.
fn json_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}
