//! Tool-call syntax: instructions for the model and an incremental scanner.
//!
//! A call looks like
//! `<tool_call server="NAME">{"name": "TOOL", "arguments": {...}}</tool_call>`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::server::ToolSchema;

const OPEN_TAG: &str = "<tool_call";
const CLOSE_TAG: &str = "</tool_call>";

/// A complete call block addressed to some server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolCall {
    pub server: String,
    /// JSON body between the tags.
    pub body: String,
    /// The whole block as the model wrote it.
    pub raw: String,
}

/// Parsed call body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl RawToolCall {
    pub fn invocation(&self) -> Result<ToolInvocation, serde_json::Error> {
        serde_json::from_str(self.body.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Call(RawToolCall),
}

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)\A<tool_call\s+server\s*=\s*"([^"]*)"\s*>(.*)</tool_call>\z"#)
            .expect("tool call pattern is valid")
    })
}

/// Splits streamed text into plain text and complete call blocks.
///
/// Text is released as soon as it cannot be the start of a call block; a
/// possible opening tag is held back until it resolves.
#[derive(Debug, Default)]
pub struct ToolCallScanner {
    buffer: String,
}

impl ToolCallScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) -> Vec<Segment> {
        self.buffer.push_str(text);
        let mut segments = Vec::new();

        loop {
            let Some(start) = self.buffer.find(OPEN_TAG) else {
                let keep = partial_open_tag_len(&self.buffer);
                let release = self.buffer.len() - keep;
                push_text(&mut segments, self.buffer.drain(..release).collect());
                break;
            };

            push_text(&mut segments, self.buffer.drain(..start).collect());

            let Some(end) = self.buffer.find(CLOSE_TAG) else {
                break;
            };
            let raw: String = self.buffer.drain(..end + CLOSE_TAG.len()).collect();
            match call_pattern().captures(&raw) {
                Some(caps) => segments.push(Segment::Call(RawToolCall {
                    server: caps[1].to_string(),
                    body: caps[2].to_string(),
                    raw: raw.clone(),
                })),
                None => push_text(&mut segments, raw),
            }
        }

        segments
    }

    /// Release whatever is still held when the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer))
    }
}

fn push_text(segments: &mut Vec<Segment>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.push_str(&text);
    } else {
        segments.push(Segment::Text(text));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the open tag.
fn partial_open_tag_len(text: &str) -> usize {
    (1..OPEN_TAG.len())
        .rev()
        .find(|&n| text.ends_with(&OPEN_TAG[..n]))
        .unwrap_or(0)
}

/// System instructions telling the model how to call `server`'s tools.
pub fn system_instructions(server: &str, tools: &[ToolSchema]) -> String {
    let mut out = format!(
        "You can use tools provided by the \"{server}\" tool server. To call one, reply with \
         exactly one block of the form\n\
         <tool_call server=\"{server}\">{{\"name\": \"TOOL_NAME\", \"arguments\": {{...}}}}</tool_call>\n\
         and stop. The result will be sent back to you in a <tool_result> block.\n\n\
         Available tools:\n"
    );
    for tool in tools {
        out.push_str(&format!("- {}", tool.name));
        if let Some(description) = tool.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(": {description}"));
        }
        if !tool.input_schema.is_null() {
            out.push_str(&format!("\n  input schema: {}", tool.input_schema));
        }
        out.push('\n');
    }
    out
}

/// Message body reporting a tool outcome back to the model.
pub fn tool_result_message(server: &str, tool: &str, outcome: Result<String, String>) -> String {
    match outcome {
        Ok(output) => format!(
            "<tool_result server=\"{server}\" name=\"{tool}\">{output}</tool_result>"
        ),
        Err(error) => format!(
            "<tool_result server=\"{server}\" name=\"{tool}\" error=\"true\">{error}</tool_result>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    #[test]
    fn plain_text_passes_through_immediately() {
        let mut scanner = ToolCallScanner::new();
        assert_eq!(scanner.push("Hello there"), vec![text("Hello there")]);
        assert_eq!(scanner.finish(), None);
    }

    #[test]
    fn call_split_across_chunks_is_assembled() {
        let mut scanner = ToolCallScanner::new();
        let mut segments = Vec::new();
        for piece in [
            "Let me check. <tool",
            "_call server=\"weather\">{\"name\": \"forecast\", ",
            "\"arguments\": {\"city\": \"Oslo\"}}</tool_",
            "call> after",
        ] {
            segments.extend(scanner.push(piece));
        }

        assert_eq!(segments[0], text("Let me check. "));
        let Segment::Call(call) = &segments[1] else {
            panic!("expected a call, got {:?}", segments[1]);
        };
        assert_eq!(call.server, "weather");
        assert!(call.raw.starts_with("<tool_call"));
        let invocation = call.invocation().unwrap();
        assert_eq!(invocation.name, "forecast");
        assert_eq!(invocation.arguments, json!({"city": "Oslo"}));
        assert_eq!(segments[2], text(" after"));
    }

    #[test]
    fn partial_tag_is_held_until_resolved() {
        let mut scanner = ToolCallScanner::new();
        assert_eq!(scanner.push("a <tool"), vec![text("a ")]);
        assert_eq!(scanner.push("box> b"), vec![text("<toolbox> b")]);
    }

    #[test]
    fn unterminated_call_is_released_at_finish() {
        let mut scanner = ToolCallScanner::new();
        assert!(scanner.push("<tool_call server=\"x\">{").is_empty());
        assert_eq!(scanner.finish().as_deref(), Some("<tool_call server=\"x\">{"));
    }

    #[test]
    fn malformed_block_is_treated_as_text() {
        let mut scanner = ToolCallScanner::new();
        let segments = scanner.push("<tool_call nope>{}</tool_call>");
        assert_eq!(segments, vec![text("<tool_call nope>{}</tool_call>")]);
    }

    #[test]
    fn two_calls_in_one_chunk() {
        let mut scanner = ToolCallScanner::new();
        let segments = scanner.push(
            "<tool_call server=\"a\">{\"name\":\"x\"}</tool_call><tool_call server=\"b\">{\"name\":\"y\"}</tool_call>",
        );
        assert_eq!(segments.len(), 2);
        assert!(matches!(&segments[0], Segment::Call(c) if c.server == "a"));
        assert!(matches!(&segments[1], Segment::Call(c) if c.server == "b"));
    }

    #[test]
    fn instructions_list_tools() {
        let tools = vec![ToolSchema {
            name: "forecast".into(),
            description: Some("Weather forecast".into()),
            input_schema: json!({"type": "object"}),
        }];
        let instructions = system_instructions("weather", &tools);
        assert!(instructions.contains("<tool_call server=\"weather\">"));
        assert!(instructions.contains("- forecast: Weather forecast"));
    }

    #[test]
    fn result_message_marks_errors() {
        let ok = tool_result_message("w", "f", Ok("sunny".into()));
        assert_eq!(ok, "<tool_result server=\"w\" name=\"f\">sunny</tool_result>");
        let err = tool_result_message("w", "f", Err("boom".into()));
        assert!(err.contains("error=\"true\""));
    }
}
