//! Log-stream message parsing
//!
//! Policy: never drop a message and never fail on one. Payloads that don't
//! parse as JSON are surfaced verbatim as output.

use serde_json::Value;

use crate::api::types::ExecutionStatus;

/// One event surfaced by a log stream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A raw message frame
    Message(String),
    /// The connection failed; the stream ends after this event
    Failed(String),
}

/// What a single stream message contained
#[derive(Debug, Default, PartialEq)]
pub struct ParsedMessage {
    /// Incremental output to surface, if any
    pub output: Option<String>,
    /// Terminal signal carried alongside the output
    pub terminal: Option<Terminal>,
}

#[derive(Debug, PartialEq)]
pub struct Terminal {
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
}

/// Extract output and terminal signals from one stream message
///
/// Output is taken from the first of the nested result output, the top-level
/// output or the log field. A terminal status is only acted on when it rides
/// along with output, and only passed/failed end the watch from the stream;
/// everything the service may send in between stays informational.
pub fn parse_message(raw: &str) -> ParsedMessage {
    if raw.is_empty() {
        return ParsedMessage::default();
    }

    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return ParsedMessage {
            output: Some(raw.to_string()),
            terminal: None,
        };
    };

    let output = value
        .pointer("/result/output")
        .and_then(Value::as_str)
        .or_else(|| value.get("output").and_then(Value::as_str))
        .or_else(|| value.get("log").and_then(Value::as_str))
        .filter(|text| !text.is_empty());

    if let Some(output) = output {
        let terminal = value
            .get("status")
            .and_then(Value::as_str)
            .map(ExecutionStatus::parse)
            .filter(|status| {
                matches!(status, ExecutionStatus::Passed | ExecutionStatus::Failed)
            })
            .map(|status| Terminal {
                status,
                error_message: value
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        return ParsedMessage {
            output: Some(output.to_string()),
            terminal,
        };
    }

    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return ParsedMessage {
            output: Some(content.to_string()),
            terminal: None,
        };
    }

    ParsedMessage {
        output: Some(raw.to_string()),
        terminal: None,
    }
}
