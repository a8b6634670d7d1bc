//! Normalises the shapes an agent runtime reply can take into a
//! [`SpendingAnalysis`].
//!
//! Accepted, in order: a `structured_output` attribute, a `data` attribute
//! (object or JSON string), an `analysis` wrapper, `message.content[*].text`
//! blocks, the bare analysis object, and free text with or without a
//! markdown fence.

use billburn_core::domain::analysis::SpendingAnalysis;
use serde_json::{Map, Value};

use crate::client::AgentError;

const MAX_UNWRAP_DEPTH: usize = 6;

pub fn extract_analysis(reply: Value) -> Result<SpendingAnalysis, AgentError> {
    let payload = unwrap_payload(reply, 0)?;
    serde_json::from_value::<SpendingAnalysis>(payload)
        .map_err(|error| {
            AgentError::Parse(format!("reply does not match analysis schema: {error}"))
        })
}

/// Reads roast text from `roast_text` (or `roast`) in any accepted envelope.
pub fn extract_roast(reply: Value) -> Result<String, AgentError> {
    let text = match reply {
        Value::String(text) => match decode_text(&text) {
            Ok(value) => return extract_roast_from(unwrap_payload(value, 0)?),
            Err(_) => text,
        },
        other => return extract_roast_from(unwrap_payload(other, 0)?),
    };
    non_empty_roast(text)
}

fn extract_roast_from(payload: Value) -> Result<String, AgentError> {
    let text = payload
        .get("roast_text")
        .or_else(|| payload.get("roast"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AgentError::Parse("reply carries no roast_text".to_string()))?;
    non_empty_roast(text)
}

fn non_empty_roast(text: String) -> Result<String, AgentError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AgentError::Parse("agent returned empty roast text".to_string()));
    }
    Ok(trimmed.to_string())
}

fn unwrap_payload(value: Value, depth: usize) -> Result<Value, AgentError> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(AgentError::Parse("reply envelope is nested too deeply".to_string()));
    }

    match value {
        Value::String(text) => unwrap_payload(decode_text(&text)?, depth + 1),
        Value::Object(mut map) => {
            check_error_envelope(&map)?;

            for key in ["structured_output", "data", "analysis"] {
                if let Some(inner) = map.remove(key) {
                    if !inner.is_null() {
                        return unwrap_payload(inner, depth + 1);
                    }
                }
            }

            if let Some(text) = message_text(&map) {
                return unwrap_payload(Value::String(text), depth + 1);
            }

            Ok(Value::Object(map))
        }
        other => Err(AgentError::Parse(format!("unexpected reply type: {}", type_name(&other)))),
    }
}

fn check_error_envelope(map: &Map<String, Value>) -> Result<(), AgentError> {
    if map.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(());
    }

    let error = map.get("error").and_then(Value::as_str).unwrap_or("unspecified agent error");
    if error == "content_filtered" {
        return Err(AgentError::ContentFiltered);
    }
    let message = map.get("message").and_then(Value::as_str).unwrap_or(error);
    Err(AgentError::Agent(message.to_string()))
}

fn message_text(map: &Map<String, Value>) -> Option<String> {
    map.get("message")?
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|block| block.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

/// Decodes JSON from model text, stripping a markdown fence when present.
pub fn decode_text(text: &str) -> Result<Value, AgentError> {
    let body = strip_fence(text.trim());
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    // Prose around the object: fall back to the outermost braces.
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str::<Value>(&body[start..=end])
            .map_err(|error| AgentError::Parse(format!("reply text is not valid JSON: {error}"))),
        _ => Err(AgentError::Parse("reply text holds no JSON object".to_string())),
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n').map(|index| index + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
