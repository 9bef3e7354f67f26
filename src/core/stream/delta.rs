//! Text extraction from decoded frames.
//!
//! Servers disagree on where the generated text lives. Ollama's generate
//! endpoint uses `response`, OpenAI-style servers nest it under
//! `choices[0].delta.content`, and assorted local runtimes use `text`,
//! `output`, or a token array. The lookups below are tried in order and the
//! first non-empty hit wins.

use serde_json::Value;

use super::frame::Frame;

/// What one frame contributes to the message being generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub text: String,
    /// The frame carried an explicit completion flag.
    pub is_final: bool,
    /// In-band error reported by the server instead of text.
    pub error: Option<String>,
}

impl Delta {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

type Lookup = fn(&Value) -> Option<String>;

const TEXT_LOOKUPS: &[Lookup] = &[
    |obj| non_empty_str(obj.get("response")),
    |obj| non_empty_str(obj.get("text")),
    |obj| obj.get("output").and_then(Value::as_str).map(str::to_owned),
    |obj| {
        obj.pointer("/output/tokens")
            .and_then(Value::as_array)
            .map(|tokens| tokens.iter().filter_map(Value::as_str).collect::<String>())
    },
    |obj| {
        obj.pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
    },
    |obj| {
        obj.pointer("/choices/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
    },
    |obj| {
        obj.pointer("/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
    },
];

const COMPLETION_FLAGS: [&str; 2] = ["done", "completed"];

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

pub fn extract_delta(frame: &Frame) -> Delta {
    match frame {
        Frame::Text(text) => Delta::text(text.clone()),
        Frame::Json(obj) => extract_from_object(obj),
    }
}

fn extract_from_object(obj: &Value) -> Delta {
    let text = TEXT_LOOKUPS
        .iter()
        .find_map(|lookup| lookup(obj).filter(|text| !text.is_empty()))
        .unwrap_or_default();

    let is_final = COMPLETION_FLAGS
        .iter()
        .any(|flag| obj.get(*flag).and_then(Value::as_bool) == Some(true));

    let error = if text.is_empty() {
        extract_error_summary(obj)
    } else {
        None
    };

    Delta {
        text,
        is_final,
        error,
    }
}

/// Pull a human-readable message out of an error object, if the object is one.
pub fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Format a non-success response body for display in the transcript.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            return format!("API Error: {summary}");
        }
        return format!("API Error: {json_value}");
    }

    format!("API Error: {trimmed}")
}
