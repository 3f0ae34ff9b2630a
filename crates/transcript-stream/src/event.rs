//! Typed interpretation of record payloads.

use serde_json::{Map, Value};

use crate::errors::StreamError;
use crate::frame::Record;

const RESPONSE_START: &str = "agent_response_start";
const TOOL_CODE: &str = "tool_code";
const TOOL_RESPONSE: &str = "tool_response";
const ERROR: &str = "error";
const NO_ESCALATION_MESSAGE: &str = "No specific message.";

/// Meaning of one record's payload. Exactly one variant per record.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The agent has started producing a response.
    ResponseStart,
    /// Incremental response text. When `is_final` is set, the delta is applied
    /// and then the turn is finalized.
    TextDelta { text: String, is_final: bool },
    /// The agent invoked a tool.
    ToolCall {
        name: String,
        input: Option<serde_json::Value>,
    },
    /// A tool returned.
    ToolResult {
        name: String,
        output: Option<serde_json::Value>,
    },
    /// End of the response with no further text.
    Final { escalation: Option<String> },
    /// Backend-reported error; the turn stays open.
    Error { message: String },
    /// Anything else, kept verbatim.
    Unknown { raw: String },
}

impl Event {
    /// Returns true for events that end the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Final { .. } | Self::TextDelta { is_final: true, .. }
        )
    }
}

/// Read-only view over a payload object.
///
/// Fields are looked up individually, so a null or oddly typed field that
/// classification does not need never rejects the whole payload.
struct WirePayload<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> WirePayload<'a> {
    fn str_field(&self, key: &str) -> Option<&'a str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn data(&self) -> Option<&'a Map<String, Value>> {
        self.fields.get("data").and_then(Value::as_object)
    }

    fn data_str(&self, key: &str) -> Option<String> {
        self.data()
            .and_then(|data| data.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn data_value(&self, key: &str) -> Option<Value> {
        self.data()
            .and_then(|data| data.get(key))
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// Concatenated text of every text part, when there is any.
    fn text(&self) -> Option<String> {
        let parts = self
            .fields
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)?;
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        (!texts.is_empty()).then(|| texts.concat())
    }

    fn is_final(&self) -> bool {
        self.fields
            .get("is_final_response")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn escalation(&self) -> Option<String> {
        let escalate = self
            .fields
            .get("actions")
            .and_then(|actions| actions.get("escalate"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        escalate.then(|| {
            self.str_field("error_message")
                .unwrap_or(NO_ESCALATION_MESSAGE)
                .to_string()
        })
    }
}

/// Classifies a record payload.
///
/// Returns `Err(MalformedRecord)` when the payload is not a JSON object;
/// callers degrade that to [`Event::Unknown`]. Fields that do not drive
/// classification are never validated.
pub fn classify_payload(payload: &str) -> Result<Event, StreamError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| StreamError::malformed(format!("payload is not valid JSON: {e}")))?;
    let Some(fields) = value.as_object() else {
        return Err(StreamError::malformed("payload is not a JSON object"));
    };
    let wire = WirePayload { fields };
    let unknown = || Event::Unknown {
        raw: payload.to_string(),
    };

    let event = match wire.str_field("event") {
        Some(RESPONSE_START) => Event::ResponseStart,
        Some(TOOL_CODE) => match wire.data_str("tool_name") {
            Some(name) => Event::ToolCall {
                name,
                input: wire.data_value("tool_input"),
            },
            None => unknown(),
        },
        Some(TOOL_RESPONSE) => match wire.data_str("tool_name") {
            Some(name) => Event::ToolResult {
                name,
                output: wire.data_value("tool_output"),
            },
            None => unknown(),
        },
        Some(ERROR) => match wire.data_str("message") {
            Some(message) => Event::Error { message },
            None => unknown(),
        },
        Some(_) => unknown(),
        None => match (wire.text(), wire.is_final()) {
            (Some(text), is_final) => Event::TextDelta { text, is_final },
            (None, true) => Event::Final {
                escalation: wire.escalation(),
            },
            (None, false) => unknown(),
        },
    };
    Ok(event)
}

/// Classifies a record, degrading malformed payloads to [`Event::Unknown`].
pub fn classify_record(record: &Record) -> Event {
    classify_payload(&record.payload).unwrap_or_else(|_| Event::Unknown {
        raw: record.payload.clone(),
    })
}
