use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Uniform result of a successful call. A present `error` still means failure to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub code: Option<i64>,
    pub data: T,
    pub error: Option<Vec<String>>,
}

impl Envelope<Value> {
    /// Lift a parsed `{code, data, error}` body; missing fields become empty.
    pub fn from_body(mut body: Value) -> Self {
        let code = body.get("code").and_then(Value::as_i64);
        let error = body.get("error").and_then(error_list);
        let data = body
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Self { code, data, error }
    }
}

impl<T> Envelope<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            code: self.code,
            data: f(self.data),
            error: self.error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_empty())
    }
}

fn error_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().map(display_value).collect()),
        other => Some(vec![display_value(other)]),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a response body whose declared type may be wrong or missing.
///
/// Empty bodies become `{}`. Anything that is not valid JSON degrades to
/// `{"message": <raw text>}`, whether or not it was declared as JSON.
pub fn parse_body(content_type: &str, text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(Map::new());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            if content_type.contains("application/json") {
                debug!("body declared json but failed to parse: {}", e);
            }
            json!({ "message": text })
        }
    }
}

/// Pick the most useful failure message from a non-2xx body.
///
/// Precedence: first entry of an `error` list, first entry of a bare list,
/// a `message` field, then a generic status line.
pub fn error_message(body: &Value, status: u16) -> String {
    if let Some(first) = body
        .get("error")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    {
        return display_value(first);
    }

    if let Some(first) = body.as_array().and_then(|list| list.first()) {
        return display_value(first);
    }

    match body.get("message") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::Bool(false)) | Some(Value::String(_)) | None => {
            format!("Request failed with status {}", status)
        }
        Some(other) => display_value(other),
    }
}
