//! Unwrapping of the double-encoded `executeQuery` envelope.
//!
//! The resolver returns the database result as a JSON *string* inside
//! `data.executeQuery`, and that string may wrap its payload in another
//! `data` member. Each step either hands a value to the next step or
//! finishes with the text to show.

use serde_json::{Map, Value};
use thiserror::Error;

/// The outer body was not a JSON object. The raw body is kept so callers can
/// still show it.
#[derive(Debug, Error)]
#[error("failed to unmarshal JSON response: {source}")]
pub struct UnwrapError {
    pub raw: String,
    #[source]
    source: serde_json::Error,
}

enum Peel {
    Next(Value),
    Done(String),
}

type Step = fn(Value, &str) -> Peel;

/// Extract and pretty-print the innermost payload of a GraphQL response.
pub fn unwrap_response(raw: &str) -> Result<String, UnwrapError> {
    let outer = match serde_json::from_str::<Option<Map<String, Value>>>(raw) {
        Ok(Some(map)) => Value::Object(map),
        // `null` carries no envelope at all
        Ok(None) => return Ok(raw.to_string()),
        Err(source) => {
            return Err(UnwrapError {
                raw: raw.to_string(),
                source,
            })
        }
    };

    const STEPS: [Step; 4] = [data_member, execute_query_string, inner_json, inner_data];

    let mut current = outer;
    for step in STEPS {
        match step(current, raw) {
            Peel::Next(value) => current = value,
            Peel::Done(text) => return Ok(text),
        }
    }
    Ok(pretty(current))
}

fn data_member(outer: Value, raw: &str) -> Peel {
    match outer {
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Object(_)) => Peel::Next(data),
            _ => Peel::Done(raw.to_string()),
        },
        _ => Peel::Done(raw.to_string()),
    }
}

fn execute_query_string(data: Value, raw: &str) -> Peel {
    match data.get("executeQuery") {
        Some(Value::String(s)) => Peel::Next(Value::String(s.clone())),
        _ => Peel::Done(raw.to_string()),
    }
}

fn inner_json(inner: Value, _raw: &str) -> Peel {
    let Value::String(text) = inner else {
        return Peel::Next(inner);
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => Peel::Next(parsed),
        Err(_) => Peel::Done(text),
    }
}

fn inner_data(inner: Value, _raw: &str) -> Peel {
    match inner {
        Value::Object(mut map) if map.contains_key("data") => {
            Peel::Next(map.remove("data").unwrap_or(Value::Null))
        }
        other => Peel::Next(other),
    }
}

fn pretty(value: Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}
