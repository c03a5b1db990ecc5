//! Typed request bodies, checked once before anything reaches the store.

use serde::de::DeserializeOwned;
use serde_json::Value;

pub const NO_DATA: &str = "No JSON data provided";
pub const BODY_AND_USERNAME_REQUIRED: &str = "Both body and username are required";
pub const BODY_REQUIRED: &str = "Body is required";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayloadError {
    #[error("{}", NO_DATA)]
    InputMissing,

    #[error("{0}")]
    FieldMissing(&'static str),
}

#[derive(Debug, PartialEq)]
pub struct NewMessagePayload {
    pub body: String,
    pub username: String,
}

#[derive(Debug, PartialEq)]
pub struct UpdateMessagePayload {
    pub body: String,
}

/// Loose shape of an incoming body: any field may be absent or of the wrong type.
#[derive(Deserialize, Default)]
struct RawFields {
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    username: Option<Value>,
}

/// A non-empty JSON object, or `InputMissing`.
fn parse_object<T: DeserializeOwned + Default>(chunk: &[u8]) -> Result<T, PayloadError> {
    match serde_json::from_slice::<Value>(chunk) {
        Ok(Value::Object(map)) if !map.is_empty() => {
            Ok(serde_json::from_value(Value::Object(map)).unwrap_or_default())
        }
        _ => Err(PayloadError::InputMissing),
    }
}

/// Present means a string that isn't empty; whitespace is left to the store.
fn required(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Some(text),
        _ => None,
    }
}

pub fn parse_new_message(chunk: &[u8]) -> Result<NewMessagePayload, PayloadError> {
    let raw: RawFields = parse_object(chunk)?;
    match (required(raw.body), required(raw.username)) {
        (Some(body), Some(username)) => Ok(NewMessagePayload { body, username }),
        _ => Err(PayloadError::FieldMissing(BODY_AND_USERNAME_REQUIRED)),
    }
}

pub fn parse_update_message(chunk: &[u8]) -> Result<UpdateMessagePayload, PayloadError> {
    let raw: RawFields = parse_object(chunk)?;
    required(raw.body)
        .map(|body| UpdateMessagePayload { body })
        .ok_or(PayloadError::FieldMissing(BODY_REQUIRED))
}
