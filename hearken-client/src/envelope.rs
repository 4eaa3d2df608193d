//! Response envelope unwrapping and failure classification.
//!
//! Successful JSON responses arrive as `{ data, message, success }`; the
//! payload under `data` is what callers see. Bodies without an envelope
//! (including non-JSON file downloads) pass through unchanged. Failed
//! responses carry `{ message, errors? }`.

use crate::transport::RawResponse;
use hearken_core::{FieldErrors, SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Key used for errors that are not tied to a single field.
pub const GENERAL_FIELD: &str = "_";

/// Unwrapped body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl Payload {
    pub fn into_json(self) -> SyncResult<Value> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Binary { content_type, .. } => Err(SyncError::Decode {
                reason: format!(
                    "expected JSON, got binary body ({})",
                    content_type.as_deref().unwrap_or("unknown content type")
                ),
            }),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> SyncResult<T> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }
}

/// Turn a response into a payload or a classified error.
pub fn into_result(response: RawResponse) -> SyncResult<Payload> {
    if response.is_success() {
        unwrap_success(response)
    } else {
        Err(classify_failure(&response))
    }
}

pub fn unwrap_success(response: RawResponse) -> SyncResult<Payload> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Json(Value::Null));
    }
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(Value::Object(map)) if is_envelope(&map) => open_envelope(response.status, map),
        Ok(value) => Ok(Payload::Json(value)),
        Err(_) => Ok(Payload::Binary {
            content_type: response.content_type,
            bytes: response.body,
        }),
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.get("success").is_some_and(Value::is_boolean)
        || (map.contains_key("data") && map.contains_key("message"))
}

fn open_envelope(status: u16, mut map: Map<String, Value>) -> SyncResult<Payload> {
    if map.get("success") == Some(&Value::Bool(false)) {
        return Err(SyncError::ServerRejected {
            status,
            message: message_of(&map).unwrap_or_else(|| "request was not successful".to_string()),
        });
    }
    Ok(Payload::Json(map.remove("data").unwrap_or(Value::Null)))
}

fn message_of(map: &Map<String, Value>) -> Option<String> {
    map.get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

/// Classify a non-2xx response.
pub fn classify_failure(response: &RawResponse) -> SyncError {
    let status = response.status;
    if status == 401 {
        return SyncError::Unauthorized;
    }
    if !(400..600).contains(&status) {
        return SyncError::Unknown(format!("unexpected HTTP status {}", status));
    }
    classify_rejection(response)
}

/// Server-side refusal carrying the body's message and any field errors.
/// Used directly for a 401 on a request sent outside the session.
pub fn classify_rejection(response: &RawResponse) -> SyncError {
    let status = response.status;
    let body: ErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
    let message = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(|| plain_text(&response.body))
        .unwrap_or_else(|| format!("HTTP {}", status));

    let field_errors = body.errors.as_ref().map(field_errors).unwrap_or_default();
    if (400..500).contains(&status) && !field_errors.is_empty() {
        SyncError::ValidationFailed {
            message,
            field_errors,
        }
    } else {
        SyncError::ServerRejected { status, message }
    }
}

fn plain_text(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.is_empty() || text.starts_with('{') || text.starts_with('<') {
        return None;
    }
    Some(text.chars().take(200).collect())
}

/// Normalize the loosely shaped `errors` member.
///
/// Accepts `{ field: "msg" }`, `{ field: ["msg", ...] }`,
/// `[{ field, message }, ...]`, and bare message lists.
pub fn field_errors(errors: &Value) -> FieldErrors {
    let mut out = FieldErrors::new();
    match errors {
        Value::Object(map) => {
            for (field, messages) in map {
                let collected = messages_of(messages);
                if !collected.is_empty() {
                    out.entry(field.clone()).or_default().extend(collected);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let field = item
                    .get("field")
                    .or_else(|| item.get("path"))
                    .and_then(Value::as_str)
                    .unwrap_or(GENERAL_FIELD);
                let collected = match item {
                    Value::Object(_) => item
                        .get("message")
                        .or_else(|| item.get("msg"))
                        .map(messages_of)
                        .unwrap_or_default(),
                    other => messages_of(other),
                };
                if !collected.is_empty() {
                    out.entry(field.to_string()).or_default().extend(collected);
                }
            }
        }
        Value::String(message) if !message.trim().is_empty() => {
            out.insert(GENERAL_FIELD.to_string(), vec![message.trim().to_string()]);
        }
        _ => {}
    }
    out
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_data_is_unwrapped() {
        let response = RawResponse::json(
            200,
            &json!({ "data": { "id": 7 }, "message": "ok", "success": true }),
        );
        assert_eq!(
            into_result(response).unwrap(),
            Payload::Json(json!({ "id": 7 }))
        );
    }

    #[test]
    fn test_bare_json_passes_through() {
        let body = json!({ "data": [1, 2], "total": 2 });
        let response = RawResponse::json(200, &body);
        assert_eq!(into_result(response).unwrap(), Payload::Json(body));
    }

    #[test]
    fn test_binary_body_is_returned_unchanged() {
        let mut response = RawResponse::new(200, b"id,body\n1,hello\n".to_vec());
        response.content_type = Some("text/csv".to_string());
        match into_result(response).unwrap() {
            Payload::Binary { content_type, bytes } => {
                assert_eq!(content_type.as_deref(), Some("text/csv"));
                assert_eq!(bytes, b"id,body\n1,hello\n");
            }
            other => panic!("expected binary payload, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_body_is_null() {
        assert_eq!(
            into_result(RawResponse::new(204, Vec::new())).unwrap(),
            Payload::Json(Value::Null)
        );
    }

    #[test]
    fn test_unsuccessful_envelope_is_rejected() {
        let response = RawResponse::json(200, &json!({ "success": false, "message": "Nope" }));
        assert_eq!(
            into_result(response).unwrap_err(),
            SyncError::ServerRejected {
                status: 200,
                message: "Nope".to_string()
            }
        );
    }

    #[test]
    fn test_validation_errors_carry_fields() {
        let response = RawResponse::json(
            422,
            &json!({
                "message": "Invalid input",
                "errors": { "title": ["is required"], "closedAt": "must be in the future" }
            }),
        );
        match into_result(response).unwrap_err() {
            SyncError::ValidationFailed {
                message,
                field_errors,
            } => {
                assert_eq!(message, "Invalid input");
                assert_eq!(field_errors["title"], vec!["is required".to_string()]);
                assert_eq!(
                    field_errors["closedAt"],
                    vec!["must be in the future".to_string()]
                );
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_error_list_shape() {
        let errors = field_errors(&json!([
            { "field": "email", "message": "taken" },
            { "msg": "general problem" }
        ]));
        assert_eq!(errors["email"], vec!["taken".to_string()]);
        assert_eq!(errors[GENERAL_FIELD], vec!["general problem".to_string()]);
    }

    #[test]
    fn test_rejection_keeps_401_message() {
        let response = RawResponse::json(401, &json!({ "message": "Invalid email or password" }));
        assert_eq!(classify_failure(&response), SyncError::Unauthorized);
        assert_eq!(
            classify_rejection(&response),
            SyncError::ServerRejected {
                status: 401,
                message: "Invalid email or password".to_string()
            }
        );
    }

    #[test]
    fn test_classification_by_status() {
        assert_eq!(
            classify_failure(&RawResponse::new(401, Vec::new())),
            SyncError::Unauthorized
        );
        assert_eq!(
            classify_failure(&RawResponse::json(404, &json!({ "message": "Input not found" }))),
            SyncError::ServerRejected {
                status: 404,
                message: "Input not found".to_string()
            }
        );
        assert_eq!(
            classify_failure(&RawResponse::new(502, b"Bad Gateway".to_vec())),
            SyncError::ServerRejected {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
        assert!(matches!(
            classify_failure(&RawResponse::new(302, Vec::new())),
            SyncError::Unknown(_)
        ));
    }
}
