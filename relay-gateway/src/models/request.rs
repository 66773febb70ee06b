use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;
use validator::{Validate, ValidationErrors};

use super::error::{ApiError, ApiResult};

pub const DEFAULT_AGENT_PROFILE: &str = "manus-1.6";
pub const DEFAULT_TASK_MODE: &str = "agent";

/// Caller-supplied API key. Opaque to the gateway; only upstream decides
/// whether it is valid.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Body of `/api/create-task`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(
        required(message = "Missing API key or prompt"),
        length(min = 1, message = "Missing API key or prompt")
    )]
    pub api_key: Option<String>,
    #[validate(
        required(message = "Missing API key or prompt"),
        length(min = 1, message = "Missing API key or prompt")
    )]
    pub prompt: Option<String>,
    /// Set when continuing an existing conversation. The optional fields are
    /// opaque to the gateway and forwarded with whatever JSON type they carry.
    pub task_id: Option<Value>,
    pub agent_profile: Option<Value>,
    pub task_mode: Option<Value>,
    pub attachments: Option<Value>,
}

/// Body of every route that needs nothing but the key.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CredentialRequest {
    #[validate(
        required(message = "Missing API key"),
        length(min = 1, message = "Missing API key")
    )]
    pub api_key: Option<String>,
}

/// Task creation payload in the upstream's own field naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamTaskPayload {
    pub prompt: String,
    pub agent_profile: Value,
    pub task_mode: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

impl CreateTaskRequest {
    /// Validate and split into the credential and the outbound payload.
    pub fn into_upstream(self) -> ApiResult<(ApiKey, UpstreamTaskPayload)> {
        self.validate().map_err(validation_error)?;

        let api_key = self
            .api_key
            .and_then(ApiKey::new)
            .ok_or_else(|| ApiError::validation("Missing API key or prompt"))?;
        let prompt = self
            .prompt
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::validation("Missing API key or prompt"))?;

        let payload = UpstreamTaskPayload {
            prompt,
            agent_profile: self
                .agent_profile
                .unwrap_or_else(|| Value::from(DEFAULT_AGENT_PROFILE)),
            task_mode: self
                .task_mode
                .unwrap_or_else(|| Value::from(DEFAULT_TASK_MODE)),
            task_id: self.task_id.filter(is_present),
            attachments: self.attachments.filter(is_present),
        };

        Ok((api_key, payload))
    }
}

impl CredentialRequest {
    pub fn into_api_key(self) -> ApiResult<ApiKey> {
        self.validate().map_err(validation_error)?;
        self.api_key
            .and_then(ApiKey::new)
            .ok_or_else(|| ApiError::validation("Missing API key"))
    }
}

/// Decode a JSON request body. An empty body, one that is not JSON, or JSON
/// that is not an object decodes to the type's default so that required-field
/// validation reports it. An object with a mistyped field is a validation
/// error carrying the decoder's message.
pub fn parse_json_body<T>(body: &Bytes) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return Ok(T::default()),
        Err(e) => {
            debug!(error = %e, "Request body is not valid JSON, treating as empty");
            return Ok(T::default());
        }
    };

    serde_json::from_value(value)
        .map_err(|e| ApiError::validation(format!("Invalid request body: {}", e)))
}

/// Whether an optional field carries something worth forwarding. Null, empty
/// strings, empty collections, `false` and zero count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn validation_error(errors: ValidationErrors) -> ApiError {
    let message = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string());
    ApiError::Validation(message)
}
