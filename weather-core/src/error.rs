use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::transport::TransportError;

/// A single field-level problem reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(alias = "loc", deserialize_with = "location_path")]
    pub location: String,
    #[serde(alias = "msg")]
    pub message: String,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl FieldError {
    /// Stand-in used when an error response body is not JSON.
    pub fn unparsable_body() -> Self {
        Self {
            location: "response".to_string(),
            message: "invalid body".to_string(),
            kind: Some("parse_error".to_string()),
        }
    }
}

/// Whatever the upstream told us about a failed call.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Message(String),
    FieldErrors(Vec<FieldError>),
    Raw(Map<String, Value>),
}

impl ErrorDetail {
    /// Sort a decoded error body into one of the known shapes.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => ErrorDetail::Message(message),
            Value::Object(map) => ErrorDetail::Raw(map),
            Value::Array(items) => {
                match serde_json::from_value::<Vec<FieldError>>(Value::Array(items.clone())) {
                    Ok(errors) => ErrorDetail::FieldErrors(errors),
                    Err(_) => ErrorDetail::Message(Value::Array(items).to_string()),
                }
            }
            other => ErrorDetail::Message(other.to_string()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ErrorDetail::Message(message) => message.clone(),
            ErrorDetail::FieldErrors(errors) => errors
                .iter()
                .map(|err| format!("{}: {}", err.location, err.message))
                .collect::<Vec<_>>()
                .join("; "),
            ErrorDetail::Raw(map) => match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => "Unknown error".to_string(),
            },
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Terminal outcome of a failed upstream call. Retries have already
/// happened below this layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no response received from the API: {0}")]
    NoResponse(#[source] TransportError),

    #[error("API validation error: {detail}")]
    Validation { status: Option<u16>, detail: ErrorDetail },
}

impl ApiError {
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            ApiError::Validation { detail, .. } => Some(detail),
            ApiError::NoResponse(_) => None,
        }
    }
}

/// Failures of the extract/transform/load run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("no usable rows in {0}")]
    EmptyDataset(String),

    #[error("data quality issue: {0}")]
    DataQuality(String),

    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),
}

fn location_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Segment {
        Name(String),
        Index(i64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Location {
        Path(Vec<Segment>),
        Single(Segment),
    }

    let render = |segment: Segment| match segment {
        Segment::Name(name) => name,
        Segment::Index(index) => index.to_string(),
    };

    Ok(match Location::deserialize(deserializer)? {
        Location::Single(segment) => render(segment),
        Location::Path(segments) => segments.into_iter().map(render).collect::<Vec<_>>().join("."),
    })
}
