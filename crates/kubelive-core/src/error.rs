//! Error types for the event data model.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("unknown {resource} status: {value}")]
    UnknownStatus {
        resource: &'static str,
        value: String,
    },

    #[error("malformed `{tag}` payload: {source}")]
    MalformedPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
