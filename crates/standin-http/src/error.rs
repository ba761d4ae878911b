//! Error taxonomy for the synthesis pipeline.
//!
//! Routing and validation failures are client errors and are translated into
//! structured JSON bodies immediately. Transport failures propagate to the
//! orchestrator boundary and are surfaced with enough detail to reproduce the
//! condition. Nothing in the core retries.

use serde_json::{json, Value};

/// Error types produced by the route-resolution and response-synthesis core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The merged route table ended up empty. Fatal at startup.
    #[error("no valid routes found in configuration: {0}")]
    Config(String),

    /// No declared path matched the request path.
    #[error("route {0} not found")]
    NotFound(String),

    /// A path matched but none of its methods did.
    #[error("method {method} is not supported for path {path}")]
    MethodNotAllowed { path: String, method: String },

    /// The request payload violated the declared schema.
    #[error("request validation failed: {message}")]
    Validation {
        message: String,
        received: Value,
        expected: Value,
    },

    /// The request body could not be parsed in the declared format.
    #[error("failed to process request data: {message}")]
    BadRequest {
        message: String,
        received: String,
        expected: Value,
    },

    /// The webhook discriminator did not select any configured data mapping.
    #[error("unknown webhook type: {given}")]
    UnknownDiscriminator {
        given: String,
        available: Vec<String>,
    },

    /// The outbound webhook call failed at the transport level.
    #[error("webhook delivery to {url} failed: {message}")]
    Transport {
        url: String,
        payload: Value,
        message: String,
    },
}

impl Error {
    /// HTTP status the error translates to at the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed { .. } => 405,
            Error::Validation { .. } | Error::BadRequest { .. } => 400,
            Error::UnknownDiscriminator { .. } => 400,
            Error::Transport { .. } => 500,
        }
    }

    /// Structured client-facing body for this error.
    pub fn to_body(&self) -> Value {
        match self {
            Error::Config(msg) => json!({ "error": "configuration error", "message": msg }),
            Error::NotFound(path) => json!({ "error": format!("route {path} not found") }),
            Error::MethodNotAllowed { path, method } => {
                json!({ "error": format!("method {method} is not supported for path {path}") })
            }
            Error::Validation {
                message,
                received,
                expected,
            } => json!({
                "error": "request validation failed",
                "message": message,
                "received_data": received,
                "expected_format": expected,
            }),
            Error::BadRequest {
                message,
                received,
                expected,
            } => json!({
                "error": "failed to process request data",
                "message": message,
                "received_data": received,
                "expected_format": expected,
            }),
            Error::UnknownDiscriminator { given, available } => json!({
                "error": format!("unknown webhook type: {given}"),
                "available_types": available,
            }),
            Error::Transport {
                url,
                payload,
                message,
            } => json!({
                "error": "webhook delivery failed",
                "message": message,
                "webhook_url": url,
                "webhook_data": payload,
            }),
        }
    }

    /// Whether the error is attributable to the client rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
