//! JSON error responses.
//!
//! Every failure leaves the server as `{ "message", "error", "node_version" }`.
//! `error` holds `{ "kind", "detail" }` in development and is `{}` otherwise.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use brakeweb_core::{Environment, ErrorKind, ServiceError};

/// Runtime identifier reported in every error body.
pub const NODE_VERSION: &str = concat!("brakeweb/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: Value,
    pub node_version: &'static str,
}

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    error: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: json!({}),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    /// Classifies a service error. Diagnostics are attached only in development.
    pub fn from_service(err: ServiceError, environment: Environment) -> Self {
        let kind = err.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            error!(kind = kind.as_str(), error = %err, detail = ?err.detail(), "Request failed");
        } else {
            warn!(kind = kind.as_str(), error = %err, "Request rejected");
        }

        let mut api_error = Self::new(status, err.to_string());
        if environment.is_development() {
            api_error.error = json!({
                "kind": kind.as_str(),
                "detail": err.detail(),
            });
        }
        api_error
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            message: self.message,
            error: self.error,
            node_version: NODE_VERSION,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::EngineQuery | ErrorKind::Storage | ErrorKind::Transcode => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Renders a handler panic as a generic 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, environment: Environment) -> Response<Body> {
    let reason = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(reason = %reason, "Handler panicked");

    let error = if environment.is_development() {
        json!({ "kind": "unhandled", "detail": reason })
    } else {
        json!({})
    };
    let body = ErrorBody {
        message: "Internal Server Error".to_string(),
        error,
        node_version: NODE_VERSION,
    };

    let mut response = Response::new(Body::from(
        serde_json::to_vec(&body).unwrap_or_default(),
    ));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
