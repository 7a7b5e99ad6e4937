use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codetype_common::Error;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// JSON error body returned by every failing route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code_for(status),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map a core error, hiding server-side detail behind `public_message`.
    ///
    /// Caller mistakes keep their own message. Everything else is logged
    /// with its full context and reported as a generic 500.
    pub fn from_core(err: Error, public_message: &str) -> Self {
        match err {
            Error::Validation(message) => Self::unprocessable(message),
            Error::Unauthenticated(message) => Self::unauthorized(message),
            other => {
                warn!("{public_message}: {other}");
                Self::internal(public_message)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::from_core(err, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn code_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        500.. => "SERVER_ERROR",
        401 => "UNAUTHORIZED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        400 => "BAD_REQUEST",
        422 => "VALIDATION_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}

/// Turns a handler panic into a JSON 500 instead of a dropped connection.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("panic recovered: {detail}");

    let body = ErrorBody {
        error: "Internal Server Error".to_string(),
        message: "Internal server error".to_string(),
        code: "INTERNAL_ERROR".to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
