//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use edge_chat::GatewayError;
use edge_normalize::NormalizeError;

/// Result type alias for handler operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// A failed agent operation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl ApiError {
    /// 504 for model timeouts, 500 for everything else.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable name of what failed.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Gateway(e) => Some(e.kind().as_str()),
            Self::Normalize(e) => Some(e.stage()),
            Self::Encode(_) => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.to_string(),
            stage: self.stage().map(str::to_string),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Gateway(e) => warn!(error = %e, kind = e.kind().as_str(), "Model call failed"),
            Self::Normalize(e) => warn!(error = %e, stage = e.stage(), "Model reply rejected"),
            Self::Encode(e) => error!(error = %e, "Response encoding failed"),
        }
        (status, Json(self.body())).into_response()
    }
}
