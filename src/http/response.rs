//! Error responses.
//!
//! Every failure leaves as JSON `{ "error": <message>, "kind": <variant> }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::RouterError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl RouterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) | Self::InvalidEvent(_) | Self::UnknownBackend(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Busy { .. } | Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::CollaboratorUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
