//! Crate-wide error type and its HTTP mapping.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::wizard::Screen;

pub type AtlasResult<T> = Result<T, AtlasError>;

#[derive(Debug, Error)]
pub enum AtlasError {
    /// Malformed user input (e.g. empty interests, unknown catalog value).
    #[error("invalid profile: {0}")]
    Validation(String),

    /// Any failure of a generation call: transport, HTTP status, empty body, schema.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Snapshot present but unreadable. Absorbed during recovery.
    #[error("persisted snapshot is corrupt: {0}")]
    PersistenceCorrupt(String),

    /// Ids that do not exist in the current roadmap.
    #[error("no task {task_id} in milestone {milestone_id}")]
    InvariantViolation {
        milestone_id: String,
        task_id: String,
    },

    #[error("a generation request is already in flight")]
    Busy,

    #[error("action {action} is not allowed on the {screen:?} screen")]
    NotAllowed { action: &'static str, screen: Screen },

    #[error("unknown suggestion: {0}")]
    UnknownSuggestion(String),

    #[error("no roadmap to export")]
    NothingToExport,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AtlasError {
    pub fn status(&self) -> StatusCode {
        match self {
            AtlasError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AtlasError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            AtlasError::Busy | AtlasError::NotAllowed { .. } => StatusCode::CONFLICT,
            AtlasError::UnknownSuggestion(_) | AtlasError::NothingToExport => StatusCode::NOT_FOUND,
            AtlasError::InvariantViolation { .. } => StatusCode::BAD_REQUEST,
            AtlasError::PersistenceCorrupt(_) | AtlasError::Io(_) | AtlasError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AtlasError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
