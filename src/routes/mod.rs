//! Route modules for the cataloger server

pub mod assist;
pub mod health;
pub mod sessions;
pub mod submission;

use axum::{routing::get, Router};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::session::SharedSession;
use crate::state::AppState;

/// Application router without middleware layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest(
            "/api/v1/sessions",
            sessions::router()
                .merge(submission::router())
                .merge(assist::router()),
        )
        .with_state(state)
}

pub(crate) fn find_session(state: &AppState, id: &Uuid) -> Result<SharedSession> {
    state
        .sessions()
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {}", id)))
}
