//! Catalog submission and alternative-title routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::find_session;
use crate::error::{AppError, Result};
use crate::submission::{InstanceCreated, SubmissionAnnotation, SubmissionError};
use crate::state::AppState;
use crate::sync::{AltTitlesSync, ExternalUpdate, LocalizedTitle};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/submission", get(preview_submission).post(submit))
        .route("/:id/alt-titles", get(get_alt_titles).put(edit_alt_titles))
        .route("/:id/alt-titles/external", post(receive_alt_titles))
}

#[derive(Debug, Serialize)]
pub struct SubmissionPreview {
    pub vocabulary: &'static str,
    pub type_field: &'static str,
    pub biblography_annotation: Vec<SubmissionAnnotation>,
}

/// Annotations as they would be submitted
async fn preview_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionPreview>> {
    let session = find_session(&state, &id)?;
    let vocabulary = state.vocabulary();
    let annotations = session.lock().submission(vocabulary);
    Ok(Json(SubmissionPreview {
        vocabulary: vocabulary.as_str(),
        type_field: vocabulary.type_field(),
        biblography_annotation: annotations,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Create an instance in the catalog; submitted annotations are removed on success
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<InstanceCreated>)> {
    if data.text_id.trim().is_empty() {
        return Err(AppError::BadRequest("text_id is required".to_string()));
    }
    let catalog = state
        .catalog()
        .cloned()
        .ok_or(SubmissionError::NotConfigured)?;
    let session = find_session(&state, &id)?;

    let (payload, ticket) = session
        .lock()
        .instance_payload(state.vocabulary(), data.metadata);

    match catalog.create_instance(&data.text_id, &payload).await {
        Ok(created) => {
            tracing::info!(
                session = %id,
                instance = %created.id,
                annotations = payload.biblography_annotation.len(),
                "Instance created"
            );
            session.lock().finish_submission(ticket);
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            session.lock().abort_submission(ticket);
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AltTitlesView {
    pub titles: Vec<LocalizedTitle>,
    pub pending: bool,
    pub version: u64,
    pub confirmed_version: u64,
}

#[derive(Debug, Deserialize)]
pub struct AltTitlesBody {
    pub titles: Vec<LocalizedTitle>,
}

#[derive(Debug, Serialize)]
pub struct ExternalTitlesResult {
    pub outcome: ExternalUpdate,
    #[serde(flatten)]
    pub view: AltTitlesView,
}

fn alt_titles_view(sync: &AltTitlesSync) -> AltTitlesView {
    AltTitlesView {
        titles: sync.view().to_vec(),
        pending: sync.has_pending(),
        version: sync.local().version,
        confirmed_version: sync.confirmed().version,
    }
}

async fn get_alt_titles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AltTitlesView>> {
    let session = find_session(&state, &id)?;
    let view = alt_titles_view(session.lock().alt_titles());
    Ok(Json(view))
}

/// Record a local edit of the alternative titles
async fn edit_alt_titles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AltTitlesBody>,
) -> Result<Json<AltTitlesView>> {
    let session = find_session(&state, &id)?;
    let mut session = session.lock();
    session.alt_titles_mut().edit(body.titles);
    Ok(Json(alt_titles_view(session.alt_titles())))
}

/// Offer titles changed outside the editor; deferred while edits are pending
async fn receive_alt_titles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AltTitlesBody>,
) -> Result<Json<ExternalTitlesResult>> {
    let session = find_session(&state, &id)?;
    let mut session = session.lock();
    let outcome = session.alt_titles_mut().receive_external(body.titles);
    Ok(Json(ExternalTitlesResult {
        outcome,
        view: alt_titles_view(session.alt_titles()),
    }))
}
