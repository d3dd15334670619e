//! Editing session API routes
//!
//! Sessions, their document, annotations and decorations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::find_session;
use crate::annotations::{Annotation, AnnotationPatch, BibliographyType, Span, StaleAnnotation};
use crate::decorations::DecorationSet;
use crate::error::{AppError, Result};
use crate::session::{Document, SessionSummary};
use crate::state::AppState;

/// Create the sessions router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_session))
        .route("/:id", get(get_session).delete(close_session))
        .route("/:id/document", patch(edit_content).put(switch_document))
        .route(
            "/:id/annotations",
            get(list_annotations)
                .post(create_annotation)
                .delete(clear_annotations),
        )
        .route(
            "/:id/annotations/:annotation_id",
            patch(update_annotation).delete(delete_annotation),
        )
        .route("/:id/decorations", get(get_decorations))
        .route("/:id/markup", get(get_markup))
}

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    pub document_id: String,
    #[serde(default)]
    pub content: String,
}

/// Open a session for a document
async fn create_session(
    State(state): State<AppState>,
    Json(data): Json<CreateSession>,
) -> Result<(StatusCode, Json<SessionSummary>)> {
    if data.document_id.trim().is_empty() {
        return Err(AppError::BadRequest("document_id is required".to_string()));
    }
    let session = state
        .sessions()
        .create(Document::new(data.document_id, data.content));
    let summary = session.lock().summary();
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>> {
    let session = find_session(&state, &id)?;
    let summary = session.lock().summary();
    Ok(Json(summary))
}

async fn close_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.sessions().remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session not found: {}", id)))
    }
}

/// Replace the document; annotations of the previous one are dropped
async fn switch_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(document): Json<Document>,
) -> Result<Json<SessionSummary>> {
    let session = find_session(&state, &id)?;
    let mut session = session.lock();
    session.switch_document(document);
    Ok(Json(session.summary()))
}

#[derive(Debug, Deserialize)]
pub struct EditContent {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ContentEdited {
    pub session: SessionSummary,
    /// Annotations whose captured text no longer matches
    pub stale: Vec<StaleAnnotation>,
}

async fn edit_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<EditContent>,
) -> Result<Json<ContentEdited>> {
    let session = find_session(&state, &id)?;
    let mut session = session.lock();
    session.set_content(data.content);
    let stale = session
        .store()
        .stale_annotations(&session.document().content);
    Ok(Json(ContentEdited {
        session: session.summary(),
        stale,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnnotationQuery {
    #[serde(rename = "type")]
    pub annotation_type: Option<String>,
}

/// List annotations, optionally of one type
async fn list_annotations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnnotationQuery>,
) -> Result<Json<Vec<Annotation>>> {
    let session = find_session(&state, &id)?;
    let session = session.lock();

    let annotations = match query.annotation_type {
        Some(raw) => {
            let annotation_type = raw
                .parse::<BibliographyType>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            session.store().list_by_type(annotation_type)
        }
        None => session.store().snapshot(),
    };
    Ok(Json(annotations))
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnotation {
    pub span: Span,
    #[serde(rename = "type")]
    pub annotation_type: BibliographyType,
}

/// Annotate a span of the session document
async fn create_annotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<CreateAnnotation>,
) -> Result<(StatusCode, Json<Annotation>)> {
    let session = find_session(&state, &id)?;
    let annotation = session.lock().annotate(data.span, data.annotation_type);
    Ok((StatusCode::CREATED, Json(annotation)))
}

async fn clear_annotations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let session = find_session(&state, &id)?;
    session.lock().store_mut().clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn update_annotation(
    State(state): State<AppState>,
    Path((id, annotation_id)): Path<(Uuid, String)>,
    Json(patch): Json<AnnotationPatch>,
) -> Result<Json<Annotation>> {
    let session = find_session(&state, &id)?;
    let annotation = session
        .lock()
        .update_annotation(&annotation_id, patch)
        .ok_or_else(|| AppError::NotFound(format!("Annotation not found: {}", annotation_id)))?;
    Ok(Json(annotation))
}

async fn delete_annotation(
    State(state): State<AppState>,
    Path((id, annotation_id)): Path<(Uuid, String)>,
) -> Result<StatusCode> {
    let session = find_session(&state, &id)?;
    if session.lock().store_mut().remove(&annotation_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Annotation not found: {}", annotation_id)))
    }
}

/// Viewport query parameters
#[derive(Debug, Deserialize)]
pub struct ViewportQuery {
    pub from: Option<usize>,
    pub to: Option<usize>,
}

impl ViewportQuery {
    fn range(&self) -> Result<Option<std::ops::Range<usize>>> {
        match (self.from, self.to) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) if from <= to => Ok(Some(from..to)),
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "viewport 'from' must not exceed 'to'".to_string(),
            )),
            _ => Err(AppError::BadRequest(
                "viewport needs both 'from' and 'to'".to_string(),
            )),
        }
    }
}

async fn get_decorations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(viewport): Query<ViewportQuery>,
) -> Result<Json<DecorationSet>> {
    let viewport = viewport.range()?;
    let session = find_session(&state, &id)?;
    let decorations = session.lock().decorations(viewport);
    Ok(Json(decorations.as_ref().clone()))
}

/// HTML preview of the annotated document
async fn get_markup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(viewport): Query<ViewportQuery>,
) -> Result<Html<String>> {
    let viewport = viewport.range()?;
    let session = find_session(&state, &id)?;
    let markup = session.lock().markup(viewport);
    Ok(Html(markup))
}
