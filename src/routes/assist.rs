//! Per-session BDRC search fields and title/author suggestions
//!
//! Search follows the editor's field model: `PUT` on every keystroke, the
//! request leaves only once the query has settled, and `GET` reads the
//! field state.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::find_session;
use crate::error::{AppError, Result};
use crate::search::{SearchState, SearchType};
use crate::session::{FieldSearch, SessionAssist};
use crate::state::AppState;
use crate::suggest::SuggestionState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/:id/search",
            put(set_search_query).get(get_search).delete(cancel_search),
        )
        .route(
            "/:id/suggestion",
            put(request_suggestion)
                .get(get_suggestion)
                .delete(abort_suggestion),
        )
}

fn session_assist(state: &AppState, id: &Uuid) -> Result<Arc<SessionAssist>> {
    state
        .sessions()
        .assist(id)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {}", id)))
}

fn search_field(state: &AppState, id: &Uuid, search_type: SearchType) -> Result<Arc<FieldSearch>> {
    session_assist(state, id)?
        .search(search_type)
        .ok_or_else(|| AppError::Unavailable("BDRC search is not configured".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct SearchFieldQuery {
    #[serde(rename = "type", default)]
    pub search_type: SearchType,
}

#[derive(Debug, Deserialize)]
pub struct SetQuery {
    pub query: String,
    #[serde(rename = "type", default)]
    pub search_type: SearchType,
}

/// Update a search field's query, restarting its debounce window
async fn set_search_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetQuery>,
) -> Result<(StatusCode, Json<SearchState>)> {
    let field = search_field(&state, &id, body.search_type)?;
    field.set_query(body.query);
    Ok((StatusCode::ACCEPTED, Json(field.state())))
}

async fn get_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SearchFieldQuery>,
) -> Result<Json<SearchState>> {
    let field = search_field(&state, &id, query.search_type)?;
    Ok(Json(field.state()))
}

async fn cancel_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SearchFieldQuery>,
) -> Result<Json<SearchState>> {
    let field = search_field(&state, &id, query.search_type)?;
    field.cancel();
    Ok(Json(field.state()))
}

/// Ask for a title/author suggestion for the session document
async fn request_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SuggestionState>)> {
    let content = find_session(&state, &id)?.lock().document().content.clone();
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("document has no content".to_string()));
    }

    let assist = session_assist(&state, &id)?;
    let controller = assist
        .suggestion()
        .ok_or_else(|| AppError::Unavailable("Suggestion service is not configured".to_string()))?;
    controller.request(content);
    Ok((StatusCode::ACCEPTED, Json(controller.state())))
}

async fn get_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestionState>> {
    let assist = session_assist(&state, &id)?;
    let controller = assist
        .suggestion()
        .ok_or_else(|| AppError::Unavailable("Suggestion service is not configured".to_string()))?;
    Ok(Json(controller.state()))
}

async fn abort_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestionState>> {
    let assist = session_assist(&state, &id)?;
    let controller = assist
        .suggestion()
        .ok_or_else(|| AppError::Unavailable("Suggestion service is not configured".to_string()))?;
    controller.abort();
    Ok(Json(controller.state()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::super::test_support::{open_session, send, state};
    use super::*;
    use crate::routes::app;
    use crate::search::{SearchBackend, SearchError, SearchHit, SearchRequest};
    use crate::session::Assistants;
    use crate::suggest::{SuggestError, TitleAuthorSuggester, TitleAuthorSuggestion};

    #[derive(Default)]
    struct StaticBackend {
        queries: Mutex<Vec<(String, SearchType)>>,
    }

    #[async_trait]
    impl SearchBackend for StaticBackend {
        async fn search(&self, request: &SearchRequest) -> std::result::Result<Vec<SearchHit>, SearchError> {
            self.queries
                .lock()
                .push((request.search_query.clone(), request.search_type));
            Ok(vec![SearchHit {
                id: "P1583".to_string(),
                score: Some(1.0),
                pref_label: Some(request.search_query.clone()),
                source: Value::Null,
            }])
        }
    }

    struct EchoSuggester;

    #[async_trait]
    impl TitleAuthorSuggester for EchoSuggester {
        async fn suggest(&self, content: &str) -> std::result::Result<TitleAuthorSuggestion, SuggestError> {
            Ok(TitleAuthorSuggestion {
                suggested_title: Some(content.chars().take(5).collect()),
                ..Default::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_field_debounces() {
        let backend = Arc::new(StaticBackend::default());
        let assistants = Assistants {
            search: Some(backend.clone() as Arc<dyn SearchBackend>),
            search_debounce: Duration::from_millis(500),
            ..Default::default()
        };
        let app = app(state(None, assistants));
        let id = open_session(&app, "text").await;
        let uri = format!("/api/v1/sessions/{}/search", id);

        for query in ["tsong", "tsong kha", "tsong kha pa"] {
            let (status, _) = send(
                &app,
                "PUT",
                &uri,
                Some(json!({ "query": query, "type": "Person" })),
            )
            .await;
            assert_eq!(status, StatusCode::ACCEPTED);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::sleep(Duration::from_millis(600)).await;

        let (_, field) = send(&app, "GET", &format!("{}?type=Person", uri), None).await;
        assert_eq!(field["query"], "tsong kha pa");
        assert_eq!(field["results"][0]["id"], "P1583");
        assert_eq!(
            *backend.queries.lock(),
            vec![("tsong kha pa".to_string(), SearchType::Person)]
        );

        let (_, other) = send(&app, "GET", &uri, None).await;
        assert_eq!(other["query"], "");
    }

    #[tokio::test]
    async fn test_search_unconfigured() {
        let app = app(state(None, Assistants::default()));
        let id = open_session(&app, "text").await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/v1/sessions/{}/search", id),
            Some(json!({ "query": "rgyud" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "not_configured");
    }

    #[tokio::test]
    async fn test_suggestion_for_document() {
        let assistants = Assistants {
            suggester: Some(Arc::new(EchoSuggester) as Arc<dyn TitleAuthorSuggester>),
            ..Default::default()
        };
        let app = app(state(None, assistants));
        let id = open_session(&app, "shes rab snying po").await;
        let uri = format!("/api/v1/sessions/{}/suggestion", id);

        let (status, body) = send(&app, "PUT", &uri, None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["is_loading"], true);

        let mut current = Value::Null;
        for _ in 0..20 {
            tokio::task::yield_now().await;
            current = send(&app, "GET", &uri, None).await.1;
            if current["is_loading"] == false {
                break;
            }
        }
        assert_eq!(current["suggestion"]["suggested_title"], "shes ");
    }
}
