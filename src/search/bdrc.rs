//! BDRC autocomplete search client
//!
//! BDRC exposes an Elasticsearch multi-search endpoint. A request is two
//! NDJSON lines: the index header and the query body. The body scores hits
//! with the server-side `bdrc-score` script over a phrase match on the
//! label fields.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::types::{SearchBackend, SearchError, SearchHit, SearchRequest, SearchType};

pub const DEFAULT_BDRC_ENDPOINT: &str = "https://autocomplete.bdrc.io/msearch";

const INDEX: &str = "bdrc_prod";
const SCORE_SCRIPT: &str = "bdrc-score";

/// Label fields for works/instances with their boosts
const WORK_FIELDS: &[&str] = &[
    "seriesName_bo_x_ewts^0.1",
    "seriesName_en^0.1",
    "authorshipStatement_bo_x_ewts^0.005",
    "authorshipStatement_en^0.005",
    "publisherName_bo_x_ewts^0.01",
    "publisherLocation_bo_x_ewts^0.01",
    "publisherName_en^0.01",
    "publisherLocation_en^0.01",
    "prefLabel_bo_x_ewts^1",
    "prefLabel_en^1",
    "comment_bo_x_ewts^0.0001",
    "comment_en^0.0001",
    "altLabel_bo_x_ewts^0.6",
    "altLabel_en^0.6",
];

const PERSON_FIELDS: &[&str] = &[
    "prefLabel_bo_x_ewts^1",
    "prefLabel_en^1",
    "comment_bo_x_ewts^0.0001",
    "comment_en^0.0001",
    "altLabel_bo_x_ewts^0.6",
    "altLabel_en^0.6",
];

const WORK_AGGREGATIONS: &[&str] = &[
    "associatedCentury",
    "associatedTradition",
    "author",
    "etext_access",
    "etext_search",
    "exclude_etexts",
    "inCollection",
    "language",
    "nocomm_search",
    "personGender",
    "placeType",
    "printMethod",
    "scans_access",
    "script",
    "translator",
    "type",
    "workGenre",
    "workIsAbout",
];

const PERSON_AGGREGATIONS: &[&str] =
    &["associatedCentury", "associatedTradition", "personGender", "type"];

const LABEL_SCRIPTS: &[&str] = &["en", "bo_x_ewts", "iast", "hani", "khmr"];

/// Retry policy for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(300),
        }
    }
}

/// Build the multi-search NDJSON body for `request`
pub fn build_msearch_payload(request: &SearchRequest) -> String {
    let person = request.search_type == SearchType::Person;

    let fields = if person { PERSON_FIELDS } else { WORK_FIELDS };
    let aggregation_names = if person {
        PERSON_AGGREGATIONS
    } else {
        WORK_AGGREGATIONS
    };

    let mut aggs: Map<String, Value> = aggregation_names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                json!({ "terms": { "field": name, "size": 1000 } }),
            )
        })
        .collect();
    if !person {
        aggs.insert(
            "etext_quality".to_string(),
            json!({
                "range": {
                    "field": "etext_quality",
                    "ranges": [
                        { "from": 0, "to": 0.95 },
                        { "from": 0.95, "to": 1.01 },
                        { "from": 1.99, "to": 4.01 }
                    ]
                }
            }),
        );
    }

    let mut filter = request.filter.clone();
    filter.push(json!({ "term": { "type": request.search_type.as_str() } }));

    let body = json!({
        "from": request.from,
        "size": request.size,
        "aggs": aggs,
        "highlight": { "fields": highlight_fields(person) },
        "query": {
            "function_score": {
                "script_score": { "script": { "id": SCORE_SCRIPT } },
                "query": {
                    "bool": {
                        "filter": filter,
                        "must": [{
                            "multi_match": {
                                "type": "phrase",
                                "query": request.search_query,
                                "fields": fields
                            }
                        }]
                    }
                }
            }
        }
    });

    format!("{}\n{}\n", json!({ "index": INDEX }), body)
}

fn highlight_fields(person: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    let plain: &[&str] = if person {
        &["type", "associatedTradition", "personGender"]
    } else {
        &[
            "type",
            "associatedTradition",
            "personGender",
            "inCollection",
            "language",
            "script",
            "workGenre",
            "workIsAbout",
            "author",
            "translator",
        ]
    };
    for name in plain {
        fields.insert(name.to_string(), json!({}));
    }

    for script in LABEL_SCRIPTS {
        fields.insert(format!("prefLabel_{}", script), json!({ "fragment_size": 500 }));
        fields.insert(format!("altLabel_{}", script), json!({ "fragment_size": 500 }));
        fields.insert(format!("comment_{}", script), json!({}));
        if !person {
            fields.insert(format!("authorshipStatement_{}", script), json!({}));
            fields.insert(format!("publisherName_{}", script), json!({}));
        }
    }
    fields
}

/// Extract hits from a multi-search response
pub fn parse_msearch_response(value: &Value) -> Result<Vec<SearchHit>, SearchError> {
    let response = value
        .get("responses")
        .and_then(|r| r.get(0))
        .ok_or_else(|| SearchError::Decode("missing responses[0]".to_string()))?;

    if let Some(error) = response.get("error") {
        return Err(SearchError::Decode(format!("search failed: {}", error)));
    }

    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(hits
        .iter()
        .filter_map(|hit| {
            let id = hit.get("_id")?.as_str()?.to_string();
            let source = hit.get("_source").cloned().unwrap_or(Value::Null);
            Some(SearchHit {
                id,
                score: hit.get("_score").and_then(Value::as_f64),
                pref_label: pref_label(&source),
                source,
            })
        })
        .collect())
}

fn pref_label(source: &Value) -> Option<String> {
    ["prefLabel_bo_x_ewts", "prefLabel_en"]
        .iter()
        .filter_map(|field| source.get(*field))
        .find_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        })
}

/// HTTP client for the BDRC multi-search endpoint
#[derive(Clone)]
pub struct BdrcClient {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl BdrcClient {
    pub fn new(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            retry,
        })
    }

    async fn send_once(&self, payload: &str) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await.map_err(map_reqwest)?;
        parse_msearch_response(&value)
    }
}

fn map_reqwest(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else if e.is_decode() {
        SearchError::Decode(e.to_string())
    } else {
        SearchError::Transport(e.to_string())
    }
}

#[async_trait]
impl SearchBackend for BdrcClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        let payload = build_msearch_payload(request);
        let mut attempt = 0;

        loop {
            match self.send_once(&payload).await {
                Ok(hits) => return Ok(hits),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "BDRC search for {:?} failed ({}), retry {}/{}",
                        request.search_query,
                        e,
                        attempt,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!("BDRC search for {:?} failed: {}", request.search_query, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::routing::post;

    use super::*;

    fn lines(payload: &str) -> (Value, Value) {
        let mut it = payload.lines();
        let header = serde_json::from_str(it.next().unwrap()).unwrap();
        let body = serde_json::from_str(it.next().unwrap()).unwrap();
        assert!(it.next().is_none());
        (header, body)
    }

    #[test]
    fn test_payload_is_ndjson_with_trailing_newline() {
        let payload = build_msearch_payload(&SearchRequest::new("sher phyin", SearchType::Instance));
        assert!(payload.ends_with('\n'));

        let (header, body) = lines(&payload);
        assert_eq!(header, json!({ "index": "bdrc_prod" }));
        assert_eq!(body["from"], 0);
        assert_eq!(body["size"], 20);
        assert_eq!(
            body.pointer("/query/function_score/script_score/script/id").unwrap(),
            "bdrc-score"
        );
    }

    #[test]
    fn test_payload_filters_append_type() {
        let mut request = SearchRequest::new("dpe cha", SearchType::Text);
        request.filter.push(json!({ "term": { "language": "bo" } }));
        let (_, body) = lines(&build_msearch_payload(&request));

        let filter = body
            .pointer("/query/function_score/query/bool/filter")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter[1], json!({ "term": { "type": "Text" } }));

        let must = body
            .pointer("/query/function_score/query/bool/must/0/multi_match")
            .unwrap();
        assert_eq!(must["type"], "phrase");
        assert_eq!(must["query"], "dpe cha");
        assert_eq!(must["fields"].as_array().unwrap().len(), WORK_FIELDS.len());
        assert!(body["aggs"].get("etext_quality").is_some());
    }

    #[test]
    fn test_person_payload_uses_person_fields() {
        let (_, body) = lines(&build_msearch_payload(&SearchRequest::new(
            "tsong kha pa",
            SearchType::Person,
        )));

        let fields = body
            .pointer("/query/function_score/query/bool/must/0/multi_match/fields")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(fields.len(), PERSON_FIELDS.len());
        assert!(body["aggs"].get("etext_quality").is_none());
        assert!(body["highlight"]["fields"].get("publisherName_en").is_none());
    }

    #[test]
    fn test_parse_hits() {
        let response = json!({
            "responses": [{
                "hits": { "hits": [
                    { "_id": "MW1", "_score": 3.5, "_source": { "prefLabel_bo_x_ewts": ["shes rab snying po"] } },
                    { "_id": "MW2", "_source": { "prefLabel_en": "Heart Sutra" } },
                    { "_source": {} }
                ]}
            }]
        });

        let hits = parse_msearch_response(&response).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].pref_label.as_deref(), Some("shes rab snying po"));
        assert_eq!(hits[0].score, Some(3.5));
        assert_eq!(hits[1].pref_label.as_deref(), Some("Heart Sutra"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_msearch_response(&json!({})).is_err());
        let empty = parse_msearch_response(&json!({ "responses": [{}] })).unwrap();
        assert!(empty.is_empty());
    }

    /// Local msearch endpoint that fails `failures` times with `status`
    #[derive(Clone)]
    struct FlakyEndpoint {
        attempts: Arc<AtomicUsize>,
        failures: usize,
        status: axum::http::StatusCode,
    }

    async fn flaky_msearch(
        State(endpoint): State<FlakyEndpoint>,
        body: String,
    ) -> (axum::http::StatusCode, axum::Json<Value>) {
        assert!(body.starts_with("{\"index\":\"bdrc_prod\"}"));
        let attempt = endpoint.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < endpoint.failures {
            return (endpoint.status, axum::Json(json!({ "error": "busy" })));
        }
        (
            axum::http::StatusCode::OK,
            axum::Json(json!({
                "responses": [{ "hits": { "hits": [
                    { "_id": "P64", "_source": { "prefLabel_en": "Tsongkhapa" } }
                ]}}]
            })),
        )
    }

    async fn spawn_endpoint(failures: usize, status: axum::http::StatusCode) -> (String, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let router = axum::Router::new()
            .route("/msearch", post(flaky_msearch))
            .with_state(FlakyEndpoint {
                attempts: Arc::clone(&attempts),
                failures,
                status,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/msearch", addr), attempts)
    }

    fn client(endpoint: &str, max_retries: u32) -> BdrcClient {
        BdrcClient::new(
            endpoint,
            Duration::from_secs(5),
            RetryPolicy {
                max_retries,
                backoff: Duration::from_millis(5),
            },
        )
        .unwrap()
    }

    fn person(query: &str) -> SearchRequest {
        SearchRequest::new(query, SearchType::Person)
    }

    #[tokio::test]
    async fn test_search_retries_server_errors() {
        let (endpoint, attempts) = spawn_endpoint(2, axum::http::StatusCode::SERVICE_UNAVAILABLE).await;

        let hits = client(&endpoint, 3).search(&person("tsong kha pa")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "P64");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_gives_up_after_max_retries() {
        let (endpoint, attempts) = spawn_endpoint(10, axum::http::StatusCode::BAD_GATEWAY).await;

        let err = client(&endpoint, 2).search(&person("tsong kha pa")).await.unwrap_err();
        assert!(matches!(err, SearchError::Http { status: 502, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_does_not_retry_client_errors() {
        let (endpoint, attempts) = spawn_endpoint(10, axum::http::StatusCode::NOT_FOUND).await;

        let err = client(&endpoint, 3).search(&person("tsong kha pa")).await.unwrap_err();
        assert!(matches!(err, SearchError::Http { status: 404, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_transport_error_is_retried() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/msearch", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&endpoint, 1).search(&person("dpe cha")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!SearchError::Http { status: 404, body: String::new() }.is_retryable());
        assert!(!SearchError::Aborted.is_retryable());
    }
}
