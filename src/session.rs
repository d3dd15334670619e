//! Editing sessions
//!
//! A session binds one document to one annotation store and one projector.
//! Sessions are never shared between documents: switching the document
//! clears the store.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use crate::annotations::{
    Annotation, AnnotationPatch, AnnotationStore, BibliographyType, NewAnnotation, Span,
};
use crate::decorations::{render_markup, DecorationSet, MarkupConfig, Projector, StyleTable};
use crate::search::{DebouncedSearch, SearchBackend, SearchType, DEFAULT_DEBOUNCE};
use crate::submission::{convert, CreateInstance, SubmissionAnnotation, Vocabulary};
use crate::suggest::{SuggestionController, TitleAuthorSuggester};
use crate::sync::{AltTitlesSync, LocalizedTitle};

/// Text being catalogued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Length in characters; annotation offsets use the same unit
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

pub struct EditingSession {
    id: Uuid,
    document: Document,
    store: AnnotationStore,
    projector: Projector,
    alt_titles: AltTitlesSync,
    markup: MarkupConfig,
}

impl EditingSession {
    pub fn new(document: Document, styles: Arc<StyleTable>, cache_capacity: usize) -> Self {
        let store = AnnotationStore::for_document(document.id.clone());
        Self {
            id: Uuid::new_v4(),
            document,
            store,
            projector: Projector::with_capacity(styles, cache_capacity),
            alt_titles: AltTitlesSync::default(),
            markup: MarkupConfig::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn alt_titles(&self) -> &AltTitlesSync {
        &self.alt_titles
    }

    pub fn alt_titles_mut(&mut self) -> &mut AltTitlesSync {
        &mut self.alt_titles
    }

    /// Annotate `span` of the current document, capturing its text
    pub fn annotate(&mut self, span: Span, annotation_type: BibliographyType) -> Annotation {
        let captured = span
            .clamp_to(self.document.char_len())
            .slice(&self.document.content)
            .to_string();
        self.store
            .add(NewAnnotation::new(span, annotation_type, captured))
    }

    /// Update an annotation, recapturing its text when only the span moves
    ///
    /// Returns the annotation after the update, or `None` for unknown ids.
    pub fn update_annotation(&mut self, id: &str, mut patch: AnnotationPatch) -> Option<Annotation> {
        if let (Some(span), None) = (patch.span, patch.text.as_ref()) {
            let captured = span
                .clamp_to(self.document.char_len())
                .slice(&self.document.content);
            patch.text = Some(captured.to_string());
        }
        self.store.update(id, patch);
        self.store.get(id).cloned()
    }

    /// Replace the document text, keeping annotations
    ///
    /// Spans are not rebased; callers re-annotate or use
    /// [`AnnotationStore::stale_annotations`] to find drifted ones.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.document.content = content.into();
    }

    /// Replace the document and drop every annotation of the previous one
    pub fn switch_document(&mut self, document: Document) {
        self.store.switch_document(document.id.clone());
        self.alt_titles = AltTitlesSync::default();
        self.document = document;
    }

    pub fn decorations(&mut self, viewport: Option<Range<usize>>) -> Arc<DecorationSet> {
        let len = self.document.char_len();
        self.projector.decorations(&self.store, len, viewport)
    }

    /// HTML preview of the document with its decorations
    pub fn markup(&mut self, viewport: Option<Range<usize>>) -> String {
        let decorations = self.decorations(viewport);
        render_markup(&self.document.content, &decorations, &self.markup)
    }

    pub fn submission(&self, vocabulary: Vocabulary) -> Vec<SubmissionAnnotation> {
        convert(self.store.sorted_by_position().iter(), vocabulary)
    }

    /// Build the instance creation payload
    ///
    /// Pending alternative titles are added to the metadata unless the
    /// caller already set `alt_titles`. The returned ticket records what was
    /// sent so the outcome can be applied after the lock is released.
    pub fn instance_payload(
        &mut self,
        vocabulary: Vocabulary,
        mut metadata: Map<String, Value>,
    ) -> (CreateInstance, SubmissionTicket) {
        let mut alt_version = None;
        if !metadata.contains_key("alt_titles") {
            if let Some(outgoing) = self.alt_titles.outgoing() {
                alt_version = Some(outgoing.version);
                metadata.insert("alt_titles".to_string(), titles_value(&outgoing.titles));
            }
        }

        let annotations = self.store.sorted_by_position();
        let payload = CreateInstance {
            metadata,
            annotation: Vec::new(),
            biblography_annotation: convert(annotations.iter(), vocabulary),
            content: self.document.content.clone(),
        };
        (
            payload,
            SubmissionTicket {
                annotations,
                alt_version,
            },
        )
    }

    /// The catalog accepted the submission
    ///
    /// Only annotations still stored as they were sent are removed; anything
    /// added or edited while the request was in flight is kept.
    pub fn finish_submission(&mut self, ticket: SubmissionTicket) {
        if let Some(version) = ticket.alt_version {
            self.alt_titles.acknowledge(version);
        }
        self.store.remove_unchanged(&ticket.annotations);
    }

    /// The catalog refused or never received the submission
    pub fn abort_submission(&mut self, ticket: SubmissionTicket) {
        if let Some(version) = ticket.alt_version {
            self.alt_titles.release(version);
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            document_id: self.document.id.clone(),
            document_length: self.document.char_len(),
            annotation_count: self.store.len(),
            version: self.store.revision().version,
        }
    }
}

fn titles_value(titles: &[LocalizedTitle]) -> Value {
    Value::Array(
        titles
            .iter()
            .map(|t| {
                Value::Object(
                    t.iter()
                        .map(|(lang, text)| (lang.clone(), Value::String(text.clone())))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// What one submission sent, as of the moment its payload was built
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub annotations: Vec<Annotation>,
    pub alt_version: Option<u64>,
}

/// Session overview returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub document_id: String,
    pub document_length: usize,
    pub annotation_count: usize,
    pub version: u64,
}

pub type SharedSession = Arc<Mutex<EditingSession>>;

pub type FieldSearch = DebouncedSearch<dyn SearchBackend>;

/// Network helpers handed to every new session
#[derive(Clone)]
pub struct Assistants {
    pub search: Option<Arc<dyn SearchBackend>>,
    pub search_debounce: Duration,
    pub search_page_size: usize,
    pub suggester: Option<Arc<dyn TitleAuthorSuggester>>,
}

impl Default for Assistants {
    fn default() -> Self {
        Self {
            search: None,
            search_debounce: DEFAULT_DEBOUNCE,
            search_page_size: 20,
            suggester: None,
        }
    }
}

/// Per-session search fields and suggestion panel
pub struct SessionAssist {
    assistants: Assistants,
    searches: Mutex<HashMap<SearchType, Arc<FieldSearch>>>,
    suggestion: Option<SuggestionController<dyn TitleAuthorSuggester>>,
}

impl SessionAssist {
    fn new(assistants: Assistants) -> Self {
        let suggestion = assistants
            .suggester
            .as_ref()
            .map(|p| SuggestionController::new(Arc::clone(p)));
        Self {
            assistants,
            searches: Mutex::new(HashMap::new()),
            suggestion,
        }
    }

    /// Search field for `search_type`, created on first use
    pub fn search(&self, search_type: SearchType) -> Option<Arc<FieldSearch>> {
        let backend = self.assistants.search.as_ref()?;
        let mut searches = self.searches.lock();
        let field = searches.entry(search_type).or_insert_with(|| {
            Arc::new(
                DebouncedSearch::new(
                    Arc::clone(backend),
                    search_type,
                    self.assistants.search_debounce,
                )
                .with_size(self.assistants.search_page_size),
            )
        });
        Some(Arc::clone(field))
    }

    pub fn suggestion(&self) -> Option<&SuggestionController<dyn TitleAuthorSuggester>> {
        self.suggestion.as_ref()
    }
}

impl Drop for SessionAssist {
    fn drop(&mut self) {
        if let Some(suggestion) = &self.suggestion {
            suggestion.abort();
        }
    }
}

struct SessionEntry {
    session: SharedSession,
    assist: Arc<SessionAssist>,
    last_access: Mutex<Instant>,
}

impl SessionEntry {
    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }
}

/// Live editing sessions by id
pub struct SessionRegistry {
    styles: Arc<StyleTable>,
    cache_capacity: usize,
    assistants: Assistants,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(styles: Arc<StyleTable>, cache_capacity: usize) -> Self {
        Self {
            styles,
            cache_capacity,
            assistants: Assistants::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_assistants(mut self, assistants: Assistants) -> Self {
        self.assistants = assistants;
        self
    }

    pub fn create(&self, document: Document) -> SharedSession {
        let session = EditingSession::new(document, Arc::clone(&self.styles), self.cache_capacity);
        let id = session.id();
        tracing::info!(session = %id, document = %session.document().id, "Opened editing session");

        let shared = Arc::new(Mutex::new(session));
        let entry = SessionEntry {
            session: Arc::clone(&shared),
            assist: Arc::new(SessionAssist::new(self.assistants.clone())),
            last_access: Mutex::new(Instant::now()),
        };
        self.sessions.write().insert(id, entry);
        shared
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().get(id).map(|entry| {
            entry.touch();
            Arc::clone(&entry.session)
        })
    }

    pub fn assist(&self, id: &Uuid) -> Option<Arc<SessionAssist>> {
        self.sessions.read().get(id).map(|entry| {
            entry.touch();
            Arc::clone(&entry.assist)
        })
    }

    /// Close sessions not accessed for at least `max_idle`
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = now.saturating_duration_since(*entry.last_access.lock());
            let keep = idle < max_idle;
            if !keep {
                tracing::info!(session = %id, idle_secs = idle.as_secs(), "Expired idle editing session");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "Closed editing session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn session(content: &str) -> EditingSession {
        EditingSession::new(
            Document::new("doc-1", content),
            Arc::new(StyleTable::default()),
            8,
        )
    }

    #[test]
    fn test_annotate_captures_text() {
        let mut s = session("བཀྲ་ཤིས་བདེ་ལེགས།");
        let a = s.annotate(Span::new(0, 4), BibliographyType::Title);
        assert_eq!(a.text, "བཀྲ་");

        let clamped = s.annotate(Span::new(8, 500), BibliographyType::Colophon);
        assert_eq!(clamped.text, "བདེ་ལེགས།");
        assert_eq!(clamped.span, Span::new(8, 500));
    }

    #[test]
    fn test_decorations_follow_store() {
        let mut s = session("abcdefghijklmnopqrst");
        s.annotate(Span::new(5, 10), BibliographyType::Title);

        let first = s.decorations(None);
        assert_eq!(first.len(), 1);

        s.store_mut().clear();
        assert!(s.decorations(None).is_empty());
    }

    #[test]
    fn test_update_annotation_recaptures_text() {
        let mut s = session("abcdefghij");
        let a = s.annotate(Span::new(0, 3), BibliographyType::Title);

        let moved = s
            .update_annotation(
                &a.id,
                AnnotationPatch {
                    span: Some(Span::new(3, 6)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(moved.text, "def");
        assert_eq!(moved.annotation_type, BibliographyType::Title);

        assert!(s.update_annotation("missing", AnnotationPatch::default()).is_none());
    }

    #[test]
    fn test_set_content_keeps_annotations() {
        let mut s = session("abcdefghij");
        s.annotate(Span::new(0, 3), BibliographyType::Title);
        s.set_content("xyzdefghij and more");

        assert_eq!(s.store().len(), 1);
        assert_eq!(s.store().stale_annotations(&s.document().content).len(), 1);
    }

    #[test]
    fn test_switch_document_clears_store() {
        let mut s = session("abcdefghij");
        s.annotate(Span::new(0, 3), BibliographyType::Title);
        s.switch_document(Document::new("doc-2", "other text"));

        assert!(s.store().is_empty());
        assert_eq!(s.store().document_id(), Some("doc-2"));
        assert_eq!(s.summary().document_length, 10);
    }

    #[test]
    fn test_markup_wraps_span() {
        let mut s = session("The title <here>");
        s.annotate(Span::new(4, 9), BibliographyType::Title);

        let html = s.markup(None);
        assert!(html.starts_with("The <span"));
        assert!(html.contains(">title</span>"));
        assert!(html.ends_with("&lt;here&gt;"));
    }

    #[test]
    fn test_instance_payload_and_finish() {
        let mut s = session("abcdefghijklmnopqrst");
        s.annotate(Span::new(10, 15), BibliographyType::Person);
        s.annotate(Span::new(0, 5), BibliographyType::Title);
        let version = s
            .alt_titles_mut()
            .edit(vec![BTreeMap::from([("en".to_string(), "Alt".to_string())])]);

        let (payload, ticket) = s.instance_payload(Vocabulary::Author, Map::new());
        assert_eq!(ticket.alt_version, Some(version));
        assert_eq!(ticket.annotations.len(), 2);
        assert_eq!(payload.biblography_annotation.len(), 2);
        assert_eq!(payload.biblography_annotation[0].span, Span::new(0, 5));
        assert_eq!(payload.metadata["alt_titles"][0]["en"], "Alt");
        assert_eq!(payload.content, "abcdefghijklmnopqrst");

        s.finish_submission(ticket);
        assert!(s.store().is_empty());
        assert!(!s.alt_titles().has_pending());
    }

    #[test]
    fn test_finish_keeps_annotations_made_in_flight() {
        let mut s = session("abcdefghijklmnopqrst");
        let sent = s.annotate(Span::new(0, 5), BibliographyType::Title);
        let edited = s.annotate(Span::new(6, 9), BibliographyType::Title);
        let (_, ticket) = s.instance_payload(Vocabulary::Author, Map::new());

        let added = s.annotate(Span::new(10, 15), BibliographyType::Person);
        s.update_annotation(
            &edited.id,
            AnnotationPatch {
                span: Some(Span::new(6, 10)),
                ..Default::default()
            },
        );

        s.finish_submission(ticket);
        assert_eq!(s.store().len(), 2);
        assert!(s.store().get(&sent.id).is_none());
        assert_eq!(s.store().get(&edited.id).unwrap().text, "ghij");
        assert!(s.store().get(&added.id).is_some());
    }

    #[test]
    fn test_abort_keeps_store_and_releases_titles() {
        let mut s = session("abcdefghij");
        s.annotate(Span::new(0, 3), BibliographyType::Title);
        s.alt_titles_mut()
            .edit(vec![BTreeMap::from([("bo".to_string(), "mtshan".to_string())])]);

        let (_, ticket) = s.instance_payload(Vocabulary::Author, Map::new());
        s.abort_submission(ticket);

        assert_eq!(s.store().len(), 1);
        assert!(s.alt_titles().has_pending());
        let (retry, _) = s.instance_payload(Vocabulary::Author, Map::new());
        assert_eq!(retry.metadata["alt_titles"][0]["bo"], "mtshan");
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = SessionRegistry::new(Arc::new(StyleTable::default()), 4);
        let a = registry.create(Document::new("a", "one"));
        let b = registry.create(Document::new("b", "two"));
        let a_id = a.lock().id();
        let b_id = b.lock().id();

        assert_ne!(a_id, b_id);
        assert_eq!(registry.len(), 2);

        a.lock().annotate(Span::new(0, 3), BibliographyType::Title);
        assert!(b.lock().store().is_empty());

        assert!(registry.remove(&a_id));
        assert!(!registry.remove(&a_id));
        assert!(registry.get(&a_id).is_none());
        assert!(registry.get(&b_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_sessions() {
        let registry = SessionRegistry::new(Arc::new(StyleTable::default()), 4);
        let idle = registry.create(Document::new("a", "one")).lock().id();
        let active = registry.create(Document::new("b", "two")).lock().id();

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(registry.get(&active).is_some());
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.evict_idle(Duration::from_secs(60)), 1);
        assert!(registry.get(&idle).is_none());
        assert!(registry.assist(&idle).is_none());
        assert!(registry.get(&active).is_some());
        assert_eq!(registry.evict_idle(Duration::from_secs(60)), 0);
    }

    #[test]
    fn test_assist_without_backends() {
        let registry = SessionRegistry::new(Arc::new(StyleTable::default()), 4);
        let id = registry.create(Document::new("a", "one")).lock().id();

        let assist = registry.assist(&id).unwrap();
        assert!(assist.search(SearchType::Person).is_none());
        assert!(assist.suggestion().is_none());
    }
}
