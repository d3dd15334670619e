//! In-memory annotation store for a single document
//!
//! The store is the only code allowed to mutate the annotation set. Every
//! effective mutation bumps the revision and notifies subscribers, so
//! consumers (the projector, the HTTP layer) can tell when to recompute.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use super::types::{
    Annotation, AnnotationPatch, BibliographyType, NewAnnotation, StaleAnnotation,
};

/// Identifies one state of one store instance
///
/// Two revisions are equal only if they come from the same store and no
/// mutation happened in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Revision {
    pub store: Uuid,
    pub version: u64,
}

/// Ordered collection of bibliographic annotations
pub struct AnnotationStore {
    instance: Uuid,
    document_id: Option<String>,
    annotations: Vec<Annotation>,
    /// Millisecond prefix of the latest id; never decreases
    id_millis: i64,
    /// Suffixes already issued under `id_millis`
    id_suffixes: HashSet<String>,
    last_timestamp: Option<DateTime<Utc>>,
    version: u64,
    changes: watch::Sender<u64>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    /// Create an empty store not yet bound to a document
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            instance: Uuid::new_v4(),
            document_id: None,
            annotations: Vec::new(),
            id_millis: i64::MIN,
            id_suffixes: HashSet::new(),
            last_timestamp: None,
            version: 0,
            changes,
        }
    }

    /// Create an empty store for `document_id`
    pub fn for_document(document_id: impl Into<String>) -> Self {
        let mut store = Self::new();
        store.document_id = Some(document_id.into());
        store
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Bind the store to another document, dropping every annotation
    pub fn switch_document(&mut self, document_id: impl Into<String>) {
        let document_id = document_id.into();
        tracing::debug!(
            from = ?self.document_id,
            to = %document_id,
            "Switching annotation store document"
        );
        self.document_id = Some(document_id);
        self.clear();
    }

    /// Store a new annotation, assigning its id and timestamp
    pub fn add(&mut self, new: NewAnnotation) -> Annotation {
        let annotation = Annotation {
            id: self.next_id(),
            span: new.span,
            annotation_type: new.annotation_type,
            text: new.text,
            timestamp: self.next_timestamp(),
        };

        tracing::debug!(
            id = %annotation.id,
            kind = %annotation.annotation_type,
            start = annotation.span.start,
            end = annotation.span.end,
            "Annotation added"
        );

        self.annotations.push(annotation.clone());
        self.bump();
        annotation
    }

    /// Remove an annotation by id. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        let removed = self.annotations.len() != before;
        if removed {
            tracing::debug!(id = %id, "Annotation removed");
            self.bump();
        }
        removed
    }

    /// Remove every annotation
    pub fn clear(&mut self) {
        if self.annotations.is_empty() {
            return;
        }
        tracing::debug!(count = self.annotations.len(), "Annotations cleared");
        self.annotations.clear();
        self.bump();
    }

    /// Remove each of `sent` that is still stored exactly as given
    ///
    /// Annotations edited or added after `sent` was taken stay in the store.
    pub fn remove_unchanged(&mut self, sent: &[Annotation]) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| !sent.contains(a));
        let removed = before - self.annotations.len();
        if removed > 0 {
            tracing::debug!(removed, kept = self.annotations.len(), "Submitted annotations removed");
            self.bump();
        }
        removed
    }

    /// Merge `patch` into the annotation with `id`
    ///
    /// Returns whether the annotation changed. Unknown ids are ignored.
    pub fn update(&mut self, id: &str, patch: AnnotationPatch) -> bool {
        let Some(annotation) = self.annotations.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        let changed = patch.apply(annotation);
        if changed {
            tracing::debug!(id = %id, "Annotation updated");
            self.bump();
        }
        changed
    }

    /// Snapshot of annotations of one type, in insertion order
    pub fn list_by_type(&self, annotation_type: BibliographyType) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.annotation_type == annotation_type)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Owned copy of every annotation, in insertion order
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }

    /// Annotations ordered by start offset, then end offset
    pub fn sorted_by_position(&self) -> Vec<Annotation> {
        let mut sorted = self.snapshot();
        sorted.sort_by_key(|a| (a.span.start, a.span.end));
        sorted
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn revision(&self) -> Revision {
        Revision {
            store: self.instance,
            version: self.version,
        }
    }

    /// Receive the latest version number after each mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Annotations whose captured text differs from `document` at their span
    pub fn stale_annotations(&self, document: &str) -> Vec<StaleAnnotation> {
        self.annotations
            .iter()
            .filter_map(|a| {
                let current = a.span.slice(document);
                (current != a.text).then(|| StaleAnnotation {
                    id: a.id.clone(),
                    captured: a.text.clone(),
                    current: current.to_string(),
                })
            })
            .collect()
    }

    fn bump(&mut self) {
        self.version += 1;
        self.changes.send_replace(self.version);
    }

    /// `<millis>-<9 hex>` with a non-decreasing millisecond prefix
    ///
    /// Ids with an older prefix can never collide with new ones, so only
    /// the suffixes of the current millisecond are remembered.
    fn next_id(&mut self) -> String {
        let millis = Utc::now().timestamp_millis().max(self.id_millis);
        if millis != self.id_millis {
            self.id_millis = millis;
            self.id_suffixes.clear();
        }
        loop {
            let mut suffix = Uuid::new_v4().simple().to_string();
            suffix.truncate(9);
            if self.id_suffixes.insert(suffix.clone()) {
                return format!("{}-{}", millis, suffix);
            }
        }
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}
