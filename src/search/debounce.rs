//! Debounced, cancellable search for a single search field
//!
//! Each keystroke calls [`DebouncedSearch::set_query`]. The request is only
//! issued once the query has been stable for the debounce delay. A newer
//! query aborts whatever the previous one was doing (waiting or in flight),
//! so there is at most one outstanding request per field, and a response
//! is only written if its generation is still the latest.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{
    SearchBackend, SearchError, SearchHit, SearchRequest, SearchState, SearchType,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

#[derive(Default)]
struct Pending {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Debounced search controller
pub struct DebouncedSearch<B: SearchBackend + ?Sized + 'static> {
    backend: Arc<B>,
    delay: Duration,
    search_type: SearchType,
    size: usize,
    pending: Arc<Mutex<Pending>>,
    state: Arc<watch::Sender<SearchState>>,
}

impl<B: SearchBackend + ?Sized + 'static> DebouncedSearch<B> {
    pub fn new(backend: Arc<B>, search_type: SearchType, delay: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            backend,
            delay,
            search_type,
            size: 20,
            pending: Arc::new(Mutex::new(Pending::default())),
            state: Arc::new(state),
        }
    }

    /// Page size of issued requests
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Record a new query value, restarting the debounce window
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let mut pending = self.pending.lock();
        pending.generation += 1;
        let generation = pending.generation;

        if let Some(task) = pending.task.take() {
            task.abort();
        }

        if query.trim().is_empty() {
            self.state.send_replace(SearchState {
                query,
                ..Default::default()
            });
            return;
        }

        self.state.send_modify(|s| {
            s.query = query.clone();
            s.is_loading = false;
        });

        let request = SearchRequest {
            size: self.size,
            ..SearchRequest::new(query, self.search_type)
        };
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.pending);
        let state = Arc::clone(&self.state);
        let delay = self.delay;

        pending.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let current = shared.lock();
                if current.generation != generation {
                    return;
                }
                state.send_modify(|s| {
                    s.is_loading = true;
                    s.error = None;
                });
            }

            tracing::debug!(query = %request.search_query, "Issuing search");
            let outcome = backend.search(&request).await;

            let current = shared.lock();
            if current.generation != generation {
                tracing::debug!(
                    query = %request.search_query,
                    "Discarding superseded search response"
                );
                return;
            }
            apply_outcome(&state, outcome);
        }));
    }

    /// Cancel any pending or in-flight request
    pub fn cancel(&self) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        self.state.send_modify(|s| s.is_loading = false);
    }
}

impl<B: SearchBackend + ?Sized + 'static> Drop for DebouncedSearch<B> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.lock().task.take() {
            task.abort();
        }
    }
}

fn apply_outcome(state: &watch::Sender<SearchState>, outcome: Result<Vec<SearchHit>, SearchError>) {
    state.send_modify(|s| {
        s.is_loading = false;
        match outcome {
            Ok(results) => {
                s.results = results;
                s.error = None;
            }
            Err(e) if e.is_abort() => {}
            Err(e) => {
                tracing::warn!("Search for {:?} failed: {}", s.query, e);
                s.error = Some(e.to_string());
            }
        }
    });
}
