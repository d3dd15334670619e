//! Request gating for title/author suggestions
//!
//! Suggestions are slow and the user may ask again, edit the content or
//! dismiss the panel while a request is still running. A response is only
//! applied if it belongs to the latest request and that request was not
//! aborted; late answers are dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::provider::{SuggestError, TitleAuthorSuggester, TitleAuthorSuggestion};

/// Identifies one suggestion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Decides whether a response may still be applied
#[derive(Debug, Default)]
pub struct SuggestionGate {
    latest: u64,
    aborted: bool,
    settled: bool,
}

impl SuggestionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding any earlier one
    pub fn begin(&mut self) -> RequestToken {
        self.latest += 1;
        self.aborted = false;
        self.settled = false;
        RequestToken(self.latest)
    }

    /// Abort the current request. No effect once it has settled.
    pub fn abort(&mut self) {
        if !self.settled {
            self.aborted = true;
        }
    }

    pub fn accepts(&self, token: RequestToken) -> bool {
        token.0 == self.latest && !self.aborted && !self.settled
    }

    /// Mark the response for `token` as applied; false if it must be ignored
    pub fn settle(&mut self, token: RequestToken) -> bool {
        if !self.accepts(token) {
            return false;
        }
        self.settled = true;
        true
    }
}

/// Observable suggestion panel state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionState {
    pub is_loading: bool,
    pub suggestion: Option<TitleAuthorSuggestion>,
    pub error: Option<String>,
}

struct Inner {
    gate: SuggestionGate,
    task: Option<JoinHandle<()>>,
}

/// Runs suggestion requests, applying only current responses
pub struct SuggestionController<P: TitleAuthorSuggester + ?Sized + 'static> {
    provider: Arc<P>,
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<SuggestionState>>,
}

impl<P: TitleAuthorSuggester + ?Sized + 'static> SuggestionController<P> {
    pub fn new(provider: Arc<P>) -> Self {
        let (state, _) = watch::channel(SuggestionState::default());
        Self {
            provider,
            inner: Arc::new(Mutex::new(Inner {
                gate: SuggestionGate::new(),
                task: None,
            })),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    /// Ask for a suggestion for `content`, superseding any running request
    pub fn request(&self, content: impl Into<String>) -> RequestToken {
        let content = content.into();
        let mut inner = self.inner.lock();
        let token = inner.gate.begin();
        if let Some(task) = inner.task.take() {
            task.abort();
        }

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.inner);
        let state = Arc::clone(&self.state);

        inner.task = Some(tokio::spawn(async move {
            let outcome = provider.suggest(&content).await;
            apply_response(&shared, &state, token, outcome);
        }));

        token
    }

    /// Abort the running request, if any
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.gate.abort();
        if let Some(task) = inner.task.take() {
            task.abort();
            self.state.send_modify(|s| s.is_loading = false);
        }
    }
}

/// Apply the response for `token` unless it was superseded or aborted
fn apply_response(
    shared: &Mutex<Inner>,
    state: &watch::Sender<SuggestionState>,
    token: RequestToken,
    outcome: Result<TitleAuthorSuggestion, SuggestError>,
) -> bool {
    let mut inner = shared.lock();
    if !inner.gate.settle(token) {
        tracing::debug!(?token, "Ignoring stale suggestion response");
        return false;
    }
    inner.task = None;
    state.send_modify(|s| {
        s.is_loading = false;
        match outcome {
            Ok(suggestion) => s.suggestion = Some(suggestion),
            Err(e) if e.is_abort() => {}
            Err(e) => {
                tracing::warn!("Title/author suggestion failed: {}", e);
                s.error = Some(e.to_string());
            }
        }
    });
    true
}
