//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::decorations::StyleTable;
use crate::session::{Assistants, SessionRegistry};
use crate::submission::{CatalogApi, Vocabulary};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionRegistry,
    catalog: Option<Arc<dyn CatalogApi>>,
}

impl AppState {
    /// Create the application state
    ///
    /// `catalog` is `None` when no catalog endpoint is configured; submission
    /// endpoints then answer 503.
    pub fn new(
        config: Config,
        styles: Arc<StyleTable>,
        catalog: Option<Arc<dyn CatalogApi>>,
        assistants: Assistants,
    ) -> Self {
        let sessions = SessionRegistry::new(styles, config.annotations.projection_cache_size)
            .with_assistants(assistants);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                catalog,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session registry
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Get the catalog client, if configured
    pub fn catalog(&self) -> Option<&Arc<dyn CatalogApi>> {
        self.inner.catalog.as_ref()
    }

    /// Vocabulary used for submissions
    pub fn vocabulary(&self) -> Vocabulary {
        self.inner.config.annotations.vocabulary
    }

    /// Start the background task that closes idle sessions
    pub fn start_session_sweeper(&self, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = (max_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let expired = state.sessions().evict_idle(max_idle);
                if expired > 0 {
                    tracing::debug!(expired, remaining = state.sessions().len(), "Swept idle sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Document;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_closes_idle_sessions() {
        let state = AppState::new(
            Config::default(),
            Arc::new(StyleTable::default()),
            None,
            Assistants::default(),
        );
        state.sessions().create(Document::new("doc-1", "dkar chag"));

        let sweeper = state.start_session_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(state.sessions().len(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(state.sessions().is_empty());
        sweeper.abort();
    }
}
