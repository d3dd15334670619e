//! Cataloger Server
//!
//! Editing sessions for bibliographic span annotation, with BDRC lookup,
//! title/author suggestions and submission to the OpenPecha catalog.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cataloger_server::config::Config;
use cataloger_server::decorations::StyleTable;
use cataloger_server::routes;
use cataloger_server::search::{BdrcClient, RetryPolicy, SearchBackend};
use cataloger_server::session::Assistants;
use cataloger_server::state::AppState;
use cataloger_server::submission::{CatalogApi, HttpCatalogClient};
use cataloger_server::suggest::{HttpSuggester, TitleAuthorSuggester};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cataloger_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Cataloger Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Submission vocabulary: {}", config.annotations.vocabulary);
    tracing::info!("BDRC endpoint: {}", config.search.endpoint);

    let (catalog, suggester) = match config.catalog.endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!("Catalog endpoint: {}", endpoint);
            let catalog: Arc<dyn CatalogApi> = Arc::new(
                HttpCatalogClient::new(endpoint, config.catalog.timeout())
                    .context("Failed to build catalog client")?,
            );
            let suggester: Arc<dyn TitleAuthorSuggester> = Arc::new(
                HttpSuggester::new(endpoint, config.catalog.timeout())
                    .context("Failed to build suggestion client")?,
            );
            (Some(catalog), Some(suggester))
        }
        None => {
            tracing::warn!("OPENPECHA_ENDPOINT not set; submission and suggestions disabled");
            (None, None)
        }
    };

    let bdrc: Arc<dyn SearchBackend> = Arc::new(
        BdrcClient::new(
            &config.search.endpoint,
            config.catalog.timeout(),
            RetryPolicy {
                max_retries: config.search.max_retries,
                ..RetryPolicy::default()
            },
        )
        .context("Failed to build BDRC client")?,
    );

    let assistants = Assistants {
        search: Some(bdrc),
        search_debounce: config.search.debounce(),
        search_page_size: config.search.page_size,
        suggester,
    };

    let app_state = AppState::new(
        config.clone(),
        Arc::new(StyleTable::default()),
        catalog,
        assistants,
    );

    match config.server.session_idle_timeout() {
        Some(max_idle) => {
            tracing::info!("Closing sessions idle for {}s", max_idle.as_secs());
            app_state.start_session_sweeper(max_idle);
        }
        None => tracing::info!("Idle session expiry disabled"),
    }

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid SERVER_HOST: {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Cataloger Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
