use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use remarker::config::Config;
use remarker::crypto::CryptoEngine;
use remarker::evernote::EvernoteClient;
use remarker::store::{self, TokenStore};
use remarker::{api, AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config first so the profile can pick the default log filter
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.profile.default_log_filter().into()),
        )
        .init();

    info!(
        "remarker v{} ({} profile)",
        env!("CARGO_PKG_VERSION"),
        config.profile.as_str()
    );
    info!("Listening on {}:{}", config.host, config.port);

    // Initialize components
    let crypto = CryptoEngine::new(&config.master_key, &config.session_secret)?;
    let store = TokenStore::new(&config.database_url, crypto.clone()).await?;
    store.migrate().await?;
    info!("Database connected and migrated ✓");

    let evernote_host = config.evernote_host();
    let evernote = EvernoteClient::new(
        config.evernote_consumer_key.clone(),
        config.evernote_consumer_secret.clone(),
        evernote_host.clone(),
    )?;
    info!("Evernote service host: {evernote_host}");

    // Build shared state
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store: Arc::new(store),
        crypto,
        evernote: Arc::new(evernote),
    });

    // Start request token purge daemon
    let daemon_state = state.clone();
    tokio::spawn(async move {
        store::purge_daemon(daemon_state).await;
    });

    // Build router
    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
