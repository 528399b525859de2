//! Background purge of stale request tokens.
//!
//! A request token is only useful until the user finishes (or abandons) the
//! Evernote authorization page, so anything older than the TTL is deleted.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::AppError;
use crate::AppState;

/// Start the purge loop.
pub async fn purge_daemon(state: Arc<AppState>) {
    let interval = state.config.request_token_purge_interval;
    info!(
        "Request token purge daemon started (interval: {}s, ttl: {}s)",
        interval.as_secs(),
        state.config.request_token_ttl.as_secs()
    );

    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = purge_cycle(&state).await {
            error!("Request token purge failed: {e}");
        }
    }
}

pub(crate) async fn purge_cycle(state: &AppState) -> Result<u64, AppError> {
    let purged = state
        .store
        .purge_request_tokens(state.config.request_token_ttl)
        .await?;

    if purged > 0 {
        info!("Purged {purged} expired request tokens");
    } else {
        debug!("No expired request tokens");
    }
    Ok(purged)
}
