pub mod api;
pub mod config;
pub mod crypto;
pub mod enml;
pub mod error;
pub mod evernote;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::AppError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn store::TokenRepository>,
    pub crypto: crypto::CryptoEngine,
    pub evernote: Arc<dyn evernote::EvernoteApi>,
}

pub type SharedState = Arc<AppState>;
