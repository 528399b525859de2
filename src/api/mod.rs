//! HTTP surface used by the Remarker browser extension.
//!
//! - POST /notes/sync         save a highlight (or start authorization)
//! - GET  /evernote_callback  OAuth callback from Evernote
//! - GET  /clear_cookie       drop the session cookie
//! - GET  /                   redirect to the project homepage
//! - GET  /status             health check

pub mod post_message;
pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
