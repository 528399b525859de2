//! Token store: request tokens for in-flight handshakes and access tokens
//! per browser client.

pub mod db;
#[cfg(test)]
pub mod memory;
pub mod purge;
mod repository;

pub use db::TokenStore;
pub use purge::purge_daemon;
pub use repository::{AccessTokenRecord, AccessTokenUpsert, RequestTokenRecord, TokenRepository};
