use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::session::ClientId;

/// A pending handshake: Evernote's temporary credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTokenRecord {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub created_at: DateTime<Utc>,
}

/// What a successful callback writes for a client.
#[derive(Debug, Clone)]
pub struct AccessTokenUpsert {
    pub client_id: ClientId,
    pub access_token: String,
    pub note_store_url: String,
    pub shard: Option<String>,
    pub evernote_user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Passed through from the callback query untouched.
    pub sandbox_lnb: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessTokenRecord {
    pub client_id: ClientId,
    pub access_token: String,
    pub note_store_url: String,
    pub shard: Option<String>,
    pub evernote_user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub sandbox_lnb: String,
    pub auth_time: DateTime<Utc>,
}

impl AccessTokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|e| e <= Utc::now()).unwrap_or(false)
    }
}

/// Persistence for both halves of the OAuth handshake.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert_request_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
    ) -> Result<(), AppError>;

    /// Look up a request token; records older than `ttl` count as absent.
    async fn find_request_token(
        &self,
        oauth_token: &str,
        ttl: Duration,
    ) -> Result<Option<RequestTokenRecord>, AppError>;

    async fn delete_request_token(&self, oauth_token: &str) -> Result<(), AppError>;

    /// Delete request tokens older than `ttl`, returning how many went.
    async fn purge_request_tokens(&self, ttl: Duration) -> Result<u64, AppError>;

    /// Insert or overwrite the client's access token. One record per client.
    async fn upsert_access_token(&self, upsert: &AccessTokenUpsert) -> Result<(), AppError>;

    async fn find_access_token(
        &self,
        client_id: ClientId,
    ) -> Result<Option<AccessTokenRecord>, AppError>;
}

/// Oldest creation time still inside `ttl`. A TTL reaching past the
/// representable range keeps everything.
pub(crate) fn cutoff(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
