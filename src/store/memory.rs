//! In-memory `TokenRepository` for route and daemon tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::repository::{
    cutoff, AccessTokenRecord, AccessTokenUpsert, RequestTokenRecord, TokenRepository,
};
use crate::error::AppError;
use crate::session::ClientId;

#[derive(Default)]
pub struct MemoryTokenStore {
    request_tokens: Mutex<HashMap<String, RequestTokenRecord>>,
    access_tokens: Mutex<HashMap<ClientId, AccessTokenRecord>>,
}

impl MemoryTokenStore {
    pub async fn insert_request_token_aged(&self, token: &str, secret: &str, age: chrono::Duration) {
        self.request_tokens.lock().await.insert(
            token.to_string(),
            RequestTokenRecord {
                oauth_token: token.to_string(),
                oauth_token_secret: secret.to_string(),
                created_at: Utc::now() - age,
            },
        );
    }

    pub async fn insert_access_token(&self, record: AccessTokenRecord) {
        self.access_tokens
            .lock()
            .await
            .insert(record.client_id, record);
    }

    pub async fn request_token_count(&self) -> usize {
        self.request_tokens.lock().await.len()
    }

    pub async fn access_token_count(&self) -> usize {
        self.access_tokens.lock().await.len()
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenStore {
    async fn insert_request_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
    ) -> Result<(), AppError> {
        self.insert_request_token_aged(oauth_token, oauth_token_secret, chrono::Duration::zero())
            .await;
        Ok(())
    }

    async fn find_request_token(
        &self,
        oauth_token: &str,
        ttl: Duration,
    ) -> Result<Option<RequestTokenRecord>, AppError> {
        let cut = cutoff(ttl);
        Ok(self
            .request_tokens
            .lock()
            .await
            .get(oauth_token)
            .filter(|r| r.created_at > cut)
            .cloned())
    }

    async fn delete_request_token(&self, oauth_token: &str) -> Result<(), AppError> {
        self.request_tokens.lock().await.remove(oauth_token);
        Ok(())
    }

    async fn purge_request_tokens(&self, ttl: Duration) -> Result<u64, AppError> {
        let cut = cutoff(ttl);
        let mut tokens = self.request_tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, r| r.created_at > cut);
        Ok((before - tokens.len()) as u64)
    }

    async fn upsert_access_token(&self, upsert: &AccessTokenUpsert) -> Result<(), AppError> {
        self.insert_access_token(AccessTokenRecord {
            client_id: upsert.client_id,
            access_token: upsert.access_token.clone(),
            note_store_url: upsert.note_store_url.clone(),
            shard: upsert.shard.clone(),
            evernote_user_id: upsert.evernote_user_id.clone(),
            expires_at: upsert.expires_at,
            sandbox_lnb: upsert.sandbox_lnb.clone(),
            auth_time: Utc::now(),
        })
        .await;
        Ok(())
    }

    async fn find_access_token(
        &self,
        client_id: ClientId,
    ) -> Result<Option<AccessTokenRecord>, AppError> {
        Ok(self.access_tokens.lock().await.get(&client_id).cloned())
    }
}
