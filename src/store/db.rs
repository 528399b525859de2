//! PostgreSQL-backed token store. Tables:
//! - `evernote_request_tokens`: pending handshakes, keyed by `oauth_token`
//! - `evernote_access_tokens`: one access token per browser `client_id`
//!
//! Token secrets and access tokens are stored encrypted.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::repository::{
    cutoff, AccessTokenRecord, AccessTokenUpsert, RequestTokenRecord, TokenRepository,
};
use crate::crypto::CryptoEngine;
use crate::error::AppError;
use crate::session::ClientId;

pub struct TokenStore {
    pool: PgPool,
    crypto: CryptoEngine,
}

impl TokenStore {
    pub async fn new(db_url: &str, crypto: CryptoEngine) -> Result<Self, AppError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool, crypto })
    }

    /// Create tables and indexes. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evernote_request_tokens (
                oauth_token         TEXT PRIMARY KEY,
                oauth_token_secret  TEXT NOT NULL,
                created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_evernote_request_tokens_created ON evernote_request_tokens(created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evernote_access_tokens (
                client_id         UUID PRIMARY KEY,
                access_token      TEXT NOT NULL,
                note_store_url    TEXT NOT NULL,
                shard             TEXT,
                evernote_user_id  TEXT,
                expires_at        TIMESTAMPTZ,
                sandbox_lnb       TEXT NOT NULL DEFAULT '',
                auth_time         TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TokenRepository for TokenStore {
    async fn insert_request_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
    ) -> Result<(), AppError> {
        let enc_secret = self.crypto.encrypt(oauth_token_secret)?;

        sqlx::query(
            r#"
            INSERT INTO evernote_request_tokens (oauth_token, oauth_token_secret)
            VALUES ($1, $2)
            ON CONFLICT (oauth_token)
            DO UPDATE SET oauth_token_secret = EXCLUDED.oauth_token_secret, created_at = NOW()
            "#,
        )
        .bind(oauth_token)
        .bind(&enc_secret)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_request_token(
        &self,
        oauth_token: &str,
        ttl: Duration,
    ) -> Result<Option<RequestTokenRecord>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT oauth_token, oauth_token_secret, created_at
            FROM evernote_request_tokens
            WHERE oauth_token = $1 AND created_at > $2
            "#,
        )
        .bind(oauth_token)
        .bind(cutoff(ttl))
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let enc_secret: String = row.try_get(1)?;
        Ok(Some(RequestTokenRecord {
            oauth_token: row.try_get(0)?,
            oauth_token_secret: self.crypto.decrypt(&enc_secret)?,
            created_at: row.try_get(2)?,
        }))
    }

    async fn delete_request_token(&self, oauth_token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM evernote_request_tokens WHERE oauth_token = $1")
            .bind(oauth_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_request_tokens(&self, ttl: Duration) -> Result<u64, AppError> {
        let affected = sqlx::query("DELETE FROM evernote_request_tokens WHERE created_at <= $1")
            .bind(cutoff(ttl))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn upsert_access_token(&self, upsert: &AccessTokenUpsert) -> Result<(), AppError> {
        let enc_access = self.crypto.encrypt(&upsert.access_token)?;

        sqlx::query(
            r#"
            INSERT INTO evernote_access_tokens
                (client_id, access_token, note_store_url, shard, evernote_user_id,
                 expires_at, sandbox_lnb, auth_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (client_id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                note_store_url = EXCLUDED.note_store_url,
                shard = EXCLUDED.shard,
                evernote_user_id = EXCLUDED.evernote_user_id,
                expires_at = EXCLUDED.expires_at,
                sandbox_lnb = EXCLUDED.sandbox_lnb,
                auth_time = NOW()
            "#,
        )
        .bind(upsert.client_id.as_uuid())
        .bind(&enc_access)
        .bind(&upsert.note_store_url)
        .bind(&upsert.shard)
        .bind(&upsert.evernote_user_id)
        .bind(upsert.expires_at)
        .bind(&upsert.sandbox_lnb)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_access_token(
        &self,
        client_id: ClientId,
    ) -> Result<Option<AccessTokenRecord>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT client_id, access_token, note_store_url, shard, evernote_user_id,
                   expires_at, sandbox_lnb, auth_time
            FROM evernote_access_tokens
            WHERE client_id = $1
            "#,
        )
        .bind(client_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let id: Uuid = row.try_get(0)?;
        let enc_access: String = row.try_get(1)?;
        let expires_at: Option<DateTime<Utc>> = row.try_get(5)?;

        Ok(Some(AccessTokenRecord {
            client_id: ClientId::from(id),
            access_token: self.crypto.decrypt(&enc_access)?,
            note_store_url: row.try_get(2)?,
            shard: row.try_get::<Option<String>, _>(3)?,
            evernote_user_id: row.try_get::<Option<String>, _>(4)?,
            expires_at,
            sandbox_lnb: row.try_get(6)?,
            auth_time: row.try_get(7)?,
        }))
    }
}
