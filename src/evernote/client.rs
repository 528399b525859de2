use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::note::NoteDraft;
use super::oauth::{self, Consumer, Freshness};
use super::note_store::{self, CreatedNote};
use super::EvernoteError;

/// Temporary credentials from the first leg of the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

/// Token credentials plus the account routing info Evernote hands back with them.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub note_store_url: String,
    pub shard: Option<String>,
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything the service needs from Evernote.
#[async_trait]
pub trait EvernoteApi: Send + Sync {
    /// First leg: obtain a request token bound to `callback_url`.
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, EvernoteError>;

    /// Where the user approves access for `token`.
    fn authorize_url(&self, token: &RequestToken) -> String;

    /// Last leg: trade the approved request token for an access token.
    async fn access_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken, EvernoteError>;

    /// `NoteStore.createNote` against the user's shard.
    async fn create_note(
        &self,
        auth_token: &str,
        note_store_url: &str,
        note: &NoteDraft,
    ) -> Result<CreatedNote, EvernoteError>;
}

/// HTTP client for Evernote's OAuth endpoint and NoteStore service.
pub struct EvernoteClient {
    consumer: Consumer,
    host: String,
    http: reqwest::Client,
    sequence: AtomicI32,
}

impl EvernoteClient {
    pub fn new(
        consumer_key: String,
        consumer_secret: String,
        host: String,
    ) -> Result<Self, EvernoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("remarker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            consumer: Consumer {
                key: consumer_key,
                secret: consumer_secret,
            },
            host,
            http,
            sequence: AtomicI32::new(0),
        })
    }

    fn oauth_endpoint(&self) -> String {
        format!("{}/oauth", self.host)
    }

    async fn oauth_get(&self, url: &str) -> Result<String, EvernoteError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EvernoteError::OAuth(format!("OAuth request failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(EvernoteError::OAuth(format!(
                "Evernote OAuth endpoint returned {status}: {body}"
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl EvernoteApi for EvernoteClient {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, EvernoteError> {
        let url = oauth::signed_url(
            &self.consumer,
            "GET",
            &self.oauth_endpoint(),
            None,
            &[("oauth_callback", callback_url)],
            &Freshness::now(),
        )?;

        let body = self.oauth_get(&url).await?;
        parse_request_token(&body)
    }

    fn authorize_url(&self, token: &RequestToken) -> String {
        format!(
            "{}/OAuth.action?oauth_token={}",
            self.host,
            oauth::percent_encode(&token.oauth_token)
        )
    }

    async fn access_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken, EvernoteError> {
        let url = oauth::signed_url(
            &self.consumer,
            "GET",
            &self.oauth_endpoint(),
            Some((oauth_token, oauth_token_secret)),
            &[("oauth_verifier", verifier)],
            &Freshness::now(),
        )?;

        let body = self.oauth_get(&url).await?;
        parse_access_token(&body, &self.host)
    }

    async fn create_note(
        &self,
        auth_token: &str,
        note_store_url: &str,
        note: &NoteDraft,
    ) -> Result<CreatedNote, EvernoteError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let payload = note_store::encode_create_note(auth_token, note, sequence)?;

        let resp = self
            .http
            .post(note_store_url)
            .header(reqwest::header::CONTENT_TYPE, note_store::CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, note_store::CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EvernoteError::Http(format!(
                "NoteStore returned {status}"
            )));
        }

        let body = resp.bytes().await?;
        note_store::decode_create_note_reply(&body)
    }
}

fn form_value(body: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub fn parse_request_token(body: &str) -> Result<RequestToken, EvernoteError> {
    if form_value(body, "oauth_callback_confirmed").as_deref() != Some("true") {
        return Err(EvernoteError::OAuth("callback was not confirmed".into()));
    }

    let oauth_token = form_value(body, "oauth_token")
        .ok_or_else(|| EvernoteError::OAuth("request token response missing oauth_token".into()))?;
    let oauth_token_secret = form_value(body, "oauth_token_secret").ok_or_else(|| {
        EvernoteError::OAuth("request token response missing oauth_token_secret".into())
    })?;

    Ok(RequestToken {
        oauth_token,
        oauth_token_secret,
    })
}

/// Parse the access-token response. `edam_expires` is milliseconds since epoch.
pub fn parse_access_token(body: &str, host: &str) -> Result<AccessToken, EvernoteError> {
    let token = form_value(body, "oauth_token")
        .ok_or_else(|| EvernoteError::OAuth("access token response missing oauth_token".into()))?;

    let shard = form_value(body, "edam_shard");
    let note_store_url = match (form_value(body, "edam_noteStoreUrl"), &shard) {
        (Some(url), _) => url,
        (None, Some(shard)) => format!("{host}/shard/{shard}/notestore"),
        (None, None) => {
            return Err(EvernoteError::OAuth(
                "access token response carries neither edam_noteStoreUrl nor edam_shard".into(),
            ))
        }
    };

    let expires_at = form_value(body, "edam_expires")
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    Ok(AccessToken {
        token,
        note_store_url,
        shard,
        user_id: form_value(body, "edam_userId"),
        expires_at,
    })
}
