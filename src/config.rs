use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Deployment profile, selected with `REMARKER_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Testing,
    Staging,
    Production,
}

impl Profile {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "testing" | "test" => Ok(Profile::Testing),
            "staging" => Ok(Profile::Staging),
            "production" | "prod" => Ok(Profile::Production),
            other => bail!("Unknown REMARKER_ENV profile: {other}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Staging => "staging",
            Profile::Production => "production",
        }
    }

    /// Log filter used when `RUST_LOG` is not set. Debug output is only
    /// enabled outside production.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Profile::Production => "remarker=info,tower_http=info",
            _ => "remarker=debug,tower_http=debug",
        }
    }
}

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: Profile,

    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Externally reachable URL of this service, used to build the OAuth callback.
    pub base_url: String,
    /// Where `GET /` redirects to.
    pub homepage_url: String,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded key for AES-256-GCM encryption of stored tokens.
    pub master_key: String,
    /// 32-byte base64-encoded HMAC key for signing the session cookie.
    pub session_secret: String,

    // ── Session cookie ──────────────────────────────────────────────────
    pub session_cookie_name: String,
    /// Mark the cookie `Secure; SameSite=None` so it is sent from the
    /// extension's cross-site iframe.
    pub session_cookie_secure: bool,

    // ── Evernote ────────────────────────────────────────────────────────
    pub evernote_consumer_key: String,
    pub evernote_consumer_secret: String,
    pub evernote_sandbox: bool,
    pub evernote_service_host: Option<String>,

    // ── Request token lifecycle ─────────────────────────────────────────
    pub request_token_ttl: Duration,
    pub request_token_purge_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let profile = Profile::parse(
            &std::env::var("REMARKER_ENV").unwrap_or_else(|_| "development".into()),
        )?;

        Ok(Config {
            profile,

            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("Invalid PORT")?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            homepage_url: std::env::var("HOMEPAGE_URL")
                .unwrap_or_else(|_| "https://github.com/fr0der1c/Remarker".into()),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,

            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            session_secret: std::env::var("SESSION_SECRET")
                .context("SESSION_SECRET is required (32 bytes, base64)")?,

            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "remarker_session".into()),
            session_cookie_secure: match std::env::var("SESSION_COOKIE_SECURE") {
                Ok(v) => parse_bool(&v).context("Invalid SESSION_COOKIE_SECURE")?,
                Err(_) => profile == Profile::Production,
            },

            evernote_consumer_key: std::env::var("EVERNOTE_CONSUMER_KEY")
                .context("EVERNOTE_CONSUMER_KEY is required")?,
            evernote_consumer_secret: std::env::var("EVERNOTE_CONSUMER_SECRET")
                .context("EVERNOTE_CONSUMER_SECRET is required")?,
            evernote_sandbox: match std::env::var("EVERNOTE_SANDBOX") {
                Ok(v) => parse_bool(&v).context("Invalid EVERNOTE_SANDBOX")?,
                Err(_) => true,
            },
            evernote_service_host: std::env::var("EVERNOTE_SERVICE_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty()),

            request_token_ttl: Duration::from_secs(
                std::env::var("REQUEST_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".into())
                    .parse()
                    .context("Invalid REQUEST_TOKEN_TTL_SECS")?,
            ),
            request_token_purge_interval: Duration::from_secs(
                std::env::var("REQUEST_TOKEN_PURGE_INTERVAL_SECS")
                    .unwrap_or_else(|_| "600".into())
                    .parse()
                    .context("Invalid REQUEST_TOKEN_PURGE_INTERVAL_SECS")?,
            ),
        })
    }

    /// The OAuth callback URL registered with Evernote's request-token call.
    pub fn callback_url(&self) -> String {
        format!("{}/evernote_callback", self.base_url)
    }

    /// Evernote service root, e.g. `https://sandbox.evernote.com`.
    pub fn evernote_host(&self) -> String {
        match &self.evernote_service_host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None if self.evernote_sandbox => "https://sandbox.evernote.com".into(),
            None => "https://www.evernote.com".into(),
        }
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    use base64::Engine as _;
    let key = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
    let secret = base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]);
    Config {
        profile: Profile::Testing,
        host: "127.0.0.1".into(),
        port: 8080,
        base_url: "http://remarker.test".into(),
        homepage_url: "https://github.com/fr0der1c/Remarker".into(),
        database_url: "postgres://unused".into(),
        master_key: key,
        session_secret: secret,
        session_cookie_name: "remarker_session".into(),
        session_cookie_secure: false,
        evernote_consumer_key: "test".into(),
        evernote_consumer_secret: "some-secret".into(),
        evernote_sandbox: true,
        evernote_service_host: None,
        request_token_ttl: Duration::from_secs(3600),
        request_token_purge_interval: Duration::from_secs(600),
    }
}
