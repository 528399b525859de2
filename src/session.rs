//! Browser session: an opaque client id carried in an HMAC-signed cookie.
//!
//! The client id is the only thing tying a browser to its stored Evernote
//! access token, so the cookie value is signed and a tampered cookie reads
//! as "no session".

use std::fmt;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::config::Config;
use crate::crypto::CryptoEngine;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The client id from the session cookie, if present and correctly signed.
pub fn read(jar: &CookieJar, crypto: &CryptoEngine, cookie_name: &str) -> Option<ClientId> {
    let cookie = jar.get(cookie_name)?;
    let payload = crypto.verify(cookie.value())?;
    Uuid::parse_str(&payload).ok().map(ClientId)
}

/// Start a new session: mint a client id and set the signed cookie.
pub fn issue(
    jar: CookieJar,
    crypto: &CryptoEngine,
    config: &Config,
) -> Result<(CookieJar, ClientId), AppError> {
    let client_id = ClientId::new();
    let value = crypto.sign(&client_id.to_string())?;

    let cookie = Cookie::build((config.session_cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .secure(config.session_cookie_secure)
        .same_site(if config.session_cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .permanent();

    Ok((jar.add(cookie), client_id))
}

/// Forget the session. The stored access token is left alone.
pub fn clear(jar: CookieJar, cookie_name: &str) -> CookieJar {
    jar.remove(Cookie::build(cookie_name.to_string()).path("/"))
}
