//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).
//!
//! Evernote's `/oauth` endpoint takes all protocol parameters in the query
//! string, so signing produces a complete URL rather than an
//! `Authorization` header.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;

use super::EvernoteError;

type HmacSha1 = Hmac<Sha1>;

/// The application's consumer credentials.
#[derive(Debug, Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

/// Nonce and timestamp for one signed request.
#[derive(Debug, Clone)]
pub struct Freshness {
    pub nonce: String,
    pub timestamp: i64,
}

impl Freshness {
    pub fn now() -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 unreserved-set encoding, as OAuth requires.
pub fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Encode every name and value, sort, and join as `k=v&k=v`.
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn signature_base_string(method: &str, base_url: &str, params: &[(String, String)]) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&normalize_parameters(params))
    )
}

/// HMAC-SHA1 over the base string with key `consumer_secret&token_secret`.
pub fn hmac_sha1_signature(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, EvernoteError> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| EvernoteError::OAuth(format!("HMAC init failed: {e}")))?;
    mac.update(base_string.as_bytes());

    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build a signed request URL.
///
/// `token` is the `(oauth_token, oauth_token_secret)` pair once one exists;
/// the request-token call is signed with the consumer secret alone.
pub fn signed_url(
    consumer: &Consumer,
    method: &str,
    base_url: &str,
    token: Option<(&str, &str)>,
    extra: &[(&str, &str)],
    freshness: &Freshness,
) -> Result<String, EvernoteError> {
    let mut params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), consumer.key.clone()),
        ("oauth_nonce".into(), freshness.nonce.clone()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), freshness.timestamp.to_string()),
        ("oauth_version".into(), "1.0".into()),
    ];
    if let Some((oauth_token, _)) = token {
        params.push(("oauth_token".into(), oauth_token.to_string()));
    }
    params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let base_string = signature_base_string(method, base_url, &params);
    let token_secret = token.map(|(_, secret)| secret).unwrap_or("");
    let signature = hmac_sha1_signature(&base_string, &consumer.secret, token_secret)?;

    Ok(format!(
        "{base_url}?{}&oauth_signature={}",
        normalize_parameters(&params),
        percent_encode(&signature)
    ))
}
