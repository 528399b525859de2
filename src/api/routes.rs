//! Route handlers for the extension-facing endpoints.
//!
//! All handlers receive `SharedState` via Axum state extraction. The
//! browser is identified only by the signed session cookie.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::post_message::PostMessage;
use crate::enml;
use crate::error::AppError;
use crate::evernote::NoteDraft;
use crate::session::{self, ClientId};
use crate::store::AccessTokenUpsert;
use crate::{AppState, SharedState};

// ── User-facing callback messages ───────────────────────────────────────────

const INVALID_REQUEST: &str = "无效请求";
const ACCESS_DENIED: &str = "您没有同意我们访问您的 Evernote 账户，授权失败。";
const BAD_COOKIE: &str = "cookie 不正确";
const REQUEST_EXPIRED: &str = "授权请求已过期，请重新点击保存按钮。";
const AUTHORIZED: &str = "Evernote 授权成功，您可以关闭此页面并再次点击保存按钮。";

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/notes/sync", post(notes_sync))
        .route("/evernote_callback", get(evernote_callback))
        .route("/clear_cookie", get(clear_cookie))
        .with_state(state)
}

// =============================================================================
// Misc
// =============================================================================

async fn index(State(state): State<SharedState>) -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.config.homepage_url.clone())],
    )
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "remarker",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /clear_cookie: forget this browser's client id.
async fn clear_cookie(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    let cookie_name = &state.config.session_cookie_name;
    match session::read(&jar, &state.crypto, cookie_name) {
        Some(client_id) => {
            info!("Clearing session for client {client_id}");
            (session::clear(jar, cookie_name), "Delete success")
        }
        None => (jar, "No need to delete"),
    }
}

// =============================================================================
// Note sync
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct SyncForm {
    #[serde(rename = "note[content]")]
    content: Option<String>,
    #[serde(rename = "note[title]")]
    title: Option<String>,
    #[serde(rename = "note[url]")]
    url: Option<String>,
    /// JSON array of strings.
    #[serde(rename = "note[tags]")]
    tags: Option<String>,
    #[serde(rename = "note[words]")]
    words: Option<String>,
}

/// POST /notes/sync: save a highlight, or start authorization if this
/// browser has no usable Evernote token yet.
async fn notes_sync(
    State(state): State<SharedState>,
    jar: CookieJar,
    Form(form): Form<SyncForm>,
) -> (CookieJar, PostMessage) {
    let client_id = match session::read(&jar, &state.crypto, &state.config.session_cookie_name) {
        Some(id) => id,
        None => {
            return match session::issue(jar.clone(), &state.crypto, &state.config) {
                Ok((jar, client_id)) => {
                    info!("New client {client_id}, starting Evernote authorization");
                    let message = start_authorization(&state).await.unwrap_or_else(failure);
                    (jar, message)
                }
                Err(e) => (jar, failure(e)),
            };
        }
    };

    let message = save_note(&state, client_id, form)
        .await
        .unwrap_or_else(failure);
    (jar, message)
}

async fn save_note(
    state: &AppState,
    client_id: ClientId,
    form: SyncForm,
) -> Result<PostMessage, AppError> {
    let record = match state.store.find_access_token(client_id).await? {
        Some(record) if !record.is_expired() => record,
        Some(_) => {
            info!("Evernote token for client {client_id} expired, re-authorizing");
            return start_authorization(state).await;
        }
        None => {
            debug!("No Evernote token for client {client_id}");
            return start_authorization(state).await;
        }
    };

    let content = form
        .content
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("note[content] is required".into()))?;
    let tags = parse_tags(form.tags.as_deref())?;

    let body = enml::html_to_enml(content);
    let note = NoteDraft::new(form.title.as_deref(), &body, &tags, form.url.as_deref());

    info!("title: {}", note.title);
    debug!("body: {}", note.content);
    if let Some(words) = &form.words {
        debug!("words: {words}");
    }

    match state
        .evernote
        .create_note(&record.access_token, &record.note_store_url, &note)
        .await
    {
        Ok(created) => {
            info!(
                "Saved note {} for client {client_id}",
                created.guid.as_deref().unwrap_or("?")
            );
            Ok(PostMessage::saved())
        }
        Err(e) if e.is_auth_failure() => {
            warn!("Evernote rejected the token for client {client_id}: {e}");
            start_authorization(state).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Get a request token, remember its secret for the callback, and hand the
/// authorization URL back to the extension.
async fn start_authorization(state: &AppState) -> Result<PostMessage, AppError> {
    let token = state
        .evernote
        .request_token(&state.config.callback_url())
        .await?;

    state
        .store
        .insert_request_token(&token.oauth_token, &token.oauth_token_secret)
        .await?;

    Ok(PostMessage::authorize(&state.evernote.authorize_url(&token)))
}

fn parse_tags(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            AppError::BadRequest(format!("note[tags] must be a JSON array of strings: {e}"))
        }),
    }
}

fn failure(e: AppError) -> PostMessage {
    match e {
        AppError::BadRequest(msg) => {
            warn!("Rejected note sync: {msg}");
            PostMessage::error(400, msg)
        }
        other => {
            error!("Note sync failed: {other}");
            PostMessage::error(500, other.to_string())
        }
    }
}

// =============================================================================
// OAuth callback
// =============================================================================

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
    sandbox_lnb: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// GET /evernote_callback: Evernote redirects the authorization window here.
async fn evernote_callback(
    State(state): State<SharedState>,
    jar: CookieJar,
    Query(q): Query<CallbackQuery>,
) -> Result<&'static str, AppError> {
    let (oauth_token, sandbox_lnb) = match (non_empty(q.oauth_token), non_empty(q.sandbox_lnb)) {
        (Some(token), Some(lnb)) => (token, lnb),
        _ => return Err(AppError::BadRequest(INVALID_REQUEST.into())),
    };

    // Evernote omits the verifier when the user declines.
    let verifier = non_empty(q.oauth_verifier)
        .ok_or_else(|| AppError::Unauthorized(ACCESS_DENIED.into()))?;

    let client_id = session::read(&jar, &state.crypto, &state.config.session_cookie_name)
        .ok_or_else(|| AppError::Unauthorized(BAD_COOKIE.into()))?;

    let request = state
        .store
        .find_request_token(&oauth_token, state.config.request_token_ttl)
        .await?
        .ok_or_else(|| AppError::BadRequest(REQUEST_EXPIRED.into()))?;

    let access = state
        .evernote
        .access_token(&oauth_token, &request.oauth_token_secret, &verifier)
        .await?;

    state
        .store
        .upsert_access_token(&AccessTokenUpsert {
            client_id,
            access_token: access.token,
            note_store_url: access.note_store_url,
            shard: access.shard,
            evernote_user_id: access.user_id,
            expires_at: access.expires_at,
            sandbox_lnb,
        })
        .await?;

    state.store.delete_request_token(&oauth_token).await?;

    info!("Client {client_id} authorized Evernote access");
    Ok(AUTHORIZED)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::evernote::{EdamErrorCode, EvernoteError};
    use crate::store::memory::MemoryTokenStore;
    use crate::store::{AccessTokenRecord, TokenRepository};
    use crate::test_support::{state_with, FakeEvernote};

    struct Harness {
        state: SharedState,
        store: Arc<MemoryTokenStore>,
        evernote: Arc<FakeEvernote>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryTokenStore::default());
            let evernote = Arc::new(FakeEvernote::default());
            let state = state_with(store.clone(), evernote.clone());
            Self {
                state,
                store,
                evernote,
            }
        }

        async fn send(&self, req: Request<Body>) -> Response {
            crate::api::router(self.state.clone())
                .oneshot(req)
                .await
                .unwrap()
        }

        /// A signed session cookie for a fresh client.
        fn session(&self) -> (ClientId, String) {
            let (jar, client_id) =
                session::issue(CookieJar::new(), &self.state.crypto, &self.state.config).unwrap();
            let cookie = jar.get(&self.state.config.session_cookie_name).unwrap();
            (client_id, format!("{}={}", cookie.name(), cookie.value()))
        }

        async fn authorize(&self, client_id: ClientId) {
            self.store
                .insert_access_token(AccessTokenRecord {
                    client_id,
                    access_token: "S=s1:U=1:tok".into(),
                    note_store_url: "https://sandbox.evernote.com/shard/s1/notestore".into(),
                    shard: Some("s1".into()),
                    evernote_user_id: Some("1".into()),
                    expires_at: None,
                    sandbox_lnb: "false".into(),
                    auth_time: chrono::Utc::now(),
                })
                .await;
        }
    }

    fn sync_request(cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in fields {
            form.append_pair(k, v);
        }

        let mut builder = Request::builder()
            .method("POST")
            .uri("/notes/sync")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(form.finish())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    const NOTE: &[(&str, &str)] = &[
        ("note[content]", "&lt;p&gt;Ownership is Rust's most unique feature.&lt;/p&gt;"),
        ("note[title]", "The Rust Book"),
        ("note[url]", "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html"),
        ("note[tags]", r#"["rust","reading"]"#),
        ("note[words]", "6"),
    ];

    // ── sync ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_sync_issues_session_and_starts_authorization() {
        let h = Harness::new();
        let resp = h.send(sync_request(None, NOTE)).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("remarker_session="));
        assert!(set_cookie.contains("HttpOnly"));

        let body = body_text(resp).await;
        assert!(body.contains(r#""status":"302""#));
        assert!(body.contains("OAuth.action?oauth_token=remarker.req0"));

        assert_eq!(
            *h.evernote.callbacks.lock().unwrap(),
            vec!["http://remarker.test/evernote_callback".to_string()]
        );
        assert_eq!(h.store.request_token_count().await, 1);
        assert!(h.evernote.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_without_stored_token_starts_authorization() {
        let h = Harness::new();
        let (_, cookie) = h.session();

        let resp = h.send(sync_request(Some(&cookie), NOTE)).await;
        assert!(resp.headers().get(header::SET_COOKIE).is_none());

        let body = body_text(resp).await;
        assert!(body.contains(r#""status":"302""#));
        assert_eq!(h.store.request_token_count().await, 1);
        assert!(h.evernote.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_with_token_creates_note() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;

        let body = body_text(h.send(sync_request(Some(&cookie), NOTE)).await).await;
        assert!(body.contains(r#"postMessage({"status":"200"}"#));

        let notes = h.evernote.notes.lock().unwrap();
        assert_eq!(notes.len(), 1);
        let (token, note_store_url, note) = &notes[0];
        assert_eq!(token, "S=s1:U=1:tok");
        assert_eq!(note_store_url, "https://sandbox.evernote.com/shard/s1/notestore");
        assert_eq!(note.title, "The Rust Book");
        assert!(note
            .content
            .ends_with("<en-note><p>Ownership is Rust's most unique feature.</p></en-note>"));
        assert_eq!(note.tag_names, vec!["rust", "reading"]);
        assert_eq!(
            note.source_url.as_deref(),
            Some("https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html")
        );
    }

    #[tokio::test]
    async fn test_sync_defaults_title_and_tags() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;

        let body = body_text(
            h.send(sync_request(Some(&cookie), &[("note[content]", "hello")]))
                .await,
        )
        .await;
        assert!(body.contains(r#""status":"200""#));

        let notes = h.evernote.notes.lock().unwrap();
        assert_eq!(notes[0].2.title, "无标题文档");
        assert!(notes[0].2.tag_names.is_empty());
    }

    #[tokio::test]
    async fn test_sync_reports_evernote_errors() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;
        h.evernote.fail_next_create(EvernoteError::User {
            code: EdamErrorCode::EnmlValidation,
            parameter: Some("Element type \"section\" must be declared.".into()),
        });

        let body = body_text(h.send(sync_request(Some(&cookie), NOTE)).await).await;
        assert!(body.contains(r#""status":"500""#));
        assert!(body.contains(r#"errorCode=ENML_VALIDATION, parameter=Element type \"section\" must be declared."#));
    }

    #[tokio::test]
    async fn test_sync_reauthorizes_on_expired_token() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;
        h.evernote.fail_next_create(EvernoteError::User {
            code: EdamErrorCode::AuthExpired,
            parameter: Some("authenticationToken".into()),
        });

        let body = body_text(h.send(sync_request(Some(&cookie), NOTE)).await).await;
        assert!(body.contains(r#""status":"302""#));
        assert_eq!(h.store.request_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_sync_skips_locally_expired_token() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.store
            .insert_access_token(AccessTokenRecord {
                client_id,
                access_token: "old".into(),
                note_store_url: "https://sandbox.evernote.com/shard/s1/notestore".into(),
                shard: None,
                evernote_user_id: None,
                expires_at: Some(chrono::Utc::now() - chrono::Duration::days(1)),
                sandbox_lnb: "false".into(),
                auth_time: chrono::Utc::now() - chrono::Duration::days(366),
            })
            .await;

        let body = body_text(h.send(sync_request(Some(&cookie), NOTE)).await).await;
        assert!(body.contains(r#""status":"302""#));
        assert!(h.evernote.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_rejects_malformed_tags() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;

        let body = body_text(
            h.send(sync_request(
                Some(&cookie),
                &[("note[content]", "x"), ("note[tags]", "rust, reading")],
            ))
            .await,
        )
        .await;
        assert!(body.contains(r#""status":"400""#));
        assert!(h.evernote.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_requires_content() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.authorize(client_id).await;

        let body = body_text(
            h.send(sync_request(Some(&cookie), &[("note[title]", "t")]))
                .await,
        )
        .await;
        assert!(body.contains(r#""status":"400""#));
    }

    // ── callback ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_callback_parameter_validation() {
        let h = Harness::new();
        let (_, cookie) = h.session();

        let resp = h
            .send(get("/evernote_callback?oauth_verifier=v&sandbox_lnb=false", Some(&cookie)))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, INVALID_REQUEST);

        let resp = h
            .send(get("/evernote_callback?oauth_token=t&oauth_verifier=v", Some(&cookie)))
            .await;
        assert_eq!(body_text(resp).await, INVALID_REQUEST);

        let resp = h
            .send(get("/evernote_callback?oauth_token=t&sandbox_lnb=false", Some(&cookie)))
            .await;
        assert_eq!(body_text(resp).await, ACCESS_DENIED);
    }

    #[tokio::test]
    async fn test_callback_requires_session() {
        let h = Harness::new();
        let resp = h
            .send(get(
                "/evernote_callback?oauth_token=t&oauth_verifier=v&sandbox_lnb=false",
                None,
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(resp).await, BAD_COOKIE);
    }

    #[tokio::test]
    async fn test_callback_unknown_or_stale_request_token() {
        let h = Harness::new();
        let (_, cookie) = h.session();
        h.store
            .insert_request_token_aged("remarker.old", "s", chrono::Duration::hours(3))
            .await;

        for token in ["remarker.missing", "remarker.old"] {
            let uri = format!(
                "/evernote_callback?oauth_token={token}&oauth_verifier=v&sandbox_lnb=false"
            );
            let resp = h.send(get(&uri, Some(&cookie))).await;
            assert_eq!(body_text(resp).await, REQUEST_EXPIRED);
        }
        assert!(h.evernote.exchanges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_stores_access_token() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();
        h.store
            .insert_request_token("remarker.req7", "secret7")
            .await
            .unwrap();

        let resp = h
            .send(get(
                "/evernote_callback?oauth_token=remarker.req7&oauth_verifier=ver1&sandbox_lnb=false",
                Some(&cookie),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, AUTHORIZED);

        assert_eq!(
            *h.evernote.exchanges.lock().unwrap(),
            vec![(
                "remarker.req7".to_string(),
                "secret7".to_string(),
                "ver1".to_string()
            )]
        );

        let record = h.store.find_access_token(client_id).await.unwrap().unwrap();
        assert_eq!(record.access_token, "S=s1:U=1:ver1");
        assert_eq!(record.sandbox_lnb, "false");
        assert_eq!(record.note_store_url, "https://sandbox.evernote.com/shard/s1/notestore");
        assert_eq!(h.store.request_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_repeated_callback_keeps_one_record_per_client() {
        let h = Harness::new();
        let (client_id, cookie) = h.session();

        for (token, verifier) in [("remarker.a", "v1"), ("remarker.b", "v2")] {
            h.store.insert_request_token(token, "s").await.unwrap();
            let uri = format!(
                "/evernote_callback?oauth_token={token}&oauth_verifier={verifier}&sandbox_lnb=true"
            );
            let resp = h.send(get(&uri, Some(&cookie))).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        assert_eq!(h.store.access_token_count().await, 1);
        let record = h.store.find_access_token(client_id).await.unwrap().unwrap();
        assert_eq!(record.access_token, "S=s1:U=1:v2");
        assert_eq!(record.sandbox_lnb, "true");
    }

    #[tokio::test]
    async fn test_authorize_then_sync_round_trip() {
        let h = Harness::new();

        let resp = h.send(sync_request(None, NOTE)).await;
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let resp = h
            .send(get(
                "/evernote_callback?oauth_token=remarker.req0&oauth_verifier=ok&sandbox_lnb=false",
                Some(&cookie),
            ))
            .await;
        assert_eq!(body_text(resp).await, AUTHORIZED);

        let body = body_text(h.send(sync_request(Some(&cookie), NOTE)).await).await;
        assert!(body.contains(r#""status":"200""#));
        assert_eq!(h.evernote.notes.lock().unwrap().len(), 1);
    }

    // ── misc ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_index_redirects_to_homepage() {
        let h = Harness::new();
        let resp = h.send(get("/", None)).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers()[header::LOCATION],
            "https://github.com/fr0der1c/Remarker"
        );
    }

    #[tokio::test]
    async fn test_clear_cookie() {
        let h = Harness::new();
        let (_, cookie) = h.session();

        let resp = h.send(get("/clear_cookie", Some(&cookie))).await;
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("remarker_session=;"));
        assert_eq!(body_text(resp).await, "Delete success");

        let resp = h.send(get("/clear_cookie", None)).await;
        assert_eq!(body_text(resp).await, "No need to delete");
    }

    #[tokio::test]
    async fn test_status() {
        let h = Harness::new();
        let body = body_text(h.send(get("/status", None)).await).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "remarker");
    }
}
