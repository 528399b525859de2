//! Shared fixtures for handler and daemon tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::test_config;
use crate::crypto::test_engine;
use crate::evernote::{
    AccessToken, CreatedNote, EvernoteApi, EvernoteError, NoteDraft, RequestToken,
};
use crate::store::TokenRepository;
use crate::{AppState, SharedState};

/// Evernote stand-in that records every call.
///
/// Request tokens are `remarker.req0`, `remarker.req1`, ... and an access
/// token for verifier `v` is `S=s1:U=1:v`.
#[derive(Default)]
pub struct FakeEvernote {
    issued: AtomicUsize,
    pub callbacks: Mutex<Vec<String>>,
    /// `(oauth_token, oauth_token_secret, verifier)`
    pub exchanges: Mutex<Vec<(String, String, String)>>,
    /// `(auth_token, note_store_url, note)`
    pub notes: Mutex<Vec<(String, String, NoteDraft)>>,
    failures: Mutex<VecDeque<EvernoteError>>,
}

impl FakeEvernote {
    pub fn fail_next_create(&self, err: EvernoteError) {
        self.failures.lock().unwrap().push_back(err);
    }
}

#[async_trait]
impl EvernoteApi for FakeEvernote {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, EvernoteError> {
        self.callbacks.lock().unwrap().push(callback_url.to_string());
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(RequestToken {
            oauth_token: format!("remarker.req{n}"),
            oauth_token_secret: format!("secret{n}"),
        })
    }

    fn authorize_url(&self, token: &RequestToken) -> String {
        format!(
            "https://sandbox.evernote.com/OAuth.action?oauth_token={}",
            token.oauth_token
        )
    }

    async fn access_token(
        &self,
        oauth_token: &str,
        oauth_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken, EvernoteError> {
        self.exchanges.lock().unwrap().push((
            oauth_token.to_string(),
            oauth_token_secret.to_string(),
            verifier.to_string(),
        ));
        Ok(AccessToken {
            token: format!("S=s1:U=1:{verifier}"),
            note_store_url: "https://sandbox.evernote.com/shard/s1/notestore".into(),
            shard: Some("s1".into()),
            user_id: Some("1".into()),
            expires_at: None,
        })
    }

    async fn create_note(
        &self,
        auth_token: &str,
        note_store_url: &str,
        note: &NoteDraft,
    ) -> Result<CreatedNote, EvernoteError> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.notes.lock().unwrap().push((
            auth_token.to_string(),
            note_store_url.to_string(),
            note.clone(),
        ));
        Ok(CreatedNote {
            guid: Some(format!("guid-{}", self.notes.lock().unwrap().len())),
            title: Some(note.title.clone()),
        })
    }
}

pub fn state_with(
    store: Arc<dyn TokenRepository>,
    evernote: Arc<dyn EvernoteApi>,
) -> SharedState {
    Arc::new(AppState {
        config: test_config(),
        store,
        crypto: test_engine(),
        evernote,
    })
}
