//! Evernote integration: the OAuth 1.0a handshake and note creation.

mod client;
mod error;
pub mod note;
pub mod note_store;
pub mod oauth;

pub use client::{parse_access_token, parse_request_token, AccessToken, EvernoteApi, EvernoteClient, RequestToken};
pub use error::{EdamErrorCode, EvernoteError};
pub use note::NoteDraft;
pub use note_store::CreatedNote;
