//! Responses for the extension's hidden iframe.
//!
//! The extension submits the note form into an iframe; the page we return
//! reports the outcome to the embedding page with `window.postMessage`.
//! The payload's `status` mirrors an HTTP code: `200` saved, `302` the user
//! has to authorize first (`content` then opens the Evernote window), `400`
//! bad form input, `500` anything else.

use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMessage {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostMessage {
    pub fn saved() -> Self {
        Self {
            status: "200".into(),
            content: None,
        }
    }

    /// Ask the embedding page to open Evernote's authorization page.
    pub fn authorize(auth_url: &str) -> Self {
        let url = serde_json::to_string(auth_url).unwrap_or_else(|_| "\"\"".into());
        Self {
            status: "302".into(),
            content: Some(format!(
                r#"<script>window.open({url}, "newwindow", "height=800, width=800");</script>"#
            )),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            content: Some(message.into()),
        }
    }

    pub fn render(&self) -> String {
        let payload = serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"500"}"#.into());
        // Keep the payload from closing our own <script> element.
        let payload = payload
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026");
        format!(r#"<script> window.parent.postMessage({payload}, "*"); </script>"#)
    }
}

impl IntoResponse for PostMessage {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}
