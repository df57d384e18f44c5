//! Object storage upload adapter
//!
//! Speaks the Dropbox v2 content API. Call arguments travel as JSON in the
//! `Dropbox-API-Arg` header and the chunk bytes are the request body.

use std::env;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::transfer::{UploadCursor, UploadSink};
use crate::constants::{env as env_constants, storage};
use crate::errors::{TransferError, TransferResult};

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

#[derive(Deserialize)]
struct SessionStartResponse {
    session_id: String,
}

/// Upload client authenticated with a bearer token
#[derive(Clone)]
pub struct DropboxClient {
    client: Client,
    content_url: String,
    token: String,
}

impl std::fmt::Debug for DropboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxClient")
            .field("content_url", &self.content_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl DropboxClient {
    pub fn new(client: Client, content_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            content_url: content_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Client using the token from the environment and the default endpoint
    ///
    /// # Errors
    ///
    /// Returns `MissingToken` if the token variable is unset or empty
    pub fn from_env(client: Client) -> TransferResult<Self> {
        Self::from_env_with_url(client, storage::DEFAULT_CONTENT_URL)
    }

    pub fn from_env_with_url(client: Client, content_url: &str) -> TransferResult<Self> {
        let token = env::var(env_constants::STORAGE_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TransferError::MissingToken {
                var: env_constants::STORAGE_TOKEN.to_string(),
            })?;
        Ok(Self::new(client, content_url, token.trim()))
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.content_url, route)
    }

    /// POST a chunk with its call arguments, returning the response body
    async fn call(&self, route: &str, arg: &Value, body: Bytes) -> Result<String, String> {
        let response = self
            .client
            .post(self.endpoint(route))
            .bearer_auth(&self.token)
            .header(API_ARG_HEADER, header_safe_json(arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), text.trim()));
        }
        tracing::debug!("{} succeeded", route);
        Ok(text)
    }
}

#[async_trait]
impl UploadSink for DropboxClient {
    async fn upload(&self, data: Bytes, destination: &str) -> TransferResult<()> {
        let arg = json!({ "path": destination, "mode": "overwrite" });
        self.call("files/upload", &arg, data)
            .await
            .map(|_| ())
            .map_err(|reason| TransferError::Upload {
                destination: destination.to_string(),
                reason,
            })
    }

    async fn start_session(&self, first_chunk: Bytes) -> TransferResult<String> {
        let arg = json!({ "close": false });
        let text = self
            .call("files/upload_session/start", &arg, first_chunk)
            .await
            .map_err(|reason| TransferError::SessionStart { reason })?;

        let response: SessionStartResponse =
            serde_json::from_str(&text).map_err(|e| TransferError::SessionStart {
                reason: format!("unexpected response: {}", e),
            })?;
        Ok(response.session_id)
    }

    async fn append(&self, cursor: &UploadCursor, chunk: Bytes) -> TransferResult<()> {
        self.call("files/upload_session/append_v2", &append_arg(cursor), chunk)
            .await
            .map(|_| ())
            .map_err(|reason| TransferError::Append {
                session_id: cursor.session_id.clone(),
                offset: cursor.offset,
                reason,
            })
    }

    async fn finish(
        &self,
        cursor: &UploadCursor,
        last_chunk: Bytes,
        destination: &str,
    ) -> TransferResult<()> {
        self.call(
            "files/upload_session/finish",
            &finish_arg(cursor, destination),
            last_chunk,
        )
        .await
        .map(|_| ())
        .map_err(|reason| TransferError::Finish {
            session_id: cursor.session_id.clone(),
            destination: destination.to_string(),
            reason,
        })
    }
}

fn cursor_value(cursor: &UploadCursor) -> Value {
    json!({ "session_id": cursor.session_id, "offset": cursor.offset })
}

fn append_arg(cursor: &UploadCursor) -> Value {
    json!({ "cursor": cursor_value(cursor), "close": false })
}

fn finish_arg(cursor: &UploadCursor, destination: &str) -> Value {
    json!({
        "cursor": cursor_value(cursor),
        "commit": { "path": destination, "mode": "overwrite" },
    })
}

/// JSON with every non-ASCII character escaped, as HTTP headers require
fn header_safe_json(value: &Value) -> String {
    let mut out = String::new();
    for c in value.to_string().chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> UploadCursor {
        UploadCursor {
            session_id: "sess-42".to_string(),
            offset: 65536,
        }
    }

    #[test]
    fn test_append_arg_shape() {
        let arg = append_arg(&cursor());
        assert_eq!(arg["cursor"]["session_id"], "sess-42");
        assert_eq!(arg["cursor"]["offset"], 65536);
        assert_eq!(arg["close"], false);
    }

    #[test]
    fn test_finish_arg_shape() {
        let arg = finish_arg(&cursor(), "/results/rosiris_67p.zip");
        assert_eq!(arg["cursor"]["offset"], 65536);
        assert_eq!(arg["commit"]["path"], "/results/rosiris_67p.zip");
        assert_eq!(arg["commit"]["mode"], "overwrite");
    }

    #[test]
    fn test_header_json_escapes_non_ascii() {
        let arg = json!({ "path": "/results/comète.zip" });
        let header = header_safe_json(&arg);
        assert!(header.is_ascii());
        assert!(header.contains("com\\u00e8te.zip"));

        // Escaped form parses back to the same value
        let parsed: Value = serde_json::from_str(&header).unwrap();
        assert_eq!(parsed, arg);
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = DropboxClient::new(Client::new(), "https://content.example/2/", "secret-token");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert_eq!(client.endpoint("files/upload"), "https://content.example/2/files/upload");
    }
}
