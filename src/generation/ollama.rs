//! Ollama REST backend
//!
//! Blocking calls only. The backend is moved onto the generation worker
//! thread and never touched from the async runtime.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ChatBackend;
use crate::{Error, Result};

/// Default Ollama endpoint
pub const DEFAULT_URL: &str = "http://localhost:11434";

/// Pulls can download gigabytes; give them much longer than a chat
const PULL_TIMEOUT: Duration = Duration::from_secs(60 * 30);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Deserialize)]
struct TagsModel {
    name: String,
}

/// [`ChatBackend`] talking to a local Ollama server
pub struct OllamaBackend {
    base_url: String,
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl OllamaBackend {
    /// Create a backend for the server at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Server base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the blocking client on first use, on the calling thread
    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Generation(format!("failed to create HTTP client: {e}")))?;

        Ok(self.client.get_or_init(|| client))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl ChatBackend for OllamaBackend {
    fn chat(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client()?
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .map_err(|e| Error::Generation(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("Ollama chat error {status}: {body}")));
        }

        let result: ChatResponse = response
            .json()
            .map_err(|e| Error::Generation(format!("invalid chat response: {e}")))?;

        Ok(result.message.content)
    }

    fn pull_model(&self, model: &str) -> Result<()> {
        tracing::info!(model, "pulling model");

        let response = self
            .client()?
            .post(self.url("/api/pull"))
            .timeout(PULL_TIMEOUT)
            .json(&PullRequest {
                model,
                stream: false,
            })
            .send()
            .map_err(|e| Error::Generation(format!("pull request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("Ollama pull error {status}: {body}")));
        }

        let result: PullResponse = response
            .json()
            .map_err(|e| Error::Generation(format!("invalid pull response: {e}")))?;

        tracing::debug!(model, status = %result.status, "pull finished");
        Ok(())
    }

    fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client()?
            .get(self.url("/api/tags"))
            .send()
            .map_err(|e| Error::Generation(format!("cannot reach {}: {e}", self.base_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Generation(format!("Ollama tags error {status}")));
        }

        let result: TagsResponse = response
            .json()
            .map_err(|e| Error::Generation(format!("invalid tags response: {e}")))?;

        Ok(result.models.into_iter().map(|m| m.name).collect())
    }
}
