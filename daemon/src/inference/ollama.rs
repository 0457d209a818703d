//! Ollama-compatible HTTP client
//!
//! `POST /api/generate` runs one non-streaming completion, `GET /api/tags`
//! lists the catalog and doubles as the reachability probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EnhancementRequest, InferenceBackend, InferenceError, ModelId};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Stateless client for an Ollama-style model server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: Client,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaClient {
    /// Create a client for `base_url` (e.g. `http://localhost:11434`)
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = ClientBuilder::new()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            request_timeout,
            probe_timeout,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_tags(&self) -> Result<Response, InferenceError> {
        let url = self.url("/api/tags");
        debug!(%url, "querying model catalog");

        let response = self
            .http
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(classify_transport)?;

        check_status(response)
    }
}

/// Wrap raw user text the way the enhancer prompt expects it
fn frame_prompt(text: &str) -> String {
    format!("User input: {text}\n\nEnhanced prompt:")
}

fn classify_transport(err: reqwest::Error) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout
    } else {
        debug!(error = %err, "transport failure");
        InferenceError::Unreachable
    }
}

fn check_status(response: Response) -> Result<Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        warn!(%status, "model server returned an error status");
        Err(InferenceError::ServerError(status.as_u16()))
    }
}

/// Extract the generated text from a `/api/generate` body
fn parse_generate_body(body: &str) -> Result<String, InferenceError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "undecodable generate response");
        InferenceError::EmptyResult
    })?;

    if let Some(error) = parsed.error {
        warn!(%error, "model server reported an error");
        return Err(InferenceError::EmptyResult);
    }

    match parsed.response.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(InferenceError::EmptyResult),
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<String, InferenceError> {
        let body = GenerateRequest {
            model: &request.model_id,
            system: &request.system_prompt,
            prompt: frame_prompt(&request.source_text),
            stream: false,
        };

        let url = self.url("/api/generate");
        debug!(%url, model = %request.model_id, chars = request.source_text.len(), "sending generate request");

        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let response = check_status(response)?;
        let text = response.text().await.map_err(classify_transport)?;
        debug!(body = %text, "raw generate response");

        parse_generate_body(&text)
    }

    async fn list_models(&self) -> Result<Vec<ModelId>, InferenceError> {
        let response = self.get_tags().await?;
        let tags: TagsResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout
            } else {
                warn!(error = %e, "undecodable model catalog");
                InferenceError::EmptyResult
            }
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn test_connection(&self) -> Result<(), InferenceError> {
        self.get_tags().await.map(|_| ())
    }
}
