//! Gemini embedding backend over the Generative Language REST API.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbedTask, Embedder, EmbedderError};

pub struct GeminiEmbedder {
    client: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

fn task_type(task: EmbedTask) -> &'static str {
    match task {
        EmbedTask::Document => "RETRIEVAL_DOCUMENT",
        EmbedTask::Query => "RETRIEVAL_QUERY",
    }
}

impl GeminiEmbedder {
    pub fn new(
        api_base: &str,
        api_key: String,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("servicegraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmbedderError::RequestFailed(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
        })
    }
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, EmbedderError> {
        let url = format!("{}/models/{}:embedContent", self.api_base, self.model);
        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
            task_type: task_type(task),
        };

        debug!(chars = text.len(), ?task, "embedding text");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| EmbedderError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EmbedderError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedContentResponse = resp
            .json()
            .map_err(|e| EmbedderError::MalformedResponse(e.to_string()))?;

        let values = parsed.embedding.values;
        if values.len() != self.dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
