//! HTTP client for the Ollama-style embedding backend.
//!
//! Wire protocol: `POST /api/embed` with `{"model", "input": [..], "truncate"}`
//! returning `{"embeddings": [[f32]]}`, and `GET /api/tags` for health and
//! model listing. All inputs of a batch go out in one request; the request
//! timeout covers the whole batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{EmbedError, EmbeddingBackend, TaskType};
use crate::config::EmbeddingConfig;

/// Timeout for the health/model-listing probe. Kept short so a dead backend
/// degrades semantic search quickly instead of hanging startup.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Client for a local Ollama-compatible embedding service.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.effective_timeout(),
        }
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    async fn list_models(&self) -> Result<Vec<String>, EmbedError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbedError::Backend {
                status: response.status().as_u16(),
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn batch_embed(
        &self,
        texts: &[String],
        task: TaskType,
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts.iter().map(|t| task.apply(t)).collect();
        let body = EmbedRequest {
            model: model.unwrap_or(&self.model),
            input: &prefixed,
            truncate: true,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.embed_url())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, started.elapsed()))?;

        if !response.status().is_success() {
            return Err(EmbedError::Backend {
                status: response.status().as_u16(),
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| classify_transport_error(e, started.elapsed()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: parsed.embeddings.len(),
            });
        }

        Ok(parsed.embeddings)
    }

    async fn health(&self) -> bool {
        match self.list_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "embedding backend health probe failed");
                false
            }
        }
    }

    async fn has_model(&self, name: &str) -> Result<bool, EmbedError> {
        let models = self.list_models().await?;
        // Ollama reports tagged names like "nomic-embed-text:latest"
        Ok(models
            .iter()
            .any(|m| m == name || m.split(':').next() == Some(name)))
    }
}

/// Map a reqwest error to the taxonomy: timeouts are distinct from other
/// transport failures and carry the elapsed time.
fn classify_transport_error(e: reqwest::Error, elapsed: Duration) -> EmbedError {
    if e.is_timeout() {
        EmbedError::Timeout { elapsed }
    } else {
        EmbedError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend() -> OllamaBackend {
        let config = EmbeddingConfig {
            base_url: "http://localhost:11434/".into(),
            ..Default::default()
        };
        OllamaBackend::new(&config)
    }

    #[test]
    fn urls_are_normalized() {
        let backend = test_backend();
        assert_eq!(backend.embed_url(), "http://localhost:11434/api/embed");
        assert_eq!(backend.tags_url(), "http://localhost:11434/api/tags");
    }

    #[test]
    fn request_body_carries_prefixed_inputs() {
        let inputs = vec![
            TaskType::SearchDocument.apply("alpha"),
            TaskType::SearchDocument.apply("beta"),
        ];
        let body = EmbedRequest {
            model: "nomic-embed-text",
            input: &inputs,
            truncate: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"][0], "search_document: alpha");
        assert_eq!(json["input"][1], "search_document: beta");
        assert_eq!(json["truncate"], true);
    }

    #[test]
    fn response_parses_embeddings() {
        let raw = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[0], vec![0.1, 0.2]);
    }

    #[test]
    fn tags_response_parses_model_names() {
        let raw = r#"{"models":[{"name":"nomic-embed-text:latest"},{"name":"llama3:8b"}]}"#;
        let parsed: TagsResponse = serde_json::from_str(raw).unwrap();
        let names: Vec<_> = parsed.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["nomic-embed-text:latest", "llama3:8b"]);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits_without_network() {
        // base_url points at a port nothing listens on; an actual request
        // would error, so success proves no request was made.
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(&config);
        let result = backend
            .batch_embed(&[], TaskType::SearchDocument, None)
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
