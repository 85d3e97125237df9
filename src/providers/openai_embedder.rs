use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::utils::Limiters;

use super::retry::with_retry;
use super::{Embedder, ProviderError};

#[derive(Debug, Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedder adapter for an OpenAI-compatible `/v1/embeddings` endpoint.
/// Batches internally (`embedding_batch_size`), bounds in-flight requests via
/// `Limiters`, and retries transient failures.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    request_timeout: Duration,
    limiters: Arc<Limiters>,
}

impl OpenAiEmbedder {
    pub fn new(
        provider: &ProviderConfig,
        batch_size: usize,
        request_timeout: Duration,
        limiters: Arc<Limiters>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            model: provider.embedding_model.clone(),
            dimension: provider.embedding_dimension,
            batch_size,
            request_timeout,
            limiters,
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let _permit = self
            .limiters
            .acquire_embedding()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Transient(format!("embedding request timed out: {err}"))
                } else {
                    ProviderError::Transient(format!("embedding request failed: {err}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ProviderError::Transient(format!(
                "embedding provider returned {status}"
            )));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Permanent(format!(
                "embedding provider rejected request ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponseBody = response
            .json()
            .await
            .map_err(|err| ProviderError::Permanent(format!("malformed embedding response: {err}")))?;

        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(ProviderError::Permanent(format!(
                "expected {} embeddings, provider returned {}",
                texts.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(ProviderError::Permanent(format!(
                    "expected dimension {}, provider returned {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    /// Splits `batch` into `embedding_batch_size`-sized groups and embeds
    /// them concurrently (bounded by `Limiters`), then reassembles in the
    /// original order — one vector per input.
    async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let batches: Vec<&[String]> = batch.chunks(self.batch_size.max(1)).collect();
        let calls = batches.iter().map(|texts| {
            let deadline = Instant::now() + self.request_timeout;
            with_retry(deadline, || self.embed_once(texts))
        });

        let results = futures::future::try_join_all(calls).await?;
        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            api_key: "test-key".to_string(),
            base_url,
            embedding_model: "some-custom-model-id".to_string(),
            embedding_dimension: 3,
            chat_model: "unused".to_string(),
            max_concurrency: 4,
        }
    }

    fn embedder(base_url: String) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            &provider_config(base_url),
            16,
            Duration::from_secs(5),
            Arc::new(Limiters::new(4)),
        )
    }

    fn embedding_body(vectors: &[[f32; 3]]) -> serde_json::Value {
        json!({
            "data": vectors
                .iter()
                .enumerate()
                .map(|(i, v)| json!({"embedding": v, "index": i}))
                .collect::<Vec<Value>>()
        })
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[[0.1, 0.2, 0.3]])))
            .mount(&server)
            .await;

        let embedder = embedder(server.uri());
        let result = embedder.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(result, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[tokio::test]
    async fn non_429_4xx_is_permanent_and_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder(server.uri());
        let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[[0.1, 0.2]; 1])))
            .mount(&server)
            .await;

        let embedder = embedder(server.uri());
        let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[tokio::test]
    async fn preserves_order_across_internal_batches() {
        let server = MockServer::start().await;

        // batch_size is forced to 1 below so each input becomes its own call;
        // each response carries a distinct vector to prove reassembly order.
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(|req: &wiremock::Request| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                let input = body["input"][0].as_str().unwrap();
                let vector = match input {
                    "a" => [1.0, 0.0, 0.0],
                    "b" => [0.0, 1.0, 0.0],
                    _ => [0.0, 0.0, 1.0],
                };
                ResponseTemplate::new(200).set_body_json(embedding_body(&[vector]))
            })
            .mount(&server)
            .await;

        let mut embedder = embedder(server.uri());
        embedder.batch_size = 1;
        let result = embedder
            .embed(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(result[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(result[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(result[2], vec![0.0, 0.0, 1.0]);
    }
}
