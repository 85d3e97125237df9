use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::utils::Limiters;

use super::retry::with_retry;
use super::{ChatCompleter, ChatTurn, ProviderError};

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    content: String,
}

/// ChatCompleter adapter for an OpenAI-compatible `/v1/chat/completions`
/// endpoint. Streaming is out of scope; this always awaits the full
/// reply body.
pub struct OpenAiChatCompleter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
    limiters: Arc<Limiters>,
}

impl OpenAiChatCompleter {
    pub fn new(provider: &ProviderConfig, request_timeout: Duration, limiters: Arc<Limiters>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            model: provider.chat_model.clone(),
            request_timeout,
            limiters,
        }
    }

    async fn complete_once(&self, messages: &[ChatTurn], temperature: f32) -> Result<String, ProviderError> {
        let _permit = self
            .limiters
            .acquire_chat()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let payload_messages: Vec<_> = messages
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&json!({
                "model": self.model,
                "messages": payload_messages,
                "temperature": temperature,
            }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Transient(format!("chat request timed out: {err}"))
                } else {
                    ProviderError::Transient(format!("chat request failed: {err}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ProviderError::Transient(format!(
                "chat provider returned {status}"
            )));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Permanent(format!(
                "chat provider rejected request ({status}): {body}"
            )));
        }

        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|err| ProviderError::Permanent(format!("malformed chat response: {err}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Permanent("chat provider returned no choices".to_string()))?
            .message
            .content;

        Ok(reply)
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChatCompleter {
    async fn complete(&self, messages: &[ChatTurn], temperature: f32) -> Result<String, ProviderError> {
        let deadline = Instant::now() + self.request_timeout;
        with_retry(deadline, || self.complete_once(messages, temperature)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            api_key: "test-key".to_string(),
            base_url,
            embedding_model: "unused".to_string(),
            embedding_dimension: 3,
            chat_model: "a-model-id-the-sdk-has-never-heard-of".to_string(),
            max_concurrency: 4,
        }
    }

    fn completer(base_url: String) -> OpenAiChatCompleter {
        OpenAiChatCompleter::new(&provider_config(base_url), Duration::from_secs(5), Arc::new(Limiters::new(4)))
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"content": content}}]})
    }

    #[tokio::test]
    async fn passes_through_arbitrary_model_id_and_returns_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                assert_eq!(body["model"], "a-model-id-the-sdk-has-never-heard-of");
                ResponseTemplate::new(200).set_body_json(chat_body("Paris is the capital of France."))
            })
            .mount(&server)
            .await;

        let completer = completer(server.uri());
        let reply = completer
            .complete(
                &[ChatTurn {
                    role: "user".to_string(),
                    content: "What is the capital of France?".to_string(),
                }],
                0.3,
            )
            .await
            .unwrap();

        assert_eq!(reply, "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn server_error_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
            .mount(&server)
            .await;

        let completer = completer(server.uri());
        let reply = completer
            .complete(&[ChatTurn { role: "user".to_string(), content: "hi".to_string() }], 0.3)
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn unauthorized_is_permanent_and_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let completer = completer(server.uri());
        let err = completer
            .complete(&[ChatTurn { role: "user".to_string(), content: "hi".to_string() }], 0.3)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }
}
