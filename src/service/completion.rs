//! Language-model completion client.
//!
//! Speaks the OpenAI-compatible chat completions API and always asks for a
//! JSON object reply. Transient failures are retried with exponential backoff
//! plus jitter; anything still failing is returned to the caller, which is
//! expected to fall back.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::{Duration, Instant};

use crate::config::NarrativeConfig;
use crate::error::{AuditError, Result};
use crate::service::http::{create_client, ClientType};

const SERVICE: &str = "completion";

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one prompt and returns the reply parsed as a JSON object.
    async fn complete_json(&self, request: &CompletionRequest) -> Result<serde_json::Value>;
}

/// Outcome of a single attempt: the error plus whether another try may help.
struct AttemptError {
    error: AuditError,
    retryable: bool,
}

impl AttemptError {
    fn transient(error: AuditError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn permanent(error: AuditError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenAiClient {
    pub fn new(config: &NarrativeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AuditError::Configuration("completion API key is not set".into()))?;

        Ok(Self {
            client: create_client(ClientType::Completion, config.timeout)?,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Exponential backoff for the given retry number (0-based) plus up to
    /// half a base step of jitter.
    fn backoff(&self, retry: u32) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        let exponential = base.saturating_mul(1u64 << retry.min(10));
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(exponential + jitter)
    }

    async fn attempt(&self, request: &CompletionRequest) -> std::result::Result<serde_json::Value, AttemptError> {
        let started = Instant::now();
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": request.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::transient(AuditError::timeout(SERVICE, started.elapsed()))
                } else {
                    AttemptError::transient(AuditError::service(SERVICE, e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = AuditError::service(SERVICE, format!("HTTP {}: {}", status, truncate(&text, 200)));
            let retryable = status.is_server_error()
                || status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::REQUEST_TIMEOUT;
            return Err(AttemptError { error, retryable });
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::transient(AuditError::timeout(SERVICE, started.elapsed()))
            } else {
                AttemptError::permanent(AuditError::MalformedAiResponse(e.to_string()))
            }
        })?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AttemptError::permanent(AuditError::MalformedAiResponse(
                    "reply has no message content".into(),
                ))
            })?;

        parse_json_object(content).map_err(AttemptError::permanent)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete_json(&self, request: &CompletionRequest) -> Result<serde_json::Value> {
        let mut retry = 0;
        loop {
            match self.attempt(request).await {
                Ok(value) => return Ok(value),
                Err(AttemptError { error, retryable }) => {
                    if !retryable || retry >= self.max_retries {
                        return Err(error);
                    }
                    let delay = self.backoff(retry);
                    tracing::debug!(
                        "[COMPLETION] Attempt {} failed ({}), retrying in {}ms",
                        retry + 1,
                        error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}

/// Parses a model reply as a JSON object, tolerating a markdown code fence.
pub fn parse_json_object(content: &str) -> Result<serde_json::Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<serde_json::Value>(unfenced) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(AuditError::MalformedAiResponse(
            "reply is JSON but not an object".into(),
        )),
        Err(e) => Err(AuditError::MalformedAiResponse(e.to_string())),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server, max_retries: u32) -> OpenAiClient {
        OpenAiClient::new(&NarrativeConfig {
            api_key: Some("sk-test".into()),
            base_url: format!("{}/v1/", server.url()),
            max_retries,
            retry_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You are an auditor.".into(),
            prompt: "Summarize.".into(),
            max_tokens: 100,
        }
    }

    fn chat_reply(content: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
    }

    #[tokio::test]
    async fn returns_parsed_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "response_format": { "type": "json_object" },
                "max_tokens": 100
            })))
            .with_status(200)
            .with_body(chat_reply(r#"{"summary":"ok"}"#))
            .create_async()
            .await;

        let value = client_for(&server, 0).complete_json(&request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(value["summary"], "ok");
    }

    #[tokio::test]
    async fn retries_server_errors_then_gives_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = client_for(&server, 2).complete_json(&request()).await.unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, AuditError::ExternalApi { .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        assert!(client_for(&server, 2).complete_json(&request()).await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(chat_reply("Sure! Here is your summary."))
            .create_async()
            .await;

        let err = client_for(&server, 2).complete_json(&request()).await.unwrap_err();
        assert!(matches!(err, AuditError::MalformedAiResponse(_)));
    }

    #[test]
    fn parses_fenced_json() {
        let value = parse_json_object("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
        assert!(parse_json_object("[1, 2]").is_err());
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = OpenAiClient::new(&NarrativeConfig::default()).err().unwrap();
        assert!(matches!(err, AuditError::Configuration(_)));
    }

    #[test]
    fn backoff_grows() {
        let client = OpenAiClient::new(&NarrativeConfig {
            api_key: Some("k".into()),
            retry_backoff: Duration::from_millis(100),
            ..Default::default()
        })
        .unwrap();
        let first = client.backoff(0);
        let third = client.backoff(2);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(450));
    }
}
