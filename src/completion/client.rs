// src/completion/client.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

use crate::completion::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::completion::CompletionClient;
use crate::config::CompletionSettings;
use crate::utils::error::CompletionError;

const SYSTEM_PROMPT: &str = "You are a financial analyst reading company filings. \
Answer exactly in the format the user asks for and never invent figures.";

/// Deterministic output keeps page lists and JSON stable between runs.
const TEMPERATURE: f32 = 0.0;

/// Slack on the HTTP timeout so the caller's deadline always fires first.
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

fn transport_timeout(deadline: Duration) -> Duration {
    deadline.saturating_add(TRANSPORT_GRACE)
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(settings: &CompletionSettings) -> Result<Self, CompletionError> {
        if settings.api_key.trim().is_empty() {
            return Err(CompletionError::Config(
                "API key is empty; set OPENAI_API_KEY or pass --api-key".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(transport_timeout(settings.timeout))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
        };

        tracing::debug!("Sending {} prompt chars to {} ({})", prompt.len(), self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?; // Propagates reqwest::Error as CompletionError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} from {}", status, self.endpoint);
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(CompletionError::RateLimited);
            }
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CompletionError::Http { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let answer = parsed.first_text().ok_or(CompletionError::EmptyResponse)?;
        tracing::debug!("Received {} response chars", answer.len());

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str, api_base: &str) -> CompletionSettings {
        CompletionSettings {
            api_base: api_base.to_string(),
            api_key: api_key.to_string(),
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_blank_api_key() {
        let result = OpenAiClient::new(&settings("  ", "https://api.openai.com/v1"));
        assert!(matches!(result, Err(CompletionError::Config(_))));
    }

    #[test]
    fn transport_timeout_outlasts_the_completion_deadline() {
        let deadline = Duration::from_secs(120);
        assert!(transport_timeout(deadline) > deadline);
        assert_eq!(transport_timeout(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn builds_endpoint_without_double_slash() {
        let client = OpenAiClient::new(&settings("sk-test", "http://localhost:8080/v1/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
