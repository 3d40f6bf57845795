// src/completion/mod.rs
pub mod client;
pub mod models;

use std::time::Duration;

use async_trait::async_trait;

use crate::utils::error::CompletionError;

pub use client::OpenAiClient;

/// Text-in/text-out model service used by the classification and extraction stages.
///
/// Responses are untrusted: callers must cope with refusals, prose, or
/// off-format output.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Runs a single completion under the caller-supplied deadline.
pub async fn complete_with_timeout(
    client: &dyn CompletionClient,
    prompt: &str,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, client.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Completion call exceeded {:?}", timeout);
            Err(CompletionError::Timeout(timeout))
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::CompletionClient;
    use crate::utils::error::CompletionError;

    /// Replays canned responses in order and records every prompt it receives.
    pub struct ScriptedCompletion {
        responses: Mutex<VecDeque<Result<String, CompletionError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        pub fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::with_results(responses.into_iter().map(|r| Ok(r.into())).collect())
        }

        pub fn with_results(results: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                responses: Mutex::new(results.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }
    }

    /// Never answers within any reasonable deadline.
    pub struct StalledCompletion;

    #[async_trait]
    impl CompletionClient for StalledCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }
}
