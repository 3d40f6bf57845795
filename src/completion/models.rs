// src/completion/models.rs
use serde::{Deserialize, Serialize};

/// Request body for the chat-completions endpoint
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Response body; only the fields we read are modelled.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    // null when the model refuses or only calls tools
    pub content: Option<String>,
}

impl ChatResponse {
    /// First non-blank message text across the returned choices.
    pub fn first_text(self) -> Option<String> {
        self.choices.into_iter().find_map(|choice| {
            let text = choice.message.content.filter(|t| !t.trim().is_empty())?;
            if choice.finish_reason.as_deref() == Some("length") {
                tracing::warn!("Completion stopped at the token limit; the reply may be cut short");
            }
            Some(text)
        })
    }
}
