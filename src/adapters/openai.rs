//! Text refinement via an OpenAI-compatible chat-completions endpoint.
//!
//! The transcript is sent with an instruction to rewrite for fluency
//! while preserving every sentence's content; the model's reply replaces
//! the raw transcript in the journal entry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TextRefiner;
use crate::config::RefinerConfig;

/// Instruction prepended to the transcript. Fidelity over polish: keep all
/// content, keep the original order, only repair what speech recognition
/// plausibly got wrong.
const REFINE_INSTRUCTION: &str = "\
You are cleaning up a voice-journal transcription. Rewrite the entry below \
so it reads fluently, with these constraints: include the content of every \
original sentence without omitting anything; stay completely faithful to \
the original meaning and order, without restructuring; fix words that are \
likely homophone or near-homophone recognition errors, using the \
surrounding context to pick the intended word; add paragraph breaks where \
natural. Output only the final entry text.";

// Request types for the chat-completions API

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// Response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Chat-completions text refiner
pub struct OpenAiRefiner {
    config: RefinerConfig,
    client: reqwest::Client,
}

impl OpenAiRefiner {
    pub fn new(config: RefinerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextRefiner for OpenAiRefiner {
    async fn refine(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: format!("{}\n\n{}", REFINE_INSTRUCTION, text),
            }],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Refinement request failed")?;

        let status = response.status();
        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse refinement response")?;

        if let Some(error) = body.error {
            anyhow::bail!("Refinement API error: {}", error.message);
        }
        if !status.is_success() {
            anyhow::bail!("Refinement request returned HTTP {}", status);
        }

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let refined = content.trim();
        if refined.is_empty() {
            anyhow::bail!("Refinement returned empty text");
        }

        Ok(refined.to_string())
    }
}
