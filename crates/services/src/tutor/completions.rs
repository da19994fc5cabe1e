use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatGateway, FALLBACK_REPLY};
use crate::error::TutorError;

/// System instruction sent ahead of every tutor message.
pub const TUTOR_INSTRUCTIONS: &str = "\
You are LiftBot, a friendly study tutor for Nigerian secondary school students \
preparing for WAEC, NECO, GCE, JAMB and POST-UTME.

What you do:
- explain hard ideas in plain words, one step at a time
- write practice questions and always give the answer with a short explanation
- share study plans and exam technique
- keep students motivated

How you do it:
- use Nigerian English and examples from the Nigerian curriculum and daily life
- aim for understanding rather than memorisation
- stay warm, patient and encouraging";

#[derive(Clone, Debug)]
pub struct CompletionsConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl CompletionsConfig {
    /// Reads `PREP_AI_API_KEY`, `PREP_AI_BASE_URL` and `PREP_AI_MODEL`.
    ///
    /// Returns `None` without an API key.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("PREP_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("PREP_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("PREP_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Calls an OpenAI-compatible chat completions endpoint directly.
#[derive(Clone)]
pub struct CompletionsGateway {
    client: Client,
    config: Option<CompletionsConfig>,
}

impl CompletionsGateway {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(CompletionsConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<CompletionsConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ChatGateway for CompletionsGateway {
    async fn ask(&self, message: &str) -> Result<String, TutorError> {
        let config = self.config.as_ref().ok_or(TutorError::NotConfigured)?;
        let payload = ChatRequest::tutor(&config.model, message);

        debug!(model = %config.model, "calling completions endpoint");
        let response = self
            .client
            .post(config.endpoint())
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %detail, "completions endpoint error");
            return Err(TutorError::Upstream {
                status: status.as_u16(),
                message: "AI service error".into(),
            });
        }

        let body: ChatResponse = response.json().await?;
        Ok(body.into_reply())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatTurn>,
    temperature: f32,
}

impl ChatRequest {
    fn tutor(model: &str, message: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatTurn {
                    role: "system",
                    content: TUTOR_INSTRUCTIONS.to_string(),
                },
                ChatTurn {
                    role: "user",
                    content: message.to_string(),
                },
            ],
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTurn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatResponse {
    fn into_reply(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
