use crate::http::build_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            default_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing api key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Per-call sampling knobs. Each AI action in the gateway picks the
/// temperature/model combination the action was tuned against.
#[derive(Debug, Clone)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
}

impl Sampling {
    /// Idea generation and copywriting actions.
    pub fn creative() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            model: None,
        }
    }

    /// Gap analysis and scoring actions.
    pub fn analytic() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
            model: None,
        }
    }

    /// Spellcheck wants reproducible corrections.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    /// Whether an API key is present. The listing-analysis handler degrades
    /// to fixed fallback metrics when this is false.
    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Send a role-tagged message list and return the assistant text.
    pub async fn chat(
        &self,
        messages: &[LlmMessage],
        sampling: Sampling,
    ) -> Result<String, LlmError> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
        else {
            return Err(LlmError::MissingApiKey);
        };

        let model = sampling
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let body = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {}", response.status())));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("missing message content".into()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<LlmMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_presets_match_action_tuning() {
        assert_eq!(Sampling::creative().temperature, 0.7);
        assert_eq!(Sampling::analytic().temperature, 0.3);
        assert_eq!(Sampling::deterministic().temperature, 0.0);
    }

    #[test]
    fn unconfigured_client_reports_missing_key() {
        let client = LlmClient::new(LlmConfig {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            default_model: "gpt-4o".into(),
        });
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn chat_without_key_is_a_typed_error() {
        let client = LlmClient::new(LlmConfig {
            base_url: "https://api.openai.com/v1".into(),
            api_key: Some("   ".into()),
            default_model: "gpt-4o".into(),
        });
        let err = client
            .chat(&[LlmMessage::user("hi")], Sampling::deterministic())
            .await
            .expect_err("blank key must not hit the network");
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
