//! OpenAI-compatible chat-completions evaluator.

use super::Evaluator;
use crate::config::Config;
use crate::error::ScoreError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You grade configuration documents for AI coding assistants. Follow the requested response format exactly.";

/// Calls `{base_url}/chat/completions` with a bearer token
pub struct HttpEvaluator {
    base_url: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl HttpEvaluator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            timeout: Duration::from_secs(20),
            max_tokens: 600,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Evaluator for the configured scoring target, if its backend exists
    pub fn from_config(config: &Config) -> Option<Self> {
        let (target, backend) = config.scoring_backend()?;
        Some(
            Self::new(&backend.base_url, target.model, backend.resolve_api_key())
                .with_timeout(config.scoring.timeout())
                .with_max_tokens(config.scoring.max_tokens()),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn map_error(&self, e: reqwest::Error) -> ScoreError {
        if e.is_timeout() {
            ScoreError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ScoreError::Transport(e.to_string())
        }
    }
}

impl Evaluator for HttpEvaluator {
    fn evaluate(&self, prompt: &str) -> Result<String, ScoreError> {
        // Built per call: a blocking client must not be dropped on an async runtime thread
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ScoreError::Transport(e.to_string()))?;

        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
        });

        tracing::debug!(model = %self.model, url = %self.endpoint(), "requesting LLM score");
        let response = client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoreError::Transport(format!("HTTP {}", status)));
        }

        let body: ChatResponse = response.json().map_err(|e| self.map_error(e))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ScoreError::Unparseable("response has no message content".to_string()))
    }
}
