//! Chat-completions decision source over HTTP.
//!
//! One blocking POST per turn, no retry: any transport failure, non-success
//! status, or response without completion text ends the run.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::DecisionSourceError;
use crate::io::config::PolicyConfig;
use crate::io::prompt::DecisionContext;
use crate::policy::PolicyOracle;

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

/// Endpoint settings for [`RemotePolicy`].
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_key_header: String,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl RemoteSettings {
    pub fn from_config(cfg: &PolicyConfig) -> Result<Self> {
        Ok(Self {
            endpoint: cfg
                .endpoint
                .clone()
                .ok_or_else(|| anyhow!("policy endpoint is not configured (AZURE_URL)"))?,
            api_key: cfg
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("policy api key is not configured (AZURE_KEY)"))?,
            api_key_header: cfg.api_key_header.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout: cfg.request_timeout(),
        })
    }
}

/// Calls a chat-completions endpoint with the system instruction and turn context.
pub struct RemotePolicy {
    client: Client,
    settings: RemoteSettings,
}

impl RemotePolicy {
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client, settings })
    }
}

impl PolicyOracle for RemotePolicy {
    #[instrument(skip_all, fields(endpoint = %self.settings.endpoint))]
    fn decide(&mut self, context: &DecisionContext) -> Result<String, DecisionSourceError> {
        let body = ChatCompletionRequest {
            model: self.settings.model.as_deref(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &context.system,
                },
                ChatMessage {
                    role: "user",
                    content: &context.user,
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(self.settings.api_key_header.as_str(), &self.settings.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "decision endpoint returned an error");
            return Err(DecisionSourceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(DecisionSourceError::Decode)?;
        let completion = completion_text(&value)?;
        debug!(response_bytes = completion.len(), "decision received");
        Ok(completion)
    }
}

/// Pull the completion from `choices[0].message.content`, falling back to the
/// legacy `choices[0].text`. A missing or non-string field is an error.
fn completion_text(value: &Value) -> Result<String, DecisionSourceError> {
    let choice = value
        .pointer("/choices/0")
        .ok_or(DecisionSourceError::MissingCompletion)?;
    choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or(DecisionSourceError::MissingCompletion)
}
