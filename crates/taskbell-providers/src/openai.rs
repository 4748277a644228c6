//! OpenAI-compatible task breakdown provider.
//!
//! Works with OpenAI's API and any compatible endpoint that supports
//! `response_format` with a JSON schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use taskbell_core::{
    config::OpenAiConfig,
    error::TaskbellError,
    traits::{BreakdownItem, TaskBreakdown},
};
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a planning assistant. Break the user's goal into a short, \
ordered list of concrete tasks. Give each task a title, a one-sentence description, and a \
realistic effort estimate in hours.";

/// Task breakdown backed by a chat completions endpoint.
pub struct OpenAiBreakdown {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBreakdown {
    /// Create from config values.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, TaskbellError> {
        if config.api_key.is_empty() {
            return Err(TaskbellError::Config(
                "openai api_key is empty (set it or OPENAI_API_KEY)".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            response_format: breakdown_response_format(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ResponseMessage>,
}

/// Assistant message; `content` is null when the model refused.
#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

/// Structured output body: `{"tasks": [...]}`.
#[derive(Deserialize)]
struct BreakdownPayload {
    tasks: Vec<BreakdownItem>,
}

/// Strict JSON schema for [`BreakdownPayload`].
fn breakdown_response_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "task_breakdown",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "description": { "type": "string" },
                                "estimated_hours": { "type": "number" }
                            },
                            "required": ["title", "description", "estimated_hours"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["tasks"],
                "additionalProperties": false
            }
        }
    })
}

/// Extract and validate the breakdown items from a completion response.
fn parse_breakdown(resp: ChatCompletionResponse) -> Result<Vec<BreakdownItem>, TaskbellError> {
    let message = resp
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .ok_or_else(|| TaskbellError::Provider("openai: response had no choices".into()))?;

    let content = match (message.content, message.refusal) {
        (Some(content), _) => content,
        (None, Some(refusal)) => {
            return Err(TaskbellError::Provider(format!("openai refused: {refusal}")))
        }
        (None, None) => return Err(TaskbellError::Provider("openai: empty message".into())),
    };

    let payload: BreakdownPayload = serde_json::from_str(&content)
        .map_err(|e| TaskbellError::Provider(format!("openai: malformed breakdown: {e}")))?;

    for item in &payload.tasks {
        if item.title.trim().is_empty() {
            return Err(TaskbellError::Provider("openai: task without title".into()));
        }
        if !item.estimated_hours.is_finite() || item.estimated_hours < 0.0 {
            return Err(TaskbellError::Provider(format!(
                "openai: invalid estimate {} for '{}'",
                item.estimated_hours, item.title
            )));
        }
    }

    Ok(payload.tasks)
}

#[async_trait]
impl TaskBreakdown for OpenAiBreakdown {
    fn name(&self) -> &str {
        "openai"
    }

    async fn breakdown(&self, prompt: &str) -> Result<Vec<BreakdownItem>, TaskbellError> {
        let start = Instant::now();
        let body = self.request(prompt);

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| TaskbellError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(TaskbellError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
            TaskbellError::Provider(format!("openai: failed to parse response: {e}"))
        })?;

        let tokens = parsed.usage.as_ref().and_then(|u| u.total_tokens);
        let items = parse_breakdown(parsed)?;

        info!(
            "openai: {} tasks in {}ms ({} tokens)",
            items.len(),
            start.elapsed().as_millis(),
            tokens.map_or_else(|| "?".to_string(), |t| t.to_string())
        );
        Ok(items)
    }
}
