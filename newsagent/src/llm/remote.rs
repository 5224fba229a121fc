use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{
    ChatMessage, LlmProvider, LlmRequest, LlmResponse, StructuredRequest, ToolCall, ToolSpec,
    UsageMetadata,
};

/// Remote LLM provider using OpenAI-compatible HTTP API
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 500,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    async fn send(&self, body: &OpenAiRequest, timeout: Duration) -> Result<OpenAiResponse> {
        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&self.base_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send(),
        )
        .await
        .context("LLM request timed out")?
        .context("LLM HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, body);
        }

        let body = tokio::time::timeout(timeout, response.json::<OpenAiResponse>())
            .await
            .context("LLM request timed out")?
            .context("Failed to parse LLM response")?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);
        let temperature = request.temperature.unwrap_or(self.default_temperature);

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(ToolDef::from).collect())
        };

        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
            tools,
            response_format: None,
        };

        let resp_body = self.send(&req_body, timeout).await?;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .context("LLM response has no choices")?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            usage: resp_body.usage.map(UsageMetadata::from).unwrap_or_default(),
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<serde_json::Value> {
        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: Some(self.default_max_tokens),
            temperature: Some(request.temperature),
            tools: None,
            response_format: Some(serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name,
                    "strict": true,
                    "schema": request.schema.json_schema(),
                }
            })),
        };

        let resp_body = self.send(&req_body, self.default_timeout).await?;

        let content = resp_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("LLM structured response has no content")?;

        debug!(schema = request.schema.name, len = content.len(), "structured completion received");

        // Strict providers return bare JSON; others may wrap it in prose or fences.
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Ok(value),
            Err(_) => {
                let cleaned = super::extract_json_from_text(&content)
                    .context("No valid JSON found in LLM structured response")?;
                serde_json::from_str(&cleaned).with_context(|| {
                    format!("Failed to parse LLM structured output as JSON. Input was: {}", cleaned)
                })
            }
        }
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ToolDef {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDef,
}

#[derive(Debug, Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolSpec> for ToolDef {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDef {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

impl From<Usage> for UsageMetadata {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        }
    }
}
