//! Conversation controller: agent -> tools -> agent ... -> feedback -> end.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::llm::{ChatMessage, LlmProvider, LlmRequest};
use crate::memory::{self, FeedbackMessage, MergeOptions, Namespace, PreferenceStore};
use crate::prompts;
use crate::tools::ToolExecutor;

/// Answer to the feedback question, in interrupt payload shape:
/// `{"type": "response", "args": "..."}` or `{"type": "ignore"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "lowercase")]
pub enum FeedbackResponse {
    Response(String),
    Ignore,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub agent_id: String,
    pub default_news_sources: String,
    pub default_content: String,
    pub max_tool_rounds: usize,
    pub merge: MergeOptions,
}

impl AgentSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            agent_id: config.agent_id().to_string(),
            default_news_sources: config.preferences.news_sources.clone(),
            default_content: config.preferences.content.clone(),
            max_tool_rounds: config
                .agent
                .as_ref()
                .and_then(|a| a.max_tool_rounds)
                .unwrap_or(25),
            merge: MergeOptions {
                reject_empty_replacement: config.preferences.reject_empty_replacement,
            },
        }
    }
}

/// Both profiles as injected into the system prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub news_sources: String,
    pub content: String,
}

/// Read both profiles for `settings.agent_id`, seeding defaults on first use.
/// Needs only the store, so it works without any completion or search credentials.
pub async fn read_preferences<S>(store: &S, settings: &AgentSettings) -> Result<Preferences>
where
    S: PreferenceStore + ?Sized,
{
    let news_sources = memory::get_memory(
        store,
        &Namespace::news_sources(settings.agent_id.clone()),
        &settings.default_news_sources,
    )
    .await?;
    let content = memory::get_memory(
        store,
        &Namespace::content(settings.agent_id.clone()),
        &settings.default_content,
    )
    .await?;
    Ok(Preferences { news_sources, content })
}

pub struct NewsAgent {
    llm: Arc<dyn LlmProvider>,
    memory_llm: Arc<dyn LlmProvider>,
    store: Arc<dyn PreferenceStore>,
    tools: Arc<dyn ToolExecutor>,
    settings: AgentSettings,
}

impl NewsAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn PreferenceStore>,
        tools: Arc<dyn ToolExecutor>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            memory_llm: llm.clone(),
            llm,
            store,
            tools,
            settings,
        }
    }

    /// Use a separate provider for profile merges.
    pub fn with_memory_llm(mut self, memory_llm: Arc<dyn LlmProvider>) -> Self {
        self.memory_llm = memory_llm;
        self
    }

    pub fn news_sources_namespace(&self) -> Namespace {
        Namespace::news_sources(self.settings.agent_id.clone())
    }

    pub fn content_namespace(&self) -> Namespace {
        Namespace::content(self.settings.agent_id.clone())
    }

    /// Read both profiles, seeding the configured defaults on first use.
    pub async fn preferences(&self) -> Result<Preferences> {
        read_preferences(self.store.as_ref(), &self.settings).await
    }

    /// Run one turn. Appends every assistant and tool message to `messages` and
    /// returns the final answer text.
    pub async fn run_turn(&self, messages: &mut Vec<ChatMessage>) -> Result<String> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("agent_turn", %run_id);
        self.run_turn_inner(messages).instrument(span).await
    }

    async fn run_turn_inner(&self, messages: &mut Vec<ChatMessage>) -> Result<String> {
        let prefs = self.preferences().await?;
        let system = ChatMessage::system(prompts::agent_system_prompt(
            &prefs.news_sources,
            &prefs.content,
        ));
        let specs = self.tools.specs();

        for round in 1..=self.settings.max_tool_rounds {
            let mut request_messages = Vec::with_capacity(messages.len() + 1);
            request_messages.push(system.clone());
            request_messages.extend(messages.iter().cloned());

            let response = self
                .llm
                .generate(LlmRequest {
                    messages: request_messages,
                    tools: specs.clone(),
                    temperature: Some(0.0),
                    ..Default::default()
                })
                .await
                .context("agent completion failed")?;

            debug!(
                round,
                tool_calls = response.tool_calls.len(),
                tokens = response.usage.total_tokens,
                "agent round"
            );

            if response.tool_calls.is_empty() {
                messages.push(ChatMessage::assistant(response.content.clone()));
                info!(round, "agent produced final answer");
                return Ok(response.content);
            }

            let calls = response.tool_calls.clone();
            messages.push(ChatMessage {
                tool_calls: Some(response.tool_calls),
                ..ChatMessage::assistant(response.content)
            });

            for call in calls {
                let output = self.call_tool(&call.function.name, &call.function.arguments).await;
                messages.push(ChatMessage::tool(call.id, output));
            }
        }

        bail!(
            "agent exceeded {} tool rounds without a final answer",
            self.settings.max_tool_rounds
        )
    }

    /// Tool output as text for the model; failures become an error payload.
    async fn call_tool(&self, name: &str, arguments: &str) -> String {
        info!(tool = name, "executing tool");
        let result = match serde_json::from_str::<serde_json::Value>(arguments) {
            Ok(args) => self.tools.execute(name, &args).await,
            Err(e) => Err(anyhow::anyhow!("arguments are not valid JSON: {}", e)),
        };
        match result {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                serde_json::json!({ "error": format!("{:#}", e) }).to_string()
            }
        }
    }

    /// Apply the human's answer to the feedback question. A response is appended to
    /// the conversation and merged into both profiles; ignore changes nothing.
    pub async fn apply_feedback(
        &self,
        messages: &mut Vec<ChatMessage>,
        feedback: FeedbackResponse,
    ) -> Result<()> {
        let text = match feedback {
            FeedbackResponse::Ignore => {
                info!("feedback ignored");
                return Ok(());
            }
            FeedbackResponse::Response(text) => text,
        };

        messages.push(ChatMessage::user(text));
        let feedback: Vec<FeedbackMessage> = messages.iter().map(FeedbackMessage::from).collect();

        for namespace in [self.news_sources_namespace(), self.content_namespace()] {
            memory::update_memory_with(
                self.store.as_ref(),
                self.memory_llm.as_ref(),
                &namespace,
                &feedback,
                self.settings.merge,
            )
            .await
            .with_context(|| format!("failed to update preferences for {}", namespace))?;
        }
        Ok(())
    }
}
