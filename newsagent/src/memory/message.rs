use serde_json::Value;

use crate::llm::ChatMessage;

/// A conversation entry handed to the merge, in whatever shape the caller had it.
///
/// Conversion into this type happens where messages enter the memory subsystem;
/// turning it into a chat message never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackMessage {
    /// Role/content pair, passed through as-is
    Record { role: String, content: String },
    /// Anything else; rendered as text under the assistant role
    Opaque(Value),
}

impl FeedbackMessage {
    pub fn record(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Record {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        match self {
            Self::Record { role, content } => ChatMessage::new(role.clone(), content.clone()),
            Self::Opaque(value) => ChatMessage::assistant(value_text(value)),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<Value> for FeedbackMessage {
    /// Objects with a string `role` and a `content` become records; everything else is opaque.
    fn from(value: Value) -> Self {
        let record = value.as_object().and_then(|obj| {
            let role = obj.get("role")?.as_str()?;
            let content = obj.get("content")?;
            Some((role.to_string(), value_text(content)))
        });
        match record {
            Some((role, content)) => Self::Record { role, content },
            None => Self::Opaque(value),
        }
    }
}

impl From<&ChatMessage> for FeedbackMessage {
    fn from(msg: &ChatMessage) -> Self {
        // Tool results lose their call id here, so they travel as plain assistant context.
        if msg.role == "tool" {
            return Self::Opaque(Value::String(msg.content.clone()));
        }
        Self::record(msg.role.clone(), msg.content.clone())
    }
}

impl From<ChatMessage> for FeedbackMessage {
    fn from(msg: ChatMessage) -> Self {
        Self::from(&msg)
    }
}

impl From<&str> for FeedbackMessage {
    fn from(text: &str) -> Self {
        Self::Opaque(Value::String(text.to_string()))
    }
}

impl From<String> for FeedbackMessage {
    fn from(text: String) -> Self {
        Self::Opaque(Value::String(text))
    }
}
