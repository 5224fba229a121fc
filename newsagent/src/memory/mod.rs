//! Preference memory: two free-text profiles (news sources, content topics) kept per agent.
//!
//! Profiles are read through [`get_memory`], which seeds a default the first time a
//! namespace is seen, and changed only through [`update_memory`], which asks the
//! completion service to fold conversation feedback into the current text. The merge is
//! additive by instruction; the returned text is stored as-is.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, LlmProvider, StructuredRequest};

mod message;
mod namespace;
mod store;

pub use message::FeedbackMessage;
pub use namespace::{
    Namespace, PreferenceCategory, CONTENT_KEY, NEWS_SOURCES_KEY, NEWS_SOURCE_FIELD,
    PROFILE_FIELD, USER_NEWS_SOURCE_PREFERENCES_SCHEMA, USER_PREFERENCES_SCHEMA,
};
pub use store::{InMemoryStore, PreferenceStore};

/// Store key under which every profile lives
pub const PROFILE_KEY: &str = "user_preferences";

/// Merges run at deterministic sampling
pub const MERGE_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Keep the stored profile when the merge returns blank text for a non-empty one.
    /// Off by default: the completion output is otherwise trusted unconditionally.
    pub reject_empty_replacement: bool,
}

/// Read the profile for `namespace`, persisting `default_content` if none exists yet.
pub async fn get_memory<S>(
    store: &S,
    namespace: &Namespace,
    default_content: &str,
) -> Result<String>
where
    S: PreferenceStore + ?Sized,
{
    if let Some(existing) = store.get(namespace, PROFILE_KEY).await? {
        return Ok(existing);
    }

    store.put(namespace, PROFILE_KEY, default_content).await?;
    info!(%namespace, "seeded default preference profile");
    Ok(default_content.to_string())
}

/// Merge `messages` into the profile for `namespace` with default options.
pub async fn update_memory<S, P>(
    store: &S,
    llm: &P,
    namespace: &Namespace,
    messages: &[FeedbackMessage],
) -> Result<()>
where
    S: PreferenceStore + ?Sized,
    P: LlmProvider + ?Sized,
{
    update_memory_with(store, llm, namespace, messages, MergeOptions::default()).await
}

/// Merge `messages` into the profile for `namespace`.
///
/// A missing profile counts as empty text (no default is seeded here). Completion or
/// store errors propagate untouched and leave the stored profile as it was.
pub async fn update_memory_with<S, P>(
    store: &S,
    llm: &P,
    namespace: &Namespace,
    messages: &[FeedbackMessage],
    options: MergeOptions,
) -> Result<()>
where
    S: PreferenceStore + ?Sized,
    P: LlmProvider + ?Sized,
{
    let category = namespace.category();
    let current_profile = store.get(namespace, PROFILE_KEY).await?.unwrap_or_default();

    let request = build_merge_request(namespace, &current_profile, messages);
    let field = request.schema.field;
    debug!(%namespace, ?category, messages = messages.len(), "requesting profile merge");

    let result = llm.generate_structured(request).await?;
    let updated = extract_profile_value(&result, field);

    if options.reject_empty_replacement
        && updated.trim().is_empty()
        && !current_profile.trim().is_empty()
    {
        warn!(%namespace, "merge returned an empty profile; keeping the stored one");
        return Ok(());
    }

    store.put(namespace, PROFILE_KEY, &updated).await?;
    info!(
        %namespace,
        ?category,
        before = current_profile.len(),
        after = updated.len(),
        "preference profile updated"
    );
    Ok(())
}

/// Build the structured completion request for one merge: the category's instructions as
/// a system message, followed by the normalized feedback in order.
pub fn build_merge_request(
    namespace: &Namespace,
    current_profile: &str,
    messages: &[FeedbackMessage],
) -> StructuredRequest {
    let category = namespace.category();
    let instructions = render_instructions(&category.instructions(), namespace, current_profile);

    let mut chat = Vec::with_capacity(messages.len() + 1);
    chat.push(ChatMessage::system(instructions));
    chat.extend(messages.iter().map(FeedbackMessage::to_chat_message));

    StructuredRequest {
        messages: chat,
        schema: category.schema(),
        temperature: MERGE_TEMPERATURE,
    }
}

/// Fill `{namespace}` and `{current_profile}` in a template.
/// The profile is inserted last so its own text is never substituted.
pub fn render_instructions(template: &str, namespace: &Namespace, current_profile: &str) -> String {
    template
        .replace("{namespace}", &namespace.to_string())
        .replace("{current_profile}", current_profile)
}

/// Pull the profile text out of a structured result.
///
/// Tries `field`, then the two known profile fields. Non-object results are used as
/// text directly. Never fails; yields an empty string when nothing usable is found.
// The multi-field fallback tolerates providers that answer with the other schema.
pub fn extract_profile_value(result: &Value, field: &str) -> String {
    match result {
        Value::Object(map) => {
            let found = [field, PROFILE_FIELD, NEWS_SOURCE_FIELD]
                .into_iter()
                .find_map(|name| map.get(name).filter(|v| !v.is_null()));
            match found {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    warn!(field, "structured result has no profile field");
                    String::new()
                }
            }
        }
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
