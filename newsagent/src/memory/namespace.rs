use std::borrow::Cow;
use std::fmt;

use crate::llm::OutputSchema;
use crate::prompts;

/// Category key of the news source profile
pub const NEWS_SOURCES_KEY: &str = "news_source_preferences";
/// Category key of the content profile
pub const CONTENT_KEY: &str = "content_preferences";

/// Output field of the content and generic schemas; also the store key of every profile.
pub const PROFILE_FIELD: &str = "user_preferences";
/// Output field of the news source schema
pub const NEWS_SOURCE_FIELD: &str = "user_news_source_preferences";

pub const USER_PREFERENCES_SCHEMA: OutputSchema = OutputSchema {
    name: "UserPreferences",
    field: PROFILE_FIELD,
    description: "User's content preferences as a formatted string with bullet points for topics and areas of interest",
};

pub const USER_NEWS_SOURCE_PREFERENCES_SCHEMA: OutputSchema = OutputSchema {
    name: "UserNewsSourcePreferences",
    field: NEWS_SOURCE_FIELD,
    description: "User's news source preferences as a formatted string with bullet points for websites and publication names",
};

/// Storage slot of one profile: `(agent_id, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    agent_id: String,
    category: String,
}

impl Namespace {
    pub fn new(agent_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            category: category.into(),
        }
    }

    pub fn news_sources(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id, NEWS_SOURCES_KEY)
    }

    pub fn content(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id, CONTENT_KEY)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Raw second component, as stored
    pub fn category_key(&self) -> &str {
        &self.category
    }

    pub fn category(&self) -> PreferenceCategory {
        PreferenceCategory::from_key(&self.category)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.agent_id, self.category)
    }
}

/// Merge behaviour selected by a namespace's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceCategory {
    /// Publications and websites only
    NewsSources,
    /// Topics and themes only
    Content,
    /// Anything else; generic instructions
    Other,
}

impl PreferenceCategory {
    /// Total mapping from a raw category key.
    pub fn from_key(key: &str) -> Self {
        match key {
            NEWS_SOURCES_KEY => Self::NewsSources,
            CONTENT_KEY => Self::Content,
            _ => Self::Other,
        }
    }

    /// Instruction template, still carrying `{namespace}` and `{current_profile}`.
    pub fn instructions(&self) -> Cow<'static, str> {
        match self {
            Self::NewsSources => Cow::Owned(format!(
                "{}{}",
                prompts::MEMORY_UPDATE_INSTRUCTIONS_NEWS_SOURCE,
                prompts::NEWS_SOURCE_EXCLUSION
            )),
            Self::Content => Cow::Borrowed(prompts::MEMORY_UPDATE_INSTRUCTIONS_CONTENT),
            Self::Other => Cow::Borrowed(prompts::MEMORY_UPDATE_INSTRUCTIONS),
        }
    }

    pub fn schema(&self) -> OutputSchema {
        match self {
            Self::NewsSources => USER_NEWS_SOURCE_PREFERENCES_SCHEMA,
            Self::Content | Self::Other => USER_PREFERENCES_SCHEMA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_and_unknown_categories() {
        assert_eq!(
            PreferenceCategory::from_key("news_source_preferences"),
            PreferenceCategory::NewsSources
        );
        assert_eq!(
            PreferenceCategory::from_key("content_preferences"),
            PreferenceCategory::Content
        );
        assert_eq!(PreferenceCategory::from_key("tone_preferences"), PreferenceCategory::Other);
        assert_eq!(PreferenceCategory::from_key(""), PreferenceCategory::Other);
        assert_eq!(PreferenceCategory::from_key("Content_Preferences"), PreferenceCategory::Other);
    }

    #[test]
    fn news_sources_route_to_their_own_schema_and_exclusion_clause() {
        let category = PreferenceCategory::NewsSources;
        assert_eq!(category.schema().field, "user_news_source_preferences");
        let instructions = category.instructions();
        assert!(instructions.ends_with(prompts::NEWS_SOURCE_EXCLUSION));
        assert!(instructions.contains("{current_profile}"));
    }

    #[test]
    fn content_and_other_share_the_generic_field() {
        assert_eq!(PreferenceCategory::Content.schema().field, "user_preferences");
        assert_eq!(PreferenceCategory::Other.schema(), USER_PREFERENCES_SCHEMA);
        assert!(PreferenceCategory::Content
            .instructions()
            .contains("NOT websites or sources"));
        assert_eq!(
            PreferenceCategory::Other.instructions(),
            prompts::MEMORY_UPDATE_INSTRUCTIONS
        );
    }

    #[test]
    fn displays_namespace_as_agent_and_category() {
        let ns = Namespace::new("news_feed_agent", "content_preferences");
        assert_eq!(ns, Namespace::content("news_feed_agent"));
        assert_eq!(ns.to_string(), "news_feed_agent/content_preferences");
        assert_eq!(ns.agent_id(), "news_feed_agent");
        assert_eq!(ns.category_key(), "content_preferences");
        assert_eq!(ns.category(), PreferenceCategory::Content);
    }
}
