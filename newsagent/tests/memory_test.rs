use anyhow::Result;
use newsagent::llm::{ChatMessage, LlmProvider, LlmRequest, LlmResponse, StructuredRequest};
use newsagent::memory::{
    self, FeedbackMessage, InMemoryStore, MergeOptions, Namespace, PreferenceStore, PROFILE_KEY,
    USER_NEWS_SOURCE_PREFERENCES_SCHEMA, USER_PREFERENCES_SCHEMA,
};
use newsagent::prompts;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Completion service stub: records every structured request and replies with a fixed value.
struct StubLlm {
    reply: Option<Value>,
    requests: Mutex<Vec<StructuredRequest>>,
}

impl StubLlm {
    fn replying(reply: Value) -> Self {
        Self { reply: Some(reply), requests: Mutex::new(Vec::new()) }
    }

    fn failing() -> Self {
        Self { reply: None, requests: Mutex::new(Vec::new()) }
    }

    fn requests(&self) -> Vec<StructuredRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for StubLlm {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse> {
        anyhow::bail!("not used by memory updates")
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(value) => Ok(value.clone()),
            None => anyhow::bail!("LLM API error 503 Service Unavailable: upstream down"),
        }
    }
}

/// In-memory store that counts writes
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    puts: AtomicUsize,
}

impl CountingStore {
    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PreferenceStore for CountingStore {
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<String>> {
        self.inner.get(namespace, key).await
    }

    async fn put(&self, namespace: &Namespace, key: &str, value: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(namespace, key, value).await
    }
}

#[tokio::test]
async fn unseen_namespace_is_seeded_with_the_default() {
    let store = InMemoryStore::new();
    let ns = Namespace::content("news_feed_agent");

    let profile = memory::get_memory(&store, &ns, "- AI news").await.unwrap();

    assert_eq!(profile, "- AI news");
    assert_eq!(store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("- AI news"));
}

#[tokio::test]
async fn existing_profile_wins_over_any_default() {
    let store = CountingStore::default();
    let ns = Namespace::news_sources("news_feed_agent");
    store.put(&ns, PROFILE_KEY, "- Reuters").await.unwrap();

    for default in ["- TechCrunch", "", "- Reuters"] {
        let profile = memory::get_memory(&store, &ns, default).await.unwrap();
        assert_eq!(profile, "- Reuters");
    }
    // only the initial put; reads never re-seed
    assert_eq!(store.puts(), 1);
}

#[tokio::test]
async fn stored_empty_profile_counts_as_present() {
    let store = InMemoryStore::new();
    let ns = Namespace::content("news_feed_agent");
    store.put(&ns, PROFILE_KEY, "").await.unwrap();

    assert_eq!(memory::get_memory(&store, &ns, "- AI").await.unwrap(), "");
}

#[tokio::test]
async fn news_source_merge_sends_exclusion_clause_and_source_schema() {
    let store = InMemoryStore::new();
    let llm = StubLlm::replying(json!({"user_news_source_preferences": "- TechCrunch"}));
    let ns = Namespace::news_sources("news_feed_agent");

    memory::update_memory(&store, &llm, &ns, &[FeedbackMessage::record("user", "add TechCrunch")])
        .await
        .unwrap();

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.schema, USER_NEWS_SOURCE_PREFERENCES_SCHEMA);
    assert_eq!(request.temperature, 0.0);
    assert!(request.messages[0].content.ends_with(prompts::NEWS_SOURCE_EXCLUSION));
    assert!(request.messages[0].content.contains("<memory_profile>\n\n</memory_profile>"));

    assert_eq!(store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("- TechCrunch"));
}

#[tokio::test]
async fn unknown_category_uses_generic_schema_and_writes_once() {
    let store = CountingStore::default();
    let llm = StubLlm::replying(json!({"user_preferences": "- Short summaries"}));
    let ns = Namespace::new("news_feed_agent", "tone_preferences");

    memory::update_memory(&store, &llm, &ns, &[FeedbackMessage::from("keep it short")])
        .await
        .unwrap();

    let request = &llm.requests()[0];
    assert_eq!(request.schema, USER_PREFERENCES_SCHEMA);
    let expected_system = prompts::MEMORY_UPDATE_INSTRUCTIONS
        .replace("{namespace}", "news_feed_agent/tone_preferences")
        .replace("{current_profile}", "");
    assert_eq!(request.messages[0].content, expected_system);
    assert!(!request.messages[0].content.contains(prompts::NEWS_SOURCE_EXCLUSION.trim()));
    assert_eq!(store.puts(), 1);
    assert_eq!(
        store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(),
        Some("- Short summaries")
    );
}

#[tokio::test]
async fn shapeless_feedback_is_normalized_without_error() {
    let store = InMemoryStore::new();
    let llm = StubLlm::replying(json!({"user_preferences": "- AI"}));
    let ns = Namespace::content("news_feed_agent");

    let messages = vec![
        FeedbackMessage::from("just a string"),
        FeedbackMessage::from(json!(12.5)),
        FeedbackMessage::from(json!({"unexpected": true})),
        FeedbackMessage::from(json!({"role": "user", "content": "more AI"})),
    ];
    memory::update_memory(&store, &llm, &ns, &messages).await.unwrap();

    let sent = &llm.requests()[0].messages;
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[1], ChatMessage::assistant("just a string"));
    assert_eq!(sent[2], ChatMessage::assistant("12.5"));
    assert_eq!(sent[3], ChatMessage::assistant(r#"{"unexpected":true}"#));
    assert_eq!(sent[4], ChatMessage::user("more AI"));
}

#[tokio::test]
async fn empty_feedback_still_invokes_the_service() {
    let store = CountingStore::default();
    let llm = StubLlm::replying(json!({"user_preferences": "- AI"}));
    let ns = Namespace::content("news_feed_agent");
    store.put(&ns, PROFILE_KEY, "- AI").await.unwrap();

    memory::update_memory(&store, &llm, &ns, &[]).await.unwrap();

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(store.puts(), 2);
}

#[tokio::test]
async fn completion_failure_propagates_and_leaves_profile_untouched() {
    let store = CountingStore::default();
    let llm = StubLlm::failing();
    let ns = Namespace::news_sources("news_feed_agent");
    store.put(&ns, PROFILE_KEY, "- Reuters").await.unwrap();

    let err = memory::update_memory(&store, &llm, &ns, &[FeedbackMessage::record("user", "add BBC")])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("503"));
    assert_eq!(store.puts(), 1);
    assert_eq!(store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("- Reuters"));
}

#[tokio::test]
async fn merge_does_not_seed_defaults() {
    let store = InMemoryStore::new();
    let llm = StubLlm::failing();
    let ns = Namespace::content("news_feed_agent");

    assert!(memory::update_memory(&store, &llm, &ns, &[]).await.is_err());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn content_scenario_sends_exact_payload() {
    let store = InMemoryStore::new();
    let llm = StubLlm::replying(json!({"user_preferences": "- AI news\n- Sports"}));
    let ns = Namespace::new("news_feed_agent", "content_preferences");

    let feedback = vec![FeedbackMessage::from(json!({"role": "user", "content": "I also want sports"}))];
    memory::update_memory(&store, &llm, &ns, &feedback).await.unwrap();

    let expected_system = prompts::MEMORY_UPDATE_INSTRUCTIONS_CONTENT
        .replace("{namespace}", "news_feed_agent/content_preferences")
        .replace("{current_profile}", "");
    let expected = StructuredRequest {
        messages: vec![
            ChatMessage::system(expected_system),
            ChatMessage::user("I also want sports"),
        ],
        schema: USER_PREFERENCES_SCHEMA,
        temperature: 0.0,
    };
    assert_eq!(llm.requests(), vec![expected]);

    // the default was never seeded, so the stored value is exactly the service output
    assert_eq!(
        store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(),
        Some("- AI news\n- Sports")
    );
    assert_eq!(memory::get_memory(&store, &ns, "- AI news").await.unwrap(), "- AI news\n- Sports");
}

#[tokio::test]
async fn merge_uses_current_profile_in_instructions() {
    let store = InMemoryStore::new();
    let llm = StubLlm::replying(json!({"user_news_source_preferences": "- Reuters\n- BBC"}));
    let ns = Namespace::news_sources("news_feed_agent");

    memory::get_memory(&store, &ns, "- Reuters").await.unwrap();
    memory::update_memory(&store, &llm, &ns, &[FeedbackMessage::record("user", "add BBC")])
        .await
        .unwrap();

    let system = &llm.requests()[0].messages[0].content;
    assert!(system.contains("# Process current profile for news_feed_agent/news_source_preferences"));
    assert!(system.contains("<memory_profile>\n- Reuters\n</memory_profile>"));
    assert_eq!(
        store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(),
        Some("- Reuters\n- BBC")
    );
}

#[tokio::test]
async fn mismatched_field_falls_back_to_other_known_field() {
    let store = InMemoryStore::new();
    let llm = StubLlm::replying(json!({"user_preferences": "- Reuters"}));
    let ns = Namespace::news_sources("news_feed_agent");

    memory::update_memory(&store, &llm, &ns, &[]).await.unwrap();

    assert_eq!(store.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("- Reuters"));
}

#[tokio::test]
async fn empty_replacement_guard_is_opt_in() {
    let ns = Namespace::content("news_feed_agent");
    let llm = StubLlm::replying(json!({"user_preferences": "   "}));

    let guarded = CountingStore::default();
    guarded.put(&ns, PROFILE_KEY, "- AI").await.unwrap();
    memory::update_memory_with(&guarded, &llm, &ns, &[], MergeOptions { reject_empty_replacement: true })
        .await
        .unwrap();
    assert_eq!(guarded.puts(), 1);
    assert_eq!(guarded.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("- AI"));

    let trusting = CountingStore::default();
    trusting.put(&ns, PROFILE_KEY, "- AI").await.unwrap();
    memory::update_memory(&trusting, &llm, &ns, &[]).await.unwrap();
    assert_eq!(trusting.puts(), 2);
    assert_eq!(trusting.get(&ns, PROFILE_KEY).await.unwrap().as_deref(), Some("   "));
}
