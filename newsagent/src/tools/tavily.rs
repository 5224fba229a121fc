use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

/// Thin async client over the Tavily search / extract / crawl / map endpoints.
#[derive(Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Search parameters; `None` means "let the heuristics decide".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_depth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_image_descriptions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_raw_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Site-map parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapParams {
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instructions: String,
    pub max_depth: u32,
    pub max_breadth: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select_domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
    pub allow_external: bool,
}

impl MapParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            instructions: String::new(),
            max_depth: 1,
            max_breadth: 20,
            limit: 50,
            select_paths: Vec::new(),
            select_domains: Vec::new(),
            exclude_paths: Vec::new(),
            exclude_domains: Vec::new(),
            allow_external: false,
        }
    }
}

fn mentions_any(query: &str, words: &[&str]) -> bool {
    words.iter().any(|w| query.contains(w))
}

fn set_default<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn domains(list: &[&str]) -> Vec<String> {
    list.iter().map(|d| d.to_string()).collect()
}

/// Fill unset search parameters from the query text. Explicit values always win.
pub fn apply_search_heuristics(params: &mut SearchParams) {
    let query = params.query.to_lowercase();

    set_default(&mut params.max_results, 10);
    set_default(&mut params.search_depth, "advanced".to_string());

    if mentions_any(&query, &["news", "recent", "latest", "breaking"]) {
        set_default(&mut params.topic, "news".to_string());
        set_default(&mut params.time_range, "week".to_string());
        set_default(&mut params.max_results, 8);
    } else if mentions_any(&query, &["stock", "market", "finance", "investment"]) {
        set_default(&mut params.topic, "finance".to_string());
        set_default(&mut params.time_range, "day".to_string());
        set_default(&mut params.exclude_domains, domains(&["reddit.com", "twitter.com"]));
    } else if mentions_any(&query, &["image", "picture", "visual", "photo"]) {
        set_default(&mut params.include_images, true);
        set_default(&mut params.include_image_descriptions, true);
        set_default(&mut params.max_results, 6);
    } else if mentions_any(&query, &["academic", "research", "study", "paper"]) {
        set_default(
            &mut params.include_domains,
            domains(&["wikipedia.org", "scholar.google.com", "arxiv.org"]),
        );
        set_default(&mut params.include_raw_content, true);
        set_default(&mut params.max_results, 12);
    }
}

impl TavilyClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(body)
                .send(),
        )
        .await
        .with_context(|| format!("Tavily {} request timed out", endpoint))?
        .with_context(|| format!("Tavily {} request failed", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily {} error {}: {}", endpoint, status, body);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse Tavily {} response", endpoint))
    }

    /// Web search; returns the `results` array (empty if the response has none).
    pub async fn search(&self, mut params: SearchParams) -> Result<Vec<Value>> {
        apply_search_heuristics(&mut params);
        info!(
            query = %params.query,
            max_results = ?params.max_results,
            topic = ?params.topic,
            "tavily search"
        );

        let body = serde_json::to_value(&params).context("failed to encode search params")?;
        let response = self.post("search", &body).await?;
        Ok(response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Extract page content as markdown; each item is `{url, content, images}`.
    pub async fn extract(&self, urls: &[String]) -> Result<Vec<Value>> {
        info!(count = urls.len(), "tavily extract");
        let body = json!({
            "urls": urls,
            "include_images": false,
            "extract_depth": "advanced",
            "format": "markdown",
        });
        let response = self.post("extract", &body).await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(|item| {
                        let field = |name: &str, fallback: Value| {
                            item.get(name).cloned().unwrap_or(fallback)
                        };
                        json!({
                            "url": field("url", json!("")),
                            "content": field("raw_content", json!("")),
                            "images": field("images", json!([])),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }

    /// Crawl one level out from `url`.
    pub async fn crawl(&self, url: &str) -> Result<Value> {
        info!(url, "tavily crawl");
        let body = json!({
            "url": url,
            "max_depth": 1,
            "max_breadth": 20,
            "limit": 50,
        });
        let response = self.post("crawl", &body).await?;
        if !response.is_object() {
            anyhow::bail!("Invalid crawl response format");
        }
        Ok(response)
    }

    /// Map a site's URLs. If the map endpoint fails, discover URLs with a
    /// `site:` search instead; the result then carries `fallback_used`.
    pub async fn map(&self, params: &MapParams) -> Value {
        info!(url = %params.url, limit = params.limit, "tavily map");
        let map_err = match self.try_map(params).await {
            Ok(response) => return response,
            Err(e) => e,
        };
        warn!(
            url = %params.url,
            error = %map_err,
            "tavily map failed, falling back to site search"
        );

        match self.site_search(params).await {
            Ok(fallback) => {
                let mut fallback = fallback;
                fallback["original_error"] = json!(format!("Map failed: {}", map_err));
                fallback
            }
            Err(search_err) => json!({
                "base_url": params.url,
                "results": [],
                "response_time": 0.0,
                "error": format!(
                    "Both map and search failed. Map: {}, Search: {}",
                    map_err, search_err
                ),
            }),
        }
    }

    async fn try_map(&self, params: &MapParams) -> Result<Value> {
        let body = serde_json::to_value(params).context("failed to encode map params")?;
        let response = self.post("map", &body).await?;
        if !response.is_object() {
            anyhow::bail!("Invalid map response format");
        }
        Ok(response)
    }

    async fn site_search(&self, params: &MapParams) -> Result<Value> {
        let domain = url::Url::parse(&params.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .with_context(|| format!("cannot derive a domain from {}", params.url))?;

        let mut query = format!("site:{}", domain);
        if !params.instructions.is_empty() {
            query.push(' ');
            query.push_str(&params.instructions);
        }

        // Raw request: the fallback must not go through the search heuristics.
        let body = json!({
            "query": query,
            "max_results": params.limit.min(10),
            "search_depth": "basic",
        });
        let response = self.post("search", &body).await?;

        let urls: Vec<Value> = response
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|r| r.get("url").and_then(Value::as_str))
                    .filter(|u| !u.is_empty())
                    .map(|u| json!(u))
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "base_url": params.url,
            "results": urls,
            "response_time": response.get("response_time").cloned().unwrap_or_else(|| json!(0.0)),
            "fallback_used": "search",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_query_gets_global_defaults_only() {
        let mut params = SearchParams::new("rust compiler internals");
        apply_search_heuristics(&mut params);
        assert_eq!(params.max_results, Some(10));
        assert_eq!(params.search_depth.as_deref(), Some("advanced"));
        assert_eq!(params.topic, None);
        assert_eq!(params.time_range, None);
    }

    #[test]
    fn news_query_is_scoped_to_the_week() {
        let mut params = SearchParams::new("Latest AI NEWS from TechCrunch");
        apply_search_heuristics(&mut params);
        assert_eq!(params.topic.as_deref(), Some("news"));
        assert_eq!(params.time_range.as_deref(), Some("week"));
        // global default was applied first and is kept
        assert_eq!(params.max_results, Some(10));
    }

    #[test]
    fn finance_query_excludes_social_sites() {
        let mut params = SearchParams::new("stock market open");
        apply_search_heuristics(&mut params);
        assert_eq!(params.topic.as_deref(), Some("finance"));
        assert_eq!(params.time_range.as_deref(), Some("day"));
        assert_eq!(
            params.exclude_domains,
            Some(vec!["reddit.com".to_string(), "twitter.com".to_string()])
        );
    }

    #[test]
    fn academic_and_image_queries() {
        let mut academic = SearchParams::new("research on protein folding");
        apply_search_heuristics(&mut academic);
        assert_eq!(academic.include_raw_content, Some(true));
        assert_eq!(academic.include_domains.as_ref().map(Vec::len), Some(3));

        let mut images = SearchParams::new("photo of the eclipse");
        apply_search_heuristics(&mut images);
        assert_eq!(images.include_images, Some(true));
        assert_eq!(images.include_image_descriptions, Some(true));
    }

    #[test]
    fn explicit_parameters_win() {
        let mut params = SearchParams {
            max_results: Some(20),
            topic: Some("general".to_string()),
            search_depth: Some("basic".to_string()),
            ..SearchParams::new("breaking news")
        };
        apply_search_heuristics(&mut params);
        assert_eq!(params.max_results, Some(20));
        assert_eq!(params.topic.as_deref(), Some("general"));
        assert_eq!(params.search_depth.as_deref(), Some("basic"));
        assert_eq!(params.time_range.as_deref(), Some("week"));
    }

    #[test]
    fn map_params_skip_empty_filters() {
        let value = serde_json::to_value(MapParams::new("https://www.theverge.com")).unwrap();
        assert_eq!(value["max_depth"], 1);
        assert_eq!(value["limit"], 50);
        assert!(value.get("instructions").is_none());
        assert!(value.get("select_paths").is_none());
    }
}
