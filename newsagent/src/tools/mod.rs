//! Web tools offered to the aggregator model.
//!
//! Tool failures are reported back to the model as error payloads so it can try
//! another approach; only unknown tool names and undecodable arguments are `Err`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::llm::ToolSpec;

pub mod tavily;

pub use tavily::{MapParams, SearchParams, TavilyClient};

/// Capability the conversation controller calls tools through.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    fn specs(&self) -> Vec<ToolSpec>;

    async fn execute(&self, name: &str, arguments: &Value) -> Result<Value>;
}

pub const TAVILY_SEARCH: &str = "tavily_search";
pub const TAVILY_EXTRACT: &str = "tavily_extract_content";
pub const TAVILY_CRAWL: &str = "tavily_crawl";
pub const TAVILY_MAP: &str = "tavily_map_site";

/// The four Tavily endpoints exposed as model tools
pub struct TavilyTools {
    client: TavilyClient,
}

impl TavilyTools {
    pub fn new(client: TavilyClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    max_results: Option<u32>,
    search_depth: Option<String>,
    time_range: Option<String>,
    topic: Option<String>,
    include_images: Option<bool>,
    include_image_descriptions: Option<bool>,
    include_raw_content: Option<bool>,
    include_domains: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        Self {
            query: args.query,
            max_results: args.max_results,
            search_depth: args.search_depth,
            time_range: args.time_range,
            topic: args.topic,
            include_images: args.include_images,
            include_image_descriptions: args.include_image_descriptions,
            include_raw_content: args.include_raw_content,
            include_domains: args.include_domains,
            exclude_domains: args.exclude_domains,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtractArgs {
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CrawlArgs {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MapArgs {
    url: String,
    #[serde(default)]
    instructions: Option<String>,
    max_depth: Option<u32>,
    max_breadth: Option<u32>,
    limit: Option<u32>,
    select_paths: Option<Vec<String>>,
    select_domains: Option<Vec<String>>,
    exclude_paths: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
    allow_external: Option<bool>,
}

impl From<MapArgs> for MapParams {
    fn from(args: MapArgs) -> Self {
        let base = MapParams::new(args.url);
        Self {
            instructions: args.instructions.unwrap_or_default(),
            max_depth: args.max_depth.unwrap_or(base.max_depth),
            max_breadth: args.max_breadth.unwrap_or(base.max_breadth),
            limit: args.limit.unwrap_or(base.limit),
            select_paths: args.select_paths.unwrap_or_default(),
            select_domains: args.select_domains.unwrap_or_default(),
            exclude_paths: args.exclude_paths.unwrap_or_default(),
            exclude_domains: args.exclude_domains.unwrap_or_default(),
            allow_external: args.allow_external.unwrap_or(base.allow_external),
            ..base
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(name: &str, arguments: &Value) -> Result<T> {
    serde_json::from_value(arguments.clone())
        .with_context(|| format!("invalid arguments for {}: {}", name, arguments))
}

fn string_list() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

#[async_trait::async_trait]
impl ToolExecutor for TavilyTools {
    fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: TAVILY_SEARCH.to_string(),
                description: "Search the web using Tavily. Optional parameters control breadth and depth; unset ones are inferred from the query.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "max_results": {"type": "integer"},
                        "search_depth": {"type": "string", "enum": ["basic", "advanced"]},
                        "time_range": {"type": "string", "enum": ["day", "week", "month", "year"]},
                        "topic": {"type": "string"},
                        "include_images": {"type": "boolean"},
                        "include_image_descriptions": {"type": "boolean"},
                        "include_raw_content": {"type": "boolean"},
                        "include_domains": string_list(),
                        "exclude_domains": string_list(),
                    },
                    "required": ["query"],
                }),
            },
            ToolSpec {
                name: TAVILY_EXTRACT.to_string(),
                description: "Extract content from web pages using Tavily. Returns url, content and images per page.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"urls": string_list()},
                    "required": ["urls"],
                }),
            },
            ToolSpec {
                name: TAVILY_CRAWL.to_string(),
                description: "Crawl a website starting from a base URL, extracting content from multiple pages.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"url": {"type": "string"}},
                    "required": ["url"],
                }),
            },
            ToolSpec {
                name: TAVILY_MAP.to_string(),
                description: "Map a website to discover its URLs without extracting content.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string"},
                        "instructions": {"type": "string"},
                        "max_depth": {"type": "integer"},
                        "max_breadth": {"type": "integer"},
                        "limit": {"type": "integer"},
                        "select_paths": string_list(),
                        "select_domains": string_list(),
                        "exclude_paths": string_list(),
                        "exclude_domains": string_list(),
                        "allow_external": {"type": "boolean"},
                    },
                    "required": ["url"],
                }),
            },
        ]
    }

    async fn execute(&self, name: &str, arguments: &Value) -> Result<Value> {
        match name {
            TAVILY_SEARCH => {
                let args: SearchArgs = decode(name, arguments)?;
                match self.client.search(args.into()).await {
                    Ok(results) => Ok(Value::Array(results)),
                    Err(e) => {
                        warn!(error = %e, "tavily search failed");
                        Ok(json!([{
                            "title": "Search Error",
                            "url": "",
                            "content": format!("Error searching: {}", e),
                            "score": 0.0,
                        }]))
                    }
                }
            }
            TAVILY_EXTRACT => {
                let args: ExtractArgs = decode(name, arguments)?;
                match self.client.extract(&args.urls).await {
                    Ok(results) => Ok(Value::Array(results)),
                    Err(e) => {
                        warn!(error = %e, "tavily extract failed");
                        Ok(json!([{
                            "url": "error",
                            "content": format!("Error extracting content: {}", e),
                            "images": [],
                        }]))
                    }
                }
            }
            TAVILY_CRAWL => {
                let args: CrawlArgs = decode(name, arguments)?;
                match self.client.crawl(&args.url).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        warn!(error = %e, url = %args.url, "tavily crawl failed");
                        Ok(json!({
                            "base_url": args.url,
                            "results": [],
                            "error": format!("Crawl failed: {}", e),
                        }))
                    }
                }
            }
            TAVILY_MAP => {
                let args: MapArgs = decode(name, arguments)?;
                Ok(self.client.map(&args.into()).await)
            }
            other => bail!("unknown tool: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_four_tools_with_required_arguments() {
        let tools = TavilyTools::new(TavilyClient::new("http://localhost", "key"));
        let specs = tools.specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![TAVILY_SEARCH, TAVILY_EXTRACT, TAVILY_CRAWL, TAVILY_MAP]);
        for spec in &specs {
            assert_eq!(spec.parameters["type"], "object");
            assert!(spec.parameters["required"].is_array());
        }
    }

    #[test]
    fn map_args_keep_defaults_for_unset_fields() {
        let args: MapArgs = serde_json::from_value(json!({
            "url": "https://techcrunch.com",
            "limit": 5,
        }))
        .unwrap();
        let params = MapParams::from(args);
        assert_eq!(params.limit, 5);
        assert_eq!(params.max_depth, 1);
        assert_eq!(params.max_breadth, 20);
        assert!(!params.allow_external);
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_are_errors() {
        let tools = TavilyTools::new(TavilyClient::new("http://localhost", "key"));
        assert!(tools.execute("shell", &json!({})).await.is_err());
        assert!(tools.execute(TAVILY_CRAWL, &json!({"href": "x"})).await.is_err());
    }
}
