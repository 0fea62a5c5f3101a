//! Web search tool backed by the Tavily HTTP API.
//!
//! Registered only when `TAVILY_API_KEY` is present.  Mode-independent: the
//! search request always leaves from the host process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AgentResult;

use super::traits::{required_str, ExecutionContext, Tool, ToolResult};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Maximum number of results returned to the LLM.
const MAX_RESULTS: usize = 5;

/// Cap on the rendered result body.
const MAX_RESPONSE_SIZE: usize = 64 * 1024;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Searches the web via Tavily.
pub struct WebSearchTool {
    api_key: String,
    client: Client,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent("Alex/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key: api_key.into(),
            client,
        }
    }

    fn render(response: &TavilyResponse, query: &str) -> String {
        let mut out = String::new();
        if let Some(answer) = &response.answer {
            out.push_str(answer);
            out.push_str("\n\n");
        }
        if response.results.is_empty() {
            out.push_str(&format!("No results for '{query}'."));
        }
        for (i, r) in response.results.iter().take(MAX_RESULTS).enumerate() {
            out.push_str(&format!("{}. {} — {}\n{}\n\n", i + 1, r.title, r.url, r.content));
        }
        if out.len() > MAX_RESPONSE_SIZE {
            out.truncate(MAX_RESPONSE_SIZE);
        }
        out.trim_end().to_string()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query." },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum results to return (default: 5).",
                    "minimum": 1,
                    "maximum": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let query = match required_str(&args, "query") {
            Ok(q) => q.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| (n as usize).min(MAX_RESULTS))
            .unwrap_or(MAX_RESULTS);

        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": true,
        });

        let request = self.client.post(TAVILY_ENDPOINT).json(&body).send();
        let response = tokio::select! {
            result = request => result,
            _ = ctx.cancel.cancelled() => {
                return Ok(ToolResult::err("", "search cancelled"));
            }
        };

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(ToolResult::err("", "web search timed out"))
            }
            Err(e) => return Ok(ToolResult::err("", format!("web search failed: {e}"))),
        };

        if !response.status().is_success() {
            let status = response.status();
            return Ok(ToolResult::err(
                "",
                format!("web search failed with status {status}"),
            ));
        }

        match response.json::<TavilyResponse>().await {
            Ok(parsed) => {
                let count = parsed.results.len().min(max_results);
                Ok(ToolResult::ok("", Self::render(&parsed, &query))
                    .with_metadata(json!({ "query": query, "count": count })))
            }
            Err(e) => Ok(ToolResult::err(
                "",
                format!("malformed search response: {e}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, content: &str) -> TavilyResult {
        TavilyResult {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }

    #[test]
    fn render_lists_results_in_order() {
        let response = TavilyResponse {
            results: vec![
                result("First", "https://a", "alpha"),
                result("Second", "https://b", "beta"),
            ],
            answer: None,
        };
        let out = WebSearchTool::render(&response, "q");
        let first = out.find("First").unwrap();
        let second = out.find("Second").unwrap();
        assert!(first < second);
        assert!(out.contains("https://a"));
    }

    #[test]
    fn render_empty_results() {
        let response = TavilyResponse {
            results: vec![],
            answer: None,
        };
        let out = WebSearchTool::render(&response, "rust async");
        assert!(out.contains("No results for 'rust async'"));
    }

    #[test]
    fn render_includes_answer_first() {
        let response = TavilyResponse {
            results: vec![result("Doc", "https://d", "detail")],
            answer: Some("Short answer.".into()),
        };
        let out = WebSearchTool::render(&response, "q");
        assert!(out.starts_with("Short answer."));
    }

    #[tokio::test]
    async fn missing_query_is_nonfatal() {
        let tool = WebSearchTool::new("key");
        let ctx = ExecutionContext::local("s", "t");
        let r = tool.execute(&ctx, json!({})).await.unwrap();
        assert!(!r.success);
    }
}
