//! Web search tool: queries DuckDuckGo's HTML endpoint (no API key) so the
//! executor can ground a task in current information the model itself
//! wasn't trained on.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Tool, ToolOutput};
use crate::error::{Error, Result};

pub struct WebSearchTool {
    client: Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
                .build()
                .unwrap_or_default(),
        }
    }

    async fn search_ddg(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("https://html.duckduckgo.com/html/?q={}", urlencoding::encode(query));
        debug!("searching duckduckgo: {}", query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ExecutorFailure(format!("search request failed: {e}")))?;
        let html = response
            .text()
            .await
            .map_err(|e| Error::ExecutorFailure(format!("failed to read search response: {e}")))?;

        Ok(Self::parse_ddg_html(&html, num_results))
    }

    fn parse_ddg_html(html: &str, max_results: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        let snippet_re = regex::Regex::new(r#"class="result__snippet"[^>]*>([^<]+)"#).ok();
        let title_re = regex::Regex::new(r#"class="result__a"[^>]*>([^<]+)"#).ok();
        let url_re = regex::Regex::new(r#"class="result__url"[^>]*>([^<]+)"#).ok();

        if let (Some(snippet_re), Some(title_re), Some(url_re)) = (snippet_re, title_re, url_re) {
            let snippets: Vec<_> = snippet_re.captures_iter(html).collect();
            let titles: Vec<_> = title_re.captures_iter(html).collect();
            let urls: Vec<_> = url_re.captures_iter(html).collect();
            let count = snippets.len().min(titles.len()).min(max_results);

            for i in 0..count {
                let title = titles.get(i).and_then(|c| c.get(1)).map(|m| html_escape::decode_html_entities(m.as_str()).to_string()).unwrap_or_default();
                let snippet = snippets.get(i).and_then(|c| c.get(1)).map(|m| html_escape::decode_html_entities(m.as_str()).to_string()).unwrap_or_default();
                let url = urls.get(i).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
                if !title.is_empty() && !snippet.is_empty() {
                    results.push(SearchResult { title, snippet, url });
                }
            }
        }

        if results.is_empty() {
            warn!("could not parse duckduckgo results, returning placeholder");
            results.push(SearchResult {
                title: "Search completed".to_string(),
                snippet: "Search was performed but results could not be parsed.".to_string(),
                url: String::new(),
            });
        }

        results
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct SearchResult {
    title: String,
    snippet: String,
    url: String,
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information not available in stored memory or training data."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "num_results": { "type": "integer", "description": "Number of results (default 5, max 10)", "default": 5 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let query = params["query"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: query".to_string()))?;
        let num_results = params["num_results"].as_u64().unwrap_or(5).min(10) as usize;

        match self.search_ddg(query, num_results).await {
            Ok(results) => {
                let formatted = results.iter().enumerate().map(|(i, r)| format!("{}. **{}**\n   {}\n   URL: {}", i + 1, r.title, r.snippet, r.url)).collect::<Vec<_>>().join("\n\n");
                let summary = format!("Found {} results for '{}'\n\n{}", results.len(), query, formatted);
                Ok(ToolOutput::success(
                    json!({
                        "query": query,
                        "results": results.iter().map(|r| json!({ "title": r.title, "snippet": r.snippet, "url": r.url })).collect::<Vec<_>>(),
                    }),
                    summary,
                ))
            }
            Err(e) => {
                warn!("web search failed: {}", e);
                Ok(ToolOutput::failure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ddg_html_falls_back_to_placeholder_on_unrecognized_markup() {
        let results = WebSearchTool::parse_ddg_html("<html><body>no matches here</body></html>", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Search completed");
    }

    #[test]
    fn parse_ddg_html_extracts_matching_result_triples() {
        let html = r#"<a class="result__a" href="#">Chess rules</a><a class="result__snippet">How chess pieces move</a><span class="result__url">chess.example</span>"#;
        let results = WebSearchTool::parse_ddg_html(html, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Chess rules");
    }
}
