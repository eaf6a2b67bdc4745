//! Web fetch tool: retrieves a single URL's body text, for when the
//! executor already knows where to look rather than needing to search.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use super::{Tool, ToolOutput};
use crate::error::{Error, Result};

const MAX_BODY_CHARS: usize = 8_000;

pub struct WebFetchTool {
    client: Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
                .build()
                .unwrap_or_default(),
        }
    }

    fn truncate(body: &str) -> String {
        if body.len() <= MAX_BODY_CHARS {
            body.to_string()
        } else {
            format!("{}... [truncated]", &body[..MAX_BODY_CHARS])
        }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the text content of a known URL."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let url = params["url"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: url".to_string()))?;

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("web fetch failed: {}", e);
                return Ok(ToolOutput::failure(format!("fetch failed: {e}")));
            }
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolOutput::failure(format!("failed to read response body: {e}"))),
        };

        if !status.is_success() {
            return Ok(ToolOutput::failure(format!("unexpected status {status} fetching {url}")));
        }

        let truncated = Self::truncate(&body);
        Ok(ToolOutput::success(json!({ "url": url, "status": status.as_u16(), "body": truncated }), format!("Fetched {url} ({} bytes)", body.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_bodies_untouched() {
        assert_eq!(WebFetchTool::truncate("hello"), "hello");
    }

    #[test]
    fn truncate_caps_long_bodies() {
        let long = "a".repeat(MAX_BODY_CHARS + 500);
        let truncated = WebFetchTool::truncate(&long);
        assert!(truncated.ends_with("... [truncated]"));
        assert!(truncated.len() < long.len());
    }
}
