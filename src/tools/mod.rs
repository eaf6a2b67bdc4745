//! Outbound tool surface (spec §6): the sandboxed executor's window onto the
//! outside world. The core never calls these directly — they exist for the
//! executor collaborator to invoke while producing an `ExecutionResult`.

mod artifact;
mod web_fetch;
mod web_search;

pub use artifact::ArtifactTool;
pub use web_fetch::WebFetchTool;
pub use web_search::WebSearchTool;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Output from a tool execution, mirroring the shape the teacher's tool
/// surface returns so an executor can treat every tool the same way.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub summary: String,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(data: impl Into<Value>, summary: impl Into<String>) -> Self {
        Self { success: true, data: data.into(), summary: summary.into(), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self { success: false, data: Value::Null, summary: format!("Error: {error}"), error: Some(error) }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> Result<ToolOutput>;
}
