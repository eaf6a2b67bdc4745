//! Artifact tool: lets the executor read, write, list, and delete files
//! under a dedicated workspace directory, for saving generated code or
//! reports the agent produces mid-task.

use serde_json::{json, Value};
use std::path::{Component, PathBuf};
use tokio::fs;
use tracing::info;

use super::{Tool, ToolOutput};
use crate::error::{Error, Result};

pub struct ArtifactTool {
    base_dir: PathBuf,
}

impl ArtifactTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).await.map_err(|e| Error::ExecutorFailure(format!("failed to create artifacts directory: {e}")))?;
        }
        Ok(())
    }

    fn resolve_path(&self, filename: &str) -> Result<PathBuf> {
        let requested = PathBuf::from(filename);
        if requested.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))) {
            return Err(Error::ExecutorFailure("access denied: path is outside the artifacts directory".to_string()));
        }
        Ok(self.base_dir.join(requested))
    }
}

impl Default for ArtifactTool {
    fn default() -> Self {
        Self::new("artifacts")
    }
}

#[async_trait::async_trait]
impl Tool for ArtifactTool {
    fn name(&self) -> &str {
        "artifact_manager"
    }

    fn description(&self) -> &str {
        "Manage persistent files (artifacts). Actions: 'write', 'read', 'list', 'delete'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["write", "read", "list", "delete"] },
                "filename": { "type": "string", "description": "Required for write, read, delete" },
                "content": { "type": "string", "description": "Required for write" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        self.ensure_dir().await?;
        let action = params["action"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: action".to_string()))?;

        match action {
            "write" => {
                let filename = params["filename"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: filename".to_string()))?;
                let content = params["content"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: content".to_string()))?;
                let path = self.resolve_path(filename)?;
                fs::write(&path, content).await.map_err(|e| Error::ExecutorFailure(format!("failed to write artifact {filename}: {e}")))?;
                info!("artifact written: {}", filename);
                Ok(ToolOutput::success(json!({ "filename": filename, "bytes": content.len() }), format!("saved artifact: {filename}")))
            }
            "read" => {
                let filename = params["filename"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: filename".to_string()))?;
                let path = self.resolve_path(filename)?;
                let content = fs::read_to_string(&path).await.map_err(|e| Error::ExecutorFailure(format!("failed to read artifact {filename}: {e}")))?;
                Ok(ToolOutput::success(json!({ "filename": filename, "content": content.clone() }), format!("content of {filename}:\n\n{content}")))
            }
            "list" => {
                let mut entries = fs::read_dir(&self.base_dir).await.map_err(|e| Error::ExecutorFailure(e.to_string()))?;
                let mut files = Vec::new();
                while let Some(entry) = entries.next_entry().await.map_err(|e| Error::ExecutorFailure(e.to_string()))? {
                    if let Ok(meta) = entry.metadata().await {
                        if meta.is_file() {
                            files.push(entry.file_name().to_string_lossy().to_string());
                        }
                    }
                }
                let summary = if files.is_empty() { "No artifacts found.".to_string() } else { format!("Artifacts:\n- {}", files.join("\n- ")) };
                Ok(ToolOutput::success(json!({ "files": files }), summary))
            }
            "delete" => {
                let filename = params["filename"].as_str().ok_or_else(|| Error::ExecutorFailure("missing required parameter: filename".to_string()))?;
                let path = self.resolve_path(filename)?;
                fs::remove_file(&path).await.map_err(|e| Error::ExecutorFailure(format!("failed to delete artifact {filename}: {e}")))?;
                info!("artifact deleted: {}", filename);
                Ok(ToolOutput::success(json!({ "filename": filename }), format!("deleted artifact: {filename}")))
            }
            other => Ok(ToolOutput::failure(format!("unknown action: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips_content() {
        let dir = tempdir().unwrap();
        let tool = ArtifactTool::new(dir.path());
        tool.execute(json!({ "action": "write", "filename": "test.txt", "content": "hello artifact" })).await.unwrap();
        let res = tool.execute(json!({ "action": "read", "filename": "test.txt" })).await.unwrap();
        assert!(res.success);
        assert_eq!(res.data["content"].as_str().unwrap(), "hello artifact");
    }

    #[tokio::test]
    async fn list_then_delete_removes_entry() {
        let dir = tempdir().unwrap();
        let tool = ArtifactTool::new(dir.path());
        tool.execute(json!({ "action": "write", "filename": "f1.txt", "content": "c1" })).await.unwrap();
        let listed = tool.execute(json!({ "action": "list" })).await.unwrap();
        assert_eq!(listed.data["files"].as_array().unwrap().len(), 1);
        tool.execute(json!({ "action": "delete", "filename": "f1.txt" })).await.unwrap();
        let listed_after = tool.execute(json!({ "action": "list" })).await.unwrap();
        assert_eq!(listed_after.data["files"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn rejects_parent_dir_traversal() {
        let dir = tempdir().unwrap();
        let tool = ArtifactTool::new(dir.path());
        let err = tool.execute(json!({ "action": "read", "filename": "../../etc/passwd" })).await.unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn rejects_absolute_path() {
        let dir = tempdir().unwrap();
        let tool = ArtifactTool::new(dir.path());
        let err = tool.execute(json!({ "action": "write", "filename": "/etc/passwd", "content": "x" })).await.unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }
}
