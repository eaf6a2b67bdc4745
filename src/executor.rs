//! The opaque LLM executor collaborator (spec §6), mirroring the shape of
//! the teacher's `agent::provider::LLMProvider` trait.
//!
//! The core treats the executor as opaque and sandboxed: given a task, the
//! retrieved context, the active goal, and the orientation, it returns a
//! structured result. Anything it surfaces is content only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::domain::{Goal, Orientation, Task};
use crate::error::{Error, Result};
use crate::memory::chunk::{Confidence, ChunkType};
use crate::retrieval::ScoredChunk;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Complete,
    Blocked,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningDraft {
    pub content: String,
    pub chunk_type: ChunkType,
    pub tags: Vec<String>,
    pub confidence: Confidence,
    pub related_chunks: Vec<uuid::Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpTaskDraft {
    pub title: String,
    pub description: String,
    pub skill_area: String,
    pub depends_on: Vec<uuid::Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub outcome_text: Option<String>,
    pub learnings: Vec<LearningDraft>,
    pub new_questions: Vec<QuestionDraft>,
    pub follow_up_tasks: Vec<FollowUpTaskDraft>,
}

impl ExecutionResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            outcome_text: Some(reason.into()),
            learnings: Vec::new(),
            new_questions: Vec::new(),
            follow_up_tasks: Vec::new(),
        }
    }
}

/// Inputs handed to the executor for one task (spec §6).
pub struct ExecutionRequest<'a> {
    pub task: &'a Task,
    pub context: &'a [ScoredChunk],
    pub goal: Option<&'a Goal>,
    pub orientation: &'a Orientation,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult>;
}

/// Real collaborator wrapping `ollama-rs`, shaped after the teacher's
/// `agent::provider::OllamaProvider`.
pub struct OllamaExecutor {
    client: ollama_rs::Ollama,
    model: String,
    timeout: std::time::Duration,
}

impl OllamaExecutor {
    pub fn new(client: ollama_rs::Ollama, model: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self { client, model: model.into(), timeout }
    }

    fn build_prompt(request: &ExecutionRequest<'_>) -> String {
        let context = request
            .context
            .iter()
            .map(|c| format!("- ({:.2}) {}", c.score, c.chunk.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Goal: {}\nPhase: {:?}\nTask: {} — {}\n\nRelevant knowledge:\n{}\n\n\
             Respond with your outcome, any new learnings, open questions, and follow-up tasks.",
            request.goal.map(|g| g.goal_text.as_str()).unwrap_or("(none)"),
            request.orientation.current_phase,
            request.task.title,
            request.task.description,
            context,
        )
    }
}

#[async_trait]
impl Executor for OllamaExecutor {
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let prompt = Self::build_prompt(&request);
        let chat = self.client.send_chat_messages(ChatMessageRequest::new(
            self.model.clone(),
            vec![ChatMessage::user(prompt)],
        ));

        let response = tokio::time::timeout(self.timeout, chat)
            .await
            .map_err(|_| Error::ExecutorFailure("timeout".to_string()))?
            .map_err(|e| Error::ExecutorFailure(e.to_string()))?;

        // The real executor is expected to emit a structured block the
        // caller can parse; without that protocol defined here (it's the
        // sandboxed executor's concern per spec §6), treat the raw reply as
        // a single completed-task outcome with no learnings, matching the
        // conservative "malformed output" path spec §7 calls out.
        Ok(ExecutionResult {
            status: ExecutionStatus::Partial,
            outcome_text: Some(response.message.content),
            learnings: Vec::new(),
            new_questions: Vec::new(),
            follow_up_tasks: Vec::new(),
        })
    }
}

/// In-memory queue of canned results, used by tests and to drive the
/// cold-start scenario of spec §8 without a live model.
pub struct ScriptedExecutor {
    results: Mutex<VecDeque<ExecutionResult>>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self { results: Mutex::new(results.into()) }
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, _request: ExecutionRequest<'_>) -> Result<ExecutionResult> {
        let mut results = self.results.lock().await;
        results
            .pop_front()
            .ok_or_else(|| Error::ExecutorFailure("scripted executor exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_executor_returns_results_in_order() {
        let executor = ScriptedExecutor::new(vec![
            ExecutionResult::failed("first"),
            ExecutionResult { status: ExecutionStatus::Complete, outcome_text: None, learnings: vec![], new_questions: vec![], follow_up_tasks: vec![] },
        ]);
        let task = Task::new(uuid::Uuid::new_v4(), "t", "area");
        let orientation = Orientation::new(uuid::Uuid::new_v4(), "v");
        let r1 = executor.execute(ExecutionRequest { task: &task, context: &[], goal: None, orientation: &orientation }).await.unwrap();
        assert_eq!(r1.status, ExecutionStatus::Failed);
        let r2 = executor.execute(ExecutionRequest { task: &task, context: &[], goal: None, orientation: &orientation }).await.unwrap();
        assert_eq!(r2.status, ExecutionStatus::Complete);
    }

    #[tokio::test]
    async fn scripted_executor_errors_when_exhausted() {
        let executor = ScriptedExecutor::new(vec![]);
        let task = Task::new(uuid::Uuid::new_v4(), "t", "area");
        let orientation = Orientation::new(uuid::Uuid::new_v4(), "v");
        let result = executor.execute(ExecutionRequest { task: &task, context: &[], goal: None, orientation: &orientation }).await;
        assert!(result.is_err());
    }
}
