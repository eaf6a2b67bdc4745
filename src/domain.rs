//! Shared entity types (spec §3), minus `Chunk` and `Relationship` which
//! live in `memory` since they carry the decay/graph machinery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-project logical-time and last-run bookkeeping (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub project_id: Uuid,
    pub current_tick: u64,
    pub last_decay_tick: u64,
    pub last_consolidation_tick: u64,
}

impl AgentState {
    pub fn new(project_id: Uuid) -> Self {
        Self { project_id, current_tick: 0, last_decay_tick: 0, last_consolidation_tick: 0 }
    }

    pub fn should_run(&self, kind: RunKind, interval: u64) -> bool {
        let last = match kind {
            RunKind::Decay => self.last_decay_tick,
            RunKind::Consolidation => self.last_consolidation_tick,
        };
        self.current_tick.saturating_sub(last) >= interval
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Decay,
    Consolidation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Research,
    Planning,
    Execution,
    Refinement,
    Complete,
}

impl Phase {
    /// Next phase in the fixed progression, or `None` once `Complete`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Intake => Some(Phase::Research),
            Phase::Research => Some(Phase::Planning),
            Phase::Planning => Some(Phase::Execution),
            Phase::Execution => Some(Phase::Refinement),
            Phase::Refinement => Some(Phase::Complete),
            Phase::Complete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    NotStarted,
    InProgress,
    Achieved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillNode {
    pub skill: String,
    pub parent: Option<String>,
    pub dependencies: Vec<String>,
    pub status: SkillStatus,
    pub notes: String,
}

/// Single compressed project-state document (spec §3, Orientation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Orientation {
    pub project_id: Uuid,
    pub vision_summary: String,
    pub success_criteria: Vec<String>,
    pub constraints: Vec<String>,
    pub skill_map: Vec<SkillNode>,
    pub current_phase: Phase,
    pub key_decisions: Vec<String>,
    pub active_priorities: Vec<String>,
    pub progress_snapshot: Vec<(String, String)>,
    pub last_rewritten: DateTime<Utc>,
    /// Logical tick of the most recent rewrite, for gating "since last
    /// rewrite" triggers against tick-stamped data such as chunks, which
    /// carry no wall-clock creation timestamp (spec §4.6).
    pub last_rewritten_tick: u64,
    pub version: u64,
}

impl Orientation {
    pub fn new(project_id: Uuid, vision_summary: impl Into<String>) -> Self {
        Self {
            project_id,
            vision_summary: vision_summary.into(),
            success_criteria: Vec::new(),
            constraints: Vec::new(),
            skill_map: Vec::new(),
            current_phase: Phase::Intake,
            key_decisions: Vec::new(),
            active_priorities: Vec::new(),
            progress_snapshot: Vec::new(),
            last_rewritten: Utc::now(),
            last_rewritten_tick: 0,
            version: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Superseded,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub goal_text: String,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(project_id: Uuid, goal_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            goal_text: goal_text.into(),
            status: GoalStatus::Active,
            created_at: Utc::now(),
            activated_at: Some(Utc::now()),
            superseded_at: None,
        }
    }
}

/// Queued goal to activate at the next safe cycle boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingGoal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub goal_text: String,
    pub created_at: DateTime<Utc>,
}

/// An explicit phase-transition decision queued for the next orientation
/// rewrite (spec §4.6's "explicit phase-transition decision" trigger), e.g.
/// raised from the CLI once the operator judges a phase complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingPhaseTransition {
    pub project_id: Uuid,
    pub phase: Phase,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ready,
    InProgress,
    Blocked,
    Done,
    /// Dropped by a pivot (spec §4.7): queued but never started, superseded
    /// by a goal change before execution began.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub skill_area: String,
    pub status: TaskStatus,
    pub depends_on: Vec<Uuid>,
    pub blocked_by: Vec<Uuid>,
    pub outcome: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(project_id: Uuid, title: impl Into<String>, skill_area: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: String::new(),
            skill_area: skill_area.into(),
            status: TaskStatus::Ready,
            depends_on: Vec::new(),
            blocked_by: Vec::new(),
            outcome: None,
            failure_reason: None,
            failure_context: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
        }
    }

    /// Recompute `status` from `depends_on`/`blocked_by` given the set of
    /// tasks this one depends on and the set of questions blocking it.
    /// Leaves `in_progress`/`done` untouched (those are driven explicitly).
    pub fn recompute_readiness(&mut self, deps_done: bool, blockers_open: bool) {
        if matches!(self.status, TaskStatus::InProgress | TaskStatus::Done | TaskStatus::Cancelled) {
            return;
        }
        self.status = if blockers_open || !deps_done {
            TaskStatus::Blocked
        } else {
            TaskStatus::Ready
        };
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    Answered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub project_id: Uuid,
    pub question: String,
    pub context: String,
    pub status: QuestionStatus,
    pub answer: Option<String>,
    pub blocks_tasks: Vec<Uuid>,
    pub asked_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn new(project_id: Uuid, question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            question: question.into(),
            context: context.into(),
            status: QuestionStatus::Open,
            answer: None,
            blocks_tasks: Vec::new(),
            asked_at: Utc::now(),
            answered_at: None,
        }
    }
}

/// Append-only activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: Uuid,
    pub project_id: Uuid,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
}

impl Activity {
    pub fn new(project_id: Uuid, action: impl Into<String>, details: impl Into<String>, tick: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            action: action.into(),
            details: details.into(),
            timestamp: Utc::now(),
            tick,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningResolution {
    Executed,
    Dismissed,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoherenceWarning {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub concern: String,
    pub suggestion: String,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<WarningResolution>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CoherenceWarning {
    pub fn new(project_id: Uuid, task_id: Uuid, concern: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            concern: concern.into(),
            suggestion: suggestion.into(),
            created_at: Utc::now(),
            resolution: None,
            resolved_at: None,
        }
    }
}

/// Summary record for a tombstoned or summarised chunk removed from the
/// live table (spec §3). A live-table removal always has a matching row
/// here — the Store's `Corruption` error fires if one is ever missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkArchive {
    pub chunk_id: Uuid,
    pub project_id: Uuid,
    pub content_summary: String,
    pub content_hash: String,
    pub tick_archived: u64,
    pub final_strength: f64,
    pub final_context: String,
}

/// Raw co-retrieval signal: one row per unordered pair of chunks returned
/// together by a retrieval call (spec §3). Consumed only by the implicit-
/// relationship job (spec §4.5), never by ranking directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoRetrieval {
    pub id: Uuid,
    pub project_id: Uuid,
    pub chunk_a_id: Uuid,
    pub chunk_b_id: Uuid,
    pub session_id: Uuid,
    pub query_context: String,
    pub timestamp: DateTime<Utc>,
}

impl CoRetrieval {
    /// Construct with the pair ordered `(min, max)` by string form to avoid
    /// double-counting `(a, b)` vs `(b, a)` (spec §3).
    pub fn new(project_id: Uuid, a: Uuid, b: Uuid, session_id: Uuid, query_context: impl Into<String>) -> Self {
        let (chunk_a_id, chunk_b_id) = if a.to_string() <= b.to_string() { (a, b) } else { (b, a) };
        Self {
            id: Uuid::new_v4(),
            project_id,
            chunk_a_id,
            chunk_b_id,
            session_id,
            query_context: query_context.into(),
            timestamp: Utc::now(),
        }
    }
}
