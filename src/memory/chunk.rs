//! Chunk: the central knowledge unit (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Research,
    Insight,
    Decision,
    Resource,
    Attempt,
    UserInput,
    Procedure,
    Question,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Verified,
    Inferred,
    Speculative,
}

impl Confidence {
    /// Weight used by the persistence score's salience term and by
    /// retrieval's final confidence weighting (spec §4.3, §4.4).
    pub fn weight(self) -> f64 {
        match self {
            Confidence::Verified => 1.0,
            Confidence::Inferred => 0.75,
            Confidence::Speculative => 0.5,
        }
    }

    /// Retrieval-side confidence weight, distinct scale per spec §4.4.
    pub fn retrieval_weight(self) -> f64 {
        match self {
            Confidence::Verified => 1.0,
            Confidence::Inferred => 0.8,
            Confidence::Speculative => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Research,
    User,
    Deduction,
    Experiment,
}

impl Source {
    pub fn weight(self) -> f64 {
        match self {
            Source::User => 1.0,
            Source::Experiment => 0.85,
            Source::Deduction => 0.75,
            Source::Research => 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    Exponential,
    Linear,
    PowerLaw,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Active,
    Warm,
    Cool,
    Cold,
    Archived,
    Tombstone,
}

impl ChunkStatus {
    /// One-way demotion ladder position; higher is "more alive".
    pub fn rank(self) -> u8 {
        match self {
            ChunkStatus::Active => 4,
            ChunkStatus::Warm => 3,
            ChunkStatus::Cool => 2,
            ChunkStatus::Cold => 1,
            ChunkStatus::Tombstone => 0,
            ChunkStatus::Archived => 0,
        }
    }

    pub fn next_tier_up(self) -> Option<ChunkStatus> {
        match self {
            ChunkStatus::Cold => Some(ChunkStatus::Cool),
            ChunkStatus::Cool => Some(ChunkStatus::Warm),
            ChunkStatus::Warm => Some(ChunkStatus::Active),
            ChunkStatus::Active => None,
            ChunkStatus::Tombstone | ChunkStatus::Archived => None,
        }
    }
}

/// Provenance captured at chunk-write time, used later for context-aware
/// retrieval boosting (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LearningContext {
    pub tick: u64,
    pub task_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub phase: Option<String>,
    pub skill_area: Option<String>,
    pub query_context: String,
    pub related_chunks: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub project_id: Uuid,
    pub content: String,
    pub chunk_type: ChunkType,
    pub tags: Vec<String>,
    pub confidence: Confidence,
    pub source: Source,

    pub embedding: Option<Vec<f32>>,

    pub tick_created: u64,
    pub tick_last_accessed: u64,
    pub tick_last_useful: u64,

    pub learning_context: LearningContext,

    pub initial_strength: f64,
    pub current_strength: f64,
    pub decay_function: DecayFunction,
    pub decay_rate: f64,

    pub access_count: u32,
    pub successful_uses: u32,
    pub last_accessed: Option<DateTime<Utc>>,
    pub last_useful: Option<DateTime<Utc>>,

    pub status: ChunkStatus,
    pub pinned: bool,
    pub superseded_by: Option<Uuid>,
    pub valid_until_tick: Option<u64>,

    /// Last computed persistence score; ranking input only, never
    /// authoritative over `current_strength`.
    pub persistence_score: f64,
}

impl Chunk {
    /// Decay-policy table from spec §4.3. `tags` is checked for a substring
    /// match on "goal" or "priority" per the spec wording.
    pub fn decay_policy(chunk_type: ChunkType, pinned: bool, tags: &[String]) -> (DecayFunction, f64) {
        if pinned || chunk_type == ChunkType::UserInput {
            return (DecayFunction::None, 0.0);
        }
        if chunk_type == ChunkType::Decision {
            return (DecayFunction::Linear, 0.02);
        }
        if tags.iter().any(|t| t.contains("goal") || t.contains("priority")) {
            return (DecayFunction::Exponential, 0.02);
        }
        if chunk_type == ChunkType::Attempt {
            return (DecayFunction::Exponential, 0.10);
        }
        (DecayFunction::Exponential, 0.05)
    }

    /// Construct a new chunk at write time; embedding is filled in by the
    /// memory engine's write path after calling the embedding collaborator.
    pub fn new(
        project_id: Uuid,
        content: impl Into<String>,
        chunk_type: ChunkType,
        tags: Vec<String>,
        confidence: Confidence,
        source: Source,
        tick: u64,
        learning_context: LearningContext,
        pinned: bool,
    ) -> Self {
        let (decay_function, decay_rate) = Self::decay_policy(chunk_type, pinned, &tags);
        Self {
            id: Uuid::new_v4(),
            project_id,
            content: content.into(),
            chunk_type,
            tags,
            confidence,
            source,
            embedding: None,
            tick_created: tick,
            tick_last_accessed: tick,
            tick_last_useful: tick,
            learning_context,
            initial_strength: 1.0,
            current_strength: 1.0,
            decay_function,
            decay_rate,
            access_count: 0,
            successful_uses: 0,
            last_accessed: None,
            last_useful: None,
            status: ChunkStatus::Active,
            pinned,
            superseded_by: None,
            valid_until_tick: None,
            persistence_score: 0.0,
        }
    }

    pub fn has_important_tag(&self) -> bool {
        const IMPORTANT: [&str; 5] = ["important", "core", "pinned", "goal", "priority"];
        self.tags.iter().any(|t| IMPORTANT.contains(&t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LearningContext {
        LearningContext::default()
    }

    #[test]
    fn decay_policy_user_input_is_exempt() {
        let (f, r) = Chunk::decay_policy(ChunkType::UserInput, false, &[]);
        assert_eq!(f, DecayFunction::None);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn decay_policy_pinned_overrides_type() {
        let (f, _) = Chunk::decay_policy(ChunkType::Attempt, true, &[]);
        assert_eq!(f, DecayFunction::None);
    }

    #[test]
    fn decay_policy_goal_tag_overrides_type() {
        let (f, r) = Chunk::decay_policy(ChunkType::Research, false, &["my-goal".to_string()]);
        assert_eq!(f, DecayFunction::Exponential);
        assert_eq!(r, 0.02);
    }

    #[test]
    fn decay_policy_attempt() {
        let (f, r) = Chunk::decay_policy(ChunkType::Attempt, false, &[]);
        assert_eq!(f, DecayFunction::Exponential);
        assert_eq!(r, 0.10);
    }

    #[test]
    fn decay_policy_decision() {
        let (f, r) = Chunk::decay_policy(ChunkType::Decision, false, &[]);
        assert_eq!(f, DecayFunction::Linear);
        assert_eq!(r, 0.02);
    }

    #[test]
    fn decay_policy_default() {
        let (f, r) = Chunk::decay_policy(ChunkType::Research, false, &[]);
        assert_eq!(f, DecayFunction::Exponential);
        assert_eq!(r, 0.05);
    }

    #[test]
    fn new_chunk_starts_at_full_strength() {
        let c = Chunk::new(
            Uuid::new_v4(),
            "hello",
            ChunkType::Insight,
            vec![],
            Confidence::Verified,
            Source::Research,
            1,
            ctx(),
            false,
        );
        assert_eq!(c.current_strength, 1.0);
        assert_eq!(c.status, ChunkStatus::Active);
    }
}
