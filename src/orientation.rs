//! Orientation Manager (spec §4.6): the one compressed project-state
//! document per project, its rewrite triggers, and its versioned archival.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Orientation, Phase, SkillNode};
use crate::error::Result;
use crate::memory::chunk::{Chunk, ChunkType, Confidence, LearningContext, Source};
use crate::store::Store;

const MAX_KEY_DECISIONS: usize = 7;
const MAX_ACTIVE_PRIORITIES: usize = 5;

/// Signals the cycle driver gathers each tick; `should_rewrite` only reasons
/// about them, it never queries the Store itself.
#[derive(Debug, Clone, Default)]
pub struct RewriteTriggers {
    pub completed_task_skill_match: bool,
    pub phase_transition_requested: bool,
    pub questions_answered_since_rewrite: usize,
    pub verified_insight_since_rewrite: bool,
    pub activities_since_rewrite: usize,
    pub orientation_age: Option<Duration>,
    pub activity_in_age_interval: bool,
    pub serialized_tokens_estimate: usize,
}

/// Any trigger firing returns its name; callers persist the reason on the
/// archived chunk's activity note if they want it auditable.
pub fn should_rewrite(triggers: &RewriteTriggers, config: &Config) -> Option<&'static str> {
    if triggers.completed_task_skill_match {
        return Some("completed_task_skill_match");
    }
    if triggers.phase_transition_requested {
        return Some("phase_transition");
    }
    if triggers.questions_answered_since_rewrite >= 3 {
        return Some("questions_answered_batch");
    }
    if triggers.verified_insight_since_rewrite {
        return Some("verified_insight");
    }
    if triggers.serialized_tokens_estimate > config.orientation_max_tokens {
        return Some("token_budget_exceeded");
    }
    if triggers.activities_since_rewrite >= config.orientation_activity_trigger_count {
        return Some("activity_count_exceeded");
    }
    if let Some(age) = triggers.orientation_age {
        if age > Duration::hours(config.orientation_max_age_hours) && triggers.activity_in_age_interval {
            return Some("wall_clock_age_exceeded");
        }
    }
    None
}

/// Partial update applied on top of the current orientation during a
/// rewrite; `None` fields carry the prior value forward unchanged.
#[derive(Debug, Clone, Default)]
pub struct OrientationUpdate {
    pub current_phase: Option<Phase>,
    pub skill_map: Option<Vec<SkillNode>>,
    pub key_decisions: Option<Vec<String>>,
    pub active_priorities: Option<Vec<String>>,
    pub progress_snapshot: Option<Vec<(String, String)>>,
}

fn keep_most_recent(mut items: Vec<String>, max: usize) -> Vec<String> {
    if items.len() > max {
        items.drain(0..items.len() - max);
    }
    items
}

pub struct OrientationManager<'a> {
    store: &'a Store,
}

impl<'a> OrientationManager<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Load the current orientation, seeding a fresh `v1` if the project has
    /// never had one.
    pub async fn current(&self, project_id: Uuid, vision_summary: impl Into<String>) -> Result<Orientation> {
        match self.store.current_orientation(project_id).await? {
            Some(o) => Ok(o),
            None => {
                let orientation = Orientation::new(project_id, vision_summary);
                self.store.put_orientation(orientation.clone()).await?;
                Ok(orientation)
            }
        }
    }

    /// Atomic rewrite (spec §4.6): archive the superseded version as a
    /// `decision` chunk tagged `orientation_archive`/`v{old_version}`, then
    /// persist the updated document at `version + 1`. `vision_summary`,
    /// `success_criteria`, and `constraints` only change when `update`
    /// explicitly carries a revised decision for them — this helper leaves
    /// them untouched, matching spec §8's rewrite invariant.
    pub async fn rewrite(&self, current: Orientation, update: OrientationUpdate, current_tick: u64) -> Result<Orientation> {
        self.archive(&current, current_tick).await?;

        let mut next = current;
        next.version += 1;
        next.last_rewritten = Utc::now();
        next.last_rewritten_tick = current_tick;
        if let Some(phase) = update.current_phase {
            next.current_phase = phase;
        }
        if let Some(skill_map) = update.skill_map {
            next.skill_map = skill_map;
        }
        if let Some(decisions) = update.key_decisions {
            next.key_decisions = keep_most_recent(decisions, MAX_KEY_DECISIONS);
        }
        if let Some(priorities) = update.active_priorities {
            next.active_priorities = keep_most_recent(priorities, MAX_ACTIVE_PRIORITIES);
        }
        if let Some(snapshot) = update.progress_snapshot {
            next.progress_snapshot = snapshot;
        }

        self.store.put_orientation(next.clone()).await?;
        Ok(next)
    }

    async fn archive(&self, current: &Orientation, current_tick: u64) -> Result<()> {
        let serialized = serde_yaml::to_string(current).map_err(|e| crate::error::Error::Corruption(e.to_string()))?;
        let tags = vec!["orientation_archive".to_string(), format!("v{}", current.version)];
        let chunk = Chunk::new(
            current.project_id,
            serialized,
            ChunkType::Decision,
            tags,
            Confidence::Verified,
            Source::Deduction,
            current_tick,
            LearningContext::default(),
            true,
        );
        self.store.put_chunk(chunk).await
    }
}

/// Wall-clock age of the current orientation, for the precautionary trigger.
pub fn orientation_age(orientation: &Orientation, now: DateTime<Utc>) -> Duration {
    now - orientation.last_rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::chunk::ChunkType as CT;
    use crate::store::{ChunkFilter, Store};

    #[test]
    fn any_single_trigger_suffices() {
        let config = Config::default();
        let mut triggers = RewriteTriggers::default();
        assert!(should_rewrite(&triggers, &config).is_none());

        triggers.completed_task_skill_match = true;
        assert_eq!(should_rewrite(&triggers, &config), Some("completed_task_skill_match"));
    }

    #[test]
    fn three_answered_questions_trigger_rewrite() {
        let config = Config::default();
        let mut triggers = RewriteTriggers::default();
        triggers.questions_answered_since_rewrite = 2;
        assert!(should_rewrite(&triggers, &config).is_none());
        triggers.questions_answered_since_rewrite = 3;
        assert_eq!(should_rewrite(&triggers, &config), Some("questions_answered_batch"));
    }

    #[test]
    fn wall_clock_trigger_requires_activity_in_interval() {
        let config = Config::default();
        let mut triggers = RewriteTriggers::default();
        triggers.orientation_age = Some(Duration::hours(config.orientation_max_age_hours + 1));
        triggers.activity_in_age_interval = false;
        assert!(should_rewrite(&triggers, &config).is_none());
        triggers.activity_in_age_interval = true;
        assert_eq!(should_rewrite(&triggers, &config), Some("wall_clock_age_exceeded"));
    }

    #[tokio::test]
    async fn rewrite_archives_prior_version_and_increments_version() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();
        let manager = OrientationManager::new(&store);

        let current = manager.current(pid, "ship the thing").await.unwrap();
        assert_eq!(current.version, 1);

        let update = OrientationUpdate {
            current_phase: Some(Phase::Research),
            ..Default::default()
        };
        let next = manager.rewrite(current, update, 5).await.unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.current_phase, Phase::Research);

        let archived = store
            .query_chunks(pid, ChunkFilter { chunk_type: Some(CT::Decision), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].tags.contains(&"orientation_archive".to_string()));
        assert!(archived[0].tags.contains(&"v1".to_string()));
    }

    #[tokio::test]
    async fn key_decisions_are_capped_at_seven_most_recent() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();
        let manager = OrientationManager::new(&store);
        let current = manager.current(pid, "vision").await.unwrap();

        let decisions: Vec<String> = (0..10).map(|i| format!("decision {i}")).collect();
        let update = OrientationUpdate { key_decisions: Some(decisions), ..Default::default() };
        let next = manager.rewrite(current, update, 1).await.unwrap();
        assert_eq!(next.key_decisions.len(), 7);
        assert_eq!(next.key_decisions[0], "decision 3");
        assert_eq!(next.key_decisions[6], "decision 9");
    }
}
