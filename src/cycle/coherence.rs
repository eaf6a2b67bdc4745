//! Coherence gate (spec §4.7): a pre-execution check that a chosen task is
//! still aligned with the active goal. Never executes a flagged task itself
//! — it only reports a concern/suggestion pair for the caller to record as a
//! `CoherenceWarning` and move on.

use crate::domain::{Goal, Task};

use super::prioritiser::text_overlap;

/// Below this lexical-overlap ratio with the active goal, a task is flagged
/// as possibly off-track. Tuned loose on purpose: the gate is a safety net
/// against drift, not a hard gatekeeper, so it should rarely fire on
/// reasonably-worded tasks that do relate to the goal.
const MIN_GOAL_OVERLAP: f64 = 0.04;

pub struct Concern {
    pub concern: String,
    pub suggestion: String,
}

/// Evaluate a candidate task against the active goal. `None` means the task
/// may proceed.
pub fn evaluate(task: &Task, goal: Option<&Goal>) -> Option<Concern> {
    let goal = goal?;
    if goal.goal_text.trim().is_empty() {
        return None;
    }
    let haystack = format!("{} {} {}", task.title, task.description, task.skill_area);
    let overlap = text_overlap(&goal.goal_text, &haystack);
    if overlap >= MIN_GOAL_OVERLAP {
        return None;
    }
    Some(Concern {
        concern: format!(
            "task '{}' (skill area '{}') shares no evident connection with the active goal '{}'",
            task.title, task.skill_area, goal.goal_text
        ),
        suggestion: "confirm this task still serves the active goal, or edit its description to state the connection".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GoalStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn goal(text: &str) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            goal_text: text.to_string(),
            status: GoalStatus::Active,
            created_at: Utc::now(),
            activated_at: Some(Utc::now()),
            superseded_at: None,
        }
    }

    #[test]
    fn no_active_goal_never_flags() {
        let task = Task::new(Uuid::new_v4(), "do something", "area");
        assert!(evaluate(&task, None).is_none());
    }

    #[test]
    fn aligned_task_passes() {
        let g = goal("learn the fundamental rules of chess");
        let mut task = Task::new(g.project_id, "learn chess check and checkmate rules", "theory");
        task.description = "study how chess check and checkmate work".to_string();
        assert!(evaluate(&task, Some(&g)).is_none());
    }

    #[test]
    fn unrelated_task_is_flagged() {
        let g = goal("learn the fundamental rules of chess");
        let task = Task::new(g.project_id, "repaint the fence", "home maintenance");
        let concern = evaluate(&task, Some(&g));
        assert!(concern.is_some());
    }
}
