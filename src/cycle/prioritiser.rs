//! Six-factor task prioritiser (spec §4.7).
//!
//! Ranks ready tasks by a weighted sum of goal alignment, active-priority
//! position, dependency readiness, skill-area balance, phase alignment, and
//! blocker-unlock potential. Ties break by insertion order, so callers must
//! pass `tasks` already ordered by creation time and rely on `rank`'s stable
//! sort rather than re-sorting the result themselves.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{Activity, Goal, Orientation, Phase, Task};

const W_GOAL: f64 = 0.35;
const W_PRIORITY: f64 = 0.20;
const W_DEPENDENCY: f64 = 0.15;
const W_BALANCE: f64 = 0.10;
const W_PHASE: f64 = 0.10;
const W_UNLOCK: f64 = 0.10;

/// Recent activities considered for the skill-area balance penalty.
const BALANCE_WINDOW: usize = 5;

pub(crate) fn tokenize(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard similarity of the two strings' token sets; 0.0 when either side
/// has no tokens.
pub(crate) fn text_overlap(a: &str, b: &str) -> f64 {
    let sa = tokenize(a);
    let sb = tokenize(b);
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn goal_alignment(task: &Task, goal: Option<&Goal>) -> f64 {
    match goal {
        Some(g) => text_overlap(&g.goal_text, &format!("{} {} {}", task.title, task.description, task.skill_area)),
        None => 0.0,
    }
}

fn active_priority_match(task: &Task, orientation: &Orientation) -> f64 {
    let haystack = format!("{} {}", task.title, task.skill_area).to_lowercase();
    let n = orientation.active_priorities.len();
    for (i, priority) in orientation.active_priorities.iter().enumerate() {
        if !priority.is_empty() && haystack.contains(&priority.to_lowercase()) {
            return 1.0 - (i as f64 / n.max(1) as f64) * 0.5;
        }
    }
    0.0
}

fn dependency_readiness(task: &Task) -> f64 {
    if task.depends_on.is_empty() {
        1.0
    } else {
        0.0
    }
}

/// Penalty (negative) when this task's skill area dominated recent activity,
/// so the prioritiser spreads work across skill areas instead of tunnelling.
fn skill_area_balance(task: &Task, recent_activities: &[Activity]) -> f64 {
    let hits = recent_activities
        .iter()
        .rev()
        .take(BALANCE_WINDOW)
        .filter(|a| a.details.to_lowercase().contains(&task.skill_area.to_lowercase()))
        .count();
    -(hits as f64 / BALANCE_WINDOW as f64)
}

const RESEARCH_KEYWORDS: [&str; 5] = ["research", "learn", "study", "investigate", "explore"];
const EXECUTION_KEYWORDS: [&str; 5] = ["build", "implement", "write", "create", "execute"];

fn phase_alignment(task: &Task, orientation: &Orientation) -> f64 {
    let text = format!("{} {}", task.title, task.description).to_lowercase();
    match orientation.current_phase {
        Phase::Intake | Phase::Research | Phase::Planning => {
            if RESEARCH_KEYWORDS.iter().any(|k| text.contains(k)) {
                1.0
            } else {
                0.3
            }
        }
        Phase::Execution | Phase::Refinement => {
            if EXECUTION_KEYWORDS.iter().any(|k| text.contains(k)) {
                1.0
            } else {
                0.3
            }
        }
        Phase::Complete => 0.0,
    }
}

fn blocker_unlock_potential(task: &Task, all_tasks: &[Task]) -> f64 {
    if all_tasks.is_empty() {
        return 0.0;
    }
    let downstream = all_tasks.iter().filter(|t| t.depends_on.contains(&task.id)).count();
    (downstream as f64 / all_tasks.len() as f64).min(1.0)
}

fn score(task: &Task, goal: Option<&Goal>, orientation: &Orientation, recent_activities: &[Activity], all_tasks: &[Task]) -> f64 {
    W_GOAL * goal_alignment(task, goal)
        + W_PRIORITY * active_priority_match(task, orientation)
        + W_DEPENDENCY * dependency_readiness(task)
        + W_BALANCE * skill_area_balance(task, recent_activities)
        + W_PHASE * phase_alignment(task, orientation)
        + W_UNLOCK * blocker_unlock_potential(task, all_tasks)
}

/// Rank `ready_tasks` descending by the six-factor score. Stable sort
/// preserves `ready_tasks`'s incoming order among ties, giving the
/// insertion-order tie-break the spec calls for.
pub fn rank(
    ready_tasks: &[Task],
    goal: Option<&Goal>,
    orientation: &Orientation,
    recent_activities: &[Activity],
    all_tasks: &[Task],
) -> Vec<(Uuid, f64)> {
    let mut scored: Vec<(Uuid, f64)> = ready_tasks
        .iter()
        .map(|t| (t.id, score(t, goal, orientation, recent_activities, all_tasks)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GoalStatus, TaskStatus};
    use chrono::Utc;

    fn task(project: Uuid, title: &str, skill_area: &str) -> Task {
        let mut t = Task::new(project, title, skill_area);
        t.status = TaskStatus::Ready;
        t
    }

    #[test]
    fn goal_aligned_task_outranks_unrelated_task() {
        let pid = Uuid::new_v4();
        let goal = Goal {
            id: Uuid::new_v4(),
            project_id: pid,
            goal_text: "learn the fundamental rules of chess".to_string(),
            status: GoalStatus::Active,
            created_at: Utc::now(),
            activated_at: Some(Utc::now()),
            superseded_at: None,
        };
        let orientation = Orientation::new(pid, "vision");
        let aligned = task(pid, "learn chess piece movement rules", "theory");
        let unrelated = task(pid, "organize the garage", "chores");
        let ranked = rank(&[aligned.clone(), unrelated.clone()], Some(&goal), &orientation, &[], &[aligned.clone(), unrelated.clone()]);
        assert_eq!(ranked[0].0, aligned.id);
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let pid = Uuid::new_v4();
        let orientation = Orientation::new(pid, "vision");
        let a = task(pid, "a", "x");
        let b = task(pid, "b", "x");
        let ranked = rank(&[a.clone(), b.clone()], None, &orientation, &[], &[a.clone(), b.clone()]);
        assert_eq!(ranked[0].0, a.id);
        assert_eq!(ranked[1].0, b.id);
    }

    #[test]
    fn dependency_free_task_scores_higher_than_blocked_shaped_one() {
        let pid = Uuid::new_v4();
        let orientation = Orientation::new(pid, "vision");
        let mut with_dep = task(pid, "needs prior work", "x");
        with_dep.depends_on = vec![Uuid::new_v4()];
        let free = task(pid, "independent work", "x");
        let ranked = rank(&[with_dep.clone(), free.clone()], None, &orientation, &[], &[with_dep.clone(), free.clone()]);
        assert_eq!(ranked[0].0, free.id);
    }
}
