use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::codec::{from_json, to_json};
use super::Store;
use crate::domain::*;
use crate::error::{Error, Result};

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let status: String = row.get("status")?;
    let depends_on: String = row.get("depends_on")?;
    let blocked_by: String = row.get("blocked_by")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let failed_at: Option<String> = row.get("failed_at")?;
    let created_at: String = row.get("created_at")?;

    Ok(Task {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        title: row.get("title")?,
        description: row.get("description")?,
        skill_area: row.get("skill_area")?,
        status: TaskStatus::from_db_str(&status).unwrap_or(TaskStatus::Blocked),
        depends_on: from_json::<Vec<String>>(&depends_on)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect(),
        blocked_by: from_json::<Vec<String>>(&blocked_by)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect(),
        outcome: row.get("outcome")?,
        failure_reason: row.get("failure_reason")?,
        failure_context: row.get("failure_context")?,
        created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
        started_at: started_at.and_then(|s| s.parse().ok()),
        completed_at: completed_at.and_then(|s| s.parse().ok()),
        failed_at: failed_at.and_then(|s| s.parse().ok()),
    })
}

fn uuid_vec_json(ids: &[Uuid]) -> Result<String> {
    to_json(&ids.iter().map(|u| u.to_string()).collect::<Vec<_>>())
}

impl Store {
    pub async fn put_task(&self, task: Task) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO tasks (
                    id, project_id, title, description, skill_area, status,
                    depends_on, blocked_by, outcome, failure_reason, failure_context,
                    created_at, started_at, completed_at, failed_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)"#,
                params![
                    task.id.to_string(),
                    task.project_id.to_string(),
                    task.title,
                    task.description,
                    task.skill_area,
                    task.status.db_str(),
                    uuid_vec_json(&task.depends_on)?,
                    uuid_vec_json(&task.blocked_by)?,
                    task.outcome,
                    task.failure_reason,
                    task.failure_context,
                    task.created_at.to_rfc3339(),
                    task.started_at.map(|t| t.to_rfc3339()),
                    task.completed_at.map(|t| t.to_rfc3339()),
                    task.failed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_task(&self, project_id: Uuid, id: Uuid) -> Result<Task> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM tasks WHERE project_id = ?1 AND id = ?2",
                params![project_id.to_string(), id.to_string()],
                row_to_task,
            )
            .optional()
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found("task", id))
        })
        .await
    }

    pub async fn tasks_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE project_id = ?1")?;
            let rows = stmt
                .query_map([project_id.to_string()], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn tasks_by_status(&self, project_id: Uuid, status: TaskStatus) -> Result<Vec<Task>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE project_id = ?1 AND status = ?2")?;
            let rows = stmt
                .query_map(params![project_id.to_string(), status.db_str()], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn tasks_by_skill_area(&self, project_id: Uuid, skill_area: &str) -> Result<Vec<Task>> {
        let skill_area = skill_area.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE project_id = ?1 AND skill_area = ?2")?;
            let rows = stmt
                .query_map(params![project_id.to_string(), skill_area], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ---- Questions ----

    pub async fn put_question(&self, q: Question) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO questions (
                    id, project_id, question, context, status, answer,
                    blocks_tasks, asked_at, answered_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"#,
                params![
                    q.id.to_string(),
                    q.project_id.to_string(),
                    q.question,
                    q.context,
                    q.status.db_str(),
                    q.answer,
                    uuid_vec_json(&q.blocks_tasks)?,
                    q.asked_at.to_rfc3339(),
                    q.answered_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_question(&self, project_id: Uuid, id: Uuid) -> Result<Question> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM questions WHERE project_id = ?1 AND id = ?2",
                params![project_id.to_string(), id.to_string()],
                row_to_question,
            )
            .optional()
            .map_err(Error::from)?
            .ok_or_else(|| Error::not_found("question", id))
        })
        .await
    }

    pub async fn questions_by_status(&self, project_id: Uuid, status: QuestionStatus) -> Result<Vec<Question>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM questions WHERE project_id = ?1 AND status = ?2")?;
            let rows = stmt
                .query_map(params![project_id.to_string(), status.db_str()], row_to_question)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Atomically answer a question and unblock the tasks whose only
    /// outstanding blocker was this question (spec §3's Question invariant,
    /// spec §4.7 wake-up handling). Returns the ids of unblocked tasks.
    pub async fn answer_question_and_unblock(&self, project_id: Uuid, question_id: Uuid, answer: String) -> Result<Vec<Uuid>> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let now = chrono::Utc::now().to_rfc3339();
            let n = tx.execute(
                "UPDATE questions SET status = 'answered', answer = ?1, answered_at = ?2 WHERE project_id = ?3 AND id = ?4 AND status = 'open'",
                params![answer, now, project_id.to_string(), question_id.to_string()],
            )?;
            if n == 0 {
                tx.commit()?;
                return Ok(Vec::new());
            }

            let mut stmt = tx.prepare("SELECT * FROM tasks WHERE project_id = ?1")?;
            let tasks = stmt
                .query_map([project_id.to_string()], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            let done: std::collections::HashSet<Uuid> = tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .map(|t| t.id)
                .collect();

            let mut unblocked = Vec::new();
            for mut task in tasks {
                if task.blocked_by.contains(&question_id) {
                    task.blocked_by.retain(|q| *q != question_id);
                    let deps_done = task.depends_on.iter().all(|d| done.contains(d));
                    if task.blocked_by.is_empty() && deps_done && task.status == TaskStatus::Blocked {
                        task.status = TaskStatus::Ready;
                        unblocked.push(task.id);
                    }
                    tx.execute(
                        "UPDATE tasks SET blocked_by = ?1, status = ?2 WHERE id = ?3",
                        params![uuid_vec_json(&task.blocked_by)?, task.status.db_str(), task.id.to_string()],
                    )?;
                }
            }
            tx.commit()?;
            Ok(unblocked)
        })
        .await
    }

    // ---- Activities ----

    pub async fn append_activity(&self, activity: Activity) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO activities (id, project_id, action, details, timestamp, tick) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    activity.id.to_string(),
                    activity.project_id.to_string(),
                    activity.action,
                    activity.details,
                    activity.timestamp.to_rfc3339(),
                    activity.tick as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn recent_activities(&self, project_id: Uuid, limit: usize) -> Result<Vec<Activity>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, action, details, timestamp, tick FROM activities WHERE project_id = ?1 ORDER BY tick DESC, timestamp DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![project_id.to_string(), limit as i64], |row| {
                    let id: String = row.get(0)?;
                    let project_id: String = row.get(1)?;
                    Ok(Activity {
                        id: Uuid::parse_str(&id).unwrap_or_default(),
                        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
                        action: row.get(2)?,
                        details: row.get(3)?,
                        timestamp: row.get::<_, String>(4)?.parse().unwrap_or_else(|_| chrono::Utc::now()),
                        tick: row.get::<_, i64>(5)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn activity_count_since(&self, project_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM activities WHERE project_id = ?1 AND timestamp > ?2",
                params![project_id.to_string(), since.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }

    pub async fn questions_answered_since(&self, project_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM questions WHERE project_id = ?1 AND status = 'answered' AND answered_at > ?2",
                params![project_id.to_string(), since.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }

    // ---- Goals / PendingGoals ----

    pub async fn active_goal(&self, project_id: Uuid) -> Result<Option<Goal>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM goals WHERE project_id = ?1 AND status = 'active'",
                [project_id.to_string()],
                row_to_goal,
            )
            .optional()
            .map_err(Error::from)
        })
        .await
    }

    pub async fn goal_history(&self, project_id: Uuid) -> Result<Vec<Goal>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM goals WHERE project_id = ?1 ORDER BY created_at ASC")?;
            let rows = stmt
                .query_map([project_id.to_string()], row_to_goal)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Activate a new goal, atomically superseding whatever was active
    /// (spec §3's Goal invariant: at most one `active` goal at a time).
    pub async fn activate_goal(&self, goal: Goal) -> Result<()> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let now = chrono::Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE goals SET status = 'superseded', superseded_at = ?1 WHERE project_id = ?2 AND status = 'active'",
                params![now, goal.project_id.to_string()],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO goals (id, project_id, goal_text, status, created_at, activated_at, superseded_at) VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    goal.id.to_string(),
                    goal.project_id.to_string(),
                    goal.goal_text,
                    goal.status.db_str(),
                    goal.created_at.to_rfc3339(),
                    goal.activated_at.map(|t| t.to_rfc3339()),
                    goal.superseded_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn enqueue_pending_goal(&self, pending: PendingGoal) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pending_goals (id, project_id, goal_text, created_at) VALUES (?1,?2,?3,?4)",
                params![pending.id.to_string(), pending.project_id.to_string(), pending.goal_text, pending.created_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Pop the oldest pending goal for a project, if any (cycle-boundary
    /// activation per spec §3's `PendingGoal`).
    pub async fn pop_pending_goal(&self, project_id: Uuid) -> Result<Option<PendingGoal>> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, String, String, String)> = tx
                .query_row(
                    "SELECT id, project_id, goal_text, created_at FROM pending_goals WHERE project_id = ?1 ORDER BY created_at ASC LIMIT 1",
                    [project_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            let Some((id, pid, text, created_at)) = row else {
                tx.commit()?;
                return Ok(None);
            };
            tx.execute("DELETE FROM pending_goals WHERE id = ?1", [&id])?;
            tx.commit()?;
            Ok(Some(PendingGoal {
                id: Uuid::parse_str(&id).unwrap_or_default(),
                project_id: Uuid::parse_str(&pid).unwrap_or_default(),
                goal_text: text,
                created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
            }))
        })
        .await
    }

    // ---- CoherenceWarnings ----

    pub async fn put_coherence_warning(&self, warning: CoherenceWarning) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO coherence_warnings (
                    id, project_id, task_id, concern, suggestion, created_at, resolution, resolved_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"#,
                params![
                    warning.id.to_string(),
                    warning.project_id.to_string(),
                    warning.task_id.to_string(),
                    warning.concern,
                    warning.suggestion,
                    warning.created_at.to_rfc3339(),
                    warning.resolution.map(|r| r.db_str()),
                    warning.resolved_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn open_coherence_warnings(&self, project_id: Uuid) -> Result<Vec<CoherenceWarning>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM coherence_warnings WHERE project_id = ?1 AND resolution IS NULL",
            )?;
            let rows = stmt
                .query_map([project_id.to_string()], row_to_warning)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ---- Orientation ----

    pub async fn current_orientation(&self, project_id: Uuid) -> Result<Option<Orientation>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM orientation WHERE project_id = ?1 AND is_current = 1",
                [project_id.to_string()],
                row_to_orientation,
            )
            .optional()
            .map_err(Error::from)
        })
        .await
    }

    pub async fn orientation_version(&self, project_id: Uuid, version: u64) -> Result<Option<Orientation>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM orientation WHERE project_id = ?1 AND version = ?2",
                params![project_id.to_string(), version as i64],
                row_to_orientation,
            )
            .optional()
            .map_err(Error::from)
        })
        .await
    }

    /// Persist a new orientation version, atomically un-marking the
    /// previous current row (spec §3: `version` strictly monotonic, and
    /// the superseded version is archived as a chunk by the caller before
    /// this is invoked).
    pub async fn put_orientation(&self, orientation: Orientation) -> Result<()> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE orientation SET is_current = 0 WHERE project_id = ?1",
                [orientation.project_id.to_string()],
            )?;
            tx.execute(
                r#"INSERT OR REPLACE INTO orientation (
                    project_id, version, vision_summary, success_criteria, constraints,
                    skill_map, current_phase, key_decisions, active_priorities,
                    progress_snapshot, last_rewritten, last_rewritten_tick, is_current
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,1)"#,
                params![
                    orientation.project_id.to_string(),
                    orientation.version as i64,
                    orientation.vision_summary,
                    to_json(&orientation.success_criteria)?,
                    to_json(&orientation.constraints)?,
                    to_json(&orientation.skill_map)?,
                    orientation.current_phase.db_str(),
                    to_json(&orientation.key_decisions)?,
                    to_json(&orientation.active_priorities)?,
                    to_json(&orientation.progress_snapshot)?,
                    orientation.last_rewritten.to_rfc3339(),
                    orientation.last_rewritten_tick as i64,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ---- Pending phase transitions ----

    /// Queue an explicit phase-transition decision for the next orientation
    /// rewrite (spec §4.6). At most one pending transition per project; a
    /// later request replaces an earlier, unconsumed one.
    pub async fn request_phase_transition(&self, transition: PendingPhaseTransition) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pending_phase_transitions (project_id, phase, requested_at) VALUES (?1,?2,?3)",
                params![transition.project_id.to_string(), transition.phase.db_str(), transition.requested_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Pop the pending phase transition for a project, if any.
    pub async fn pop_pending_phase_transition(&self, project_id: Uuid) -> Result<Option<PendingPhaseTransition>> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, String)> = tx
                .query_row(
                    "SELECT phase, requested_at FROM pending_phase_transitions WHERE project_id = ?1",
                    [project_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((phase, requested_at)) = row else {
                tx.commit()?;
                return Ok(None);
            };
            tx.execute("DELETE FROM pending_phase_transitions WHERE project_id = ?1", [project_id.to_string()])?;
            tx.commit()?;
            Ok(Some(PendingPhaseTransition {
                project_id,
                phase: Phase::from_db_str(&phase).unwrap_or(Phase::Intake),
                requested_at: requested_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
            }))
        })
        .await
    }
}

fn row_to_question(row: &rusqlite::Row) -> rusqlite::Result<Question> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let status: String = row.get("status")?;
    let blocks_tasks: String = row.get("blocks_tasks")?;
    let asked_at: String = row.get("asked_at")?;
    let answered_at: Option<String> = row.get("answered_at")?;

    Ok(Question {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        question: row.get("question")?,
        context: row.get("context")?,
        status: QuestionStatus::from_db_str(&status).unwrap_or(QuestionStatus::Open),
        answer: row.get("answer")?,
        blocks_tasks: from_json::<Vec<String>>(&blocks_tasks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect(),
        asked_at: asked_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
        answered_at: answered_at.and_then(|s| s.parse().ok()),
    })
}

fn row_to_goal(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let activated_at: Option<String> = row.get("activated_at")?;
    let superseded_at: Option<String> = row.get("superseded_at")?;

    Ok(Goal {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        goal_text: row.get("goal_text")?,
        status: GoalStatus::from_db_str(&status).unwrap_or(GoalStatus::Active),
        created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
        activated_at: activated_at.and_then(|s| s.parse().ok()),
        superseded_at: superseded_at.and_then(|s| s.parse().ok()),
    })
}

fn row_to_warning(row: &rusqlite::Row) -> rusqlite::Result<CoherenceWarning> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let task_id: String = row.get("task_id")?;
    let created_at: String = row.get("created_at")?;
    let resolution: Option<String> = row.get("resolution")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;

    Ok(CoherenceWarning {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        task_id: Uuid::parse_str(&task_id).unwrap_or_default(),
        concern: row.get("concern")?,
        suggestion: row.get("suggestion")?,
        created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
        resolution: resolution.and_then(|s| WarningResolution::from_db_str(&s).ok()),
        resolved_at: resolved_at.and_then(|s| s.parse().ok()),
    })
}

fn row_to_orientation(row: &rusqlite::Row) -> rusqlite::Result<Orientation> {
    let project_id: String = row.get("project_id")?;
    let success_criteria: String = row.get("success_criteria")?;
    let constraints: String = row.get("constraints")?;
    let skill_map: String = row.get("skill_map")?;
    let current_phase: String = row.get("current_phase")?;
    let key_decisions: String = row.get("key_decisions")?;
    let active_priorities: String = row.get("active_priorities")?;
    let progress_snapshot: String = row.get("progress_snapshot")?;
    let last_rewritten: String = row.get("last_rewritten")?;

    Ok(Orientation {
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        vision_summary: row.get("vision_summary")?,
        success_criteria: from_json(&success_criteria).unwrap_or_default(),
        constraints: from_json(&constraints).unwrap_or_default(),
        skill_map: from_json(&skill_map).unwrap_or_default(),
        current_phase: Phase::from_db_str(&current_phase).unwrap_or(Phase::Intake),
        key_decisions: from_json(&key_decisions).unwrap_or_default(),
        active_priorities: from_json(&active_priorities).unwrap_or_default(),
        progress_snapshot: from_json(&progress_snapshot).unwrap_or_default(),
        last_rewritten: last_rewritten.parse().unwrap_or_else(|_| chrono::Utc::now()),
        last_rewritten_tick: row.get::<_, i64>("last_rewritten_tick")? as u64,
        version: row.get::<_, i64>("version")? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answering_question_unblocks_only_ready_tasks() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut q = Question::new(pid, "which opening?", "ctx");
        store.put_question(q.clone()).await.unwrap();

        let mut t1 = Task::new(pid, "t1", "openings");
        t1.status = TaskStatus::Blocked;
        t1.blocked_by = vec![q.id];
        store.put_task(t1.clone()).await.unwrap();

        let mut t2 = Task::new(pid, "t2", "openings");
        t2.status = TaskStatus::Blocked;
        t2.blocked_by = vec![q.id, Uuid::new_v4()]; // still blocked by another question
        store.put_task(t2.clone()).await.unwrap();

        let unblocked = store.answer_question_and_unblock(pid, q.id, "e4".to_string()).await.unwrap();
        assert_eq!(unblocked, vec![t1.id]);

        let t1_after = store.get_task(pid, t1.id).await.unwrap();
        assert_eq!(t1_after.status, TaskStatus::Ready);
        let t2_after = store.get_task(pid, t2.id).await.unwrap();
        assert_eq!(t2_after.status, TaskStatus::Blocked);

        q = store.get_question(pid, q.id).await.unwrap();
        assert_eq!(q.status, QuestionStatus::Answered);
    }

    #[tokio::test]
    async fn activating_goal_supersedes_previous() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let g1 = Goal::new(pid, "learn chess");
        store.activate_goal(g1.clone()).await.unwrap();
        let g2 = Goal::new(pid, "learn go");
        store.activate_goal(g2.clone()).await.unwrap();

        let active = store.active_goal(pid).await.unwrap().unwrap();
        assert_eq!(active.id, g2.id);

        let history = store.goal_history(pid).await.unwrap();
        let old = history.iter().find(|g| g.id == g1.id).unwrap();
        assert_eq!(old.status, GoalStatus::Superseded);
    }

    #[tokio::test]
    async fn orientation_round_trips_and_versions_monotonically() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let o1 = Orientation::new(pid, "learn chess");
        store.put_orientation(o1.clone()).await.unwrap();
        let mut o2 = o1.clone();
        o2.version = 2;
        o2.key_decisions.push("prioritize openings".to_string());
        store.put_orientation(o2.clone()).await.unwrap();

        let current = store.current_orientation(pid).await.unwrap().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.vision_summary, "learn chess");

        let archived = store.orientation_version(pid, 1).await.unwrap().unwrap();
        assert_eq!(archived.version, 1);
    }
}
