//! Agent Cycle Driver (spec §4.7): the thin harness that ticks the Clock,
//! reconstructs agent state from the Store via the Memory Engine, asks
//! Retrieval for context, hands a task to the external executor, persists
//! learnings, and maintains the Orientation. This is the only component
//! that invokes all four core subsystems together; none of the scheduling,
//! decay, or retrieval logic itself lives here.

pub mod coherence;
pub mod pivot;
pub mod prioritiser;

use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::domain::{
    Activity, CoherenceWarning, Goal, GoalStatus, Orientation, Phase, Question, QuestionStatus, SkillNode,
    SkillStatus, Task, TaskStatus,
};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::executor::{ExecutionRequest, ExecutionResult, ExecutionStatus, Executor};
use crate::memory::chunk::{Chunk, ChunkType, Confidence, LearningContext, Source};
use crate::memory::consolidation::Consolidator;
use crate::memory::engine::MemoryEngine;
use crate::orientation::{orientation_age, OrientationManager, OrientationUpdate, RewriteTriggers};
use crate::retrieval::{RetrievalContext, RetrievalEngine, ScoredChunk};
use crate::store::Store;

/// Snapshot the cycle driver reconstructs at wake-up (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStatus {
    Ready,
    WaitingForUser,
    Idle,
}

#[derive(Debug, Clone)]
pub struct WakeupState {
    pub orientation: Orientation,
    pub active_goal: Option<Goal>,
    pub current_task: Option<Task>,
    pub task_queue: Vec<Task>,
    pub open_questions: Vec<Question>,
    pub status: ReadinessStatus,
}

/// Outcome of answering a question outside a cycle (spec §3 Question
/// invariant, §4.7 pivot detection).
#[derive(Debug, Clone, Default)]
pub struct AnswerOutcome {
    pub unblocked_tasks: Vec<Uuid>,
    pub pivot_detected: bool,
    pub cancelled_tasks: Vec<Uuid>,
}

/// One cycle's outcome, enough for a CLI or test to assert on.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub tick: u64,
    pub dispatched_task: Option<Uuid>,
    pub result_status: Option<ExecutionStatus>,
    pub coherence_warnings: Vec<Uuid>,
    pub orientation_rewritten: bool,
    pub consolidation_ran: bool,
    pub decay_ran: bool,
}

fn phase_tag(phase: Phase) -> String {
    format!("{phase:?}").to_lowercase()
}

/// Whether a chunk's tags or content reference a given skill (spec §4.6:
/// a verified insight trigger must "touch a skill area").
fn chunk_touches_skill(chunk: &Chunk, skill: &str) -> bool {
    chunk.tags.iter().any(|t| t.eq_ignore_ascii_case(skill)) || chunk.content.to_lowercase().contains(&skill.to_lowercase())
}

/// Recompute skill_map statuses from the full completed-task and verified-
/// insight history (spec §4.6 rewrite step 2): a skill with a matching done
/// task is `achieved`; otherwise a skill touched by a verified insight moves
/// from `not_started` to `in_progress`. Already-achieved skills never regress.
fn recompute_skill_map(skill_map: &[SkillNode], done_tasks: &[Task], verified_insights: &[Chunk]) -> Vec<SkillNode> {
    skill_map
        .iter()
        .cloned()
        .map(|mut node| {
            if done_tasks.iter().any(|t| t.skill_area.eq_ignore_ascii_case(&node.skill)) {
                node.status = SkillStatus::Achieved;
            } else if node.status != SkillStatus::Achieved && verified_insights.iter().any(|c| chunk_touches_skill(c, &node.skill)) {
                node.status = SkillStatus::InProgress;
            }
            node
        })
        .collect()
}

/// Advance to the next phase once every skill in the map is achieved.
fn derive_phase(current_phase: Phase, skill_map: &[SkillNode]) -> Phase {
    if !skill_map.is_empty() && skill_map.iter().all(|n| n.status == SkillStatus::Achieved) {
        current_phase.next().unwrap_or(current_phase)
    } else {
        current_phase
    }
}

/// Skills still needing work, ordered so the currently most urgent ones
/// (in_progress) sort last and survive `OrientationManager`'s keep-most-
/// recent trim if there are more than it can hold.
fn derive_active_priorities(skill_map: &[SkillNode]) -> Vec<String> {
    let mut not_started: Vec<String> = skill_map.iter().filter(|n| n.status == SkillStatus::NotStarted).map(|n| n.skill.clone()).collect();
    let in_progress: Vec<String> = skill_map.iter().filter(|n| n.status == SkillStatus::InProgress).map(|n| n.skill.clone()).collect();
    not_started.extend(in_progress);
    not_started
}

pub struct CycleDriver<'a> {
    store: &'a Store,
    embedder: &'a dyn EmbeddingProvider,
    executor: &'a dyn Executor,
    config: &'a Config,
}

impl<'a> CycleDriver<'a> {
    pub fn new(store: &'a Store, embedder: &'a dyn EmbeddingProvider, executor: &'a dyn Executor, config: &'a Config) -> Self {
        Self { store, embedder, executor, config }
    }

    /// Load Orientation, open tasks/questions, and the active goal; classify
    /// readiness (spec §4.7 "Wake-up").
    pub async fn wake_up(&self, project_id: Uuid) -> Result<WakeupState> {
        let orientation = OrientationManager::new(self.store).current(project_id, "").await?;
        let active_goal = self.store.active_goal(project_id).await?;
        let current_task = self
            .store
            .tasks_by_status(project_id, TaskStatus::InProgress)
            .await?
            .into_iter()
            .next();
        let task_queue = self.store.tasks_by_status(project_id, TaskStatus::Ready).await?;
        let open_questions = self.store.questions_by_status(project_id, QuestionStatus::Open).await?;

        let status = if current_task.is_some() || !task_queue.is_empty() {
            ReadinessStatus::Ready
        } else if !open_questions.is_empty() {
            ReadinessStatus::WaitingForUser
        } else {
            ReadinessStatus::Idle
        };

        Ok(WakeupState { orientation, active_goal, current_task, task_queue, open_questions, status })
    }

    /// Answer a question: unblock dependents, persist the answer as a
    /// `user_input`/`verified` chunk, and run pivot detection (spec §3
    /// Question invariant, §4.7 "Pivot detection", §8 scenario 6).
    pub async fn answer_question(&self, project_id: Uuid, question_id: Uuid, answer: String, tick: u64) -> Result<AnswerOutcome> {
        let unblocked_tasks = self.store.answer_question_and_unblock(project_id, question_id, answer.clone()).await?;

        let engine = MemoryEngine::new(self.store, self.embedder);
        engine
            .write_chunk(
                project_id,
                answer.clone(),
                ChunkType::UserInput,
                vec!["answer".to_string()],
                Confidence::Verified,
                Source::User,
                tick,
                LearningContext { tick, query_context: answer.clone(), ..Default::default() },
                false,
            )
            .await?;
        self.store
            .append_activity(Activity::new(project_id, "QuestionAnswered", format!("question {question_id} answered"), tick))
            .await?;

        let pivot_detected = pivot::detect(self.embedder, &answer, &self.config.pivot_keyword_list, self.config.pivot_similarity_threshold).await?;

        let mut cancelled_tasks = Vec::new();
        if pivot_detected {
            cancelled_tasks = self.cancel_queued_tasks(project_id).await?;
            self.store
                .append_activity(Activity::new(
                    project_id,
                    "Pivot",
                    format!("pivot detected on answer to question {question_id}; cancelled {} queued task(s)", cancelled_tasks.len()),
                    tick,
                ))
                .await?;
            self.force_orientation_rewrite(project_id, tick, "pivot").await?;
        }

        Ok(AnswerOutcome { unblocked_tasks, pivot_detected, cancelled_tasks })
    }

    /// Cancel every task not already `in_progress`/`done` (the "queued,
    /// never started" set spec §4.7 and §8 scenario 6 call out as
    /// pivot-cancellable). The currently running task, if any, is left
    /// untouched — it completes or times out on its own.
    async fn cancel_queued_tasks(&self, project_id: Uuid) -> Result<Vec<Uuid>> {
        let mut cancelled = Vec::new();
        for mut task in self.store.tasks_by_project(project_id).await? {
            if matches!(task.status, TaskStatus::Ready | TaskStatus::Blocked) {
                task.status = TaskStatus::Cancelled;
                cancelled.push(task.id);
                self.store.put_task(task).await?;
            }
        }
        Ok(cancelled)
    }

    async fn force_orientation_rewrite(&self, project_id: Uuid, tick: u64, reason: &str) -> Result<()> {
        let manager = OrientationManager::new(self.store);
        let current = manager.current(project_id, "").await?;
        let mut update = OrientationUpdate::default();
        update.key_decisions = Some({
            let mut decisions = current.key_decisions.clone();
            decisions.push(format!("orientation rewritten: {reason}"));
            decisions
        });
        manager.rewrite(current, update, tick).await?;
        Ok(())
    }

    /// Run exactly one agent cycle for `project_id` (spec §4.7): tick,
    /// wake-up, prioritise, coherence-gate, execute at most one task,
    /// persist the result, then run end-of-cycle triggers.
    pub async fn run_cycle(&self, project_id: Uuid, session_id: Uuid) -> Result<CycleReport> {
        let clock = Clock::new(self.store);
        // The one write every cycle makes unconditionally; worth the bounded
        // retry if the store ever reports a transient lock (spec §7).
        let tick = crate::error::with_retry(|| clock.increment(project_id)).await?;
        let mut report = CycleReport { tick, ..Default::default() };

        let wake = self.wake_up(project_id).await?;

        if let Some(task) = wake.current_task {
            // A task is already in flight from a prior cycle; this cycle
            // does not dispatch a new one (spec §5: in_progress held by at
            // most one task per project at a time).
            report.dispatched_task = Some(task.id);
        } else if !wake.task_queue.is_empty() {
            let all_tasks = self.store.tasks_by_project(project_id).await?;
            let recent_activities = self.store.recent_activities(project_id, 20).await?;
            let ranked = prioritiser::rank(&wake.task_queue, wake.active_goal.as_ref(), &wake.orientation, &recent_activities, &all_tasks);

            let mut dispatched = None;
            for (task_id, _score) in &ranked {
                let task = wake.task_queue.iter().find(|t| t.id == *task_id).cloned().unwrap();
                if let Some(concern) = coherence::evaluate(&task, wake.active_goal.as_ref()) {
                    let warning = CoherenceWarning::new(project_id, task.id, concern.concern, concern.suggestion);
                    report.coherence_warnings.push(warning.id);
                    self.store.put_coherence_warning(warning).await?;
                    self.store
                        .append_activity(Activity::new(project_id, "CoherenceWarning", format!("task {} flagged off-track", task.id), tick))
                        .await?;
                    continue;
                }
                dispatched = Some(task);
                break;
            }

            if let Some(task) = dispatched {
                let status = self
                    .execute_task(project_id, task, tick, wake.active_goal.as_ref(), &wake.orientation, session_id)
                    .await?;
                report.dispatched_task = report.dispatched_task.or(Some(status.0));
                report.result_status = Some(status.1);
            }
        }

        // End of cycle (spec §4.7): activate a pending goal, run
        // orientation triggers, and schedule consolidation.
        if let Some(pending) = self.store.pop_pending_goal(project_id).await? {
            let goal = Goal {
                id: Uuid::new_v4(),
                project_id,
                goal_text: pending.goal_text,
                status: GoalStatus::Active,
                created_at: pending.created_at,
                activated_at: Some(chrono::Utc::now()),
                superseded_at: None,
            };
            self.store.activate_goal(goal).await?;
            self.store
                .append_activity(Activity::new(project_id, "GoalActivated", "pending goal activated at cycle boundary".to_string(), tick))
                .await?;
        }

        report.orientation_rewritten = self.maybe_rewrite_orientation(project_id, tick).await?;

        if clock.should_run(project_id, crate::domain::RunKind::Decay, self.config.memory_decay_interval_ticks).await? {
            let state = self.store.load_agent_state(project_id).await?;
            let engine = MemoryEngine::new(self.store, self.embedder);
            engine.run_decay(project_id, tick, state.last_decay_tick).await?;
            clock.mark_decay_ran(project_id).await?;
            report.decay_ran = true;
        }

        if clock
            .should_run(project_id, crate::domain::RunKind::Consolidation, self.config.memory_consolidation_interval_ticks)
            .await?
        {
            let consolidator = Consolidator::new(self.store, Some(self.embedder));
            consolidator
                .run(
                    project_id,
                    tick,
                    self.config.memory_consolidation_interval_ticks,
                    self.config.memory_consolidation_interval_ticks,
                    self.config.coretrieval_threshold,
                    self.config.memory_coretrieval_retention_days,
                )
                .await?;
            clock.mark_consolidation_ran(project_id).await?;
            report.consolidation_ran = true;
        }

        Ok(report)
    }

    /// Execute a single task end-to-end: mark in-progress, retrieve context,
    /// call the executor under a timeout, and handle the structured result
    /// (spec §4.7 "Execute" / "Result handling").
    async fn execute_task(
        &self,
        project_id: Uuid,
        mut task: Task,
        tick: u64,
        goal: Option<&Goal>,
        orientation: &Orientation,
        session_id: Uuid,
    ) -> Result<(Uuid, ExecutionStatus)> {
        task.status = TaskStatus::InProgress;
        task.started_at = Some(chrono::Utc::now());
        self.store.put_task(task.clone()).await?;
        self.store
            .append_activity(Activity::new(project_id, "Starting", format!("task {}: {}", task.id, task.title), tick))
            .await?;

        let query = format!("{} {}", task.title, task.description);
        let retrieval_ctx = RetrievalContext {
            tick,
            task_id: Some(task.id),
            goal_id: goal.map(|g| g.id),
            phase: Some(phase_tag(orientation.current_phase)),
            skill_area: Some(task.skill_area.clone()),
            query: query.clone(),
        };
        let retrieval = RetrievalEngine::new(self.store, self.embedder);
        let context = retrieval
            .retrieve(
                project_id,
                &retrieval_ctx,
                session_id,
                self.config.agent_max_tasks_per_session,
                self.config.min_similarity_threshold,
                &self.config.retrieval_confidence_weights,
            )
            .await?;

        // Spec §4.3 "Reactivation": any retrieval that returns a chunk bumps
        // its access_count/tick_last_accessed, independent of whether the
        // executor later flags it useful.
        let engine = MemoryEngine::new(self.store, self.embedder);
        for scored in &context {
            engine
                .reactivate(project_id, scored.chunk.id, tick, false, scored.breakdown.context_match)
                .await?;
        }

        let request = ExecutionRequest { task: &task, context: &context, goal, orientation };
        let timeout = std::time::Duration::from_secs(self.config.executor_timeout_secs);
        let result = match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ExecutionResult::failed(e.activity_reason()),
            Err(_) => ExecutionResult::failed("timeout"),
        };

        self.handle_result(project_id, task, tick, goal, orientation, &query, &context, result).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_result(
        &self,
        project_id: Uuid,
        mut task: Task,
        tick: u64,
        goal: Option<&Goal>,
        orientation: &Orientation,
        query: &str,
        context: &[ScoredChunk],
        result: ExecutionResult,
    ) -> Result<(Uuid, ExecutionStatus)> {
        let task_id = task.id;
        let engine = MemoryEngine::new(self.store, self.embedder);
        let related_chunks: Vec<Uuid> = context.iter().map(|c| c.chunk.id).collect();

        let learning_context = LearningContext {
            tick,
            task_id: Some(task.id),
            goal_id: goal.map(|g| g.id),
            phase: Some(phase_tag(orientation.current_phase)),
            skill_area: Some(task.skill_area.clone()),
            query_context: query.to_string(),
            related_chunks: related_chunks.clone(),
        };

        for learning in &result.learnings {
            engine
                .write_chunk(
                    project_id,
                    learning.content.clone(),
                    learning.chunk_type,
                    learning.tags.clone(),
                    learning.confidence,
                    Source::Deduction,
                    tick,
                    LearningContext { related_chunks: learning.related_chunks.clone(), ..learning_context.clone() },
                    false,
                )
                .await?;
            self.store
                .append_activity(Activity::new(project_id, "LearningStored", learning.content.chars().take(120).collect::<String>(), tick))
                .await?;
        }

        // Spec §4.3 "useful" signal: a chunk the executor cited while
        // producing a learning is a stronger signal than merely having been
        // retrieved, so it gets the diminishing-returns strength boost and a
        // chance at one-tier promotion.
        let cited: std::collections::HashSet<Uuid> = result.learnings.iter().flat_map(|l| l.related_chunks.iter().copied()).collect();
        for scored in context.iter().filter(|c| cited.contains(&c.chunk.id)) {
            engine
                .reactivate(project_id, scored.chunk.id, tick, true, scored.breakdown.context_match)
                .await?;
        }

        for question in &result.new_questions {
            let mut q = Question::new(project_id, question.question.clone(), question.context.clone());
            if result.status == ExecutionStatus::Blocked {
                q.blocks_tasks.push(task.id);
            }
            self.store.put_question(q).await?;
        }

        for follow_up in &result.follow_up_tasks {
            let mut new_task = Task::new(project_id, follow_up.title.clone(), follow_up.skill_area.clone());
            new_task.description = follow_up.description.clone();
            new_task.depends_on = follow_up.depends_on.clone();
            self.store.put_task(new_task).await?;
        }

        match result.status {
            ExecutionStatus::Complete => {
                task.status = TaskStatus::Done;
                task.completed_at = Some(chrono::Utc::now());
                task.outcome = result.outcome_text.clone();
                self.store.put_task(task.clone()).await?;
                self.reevaluate_dependents(project_id, task.id).await?;
                self.store
                    .append_activity(Activity::new(project_id, "Completed", format!("task {} done", task.id), tick))
                    .await?;
            }
            ExecutionStatus::Blocked => {
                task.status = TaskStatus::Blocked;
                self.store.put_task(task.clone()).await?;
                self.store
                    .append_activity(Activity::new(project_id, "Blocked", format!("task {} blocked pending new question(s)", task.id), tick))
                    .await?;
            }
            ExecutionStatus::Partial => {
                task.status = TaskStatus::Ready;
                if let Some(outcome) = &result.outcome_text {
                    task.description = format!("{}\n\n[partial progress] {}", task.description, outcome);
                }
                self.store.put_task(task.clone()).await?;
                self.store
                    .append_activity(Activity::new(project_id, "Partial", format!("task {} left ready with partial progress", task.id), tick))
                    .await?;
            }
            ExecutionStatus::Failed => {
                let already_failed_once = task.failure_reason.is_some();
                task.failure_reason = result.outcome_text.clone().or(Some("unknown failure".to_string()));
                task.failure_context = Some(query.to_string());
                task.failed_at = Some(chrono::Utc::now());
                task.status = if already_failed_once { TaskStatus::Done } else { TaskStatus::Ready };
                self.store.put_task(task.clone()).await?;
                self.store
                    .append_activity(Activity::new(
                        project_id,
                        "Failed",
                        format!("task {} failed: {}", task.id, task.failure_reason.clone().unwrap_or_default()),
                        tick,
                    ))
                    .await?;
            }
        }

        Ok((task_id, result.status))
    }

    /// Re-evaluate every task whose `depends_on` includes `completed_id`,
    /// flipping it to `ready` once all its dependencies are `done` and it
    /// has no open blocking questions (spec §3 Task invariant).
    async fn reevaluate_dependents(&self, project_id: Uuid, completed_id: Uuid) -> Result<Vec<Uuid>> {
        let all_tasks = self.store.tasks_by_project(project_id).await?;
        let done: std::collections::HashSet<Uuid> = all_tasks.iter().filter(|t| t.status == TaskStatus::Done).map(|t| t.id).collect();
        let open_questions = self.store.questions_by_status(project_id, QuestionStatus::Open).await?;
        let open_ids: std::collections::HashSet<Uuid> = open_questions.iter().map(|q| q.id).collect();

        let mut flipped = Vec::new();
        for mut task in all_tasks {
            if !task.depends_on.contains(&completed_id) {
                continue;
            }
            if !matches!(task.status, TaskStatus::Ready | TaskStatus::Blocked) {
                continue;
            }
            let deps_done = task.depends_on.iter().all(|d| done.contains(d));
            let blockers_open = task.blocked_by.iter().any(|b| open_ids.contains(b));
            let before = task.status;
            task.recompute_readiness(deps_done, blockers_open);
            if task.status != before {
                flipped.push(task.id);
            }
            self.store.put_task(task).await?;
        }
        Ok(flipped)
    }

    /// Evaluate the Orientation's rewrite triggers (spec §4.6) and rewrite
    /// when any fires.
    async fn maybe_rewrite_orientation(&self, project_id: Uuid, tick: u64) -> Result<bool> {
        let manager = OrientationManager::new(self.store);
        let current = manager.current(project_id, "").await?;

        // Cumulative: every done task and every verified insight ever
        // recorded, used below to recompute skill_map (spec §4.6 step 2).
        let done_tasks = self.store.tasks_by_status(project_id, TaskStatus::Done).await?;
        let verified_insights = self
            .store
            .query_chunks(
                project_id,
                crate::store::ChunkFilter {
                    chunk_type: Some(ChunkType::Insight),
                    confidence: Some(Confidence::Verified),
                    ..Default::default()
                },
            )
            .await?;

        // Triggers only fire on activity since the last rewrite, not on the
        // cumulative history above (spec §4.6's triggers are one-shot events).
        let completed_task_skill_match = done_tasks.iter().any(|t| {
            t.completed_at.map_or(false, |c| c > current.last_rewritten)
                && current.skill_map.iter().any(|s| s.skill.eq_ignore_ascii_case(&t.skill_area))
        });
        let activities_since_rewrite = self.store.activity_count_since(project_id, current.last_rewritten).await?;
        let questions_answered_since_rewrite = self.store.questions_answered_since(project_id, current.last_rewritten).await?;
        let verified_insight_since_rewrite = verified_insights
            .iter()
            .any(|c| c.tick_created > current.last_rewritten_tick && current.skill_map.iter().any(|s| chunk_touches_skill(c, &s.skill)));

        let pending_phase_transition = self.store.pop_pending_phase_transition(project_id).await?;
        let phase_transition_requested = pending_phase_transition.is_some();

        let serialized = serde_yaml::to_string(&current).map_err(|e| crate::error::Error::Corruption(e.to_string()))?;
        let age = orientation_age(&current, chrono::Utc::now());

        let triggers = RewriteTriggers {
            completed_task_skill_match,
            phase_transition_requested,
            questions_answered_since_rewrite,
            verified_insight_since_rewrite,
            activities_since_rewrite,
            orientation_age: Some(age),
            activity_in_age_interval: activities_since_rewrite > 0,
            serialized_tokens_estimate: serialized.len() / 4,
        };

        let Some(reason) = crate::orientation::should_rewrite(&triggers, self.config) else {
            return Ok(false);
        };

        let new_skill_map = recompute_skill_map(&current.skill_map, &done_tasks, &verified_insights);
        let new_phase = match pending_phase_transition {
            Some(requested) => requested.phase,
            None => derive_phase(current.current_phase, &new_skill_map),
        };
        let progress_snapshot = new_skill_map.iter().map(|s| (s.skill.clone(), format!("{:?}", s.status))).collect();
        let active_priorities = derive_active_priorities(&new_skill_map);
        let mut key_decisions = current.key_decisions.clone();
        key_decisions.push(format!("orientation rewritten: {reason}"));

        let update = OrientationUpdate {
            current_phase: Some(new_phase),
            skill_map: Some(new_skill_map),
            key_decisions: Some(key_decisions),
            active_priorities: Some(active_priorities),
            progress_snapshot: Some(progress_snapshot),
        };
        manager.rewrite(current, update, tick).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{Orientation, SkillNode, SkillStatus};
    use crate::embedding::DeterministicHashProvider;
    use crate::executor::ScriptedExecutor;
    use crate::store::Store;

    async fn seed_orientation(store: &Store, project_id: Uuid) {
        let mut orientation = Orientation::new(project_id, "learn chess");
        orientation.skill_map = vec![SkillNode {
            skill: "theory".to_string(),
            parent: None,
            dependencies: vec![],
            status: SkillStatus::NotStarted,
            notes: String::new(),
        }];
        store.put_orientation(orientation).await.unwrap();
    }

    #[tokio::test]
    async fn completed_task_skill_match_is_one_shot_not_a_storm() {
        let store = Store::open_in_memory().await.unwrap();
        let project_id = Uuid::new_v4();
        store.initialize_project(project_id).await.unwrap();
        seed_orientation(&store, project_id).await;

        let mut task = Task::new(project_id, "learn openings", "theory");
        task.status = TaskStatus::Done;
        task.completed_at = Some(chrono::Utc::now());
        store.put_task(task).await.unwrap();

        let executor = ScriptedExecutor::new(vec![]);
        let embedder = DeterministicHashProvider::new(8);
        let config = Config::default();
        let driver = CycleDriver::new(&store, &embedder, &executor, &config);

        let rewrote_first = driver.maybe_rewrite_orientation(project_id, 1).await.unwrap();
        assert!(rewrote_first);

        let orientation = store.current_orientation(project_id).await.unwrap().unwrap();
        assert_eq!(orientation.skill_map[0].status, SkillStatus::Achieved);
        assert_eq!(orientation.current_phase, Phase::Research);

        // The same Done task must not keep firing the trigger on later ticks.
        let rewrote_second = driver.maybe_rewrite_orientation(project_id, 2).await.unwrap();
        assert!(!rewrote_second);
    }

    #[tokio::test]
    async fn explicit_phase_transition_overrides_derived_phase() {
        let store = Store::open_in_memory().await.unwrap();
        let project_id = Uuid::new_v4();
        store.initialize_project(project_id).await.unwrap();
        seed_orientation(&store, project_id).await;

        store
            .request_phase_transition(crate::domain::PendingPhaseTransition {
                project_id,
                phase: Phase::Execution,
                requested_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let executor = ScriptedExecutor::new(vec![]);
        let embedder = DeterministicHashProvider::new(8);
        let config = Config::default();
        let driver = CycleDriver::new(&store, &embedder, &executor, &config);

        let rewrote = driver.maybe_rewrite_orientation(project_id, 1).await.unwrap();
        assert!(rewrote);
        let orientation = store.current_orientation(project_id).await.unwrap().unwrap();
        assert_eq!(orientation.current_phase, Phase::Execution);
    }
}
