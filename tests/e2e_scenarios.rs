//! End-to-end cycle scenarios (spec §8). Scenarios 2-5 (decay ladder,
//! reactivation, implicit relationship formation, contradiction cascade)
//! are exercised at the unit level inside `memory::decay` and
//! `memory::implicit`; this file covers the two that need the full
//! `CycleDriver` wired across Store, Clock, Memory Engine, and Retrieval.

use uuid::Uuid;

use visioneer::clock::Clock;
use visioneer::config::Config;
use visioneer::cycle::CycleDriver;
use visioneer::domain::{Goal, Question, Task, TaskStatus};
use visioneer::embedding::DeterministicHashProvider;
use visioneer::executor::{ExecutionResult, ExecutionStatus, LearningDraft, ScriptedExecutor};
use visioneer::memory::chunk::{ChunkType, Confidence};
use visioneer::store::{ChunkFilter, Store};

#[tokio::test]
async fn cold_start_single_cycle_completes_top_task_and_stores_learnings() {
    let store = Store::open_in_memory().await.unwrap();
    let project_id = Uuid::new_v4();
    store.initialize_project(project_id).await.unwrap();

    let goal = Goal::new(project_id, "Learn the fundamental rules of chess");
    store.activate_goal(goal).await.unwrap();

    let titles = [
        ("learn piece movement rules", "theory"),
        ("learn check and checkmate rules", "theory"),
        ("learn special moves: castling and en passant", "theory"),
        ("learn opening principles", "theory"),
        ("set up the board correctly", "setup"),
    ];
    for (title, area) in titles {
        store.put_task(Task::new(project_id, title, area)).await.unwrap();
    }

    let learnings = vec![
        LearningDraft {
            content: "the king is in check when threatened".to_string(),
            chunk_type: ChunkType::Insight,
            tags: vec!["chess".to_string()],
            confidence: Confidence::Verified,
            related_chunks: vec![],
        },
        LearningDraft {
            content: "checkmate ends the game".to_string(),
            chunk_type: ChunkType::Insight,
            tags: vec!["chess".to_string()],
            confidence: Confidence::Verified,
            related_chunks: vec![],
        },
        LearningDraft {
            content: "a king cannot move into check".to_string(),
            chunk_type: ChunkType::Insight,
            tags: vec!["chess".to_string()],
            confidence: Confidence::Verified,
            related_chunks: vec![],
        },
    ];
    let executor = ScriptedExecutor::new(vec![ExecutionResult {
        status: ExecutionStatus::Complete,
        outcome_text: Some("documented check and checkmate rules".to_string()),
        learnings,
        new_questions: vec![],
        follow_up_tasks: vec![],
    }]);

    let embedder = DeterministicHashProvider::new(32);
    let config = Config::default();
    let driver = CycleDriver::new(&store, &embedder, &executor, &config);

    let report = driver.run_cycle(project_id, Uuid::new_v4()).await.unwrap();
    assert_eq!(report.tick, 1);
    assert_eq!(report.result_status, Some(ExecutionStatus::Complete));

    let done = store.tasks_by_status(project_id, TaskStatus::Done).await.unwrap();
    assert_eq!(done.len(), 1);

    let chunks = store.query_chunks(project_id, ChunkFilter::default()).await.unwrap();
    let learning_chunks: Vec<_> = chunks.iter().filter(|c| c.chunk_type == ChunkType::Insight).collect();
    assert_eq!(learning_chunks.len(), 3);
    for chunk in &learning_chunks {
        assert_eq!(chunk.tick_created, 1);
        assert!(chunk.embedding.as_ref().unwrap().iter().any(|x| *x != 0.0));
    }

    let activities = store.recent_activities(project_id, 20).await.unwrap();
    assert!(activities.iter().any(|a| a.action == "Starting"));
    assert!(activities.iter().any(|a| a.action == "Completed"));
    assert_eq!(activities.iter().filter(|a| a.action == "LearningStored").count(), 3);
}

#[tokio::test]
async fn pivot_on_answered_question_cancels_queued_tasks_and_rewrites_orientation() {
    let store = Store::open_in_memory().await.unwrap();
    let project_id = Uuid::new_v4();
    store.initialize_project(project_id).await.unwrap();

    let goal = Goal::new(project_id, "Ship the chess tutorial");
    store.activate_goal(goal).await.unwrap();

    let mut blocked_task = Task::new(project_id, "write endgame chapter", "writing");
    let question = Question::new(project_id, "should the tutorial cover blitz variants?", "scoping the endgame chapter");
    blocked_task.blocked_by.push(question.id);
    blocked_task.status = TaskStatus::Blocked;
    store.put_task(blocked_task.clone()).await.unwrap();
    store.put_question(question.clone()).await.unwrap();

    let queued_task = Task::new(project_id, "write opening chapter", "writing");
    store.put_task(queued_task.clone()).await.unwrap();

    let executor = ScriptedExecutor::new(vec![]);
    let embedder = DeterministicHashProvider::new(32);
    let mut config = Config::default();
    config.pivot_keyword_list = vec!["never mind".to_string()];
    let driver = CycleDriver::new(&store, &embedder, &executor, &config);

    let outcome = driver
        .answer_question(project_id, question.id, "never mind, forget the endgame chapter entirely".to_string(), 1)
        .await
        .unwrap();

    assert!(outcome.pivot_detected);
    assert!(outcome.cancelled_tasks.contains(&queued_task.id));

    let tasks = store.tasks_by_project(project_id).await.unwrap();
    let queued_after = tasks.iter().find(|t| t.id == queued_task.id).unwrap();
    assert_eq!(queued_after.status, TaskStatus::Cancelled);

    let activities = store.recent_activities(project_id, 20).await.unwrap();
    assert!(activities.iter().any(|a| a.action == "Pivot"));

    let orientation = store.current_orientation(project_id).await.unwrap().unwrap();
    assert!(orientation.key_decisions.iter().any(|d| d.contains("pivot")));
}
