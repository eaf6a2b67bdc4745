//! Visioneer CLI: a thin shell over the library. Every subcommand is a
//! direct call into `visioneer`'s public API — no business logic lives here.

use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ollama_rs::Ollama;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Terminal,
};
use tracing::{info, Level};
use tracing_appender::rolling;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use visioneer::config::Config;
use visioneer::cycle::CycleDriver;
use visioneer::domain::{GoalStatus, Phase, PendingGoal, PendingPhaseTransition, QuestionStatus, TaskStatus, WarningResolution};
use visioneer::embedding::FastEmbedProvider;
use visioneer::executor::OllamaExecutor;
use visioneer::{Clock, EmbeddingProvider, Executor, OrientationManager, Store};

/// Every database file holds exactly one project, so its identity is
/// derived deterministically from the canonical path rather than tracked
/// in a separate file the CLI would have to keep in sync.
fn project_id_for(database_path: &str) -> Uuid {
    const NAMESPACE: Uuid = Uuid::from_bytes([
        0x4f, 0x61, 0xc8, 0x3a, 0x1c, 0x3e, 0x47, 0x0e, 0x9e, 0x3d, 0x2f, 0x0a, 0x6b, 0x91, 0x5d, 0x07,
    ]);
    let canonical = std::fs::canonicalize(database_path).unwrap_or_else(|_| PathBuf::from(database_path));
    Uuid::new_v5(&NAMESPACE, canonical.to_string_lossy().as_bytes())
}

fn init_logging() {
    let file_appender = rolling::daily("logs", "visioneer.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    std::mem::forget(guard);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(non_blocking)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn build_executor(config: &Config) -> Box<dyn Executor> {
    let mut ollama = Ollama::default();
    if let Some(host) = &config.ollama_host {
        ollama = Ollama::new(host.clone(), 11434);
    }
    Box::new(OllamaExecutor::new(ollama, config.executor_model.clone(), Duration::from_secs(config.executor_timeout_secs)))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let config = Config::load(Some(&PathBuf::from("visioneer.yaml"))).context("failed to load configuration")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    let store = Store::open(&config.database_path).await.context("failed to open store")?;
    let project_id = project_id_for(&config.database_path);
    store.initialize_project(project_id).await.context("failed to initialize project")?;

    match command.as_str() {
        "run" => cmd_run(&store, &config, project_id).await?,
        "loop" => cmd_loop(&store, &config, project_id).await?,
        "status" => cmd_status(&store, project_id).await?,
        "dashboard" => cmd_dashboard(&store, project_id).await?,
        "goal" => cmd_goal(&store, project_id, &args[1..]).await?,
        "phase" => cmd_phase(&store, project_id, &args[1..]).await?,
        "answer" => cmd_answer(&store, &config, project_id, &args[1..]).await?,
        "warnings" => cmd_warnings(&store, project_id, &args[1..]).await?,
        "reset" => {
            store.reset_project(project_id).await.context("failed to reset project")?;
            println!("project reset.");
        }
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        "usage: visioneer <command> [args]\n\n\
         commands:\n  \
         run                              run exactly one agent cycle\n  \
         loop                             run cycles continuously until idle or Ctrl-C\n  \
         status                           print the current AgentState snapshot\n  \
         dashboard                        live ratatui view of tasks/questions/orientation\n  \
         goal set <text>                  set or queue the active goal\n  \
         goal history                     print the goal history\n  \
         phase set <intake|research|planning|execution|refinement|complete>\n  \
                                          queue an explicit phase transition for the next rewrite\n  \
         answer <question-id> <text>      answer an open question\n  \
         warnings list                    list open coherence warnings\n  \
         warnings resolve <id> <exec|skip|edit>   resolve a coherence warning\n  \
         reset                            drop and recreate the project's tables"
    );
}

async fn cmd_run(store: &Store, config: &Config, project_id: Uuid) -> Result<()> {
    let embedder = FastEmbedProvider::new().context("failed to initialize embedding model")?;
    let executor = build_executor(config).await;
    let driver = CycleDriver::new(store, &embedder, executor.as_ref(), config);
    let session_id = Uuid::new_v4();
    let report = driver.run_cycle(project_id, session_id).await.context("cycle failed")?;
    info!("cycle {} complete: {:?}", report.tick, report.result_status);
    println!(
        "tick {}: dispatched={:?} result={:?} coherence_warnings={} orientation_rewritten={} consolidation_ran={} decay_ran={}",
        report.tick,
        report.dispatched_task,
        report.result_status,
        report.coherence_warnings.len(),
        report.orientation_rewritten,
        report.consolidation_ran,
        report.decay_ran,
    );
    Ok(())
}

async fn cmd_loop(store: &Store, config: &Config, project_id: Uuid) -> Result<()> {
    let embedder = FastEmbedProvider::new().context("failed to initialize embedding model")?;
    let executor = build_executor(config).await;
    let driver = CycleDriver::new(store, &embedder, executor.as_ref(), config);

    loop {
        let session_id = Uuid::new_v4();
        let report = driver.run_cycle(project_id, session_id).await.context("cycle failed")?;
        println!("tick {}: dispatched={:?} result={:?}", report.tick, report.dispatched_task, report.result_status);

        let wake = driver.wake_up(project_id).await?;
        if matches!(wake.status, visioneer::cycle::ReadinessStatus::Idle) {
            println!("idle: no ready tasks and no open questions.");
            break;
        }
        if matches!(wake.status, visioneer::cycle::ReadinessStatus::WaitingForUser) {
            println!("waiting for user: all remaining tasks are blocked on open questions.");
            break;
        }
    }
    Ok(())
}

async fn cmd_status(store: &Store, project_id: Uuid) -> Result<()> {
    let clock = Clock::new(store);
    clock.initialize(project_id).await?;
    let manager = OrientationManager::new(store);
    let orientation = manager.current(project_id, "").await?;
    let ready = store.tasks_by_status(project_id, TaskStatus::Ready).await?;
    let in_progress = store.tasks_by_status(project_id, TaskStatus::InProgress).await?;
    let blocked = store.tasks_by_status(project_id, TaskStatus::Blocked).await?;
    let open_questions = store.questions_by_status(project_id, QuestionStatus::Open).await?;
    let goal = store.active_goal(project_id).await?;

    println!("project: {project_id}");
    println!("orientation: v{} phase={:?}", orientation.version, orientation.current_phase);
    println!("active goal: {}", goal.map(|g| g.goal_text).unwrap_or_else(|| "(none)".to_string()));
    println!("tasks: ready={} in_progress={} blocked={}", ready.len(), in_progress.len(), blocked.len());
    println!("open questions: {}", open_questions.len());
    Ok(())
}

async fn cmd_goal(store: &Store, project_id: Uuid, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("set") => {
            let text = args[1..].join(" ");
            if text.trim().is_empty() {
                bail!("usage: visioneer goal set <text>");
            }
            match store.active_goal(project_id).await? {
                None => {
                    let goal = visioneer::domain::Goal::new(project_id, text);
                    store.activate_goal(goal).await?;
                    println!("goal activated immediately (no prior active goal).");
                }
                Some(_) => {
                    let pending = PendingGoal { id: Uuid::new_v4(), project_id, goal_text: text, created_at: chrono::Utc::now() };
                    store.enqueue_pending_goal(pending).await?;
                    println!("goal queued; it will activate at the next cycle boundary.");
                }
            }
        }
        Some("history") => {
            for goal in store.goal_history(project_id).await? {
                println!("[{:?}] {} (created {})", goal.status, goal.goal_text, goal.created_at);
            }
        }
        _ => bail!("usage: visioneer goal set <text> | visioneer goal history"),
    }
    Ok(())
}

/// Queue an explicit phase-transition decision (spec §4.6's "explicit
/// phase-transition decision" trigger); it takes effect at the next
/// orientation rewrite rather than editing the orientation directly.
async fn cmd_phase(store: &Store, project_id: Uuid, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("set") => {
            let name = args.get(1).ok_or_else(|| anyhow::anyhow!("usage: visioneer phase set <phase>"))?;
            let phase = Phase::from_db_str(name).map_err(|_| anyhow::anyhow!("unknown phase '{name}'"))?;
            store
                .request_phase_transition(PendingPhaseTransition { project_id, phase, requested_at: chrono::Utc::now() })
                .await?;
            println!("phase transition to {phase:?} queued; it will apply at the next orientation rewrite.");
        }
        _ => bail!("usage: visioneer phase set <phase>"),
    }
    Ok(())
}

async fn cmd_answer(store: &Store, config: &Config, project_id: Uuid, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("usage: visioneer answer <question-id> <text>");
    }
    let question_id = Uuid::parse_str(&args[0]).context("invalid question id")?;
    let answer = args[1..].join(" ");

    let embedder = FastEmbedProvider::new().context("failed to initialize embedding model")?;
    let executor = build_executor(config).await;
    let driver = CycleDriver::new(store, &embedder, executor.as_ref(), config);
    let clock = Clock::new(store);
    let tick = clock.increment(project_id).await?;

    let outcome = driver.answer_question(project_id, question_id, answer, tick).await?;
    println!("unblocked {} task(s)", outcome.unblocked_tasks.len());
    if outcome.pivot_detected {
        println!("pivot detected: cancelled {} queued task(s); orientation rewritten.", outcome.cancelled_tasks.len());
    }
    Ok(())
}

async fn cmd_warnings(store: &Store, project_id: Uuid, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("list") | None => {
            for warning in store.open_coherence_warnings(project_id).await? {
                println!("[{}] task={} concern={} suggestion={}", warning.id, warning.task_id, warning.concern, warning.suggestion);
            }
        }
        Some("resolve") => {
            if args.len() < 3 {
                bail!("usage: visioneer warnings resolve <id> <exec|skip|edit>");
            }
            let warning_id = Uuid::parse_str(&args[1]).context("invalid warning id")?;
            let resolution = match args[2].as_str() {
                "exec" => WarningResolution::Executed,
                "skip" => WarningResolution::Dismissed,
                "edit" => WarningResolution::Modified,
                other => bail!("unknown resolution '{other}', expected exec|skip|edit"),
            };
            let mut warnings = store.open_coherence_warnings(project_id).await?;
            let warning = warnings.iter_mut().find(|w| w.id == warning_id).ok_or_else(|| anyhow::anyhow!("no open warning with that id"))?;
            warning.resolution = Some(resolution);
            warning.resolved_at = Some(chrono::Utc::now());
            store.put_coherence_warning(warning.clone()).await?;
            println!("warning resolved.");
        }
        Some(other) => bail!("unknown warnings subcommand: {other}"),
    }
    Ok(())
}

async fn cmd_dashboard(store: &Store, project_id: Uuid) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let manager = OrientationManager::new(store);
    loop {
        let orientation = manager.current(project_id, "").await?;
        let ready = store.tasks_by_status(project_id, TaskStatus::Ready).await?;
        let in_progress = store.tasks_by_status(project_id, TaskStatus::InProgress).await?;
        let blocked = store.tasks_by_status(project_id, TaskStatus::Blocked).await?;
        let questions = store.questions_by_status(project_id, QuestionStatus::Open).await?;
        let goal = store.active_goal(project_id).await?;

        terminal.draw(|f| {
            let chunks = Layout::default().direction(Direction::Horizontal).constraints([Constraint::Percentage(60), Constraint::Percentage(40)]).split(f.area());

            let mut task_items: Vec<ListItem> = Vec::new();
            for t in &in_progress {
                task_items.push(ListItem::new(format!("[in_progress] {}", t.title)).style(Style::default().fg(Color::Yellow)));
            }
            for t in &ready {
                task_items.push(ListItem::new(format!("[ready] {}", t.title)));
            }
            for t in &blocked {
                task_items.push(ListItem::new(format!("[blocked] {}", t.title)).style(Style::default().fg(Color::Red)));
            }
            let tasks_list = List::new(task_items).block(Block::default().borders(Borders::ALL).title(" Tasks "));
            f.render_widget(tasks_list, chunks[0]);

            let sidebar = Layout::default().direction(Direction::Vertical).constraints([Constraint::Percentage(50), Constraint::Percentage(50)]).split(chunks[1]);

            let orientation_text = format!(
                "phase: {:?}\nversion: {}\ngoal: {}",
                orientation.current_phase,
                orientation.version,
                goal.as_ref().map(|g| g.goal_text.as_str()).unwrap_or("(none)")
            );
            let orientation_para = Paragraph::new(orientation_text).block(Block::default().borders(Borders::ALL).title(" Orientation "));
            f.render_widget(orientation_para, sidebar[0]);

            let question_items: Vec<ListItem> = questions.iter().map(|q| ListItem::new(q.question.clone())).collect();
            let questions_list = List::new(question_items).block(Block::default().borders(Borders::ALL).title(" Open Questions "));
            f.render_widget(questions_list, sidebar[1]);
        })?;

        if event::poll(Duration::from_millis(500))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
