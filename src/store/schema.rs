//! Idempotent schema creation (spec §4.1's "migration mechanism").
//!
//! Every table is created with `CREATE TABLE IF NOT EXISTS`; future schema
//! changes append further `CREATE TABLE IF NOT EXISTS` / `ALTER TABLE`
//! statements keyed off `schema_meta.version` rather than replacing this
//! function wholesale.

use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS schema_meta (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agent_state (
            project_id TEXT PRIMARY KEY,
            current_tick INTEGER NOT NULL,
            last_decay_tick INTEGER NOT NULL,
            last_consolidation_tick INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orientation (
            project_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            vision_summary TEXT NOT NULL,
            success_criteria TEXT NOT NULL,
            constraints TEXT NOT NULL,
            skill_map TEXT NOT NULL,
            current_phase TEXT NOT NULL,
            key_decisions TEXT NOT NULL,
            active_priorities TEXT NOT NULL,
            progress_snapshot TEXT NOT NULL,
            last_rewritten TEXT NOT NULL,
            last_rewritten_tick INTEGER NOT NULL DEFAULT 0,
            is_current INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (project_id, version)
        );

        CREATE TABLE IF NOT EXISTS goals (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            goal_text TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            activated_at TEXT,
            superseded_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_goals_project ON goals(project_id, status);

        CREATE TABLE IF NOT EXISTS pending_goals (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            goal_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pending_phase_transitions (
            project_id TEXT PRIMARY KEY,
            phase TEXT NOT NULL,
            requested_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            skill_area TEXT NOT NULL,
            status TEXT NOT NULL,
            depends_on TEXT NOT NULL,
            blocked_by TEXT NOT NULL,
            outcome TEXT,
            failure_reason TEXT,
            failure_context TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            failed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project_status ON tasks(project_id, status);
        CREATE INDEX IF NOT EXISTS idx_tasks_skill_area ON tasks(project_id, skill_area);

        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            question TEXT NOT NULL,
            context TEXT NOT NULL,
            status TEXT NOT NULL,
            answer TEXT,
            blocks_tasks TEXT NOT NULL,
            asked_at TEXT NOT NULL,
            answered_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_questions_project_status ON questions(project_id, status);

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            tick INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_activities_project_tick ON activities(project_id, tick);

        CREATE TABLE IF NOT EXISTS coherence_warnings (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            task_id TEXT NOT NULL,
            concern TEXT NOT NULL,
            suggestion TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolution TEXT,
            resolved_at TEXT
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            content TEXT NOT NULL,
            chunk_type TEXT NOT NULL,
            tags TEXT NOT NULL,
            confidence TEXT NOT NULL,
            source TEXT NOT NULL,
            tick_created INTEGER NOT NULL,
            tick_last_accessed INTEGER NOT NULL,
            tick_last_useful INTEGER NOT NULL,
            learning_context TEXT NOT NULL,
            initial_strength REAL NOT NULL,
            current_strength REAL NOT NULL,
            decay_function TEXT NOT NULL,
            decay_rate REAL NOT NULL,
            access_count INTEGER NOT NULL,
            successful_uses INTEGER NOT NULL,
            last_accessed TEXT,
            last_useful TEXT,
            status TEXT NOT NULL,
            pinned INTEGER NOT NULL,
            superseded_by TEXT,
            valid_until_tick INTEGER,
            persistence_score REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_project_status ON chunks(project_id, status);
        CREATE INDEX IF NOT EXISTS idx_chunks_project_type ON chunks(project_id, chunk_type);

        CREATE TABLE IF NOT EXISTS chunk_embeddings (
            chunk_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            vector BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_embeddings_project ON chunk_embeddings(project_id);

        CREATE TABLE IF NOT EXISTS chunks_archive (
            chunk_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            content_summary TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            tick_archived INTEGER NOT NULL,
            final_strength REAL NOT NULL,
            final_context TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relationships (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            from_chunk_id TEXT NOT NULL,
            to_chunk_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            weight REAL NOT NULL,
            activation_count INTEGER NOT NULL,
            last_activated TEXT,
            context_tags TEXT NOT NULL,
            origin TEXT NOT NULL,
            UNIQUE(from_chunk_id, to_chunk_id, relationship_type)
        );
        CREATE INDEX IF NOT EXISTS idx_rel_from ON relationships(from_chunk_id);
        CREATE INDEX IF NOT EXISTS idx_rel_to ON relationships(to_chunk_id);

        CREATE TABLE IF NOT EXISTS relationships_archive (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            from_chunk_id TEXT NOT NULL,
            to_chunk_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            final_weight REAL NOT NULL,
            reason TEXT NOT NULL,
            archived_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS coretrieval (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            chunk_a_id TEXT NOT NULL,
            chunk_b_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            query_context TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_coretrieval_pair ON coretrieval(chunk_a_id, chunk_b_id);
        CREATE INDEX IF NOT EXISTS idx_coretrieval_project_ts ON coretrieval(project_id, timestamp);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (id, version) VALUES (0, ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
