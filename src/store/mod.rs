//! Durable, transactional persistence (spec §4.1).
//!
//! One `rusqlite::Connection` per `Store`, guarded by a `tokio::sync::Mutex`
//! and driven through blocking closures executed via `spawn_blocking` —
//! the same shape as the teacher's `SqliteTaskQueue` in
//! `orchestrator::queue`. The live vector index is an in-memory
//! `Vec<(Uuid, Vec<f32>)>` per project, rebuilt from the `chunk_embeddings`
//! table at `Store::open` and kept in sync on every write, matching
//! `memory::vector::VectorMemory`'s cache-plus-linear-scan design.

mod chunks;
mod codec;
mod entities;
mod relationships;
mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::AgentState;
use crate::error::{Error, Result};

pub use chunks::ChunkFilter;

/// In-memory cosine-similarity index for one project, rebuilt at startup.
#[derive(Default)]
pub struct VectorIndex {
    entries: Vec<(Uuid, Vec<f32>)>,
}

impl VectorIndex {
    fn upsert(&mut self, id: Uuid, vector: Vec<f32>) {
        if let Some(slot) = self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            slot.1 = vector;
        } else {
            self.entries.push((id, vector));
        }
    }

    fn remove(&mut self, id: Uuid) {
        self.entries.retain(|(eid, _)| *eid != id);
    }

    /// Cosine similarity via dot product over the (not pre-normalized)
    /// stored vectors, matching spec §4.1's determinism requirement.
    fn search(&self, query: &[f32], k: usize, min_similarity: f32, allowed: &[Uuid]) -> Vec<(Uuid, f32)> {
        let mut scored: Vec<(Uuid, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| allowed.is_empty() || allowed.contains(id))
            .filter_map(|(id, v)| cosine_similarity(query, v).map(|sim| (*id, sim)))
            .filter(|(_, sim)| *sim >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        None
    } else {
        Some(dot / (na * nb))
    }
}

pub struct Store {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    /// One vector index per project, guarded independently of the
    /// connection so readers don't contend with unrelated writers
    /// (spec §5's "single writer, multiple readers between writes").
    vectors: Arc<RwLock<HashMap<Uuid, VectorIndex>>>,
}

impl Store {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let path_for_init = db_path.clone();

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path_for_init)?;
            schema::initialize(&conn)?;
            Ok(conn)
        })
        .await??;

        let store = Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
            vectors: Arc::new(RwLock::new(HashMap::new())),
        };

        store.rebuild_vector_cache().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::from)?;
        schema::initialize(&conn).map_err(Error::from)?;
        Ok(Self {
            db_path: PathBuf::new(),
            conn: Arc::new(Mutex::new(conn)),
            vectors: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run a blocking closure against the connection, holding the async
    /// mutex for the duration. The closure runs on the current (blocking-
    /// tolerant) task; callers on the async runtime should expect this to
    /// occupy a worker thread briefly, matching the teacher's
    /// `spawn_blocking`-per-statement pattern but sharing one connection
    /// rather than reopening the file each call.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            f(&guard)
        })
        .await?
    }

    async fn with_conn_mut<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            f(&mut guard)
        })
        .await?
    }

    async fn rebuild_vector_cache(&self) -> Result<()> {
        let rows: Vec<(Uuid, Uuid, Vec<u8>)> = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT project_id, chunk_id, vector FROM chunk_embeddings",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        let project_id: String = row.get(0)?;
                        let chunk_id: String = row.get(1)?;
                        let vector: Vec<u8> = row.get(2)?;
                        Ok((project_id, chunk_id, vector))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let mut out = Vec::with_capacity(rows.len());
                for (p, c, v) in rows {
                    let pid = Uuid::parse_str(&p).map_err(|e| Error::Corruption(e.to_string()))?;
                    let cid = Uuid::parse_str(&c).map_err(|e| Error::Corruption(e.to_string()))?;
                    out.push((pid, cid, v));
                }
                Ok(out)
            })
            .await?;

        let mut vectors = self.vectors.write().await;
        for (project_id, chunk_id, blob) in rows {
            let index = vectors.entry(project_id).or_default();
            index.upsert(chunk_id, codec::decode_vector(&blob));
        }
        Ok(())
    }

    pub(crate) async fn index_upsert(&self, project_id: Uuid, chunk_id: Uuid, vector: Vec<f32>) {
        let mut vectors = self.vectors.write().await;
        vectors.entry(project_id).or_default().upsert(chunk_id, vector);
    }

    pub(crate) async fn index_remove(&self, project_id: Uuid, chunk_id: Uuid) {
        let mut vectors = self.vectors.write().await;
        if let Some(idx) = vectors.get_mut(&project_id) {
            idx.remove(chunk_id);
        }
    }

    /// Given a query vector, return the k highest cosine-similar chunk ids
    /// with their similarities, optionally restricted to a set of allowed
    /// ids (the caller — `retrieval::semantic` — pre-filters by status).
    pub async fn vector_search(
        &self,
        project_id: Uuid,
        query: &[f32],
        k: usize,
        min_similarity: f32,
        allowed: &[Uuid],
    ) -> Vec<(Uuid, f32)> {
        let vectors = self.vectors.read().await;
        match vectors.get(&project_id) {
            Some(idx) => idx.search(query, k, min_similarity, allowed),
            None => Vec::new(),
        }
    }

    // ---- Clock / AgentState (spec §4.2) ----

    pub async fn initialize_project(&self, project_id: Uuid) -> Result<AgentState> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<(i64, i64, i64)> = tx
                .query_row(
                    "SELECT current_tick, last_decay_tick, last_consolidation_tick FROM agent_state WHERE project_id = ?1",
                    [project_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .ok();

            let state = if let Some((tick, decay, consolidation)) = existing {
                AgentState {
                    project_id,
                    current_tick: tick as u64,
                    last_decay_tick: decay as u64,
                    last_consolidation_tick: consolidation as u64,
                }
            } else {
                tx.execute(
                    "INSERT INTO agent_state (project_id, current_tick, last_decay_tick, last_consolidation_tick) VALUES (?1, 0, 0, 0)",
                    [project_id.to_string()],
                )?;
                AgentState::new(project_id)
            };
            tx.commit()?;
            Ok(state)
        })
        .await
    }

    pub async fn load_agent_state(&self, project_id: Uuid) -> Result<AgentState> {
        self.with_conn(move |conn| {
            let (tick, decay, consolidation): (i64, i64, i64) = conn
                .query_row(
                    "SELECT current_tick, last_decay_tick, last_consolidation_tick FROM agent_state WHERE project_id = ?1",
                    [project_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .map_err(|_| Error::not_found("agent_state", project_id))?;
            Ok(AgentState {
                project_id,
                current_tick: tick as u64,
                last_decay_tick: decay as u64,
                last_consolidation_tick: consolidation as u64,
            })
        })
        .await
    }

    /// Atomically `current_tick += 1`, returning the new value. Invoked
    /// exactly once at the start of each agent cycle (spec §4.2).
    pub async fn increment_tick(&self, project_id: Uuid) -> Result<u64> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE agent_state SET current_tick = current_tick + 1 WHERE project_id = ?1",
                [project_id.to_string()],
            )?;
            let new_tick: i64 = tx.query_row(
                "SELECT current_tick FROM agent_state WHERE project_id = ?1",
                [project_id.to_string()],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(new_tick as u64)
        })
        .await
    }

    pub async fn mark_decay_ran(&self, project_id: Uuid) -> Result<()> {
        self.with_conn_mut(move |conn| {
            conn.execute(
                "UPDATE agent_state SET last_decay_tick = current_tick WHERE project_id = ?1",
                [project_id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn mark_consolidation_ran(&self, project_id: Uuid) -> Result<()> {
        self.with_conn_mut(move |conn| {
            conn.execute(
                "UPDATE agent_state SET last_consolidation_tick = current_tick WHERE project_id = ?1",
                [project_id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    /// Drop and recreate every table for a project (CLI `reset`). Scoped to
    /// a single project's rows rather than the whole database file, since a
    /// store may (in principle) host more than one project.
    pub async fn reset_project(&self, project_id: Uuid) -> Result<()> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let pid = project_id.to_string();
            for table in [
                "agent_state", "orientation", "goals", "pending_goals", "tasks",
                "questions", "activities", "coherence_warnings", "chunks",
                "chunk_embeddings", "chunks_archive", "relationships",
                "relationships_archive", "coretrieval",
            ] {
                tx.execute(&format!("DELETE FROM {table} WHERE project_id = ?1"), [&pid])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        let mut vectors = self.vectors.write().await;
        vectors.remove(&project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_project_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let s1 = store.initialize_project(pid).await.unwrap();
        assert_eq!(s1.current_tick, 0);
        let s2 = store.initialize_project(pid).await.unwrap();
        assert_eq!(s2.current_tick, 0);
    }

    #[tokio::test]
    async fn increment_tick_is_monotonic() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();
        assert_eq!(store.increment_tick(pid).await.unwrap(), 1);
        assert_eq!(store.increment_tick(pid).await.unwrap(), 2);
        let state = store.load_agent_state(pid).await.unwrap();
        assert_eq!(state.current_tick, 2);
    }

    #[tokio::test]
    async fn vector_search_respects_min_similarity_and_k() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.index_upsert(pid, a, vec![1.0, 0.0]).await;
        store.index_upsert(pid, b, vec![0.0, 1.0]).await;
        let results = store.vector_search(pid, &[1.0, 0.0], 5, 0.5, &[]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
    }
}
