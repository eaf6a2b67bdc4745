//! Write path, decay pass, and reactivation (spec §4.3).
//!
//! Glues `chunk`, `decay`, and `score` to the Store and the embedding
//! collaborator. Everything here is per-project; callers serialize cycles
//! per project as described in spec §5.

use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::{ChunkFilter, Store};

use super::chunk::{Chunk, ChunkStatus, ChunkType, Confidence, LearningContext, Source};
use super::decay::{apply_decay, strength_to_status};
use super::score::persistence_score;

/// Reactivation crosses back above this normalized strength **and** needs a
/// strong context match to promote a tier (spec §4.3 "strong" threshold
/// reused from §4.4's boosting rule).
const STRONG_CONTEXT_MATCH: f64 = 0.7;

/// Diminishing-returns boost applied on a `useful` signal (spec §4.3).
fn useful_boost(strength: f64) -> f64 {
    (strength + 0.2 * (1.0 - strength)).min(1.0)
}

pub struct MemoryEngine<'a> {
    store: &'a Store,
    embedder: &'a dyn EmbeddingProvider,
}

impl<'a> MemoryEngine<'a> {
    pub fn new(store: &'a Store, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Store a new chunk: assign decay parameters, embed, compute an initial
    /// persistence score, and persist (spec §4.3 "On storing a chunk").
    #[allow(clippy::too_many_arguments)]
    pub async fn write_chunk(
        &self,
        project_id: Uuid,
        content: impl Into<String>,
        chunk_type: ChunkType,
        tags: Vec<String>,
        confidence: Confidence,
        source: Source,
        tick: u64,
        learning_context: LearningContext,
        pinned: bool,
    ) -> Result<Chunk> {
        let content = content.into();
        let mut chunk = Chunk::new(
            project_id,
            content.clone(),
            chunk_type,
            tags,
            confidence,
            source,
            tick,
            learning_context,
            pinned,
        );

        match self.embedder.embed(&content).await {
            Ok(vector) => chunk.embedding = Some(vector),
            Err(_) => {
                // EmbeddingFailure (spec §7): stored without an embedding,
                // retrievable only lexically/graph-wise until a repair job
                // re-embeds it. Not a fatal write error.
                chunk.embedding = None;
            }
        }

        chunk.persistence_score = persistence_score(&chunk, 0, tick);
        self.store.put_chunk(chunk.clone()).await?;
        Ok(chunk)
    }

    /// Apply one decay pass to every live, non-pinned chunk in the project
    /// (spec §4.3 "Decay"). Returns the number of chunks touched.
    pub async fn run_decay(&self, project_id: Uuid, current_tick: u64, last_decay_tick: u64) -> Result<usize> {
        let filter = ChunkFilter {
            status: Some(vec![
                ChunkStatus::Active,
                ChunkStatus::Warm,
                ChunkStatus::Cool,
                ChunkStatus::Cold,
            ]),
            ..Default::default()
        };
        let chunks = self.store.query_chunks(project_id, filter).await?;
        let mut touched = 0usize;
        for mut chunk in chunks {
            if chunk.pinned {
                continue;
            }
            let before = chunk.current_strength;
            apply_decay(&mut chunk, current_tick, last_decay_tick);
            if (chunk.current_strength - before).abs() > f64::EPSILON {
                let relationship_count = self.store.relationship_count(chunk.id).await?;
                chunk.persistence_score = persistence_score(&chunk, relationship_count, current_tick);
                self.store.put_chunk(chunk).await?;
                touched += 1;
            }
        }
        Ok(touched)
    }

    /// Reactivate a chunk returned by retrieval, or one flagged `useful` by
    /// the executor (spec §4.3 "Reactivation").
    pub async fn reactivate(
        &self,
        project_id: Uuid,
        chunk_id: Uuid,
        current_tick: u64,
        useful: bool,
        context_match: f64,
    ) -> Result<Chunk> {
        let mut chunk = self.store.get_chunk(project_id, chunk_id).await?;

        chunk.access_count += 1;
        chunk.tick_last_accessed = current_tick;
        chunk.last_accessed = Some(chrono::Utc::now());

        if useful {
            chunk.successful_uses += 1;
            chunk.tick_last_useful = current_tick;
            chunk.last_useful = Some(chrono::Utc::now());
            chunk.current_strength = useful_boost(chunk.current_strength);

            let target = strength_to_status(chunk.current_strength);
            if target.rank() > chunk.status.rank() && context_match > STRONG_CONTEXT_MATCH {
                if let Some(next) = chunk.status.next_tier_up() {
                    chunk.status = next;
                }
            }
        }

        let relationship_count = self.store.relationship_count(chunk.id).await?;
        chunk.persistence_score = persistence_score(&chunk, relationship_count, current_tick);
        self.store.put_chunk(chunk.clone()).await?;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicHashProvider;

    #[tokio::test]
    async fn write_chunk_gets_embedding_and_decay_policy() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(16);
        let engine = MemoryEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();

        let chunk = engine
            .write_chunk(
                pid,
                "the sky is blue",
                ChunkType::Insight,
                vec![],
                Confidence::Verified,
                Source::Research,
                1,
                LearningContext::default(),
                false,
            )
            .await
            .unwrap();

        assert!(chunk.embedding.is_some());
        assert_eq!(chunk.decay_rate, 0.05);
    }

    #[tokio::test]
    async fn decay_pass_demotes_and_updates_persistence_score() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(16);
        let engine = MemoryEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();

        let chunk = engine
            .write_chunk(
                pid,
                "attempt at something",
                ChunkType::Attempt,
                vec![],
                Confidence::Inferred,
                Source::Experiment,
                0,
                LearningContext::default(),
                false,
            )
            .await
            .unwrap();

        let touched = engine.run_decay(pid, 60, 0).await.unwrap();
        assert_eq!(touched, 1);

        let reloaded = store.get_chunk(pid, chunk.id).await.unwrap();
        assert!(reloaded.current_strength < chunk.current_strength);
        assert_ne!(reloaded.status, ChunkStatus::Active);
    }

    #[tokio::test]
    async fn reactivation_with_strong_context_promotes_one_tier() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(16);
        let engine = MemoryEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();

        let mut chunk = engine
            .write_chunk(
                pid,
                "cool fact",
                ChunkType::Research,
                vec![],
                Confidence::Verified,
                Source::Research,
                0,
                LearningContext::default(),
                false,
            )
            .await
            .unwrap();
        chunk.current_strength = 0.10;
        chunk.status = ChunkStatus::Cool;
        store.put_chunk(chunk.clone()).await.unwrap();

        let reactivated = engine.reactivate(pid, chunk.id, 1, true, 0.9).await.unwrap();
        assert_eq!(reactivated.status, ChunkStatus::Warm);
        assert_eq!(reactivated.access_count, 1);
        assert_eq!(reactivated.successful_uses, 1);
    }

    #[tokio::test]
    async fn reactivation_without_strong_context_does_not_promote() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(16);
        let engine = MemoryEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();

        let mut chunk = engine
            .write_chunk(
                pid,
                "cool fact",
                ChunkType::Research,
                vec![],
                Confidence::Verified,
                Source::Research,
                0,
                LearningContext::default(),
                false,
            )
            .await
            .unwrap();
        chunk.current_strength = 0.10;
        chunk.status = ChunkStatus::Cool;
        store.put_chunk(chunk.clone()).await.unwrap();

        let reactivated = engine.reactivate(pid, chunk.id, 1, true, 0.2).await.unwrap();
        assert_eq!(reactivated.status, ChunkStatus::Cool);
    }
}
