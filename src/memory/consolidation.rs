//! Consolidation pass: tombstone archival, cool-chunk summarization, and
//! triggering the implicit-relationship job (spec §4.3 "Consolidation").

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ChunkArchive;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::{ChunkFilter, Store};

use super::chunk::ChunkStatus;
use super::implicit::run_implicit_relationship_job;
use super::relationship::RelationshipType;

/// Length a summarized chunk's content is truncated to when no executor is
/// available to generate a proper summary (spec §4.3: "a prefix truncation
/// is acceptable").
const SUMMARY_PREFIX_CHARS: usize = 240;

fn content_hash(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn truncate_to_summary(content: &str) -> String {
    if content.chars().count() <= SUMMARY_PREFIX_CHARS {
        content.to_string()
    } else {
        let mut summary: String = content.chars().take(SUMMARY_PREFIX_CHARS).collect();
        summary.push('\u{2026}');
        summary
    }
}

#[derive(Debug, Default)]
pub struct ConsolidationReport {
    pub archived_tombstones: usize,
    pub summarized_cool_chunks: usize,
    pub implicit_edges_created: usize,
    pub implicit_edges_strengthened: usize,
}

pub struct Consolidator<'a> {
    store: &'a Store,
    embedder: Option<&'a dyn EmbeddingProvider>,
}

impl<'a> Consolidator<'a> {
    pub fn new(store: &'a Store, embedder: Option<&'a dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// One full consolidation pass for a project (spec §4.3 steps 1-3).
    pub async fn run(
        &self,
        project_id: Uuid,
        current_tick: u64,
        tombstone_retention_ticks: u64,
        summarise_age_ticks: u64,
        coretrieval_threshold: usize,
        coretrieval_retention_days: i64,
    ) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();

        report.archived_tombstones = self
            .archive_tombstones(project_id, current_tick, tombstone_retention_ticks)
            .await?;
        report.summarized_cool_chunks = self
            .summarize_stale_cool_chunks(project_id, current_tick, summarise_age_ticks)
            .await?;

        let cutoff = Utc::now() - chrono::Duration::days(coretrieval_retention_days);
        let implicit = run_implicit_relationship_job(self.store, project_id, coretrieval_threshold, cutoff).await?;
        report.implicit_edges_created = implicit.created;
        report.implicit_edges_strengthened = implicit.strengthened;

        Ok(report)
    }

    /// Step 1: archive tombstones past the retention window, transferring
    /// outgoing edges to any `replaces` target at 50% weight and dropping
    /// the rest.
    async fn archive_tombstones(&self, project_id: Uuid, current_tick: u64, retention_ticks: u64) -> Result<usize> {
        let filter = ChunkFilter { status: Some(vec![ChunkStatus::Tombstone]), ..Default::default() };
        let tombstones = self.store.query_chunks(project_id, filter).await?;
        let mut archived = 0usize;

        for chunk in tombstones {
            let age = current_tick.saturating_sub(chunk.tick_last_accessed);
            if age < retention_ticks {
                continue;
            }

            let outgoing = self.store.relationships_by_endpoint(chunk.id, true).await?;
            let replaces_target = outgoing
                .iter()
                .find(|r| r.relationship_type == RelationshipType::Replaces)
                .map(|r| r.to_chunk_id);

            if let Some(target) = replaces_target {
                for rel in &outgoing {
                    if rel.relationship_type == RelationshipType::Replaces {
                        continue;
                    }
                    let transferred = super::relationship::Relationship::new(
                        project_id,
                        target,
                        rel.to_chunk_id,
                        rel.relationship_type,
                        rel.weight * 0.5,
                        super::relationship::Origin::Implicit,
                    );
                    self.store.put_relationship(transferred).await?;
                }
            }
            for rel in outgoing {
                self.store
                    .archive_and_delete_relationship(&rel, "source chunk tombstoned")
                    .await?;
            }

            let archive = ChunkArchive {
                chunk_id: chunk.id,
                project_id,
                content_summary: truncate_to_summary(&chunk.content),
                content_hash: content_hash(&chunk.content),
                tick_archived: current_tick,
                final_strength: chunk.current_strength,
                final_context: chunk.learning_context.query_context.clone(),
            };
            self.store.archive_chunk(archive).await?;
            self.store.delete_chunk(project_id, chunk.id).await?;
            archived += 1;
        }

        Ok(archived)
    }

    /// Step 2: replace stale cool chunks' content with a compact summary,
    /// re-embedding it if an embedder is available.
    async fn summarize_stale_cool_chunks(&self, project_id: Uuid, current_tick: u64, summarise_age: u64) -> Result<usize> {
        let filter = ChunkFilter { status: Some(vec![ChunkStatus::Cool]), ..Default::default() };
        let candidates = self.store.query_chunks(project_id, filter).await?;
        let mut summarized = 0usize;

        for mut chunk in candidates {
            let age = current_tick.saturating_sub(chunk.tick_last_accessed);
            if age < summarise_age {
                continue;
            }
            let summary = truncate_to_summary(&chunk.content);
            if summary == chunk.content {
                continue;
            }
            chunk.content = summary.clone();
            chunk.embedding = match self.embedder {
                Some(embedder) => embedder.embed(&summary).await.ok(),
                None => None,
            };
            self.store.put_chunk(chunk).await?;
            summarized += 1;
        }

        Ok(summarized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::chunk::{Chunk, ChunkType, Confidence, LearningContext, Source};
    use crate::memory::relationship::{Origin, Relationship};

    fn long_content() -> String {
        "x".repeat(500)
    }

    #[tokio::test]
    async fn tombstones_past_retention_are_archived_and_removed() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut chunk = Chunk::new(
            pid, long_content(), ChunkType::Attempt, vec![], Confidence::Inferred, Source::Experiment, 0,
            LearningContext::default(), false,
        );
        chunk.status = ChunkStatus::Tombstone;
        chunk.current_strength = 0.0;
        chunk.tick_last_accessed = 0;
        let id = chunk.id;
        store.put_chunk(chunk).await.unwrap();

        let consolidator = Consolidator::new(&store, None);
        let report = consolidator.run(pid, 1000, 100, 500, 3, 30).await.unwrap();
        assert_eq!(report.archived_tombstones, 1);

        let archive = store.get_chunk_archive(id).await.unwrap();
        assert!(archive.is_some());
        assert!(store.get_chunk(pid, id).await.is_err());
    }

    #[tokio::test]
    async fn tombstone_transfers_edges_to_replaces_target_at_half_weight() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();

        let mut old = Chunk::new(
            pid, long_content(), ChunkType::Research, vec![], Confidence::Inferred, Source::Research, 0,
            LearningContext::default(), false,
        );
        old.status = ChunkStatus::Tombstone;
        old.current_strength = 0.0;
        old.tick_last_accessed = 0;
        let old_id = old.id;

        let replacement = Chunk::new(
            pid, "new version", ChunkType::Insight, vec![], Confidence::Verified, Source::Research, 10,
            LearningContext::default(), false,
        );
        let replacement_id = replacement.id;

        let other = Chunk::new(
            pid, "related fact", ChunkType::Research, vec![], Confidence::Inferred, Source::Research, 0,
            LearningContext::default(), false,
        );
        let other_id = other.id;

        store.put_chunk(old).await.unwrap();
        store.put_chunk(replacement).await.unwrap();
        store.put_chunk(other).await.unwrap();

        store
            .put_relationship(Relationship::new(pid, old_id, replacement_id, RelationshipType::Replaces, 1.0, Origin::Explicit))
            .await
            .unwrap();
        store
            .put_relationship(Relationship::new(pid, old_id, other_id, RelationshipType::Supports, 0.8, Origin::Explicit))
            .await
            .unwrap();

        let consolidator = Consolidator::new(&store, None);
        consolidator.run(pid, 1000, 100, 500, 3, 30).await.unwrap();

        let transferred = store
            .find_relationship(replacement_id, other_id, RelationshipType::Supports)
            .await
            .unwrap();
        assert!(transferred.is_some());
        assert!((transferred.unwrap().weight - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stale_cool_chunks_get_summarized() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut chunk = Chunk::new(
            pid, long_content(), ChunkType::Research, vec![], Confidence::Inferred, Source::Research, 0,
            LearningContext::default(), false,
        );
        chunk.status = ChunkStatus::Cool;
        chunk.tick_last_accessed = 0;
        let id = chunk.id;
        store.put_chunk(chunk).await.unwrap();

        let consolidator = Consolidator::new(&store, None);
        let report = consolidator.run(pid, 1000, 100000, 500, 3, 30).await.unwrap();
        assert_eq!(report.summarized_cool_chunks, 1);

        let reloaded = store.get_chunk(pid, id).await.unwrap();
        assert!(reloaded.content.len() < 500);
    }
}
