//! Implicit-relationship formation and contradiction cascades (spec §4.5).
//!
//! Runs as part of consolidation, never on the hot retrieval path.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;

use super::relationship::{
    canonical_pair, Origin, Relationship, RelationshipType, STRENGTHEN_DELTA, WEAKEN_DELTA_CONTRADICTION,
};

/// Default initial weight for a freshly implied `related_to` edge.
const IMPLICIT_INITIAL_WEIGHT: f64 = 0.2;

#[derive(Debug, Default)]
pub struct ImplicitJobReport {
    pub created: usize,
    pub strengthened: usize,
    pub pruned_coretrievals: usize,
}

/// Step 1+2+3 of spec §4.5: group co-retrieval rows by pair, promote pairs
/// past the session threshold to a `related_to` edge (or strengthen an
/// existing one), then prune old co-retrieval signal.
pub async fn run_implicit_relationship_job(
    store: &Store,
    project_id: Uuid,
    coretrieval_threshold: usize,
    retention_cutoff: DateTime<Utc>,
) -> Result<ImplicitJobReport> {
    let mut report = ImplicitJobReport::default();
    let counts = store.coretrieval_session_counts(project_id).await?;

    for (a, b, session_count) in counts {
        if session_count < coretrieval_threshold {
            continue;
        }
        let (from, to) = canonical_pair(a, b);

        match store.find_relationship(from, to, RelationshipType::RelatedTo).await? {
            Some(mut existing) => {
                existing.strengthen(STRENGTHEN_DELTA);
                store.put_relationship(existing).await?;
                report.strengthened += 1;
            }
            None => {
                let edge = Relationship::new(
                    project_id,
                    from,
                    to,
                    RelationshipType::RelatedTo,
                    IMPLICIT_INITIAL_WEIGHT,
                    Origin::Implicit,
                );
                store.put_relationship(edge).await?;
                report.created += 1;
            }
        }
    }

    report.pruned_coretrievals = store.prune_coretrieval_older_than(project_id, retention_cutoff).await?;
    Ok(report)
}

/// Apply the contradiction cascade for a chunk flagged as contradicting
/// `contradicted_id` (spec §4.5, second paragraph). When `replaces` is
/// `true`, the caller has also recorded a `replaces` edge from the
/// contradicting chunk to the contradicted one; this marks the contradicted
/// chunk `superseded_by` so it decays at the `superseded` category rate on
/// the next pass (`memory::decay::category_multiplier` reads `superseded_by`
/// directly).
pub async fn apply_contradiction(
    store: &Store,
    contradicted_id: Uuid,
    contradicting_id: Uuid,
    project_id: Uuid,
    replaces: bool,
) -> Result<()> {
    let outgoing = store.relationships_by_endpoint(contradicted_id, true).await?;
    for mut rel in outgoing {
        rel.weaken(WEAKEN_DELTA_CONTRADICTION);
        if rel.should_archive() {
            store.archive_and_delete_relationship(&rel, "contradiction cascade").await?;
        } else {
            store.put_relationship(rel).await?;
        }
    }

    let mut contradicted = store.get_chunk(project_id, contradicted_id).await?;
    let note = format!("contradicted_by:{contradicting_id}");
    if !contradicted.tags.contains(&note) {
        contradicted.tags.push(note);
    }
    if replaces {
        contradicted.superseded_by = Some(contradicting_id);
    }
    store.put_chunk(contradicted).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CoRetrieval;
    use crate::memory::chunk::{Chunk, ChunkType, Confidence, LearningContext, Source};

    #[tokio::test]
    async fn pair_past_threshold_creates_implicit_edge() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for _ in 0..3 {
            store.record_coretrieval(CoRetrieval::new(pid, a, b, Uuid::new_v4(), "q")).await.unwrap();
        }

        let report = run_implicit_relationship_job(&store, pid, 3, Utc::now() - chrono::Duration::days(365))
            .await
            .unwrap();
        assert_eq!(report.created, 1);

        let (from, to) = canonical_pair(a, b);
        let edge = store.find_relationship(from, to, RelationshipType::RelatedTo).await.unwrap();
        assert!(edge.is_some());
        assert_eq!(edge.unwrap().origin, Origin::Implicit);
    }

    #[tokio::test]
    async fn pair_below_threshold_is_skipped() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.record_coretrieval(CoRetrieval::new(pid, a, b, Uuid::new_v4(), "q")).await.unwrap();

        let report = run_implicit_relationship_job(&store, pid, 3, Utc::now() - chrono::Duration::days(365))
            .await
            .unwrap();
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn contradiction_weakens_outgoing_edges_and_tags_chunk() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();

        let contradicted = Chunk::new(
            pid, "old claim", ChunkType::Research, vec![], Confidence::Inferred, Source::Research, 0,
            LearningContext::default(), false,
        );
        let other = Chunk::new(
            pid, "supporting detail", ChunkType::Research, vec![], Confidence::Inferred, Source::Research, 0,
            LearningContext::default(), false,
        );
        let new_chunk = Chunk::new(
            pid, "new claim", ChunkType::Insight, vec![], Confidence::Verified, Source::Research, 1,
            LearningContext::default(), false,
        );
        let contradicted_id = contradicted.id;
        let other_id = other.id;
        let new_id = new_chunk.id;
        store.put_chunk(contradicted).await.unwrap();
        store.put_chunk(other).await.unwrap();
        store.put_chunk(new_chunk).await.unwrap();

        let edge = Relationship::new(pid, contradicted_id, other_id, RelationshipType::Supports, 0.5, Origin::Explicit);
        store.put_relationship(edge).await.unwrap();

        apply_contradiction(&store, contradicted_id, new_id, pid, true).await.unwrap();

        let remaining = store.relationships_by_endpoint(contradicted_id, true).await.unwrap();
        assert!(remaining.is_empty(), "weight should have dropped below the archive threshold");

        let reloaded = store.get_chunk(pid, contradicted_id).await.unwrap();
        assert_eq!(reloaded.superseded_by, Some(new_id));
        assert!(reloaded.tags.iter().any(|t| t.starts_with("contradicted_by:")));
    }
}
