//! Persistence score: a ranking-only `[0,1]` composite (spec §4.3).
//!
//! Never overwrites `current_strength`; recomputed periodically (on write,
//! reactivation, and consolidation) and stored on the chunk purely as a
//! ranking input for retrieval and consolidation decisions.

use super::chunk::{Chunk, ChunkType, Confidence, Source};

const FREQUENCY_K: f64 = 0.3;
const MAX_CONNECTIONS: f64 = 15.0;
const RECENCY_TAU: f64 = 50.0;

const W_FREQUENCY: f64 = 0.25;
const W_SALIENCE: f64 = 0.30;
const W_CONNECTION: f64 = 0.15;
const W_RECENCY: f64 = 0.15;
const W_IMPORTANCE: f64 = 0.15;

fn type_salience(t: ChunkType) -> f64 {
    match t {
        ChunkType::UserInput => 1.0,
        ChunkType::Decision => 0.9,
        ChunkType::Insight => 0.8,
        ChunkType::Research => 0.6,
        ChunkType::Attempt => 0.5,
        ChunkType::Procedure | ChunkType::Question | ChunkType::Resource => 0.5,
    }
}

fn source_multiplier(s: Source) -> f64 {
    match s {
        Source::User => 1.0,
        Source::Experiment => 0.85,
        Source::Deduction => 0.75,
        Source::Research => 0.7,
    }
}

fn confidence_multiplier(c: Confidence) -> f64 {
    match c {
        Confidence::Verified => 1.0,
        Confidence::Inferred => 0.75,
        Confidence::Speculative => 0.5,
    }
}

/// Compute the persistence score for a chunk given its live relationship
/// count (the Store knows this; the memory engine does not track edges
/// itself) and the project's current tick.
pub fn persistence_score(chunk: &Chunk, relationship_count: usize, current_tick: u64) -> f64 {
    let frequency = 1.0 - (-FREQUENCY_K * chunk.access_count as f64).exp();

    let salience = type_salience(chunk.chunk_type)
        * source_multiplier(chunk.source)
        * confidence_multiplier(chunk.confidence);

    let connection = (relationship_count as f64 / MAX_CONNECTIONS).min(1.0);

    let recency = if chunk.access_count == 0 {
        0.0
    } else {
        let elapsed = current_tick.saturating_sub(chunk.tick_last_accessed) as f64;
        (-elapsed / RECENCY_TAU).exp()
    };

    let importance = if chunk.pinned {
        1.0
    } else if chunk.has_important_tag() {
        0.7
    } else {
        0.4
    };

    let score = W_FREQUENCY * frequency
        + W_SALIENCE * salience
        + W_CONNECTION * connection
        + W_RECENCY * recency
        + W_IMPORTANCE * importance;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let sum = W_FREQUENCY + W_SALIENCE + W_CONNECTION + W_RECENCY + W_IMPORTANCE;
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn never_accessed_chunk_has_zero_recency() {
        let chunk = crate::memory::chunk::Chunk::new(
            uuid::Uuid::new_v4(),
            "x",
            ChunkType::Research,
            vec![],
            Confidence::Verified,
            Source::Research,
            0,
            crate::memory::chunk::LearningContext::default(),
            false,
        );
        let score = persistence_score(&chunk, 0, 100);
        // access_count == 0 -> frequency == 0, recency == 0; only
        // salience/connection/importance terms survive.
        assert!(score > 0.0);
        assert!(score < 1.0);
    }

    #[test]
    fn pinned_chunk_gets_full_importance_term() {
        let mut chunk = crate::memory::chunk::Chunk::new(
            uuid::Uuid::new_v4(),
            "x",
            ChunkType::Research,
            vec![],
            Confidence::Verified,
            Source::Research,
            0,
            crate::memory::chunk::LearningContext::default(),
            true,
        );
        chunk.pinned = true;
        let unpinned_importance_score = {
            let mut c2 = chunk.clone();
            c2.pinned = false;
            persistence_score(&c2, 0, 0)
        };
        let pinned_score = persistence_score(&chunk, 0, 0);
        assert!(pinned_score > unpinned_importance_score);
    }
}
