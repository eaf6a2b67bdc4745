//! Reciprocal Rank Fusion across the semantic, lexical, and graph sources
//! (spec §4.4).

use std::collections::HashMap;

use uuid::Uuid;

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const W_SEMANTIC: f64 = 0.40;
pub const W_KEYWORD: f64 = 0.35;
pub const W_GRAPH: f64 = 0.25;

/// `score_rrf(c) = Σ_source w_source · 1 / (k + rank_source(c))`. Each input
/// list is rank-ordered best-first; a chunk absent from a source
/// contributes zero for that source.
pub fn reciprocal_rank_fusion(
    semantic: &[Uuid],
    keyword: &[Uuid],
    graph: &[Uuid],
    k: f64,
) -> HashMap<Uuid, f64> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    for (source, weight) in [(semantic, W_SEMANTIC), (keyword, W_KEYWORD), (graph, W_GRAPH)] {
        for (rank, id) in source.iter().enumerate() {
            *scores.entry(*id).or_insert(0.0) += weight / (k + rank as f64 + 1.0);
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_present_in_all_sources_outranks_single_source_hit() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let semantic = vec![a, b];
        let keyword = vec![a];
        let graph = vec![a];

        let scores = reciprocal_rank_fusion(&semantic, &keyword, &graph, DEFAULT_RRF_K);
        assert!(scores[&a] > scores[&b]);
    }

    #[test]
    fn absent_chunk_contributes_zero() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let scores = reciprocal_rank_fusion(&[a], &[], &[], DEFAULT_RRF_K);
        assert!(!scores.contains_key(&b));
    }
}
