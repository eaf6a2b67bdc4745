//! Relationship-graph traversal source (spec §4.3 "Traverse", §4.4 graph
//! fusion source).

use uuid::Uuid;

use crate::error::Result;
use crate::memory::relationship::{traversal_score, Direction, RelationshipType};
use crate::store::Store;

fn recency_factor(current_tick: u64, tick_last_accessed: u64, access_count: u32) -> f64 {
    if access_count == 0 {
        return 1.0;
    }
    let elapsed = current_tick.saturating_sub(tick_last_accessed) as f64;
    1.0 - 0.3 * (-elapsed / 10.0).exp()
}

/// Expand from one seed chunk, returning connected chunks ranked by
/// `weight * recency_factor * context_match` descending (spec §4.3's
/// `Traverse` formula). `context_match` is left at 1.0 here; the caller
/// (`retrieval::mod`) applies the query-specific context boost afterward so
/// graph edges don't get scored against context twice.
pub async fn traverse(
    store: &Store,
    project_id: Uuid,
    seed: Uuid,
    current_tick: u64,
    relationship_type: Option<RelationshipType>,
    min_weight: f64,
    direction: Direction,
    limit: usize,
) -> Result<Vec<(Uuid, f64)>> {
    let mut edges = Vec::new();
    if matches!(direction, Direction::Outgoing | Direction::Both) {
        edges.extend(store.relationships_by_endpoint(seed, true).await?);
    }
    if matches!(direction, Direction::Incoming | Direction::Both) {
        edges.extend(store.relationships_by_endpoint(seed, false).await?);
    }

    let mut scored = Vec::new();
    for edge in edges {
        if edge.weight < min_weight {
            continue;
        }
        if let Some(rt) = relationship_type {
            if edge.relationship_type != rt {
                continue;
            }
        }
        let other = if edge.from_chunk_id == seed { edge.to_chunk_id } else { edge.from_chunk_id };
        if other == seed {
            continue;
        }
        let chunk = match store.get_chunk(project_id, other).await {
            Ok(c) => c,
            Err(_) => continue,
        };
        let rf = recency_factor(current_tick, chunk.tick_last_accessed, chunk.access_count);
        scored.push((other, traversal_score(edge.weight, rf, 1.0)));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// Expand from several seeds at once (used as a hybrid-fusion source),
/// deduplicating by keeping each chunk's best score across seeds.
pub async fn expand_from_seeds(
    store: &Store,
    project_id: Uuid,
    seeds: &[Uuid],
    current_tick: u64,
    limit: usize,
) -> Result<Vec<(Uuid, f64)>> {
    use std::collections::HashMap;
    let mut best: HashMap<Uuid, f64> = HashMap::new();
    for &seed in seeds {
        let edges = traverse(store, project_id, seed, current_tick, None, 0.0, Direction::Both, limit).await?;
        for (id, score) in edges {
            best.entry(id).and_modify(|s| *s = s.max(score)).or_insert(score);
        }
    }
    let mut scored: Vec<(Uuid, f64)> = best.into_iter().collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}
