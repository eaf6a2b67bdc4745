//! Retrieval (spec §4.4): query planning, the three search sources, RRF
//! fusion, and context-aware boosting.

pub mod boost;
pub mod fusion;
pub mod graph;
pub mod lexical;
pub mod plan;
pub mod semantic;

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::ConfidenceWeights;
use crate::domain::CoRetrieval;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::memory::chunk::{Chunk, ChunkStatus};
use crate::memory::relationship::Direction;
use crate::store::{ChunkFilter, Store};

use plan::QueryPlan;

/// Mirrors the query-time agent state the spec calls `RetrievalContext`
/// (spec §4.4): `{tick, task_id, goal_id, phase, skill_area, query}`.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    pub tick: u64,
    pub task_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub phase: Option<String>,
    pub skill_area: Option<String>,
    pub query: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub semantic: Option<f64>,
    pub lexical: Option<f64>,
    pub graph: Option<f64>,
    pub context_match: f64,
    pub boost_reason: Option<&'static str>,
    pub confidence_weight: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

const CANDIDATE_POOL: usize = 50;

fn is_live(status: ChunkStatus) -> bool {
    !matches!(status, ChunkStatus::Archived | ChunkStatus::Tombstone)
}

pub struct RetrievalEngine<'a> {
    store: &'a Store,
    embedder: &'a dyn EmbeddingProvider,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(store: &'a Store, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Classify and run a query, returning a ranked, boosted, confidence-
    /// weighted list of at most `limit` chunks, recording co-retrieval pairs
    /// for the implicit-relationship job along the way (spec §4.4).
    pub async fn retrieve(
        &self,
        project_id: Uuid,
        ctx: &RetrievalContext,
        session_id: Uuid,
        limit: usize,
        min_similarity: f32,
        confidence_weights: &ConfidenceWeights,
    ) -> Result<Vec<ScoredChunk>> {
        let query_plan = plan::classify(&ctx.query);
        if query_plan == QueryPlan::Operational {
            return Ok(Vec::new());
        }

        let alive = ChunkFilter {
            status: Some(vec![ChunkStatus::Active, ChunkStatus::Warm, ChunkStatus::Cool, ChunkStatus::Cold]),
            ..Default::default()
        };
        let corpus = self.store.query_chunks(project_id, alive).await?;
        let mut chunk_map: HashMap<Uuid, Chunk> = corpus.iter().map(|c| (c.id, c.clone())).collect();

        let mut semantic_similarities: HashMap<Uuid, f64> = HashMap::new();
        let mut breakdowns: HashMap<Uuid, ScoreBreakdown> = HashMap::new();
        let mut base_scores: HashMap<Uuid, f64> = HashMap::new();

        match query_plan {
            QueryPlan::Operational => unreachable!("handled above"),
            QueryPlan::Lookup => {
                let decisions: Vec<Chunk> = corpus
                    .iter()
                    .filter(|c| c.chunk_type == crate::memory::chunk::ChunkType::Decision)
                    .cloned()
                    .collect();
                for (id, score) in lexical::search(&decisions, &ctx.query, CANDIDATE_POOL) {
                    base_scores.insert(id, score);
                    breakdowns.entry(id).or_default().lexical = Some(score);
                }
            }
            QueryPlan::Exploration => {
                let allowed: Vec<Uuid> = chunk_map.keys().copied().collect();
                let hits = semantic::search(self.store, self.embedder, project_id, &ctx.query, CANDIDATE_POOL, min_similarity, &allowed).await?;
                for (id, sim) in hits {
                    semantic_similarities.insert(id, sim as f64);
                    base_scores.insert(id, sim as f64);
                    breakdowns.entry(id).or_default().semantic = Some(sim as f64);
                }
            }
            QueryPlan::Connection => {
                let seeds = lexical::search(&corpus, &ctx.query, 3);
                let seed_ids: Vec<Uuid> = seeds.iter().map(|(id, _)| *id).collect();
                let hits = graph::expand_from_seeds(self.store, project_id, &seed_ids, ctx.tick, CANDIDATE_POOL).await?;
                for (id, score) in hits {
                    base_scores.insert(id, score);
                    breakdowns.entry(id).or_default().graph = Some(score);
                }
            }
            QueryPlan::Hybrid => {
                let allowed: Vec<Uuid> = chunk_map.keys().copied().collect();
                let semantic_hits = semantic::search(self.store, self.embedder, project_id, &ctx.query, CANDIDATE_POOL, min_similarity, &allowed).await?;
                let lexical_hits = lexical::search(&corpus, &ctx.query, CANDIDATE_POOL);
                let seed_ids: Vec<Uuid> = semantic_hits
                    .iter()
                    .map(|(id, _)| *id)
                    .chain(lexical_hits.iter().map(|(id, _)| *id))
                    .take(10)
                    .collect();
                let graph_hits = graph::expand_from_seeds(self.store, project_id, &seed_ids, ctx.tick, CANDIDATE_POOL).await?;

                for (id, sim) in &semantic_hits {
                    semantic_similarities.insert(*id, *sim as f64);
                    breakdowns.entry(*id).or_default().semantic = Some(*sim as f64);
                }
                for (id, score) in &lexical_hits {
                    breakdowns.entry(*id).or_default().lexical = Some(*score);
                }
                for (id, score) in &graph_hits {
                    breakdowns.entry(*id).or_default().graph = Some(*score);
                }

                let semantic_ids: Vec<Uuid> = semantic_hits.iter().map(|(id, _)| *id).collect();
                let lexical_ids: Vec<Uuid> = lexical_hits.iter().map(|(id, _)| *id).collect();
                let graph_ids: Vec<Uuid> = graph_hits.iter().map(|(id, _)| *id).collect();
                base_scores = fusion::reciprocal_rank_fusion(&semantic_ids, &lexical_ids, &graph_ids, fusion::DEFAULT_RRF_K);
            }
        }

        let mut results = Vec::new();
        for (id, base_score) in base_scores {
            let chunk = match chunk_map.remove(&id) {
                Some(c) => c,
                None => match self.store.get_chunk(project_id, id).await {
                    Ok(c) if is_live(c.status) => c,
                    _ => continue,
                },
            };

            let mut breakdown = breakdowns.remove(&id).unwrap_or_default();
            breakdown.context_match = boost::context_match(&chunk.learning_context, ctx);

            let mut score = base_score;
            if let Some(similarity) = semantic_similarities.get(&id) {
                if let Some(restored) = boost::weak_memory_reactivation(chunk.current_strength, breakdown.context_match, *similarity) {
                    score = restored;
                    breakdown.boost_reason = Some("weak_memory_reactivation");
                }
            }
            if breakdown.boost_reason.is_none() {
                score = boost::apply_context_boost(score, breakdown.context_match);
                if breakdown.context_match > 0.7 {
                    breakdown.boost_reason = Some("strong_context_match");
                } else if breakdown.context_match > 0.4 {
                    breakdown.boost_reason = Some("moderate_context_match");
                }
            }

            let cw = confidence_weights_for(chunk.confidence, confidence_weights);
            breakdown.confidence_weight = cw;
            score *= cw;

            results.push(ScoredChunk { chunk, score, breakdown });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        self.record_coretrieval(project_id, &results, session_id, &ctx.query).await?;
        Ok(results)
    }

    async fn record_coretrieval(&self, project_id: Uuid, results: &[ScoredChunk], session_id: Uuid, query: &str) -> Result<()> {
        for i in 0..results.len() {
            for j in (i + 1)..results.len() {
                let row = CoRetrieval::new(project_id, results[i].chunk.id, results[j].chunk.id, session_id, query);
                self.store.record_coretrieval(row).await?;
            }
        }
        Ok(())
    }
}

fn confidence_weights_for(confidence: crate::memory::chunk::Confidence, weights: &ConfidenceWeights) -> f64 {
    match confidence {
        crate::memory::chunk::Confidence::Verified => weights.verified,
        crate::memory::chunk::Confidence::Inferred => weights.inferred,
        crate::memory::chunk::Confidence::Speculative => weights.speculative,
    }
}

/// Explicit graph traversal (spec §4.3 "Traverse"), independent of the
/// retrieve() plan dispatch above.
pub async fn traverse(
    store: &Store,
    project_id: Uuid,
    chunk_id: Uuid,
    current_tick: u64,
    relationship_type: Option<crate::memory::relationship::RelationshipType>,
    min_weight: f64,
    direction: Direction,
    limit: usize,
) -> Result<Vec<(Uuid, f64)>> {
    graph::traverse(store, project_id, chunk_id, current_tick, relationship_type, min_weight, direction, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicHashProvider;
    use crate::memory::chunk::{ChunkType, Confidence, LearningContext, Source};

    #[tokio::test]
    async fn operational_plan_returns_no_chunks() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(16);
        let engine = RetrievalEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();

        let ctx = RetrievalContext {
            tick: 1, task_id: None, goal_id: None, phase: None, skill_area: None,
            query: "what's blocked".to_string(),
        };
        let results = engine
            .retrieve(pid, &ctx, Uuid::new_v4(), 10, 0.0, &ConfidenceWeights::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn exploration_plan_finds_semantically_similar_chunk() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(32);
        let engine = RetrievalEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();

        let mut chunk = Chunk::new(
            pid, "rust ownership and borrowing rules", ChunkType::Research, vec![],
            Confidence::Verified, Source::Research, 0, LearningContext::default(), false,
        );
        chunk.embedding = Some(embedder.embed(&chunk.content).await.unwrap());
        store.put_chunk(chunk.clone()).await.unwrap();

        let ctx = RetrievalContext {
            tick: 1, task_id: None, goal_id: None, phase: None, skill_area: None,
            query: "what do i know about rust ownership and borrowing rules".to_string(),
        };
        let results = engine
            .retrieve(pid, &ctx, Uuid::new_v4(), 10, 0.0, &ConfidenceWeights::default())
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.id, chunk.id);
    }

    #[tokio::test]
    async fn retrieve_records_coretrieval_pairs() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = DeterministicHashProvider::new(32);
        let engine = RetrievalEngine::new(&store, &embedder);
        let pid = Uuid::new_v4();
        store.initialize_project(pid).await.unwrap();

        for text in ["caching layer design notes", "caching layer invalidation policy"] {
            let mut chunk = Chunk::new(
                pid, text, ChunkType::Research, vec![], Confidence::Verified, Source::Research, 0,
                LearningContext::default(), false,
            );
            chunk.embedding = Some(embedder.embed(&chunk.content).await.unwrap());
            store.put_chunk(chunk).await.unwrap();
        }

        let ctx = RetrievalContext {
            tick: 1, task_id: None, goal_id: None, phase: None, skill_area: None,
            query: "tell me about caching layer design".to_string(),
        };
        let session = Uuid::new_v4();
        let results = engine.retrieve(pid, &ctx, session, 10, 0.0, &ConfidenceWeights::default()).await.unwrap();
        assert_eq!(results.len(), 2);

        let counts = store.coretrieval_session_counts(pid).await.unwrap();
        assert_eq!(counts.len(), 1);
    }
}
