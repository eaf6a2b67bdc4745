//! Context-aware boosting and weak-memory reactivation (spec §4.4).

use crate::memory::chunk::{Confidence, LearningContext};

use super::RetrievalContext;

/// Weighted fraction of matching dimensions between a chunk's stored
/// `LearningContext` and the current `RetrievalContext`: goal (0.40), task
/// (0.25), phase (0.20), skill_area (0.15). A dimension only contributes
/// when the query side specifies it and both sides agree — an unspecified
/// query dimension is simply absent from the sum rather than counted as a
/// match or a miss.
pub fn context_match(learning: &LearningContext, ctx: &RetrievalContext) -> f64 {
    let mut score = 0.0;
    if ctx.goal_id.is_some() && learning.goal_id == ctx.goal_id {
        score += 0.40;
    }
    if ctx.task_id.is_some() && learning.task_id == ctx.task_id {
        score += 0.25;
    }
    if ctx.phase.is_some() && learning.phase == ctx.phase {
        score += 0.20;
    }
    if ctx.skill_area.is_some() && learning.skill_area == ctx.skill_area {
        score += 0.15;
    }
    score
}

/// Apply the strong/moderate context-match multiplier to a fused score.
pub fn apply_context_boost(score: f64, context_match: f64) -> f64 {
    if context_match > 0.7 {
        score * (1.0 + (context_match - 0.5) * 0.6)
    } else if context_match > 0.4 {
        score * (1.0 + (context_match - 0.3) * 0.3)
    } else {
        score
    }
}

/// Weak-memory reactivation: a chunk whose `current_strength` has decayed
/// below 0.3 can still surface if the context match is strong, replacing the
/// base similarity contribution rather than adding to it. Returns `None`
/// when the conditions aren't met, leaving the caller's normal score as-is.
pub fn weak_memory_reactivation(current_strength: f64, context_match: f64, base_similarity: f64) -> Option<f64> {
    if current_strength < 0.3 && context_match > 0.6 {
        Some(context_match * base_similarity * 0.7)
    } else {
        None
    }
}

pub fn confidence_weight(confidence: Confidence) -> f64 {
    confidence.retrieval_weight()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(goal_id: Option<Uuid>) -> RetrievalContext {
        RetrievalContext {
            tick: 10,
            task_id: None,
            goal_id,
            phase: None,
            skill_area: None,
            query: "q".to_string(),
        }
    }

    #[test]
    fn matching_goal_contributes_its_weight() {
        let goal = Uuid::new_v4();
        let mut learning = LearningContext::default();
        learning.goal_id = Some(goal);
        let matched = context_match(&learning, &ctx(Some(goal)));
        assert!((matched - 0.40).abs() < 1e-9);
    }

    #[test]
    fn strong_match_boosts_above_moderate() {
        let strong = apply_context_boost(1.0, 0.9);
        let moderate = apply_context_boost(1.0, 0.5);
        assert!(strong > moderate);
        assert!(strong > 1.0);
    }

    #[test]
    fn weak_chunk_with_strong_context_reactivates() {
        let restored = weak_memory_reactivation(0.1, 0.8, 0.5);
        assert!(restored.is_some());
    }

    #[test]
    fn strong_chunk_never_reactivates() {
        assert!(weak_memory_reactivation(0.9, 0.9, 0.5).is_none());
    }
}
