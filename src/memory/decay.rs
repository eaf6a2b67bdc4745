//! Decay laws and status-ladder transitions (spec §4.3).

use super::chunk::{Chunk, ChunkStatus, ChunkType, DecayFunction};

/// Category multiplier `μ` from spec §4.3. A `goal`/`priority` tag overrides
/// the type-based multiplier to 0.4 regardless of type.
fn category_multiplier(chunk: &Chunk) -> f64 {
    if chunk.tags.iter().any(|t| t.contains("goal") || t.contains("priority")) {
        return 0.4;
    }
    if chunk.superseded_by.is_some() {
        return 2.5;
    }
    match chunk.chunk_type {
        ChunkType::UserInput => 0.0,
        ChunkType::Decision => 0.5,
        ChunkType::Insight => 0.8,
        ChunkType::Research => 1.0,
        ChunkType::Attempt => 1.3,
        ChunkType::Procedure => 0.7,
        ChunkType::Question => 1.1,
        ChunkType::Resource => 1.0,
    }
}

fn recency_factor(chunk: &Chunk, current_tick: u64) -> f64 {
    if chunk.access_count == 0 {
        return 1.0;
    }
    let elapsed = current_tick.saturating_sub(chunk.tick_last_accessed) as f64;
    1.0 - 0.3 * (-elapsed / 10.0).exp()
}

/// Map a strength value to its status per the thresholds table in spec §4.3.
pub fn strength_to_status(strength: f64) -> ChunkStatus {
    if strength <= 0.0 {
        ChunkStatus::Tombstone
    } else if strength < 0.05 {
        ChunkStatus::Cold
    } else if strength < 0.15 {
        ChunkStatus::Cool
    } else if strength < 0.30 {
        ChunkStatus::Warm
    } else {
        ChunkStatus::Active
    }
}

/// Apply one decay pass to a single chunk, mutating `current_strength` and
/// `status` in place. `current_tick` is the tick at which decay is running;
/// `last_decay_tick` is the project's previous decay-run tick, so that
/// `Δ = current_tick − max(tick_last_accessed, last_decay_tick)` per spec §4.3
/// (a chunk untouched since the last decay pass only decays for the ticks
/// since that pass, not since its last access, avoiding double-counting).
///
/// Per spec §9's fixed ambiguity: the demotion decision reads strength
/// *after* this pass's update, never before. Status only ever demotes here;
/// promotion is exclusively the job of `reactivate` in `super::engine`.
pub fn apply_decay(chunk: &mut Chunk, current_tick: u64, last_decay_tick: u64) {
    if chunk.pinned || chunk.decay_function == DecayFunction::None {
        return;
    }

    let floor = chunk.tick_last_accessed.max(last_decay_tick);
    let delta = current_tick.saturating_sub(floor) as f64;

    if delta <= 0.0 {
        return;
    }

    let mu = category_multiplier(chunk);
    let rf = recency_factor(chunk, current_tick);
    let lambda = chunk.decay_rate;

    let new_strength = match chunk.decay_function {
        DecayFunction::Exponential => chunk.current_strength * (-lambda * delta * mu * rf).exp(),
        DecayFunction::Linear => (chunk.current_strength - lambda * delta * mu * rf).max(0.0),
        DecayFunction::PowerLaw => chunk.current_strength * (1.0 + delta).powf(-lambda * mu * rf),
        DecayFunction::None => chunk.current_strength,
    };

    chunk.current_strength = new_strength.clamp(0.0, 1.0);

    let target = strength_to_status(chunk.current_strength);
    // One-way demotion only: never move to a higher-ranked status here.
    if target.rank() < chunk.status.rank() || chunk.status == ChunkStatus::Archived {
        if chunk.status != ChunkStatus::Archived {
            chunk.status = target;
        }
    } else if chunk.current_strength <= 0.0 {
        chunk.status = ChunkStatus::Tombstone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::chunk::{Confidence, LearningContext, Source};
    use uuid::Uuid;

    fn research_chunk() -> Chunk {
        let mut c = Chunk::new(
            Uuid::new_v4(),
            "some research",
            ChunkType::Research,
            vec![],
            Confidence::Verified,
            Source::Research,
            0,
            LearningContext::default(),
            false,
        );
        c.decay_function = DecayFunction::Exponential;
        c.decay_rate = 0.05;
        c
    }

    #[test]
    fn decay_ladder_matches_spec_scenario_2() {
        let mut c = research_chunk();
        apply_decay(&mut c, 10, 0);
        assert!((c.current_strength - 0.60653).abs() < 0.001, "got {}", c.current_strength);
        assert_eq!(c.status, ChunkStatus::Active);

        let mut c = research_chunk();
        apply_decay(&mut c, 30, 0);
        assert!((c.current_strength - 0.22313).abs() < 0.01, "got {}", c.current_strength);
        assert_eq!(c.status, ChunkStatus::Warm);

        let mut c = research_chunk();
        apply_decay(&mut c, 60, 0);
        assert!((c.current_strength - 0.0498).abs() < 0.01, "got {}", c.current_strength);
        assert_eq!(c.status, ChunkStatus::Cool);
    }

    #[test]
    fn pinned_chunk_never_decays() {
        let mut c = research_chunk();
        c.pinned = true;
        apply_decay(&mut c, 1000, 0);
        assert_eq!(c.current_strength, 1.0);
        assert_eq!(c.status, ChunkStatus::Active);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut c = research_chunk();
        c.tick_last_accessed = 50;
        let before = c.current_strength;
        apply_decay(&mut c, 50, 0);
        assert_eq!(c.current_strength, before);
    }

    #[test]
    fn decay_never_promotes() {
        let mut c = research_chunk();
        c.current_strength = 0.05;
        c.status = ChunkStatus::Cool;
        c.tick_last_accessed = 100;
        apply_decay(&mut c, 100, 0); // delta == 0 since tick_last_accessed == current, no-op
        assert_eq!(c.status, ChunkStatus::Cool);
    }

    #[test]
    fn superseded_chunk_decays_faster() {
        let mut a = research_chunk();
        let mut b = research_chunk();
        b.superseded_by = Some(Uuid::new_v4());
        apply_decay(&mut a, 10, 0);
        apply_decay(&mut b, 10, 0);
        assert!(b.current_strength < a.current_strength);
    }

    #[test]
    fn decay_respects_last_decay_tick_floor() {
        // A chunk not accessed since before the last decay pass should only
        // decay for the ticks since that pass, not since its (older) access.
        let mut c = research_chunk();
        c.tick_last_accessed = 0;
        apply_decay(&mut c, 100, 90);
        let mut control = research_chunk();
        control.tick_last_accessed = 0;
        apply_decay(&mut control, 10, 0);
        assert!((c.current_strength - control.current_strength).abs() < 1e-9);
    }
}
