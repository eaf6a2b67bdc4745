//! Relationship: typed, weighted edges between chunks (spec §3, §4.3).
//!
//! Edges never time-decay; they only change under explicit create/strengthen/
//! weaken operations and implicit formation (`memory::implicit`). Endpoints
//! are weak references — the Store is responsible for archiving incident
//! edges when an endpoint chunk is removed (spec §9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Supports,
    Contradicts,
    BuildsOn,
    Replaces,
    Requires,
    RelatedTo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub id: Uuid,
    pub project_id: Uuid,
    pub from_chunk_id: Uuid,
    pub to_chunk_id: Uuid,
    pub relationship_type: RelationshipType,
    pub weight: f64,
    pub activation_count: u32,
    pub last_activated: Option<DateTime<Utc>>,
    pub context_tags: Vec<String>,
    pub origin: Origin,
}

/// Weight below which a live edge is archived rather than kept (spec §3).
pub const ARCHIVE_THRESHOLD: f64 = 0.05;

/// Default strengthen increment (spec §4.3).
pub const STRENGTHEN_DELTA: f64 = 0.05;

/// Weaken increment for a manual weaken call (spec §4.3).
pub const WEAKEN_DELTA_MANUAL: f64 = 0.10;

/// Weaken increment applied to a contradicted chunk's outgoing edges
/// (spec §4.5).
pub const WEAKEN_DELTA_CONTRADICTION: f64 = 0.30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipArchive {
    pub id: Uuid,
    pub project_id: Uuid,
    pub from_chunk_id: Uuid,
    pub to_chunk_id: Uuid,
    pub relationship_type: RelationshipType,
    pub final_weight: f64,
    pub reason: String,
    pub archived_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        project_id: Uuid,
        from_chunk_id: Uuid,
        to_chunk_id: Uuid,
        relationship_type: RelationshipType,
        weight: f64,
        origin: Origin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            from_chunk_id,
            to_chunk_id,
            relationship_type,
            weight: weight.clamp(0.0, 1.0),
            activation_count: 0,
            last_activated: None,
            context_tags: Vec::new(),
            origin,
        }
    }

    /// Merge a duplicate `(from, to, type)` create call: `max(weight)` and
    /// union of `context_tags` (spec §4.3).
    pub fn merge_duplicate(&mut self, other_weight: f64, other_tags: &[String]) {
        self.weight = self.weight.max(other_weight).clamp(0.0, 1.0);
        for tag in other_tags {
            if !self.context_tags.contains(tag) {
                self.context_tags.push(tag.clone());
            }
        }
    }

    pub fn strengthen(&mut self, delta: f64) {
        self.weight = (self.weight + delta).clamp(0.0, 1.0);
        self.activation_count += 1;
        self.last_activated = Some(Utc::now());
    }

    pub fn weaken(&mut self, delta: f64) {
        self.weight = (self.weight - delta).clamp(0.0, 1.0);
    }

    pub fn should_archive(&self) -> bool {
        self.weight < ARCHIVE_THRESHOLD
    }

    pub fn to_archive(&self, reason: impl Into<String>) -> RelationshipArchive {
        RelationshipArchive {
            id: self.id,
            project_id: self.project_id,
            from_chunk_id: self.from_chunk_id,
            to_chunk_id: self.to_chunk_id,
            relationship_type: self.relationship_type,
            final_weight: self.weight,
            reason: reason.into(),
            archived_at: Utc::now(),
        }
    }
}

/// Canonical direction for implicit edges formed from raw co-retrieval
/// signal: lexicographic order on the chunk id string form, per the spec's
/// explicit fix to the source's inconsistent `A→B` vs `B→A` direction
/// (spec §9).
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a.to_string() <= b.to_string() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Score used by `traverse` to rank connected chunks (spec §4.3):
/// `weight * recency_factor * context_match`.
pub fn traversal_score(weight: f64, recency_factor: f64, context_match: f64) -> f64 {
    weight * recency_factor * context_match
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }

    #[test]
    fn weaken_below_threshold_is_archivable() {
        let mut r = Relationship::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            RelationshipType::Supports,
            0.30,
            Origin::Explicit,
        );
        r.weaken(WEAKEN_DELTA_CONTRADICTION);
        assert!((r.weight - 0.0).abs() < 1e-9);
        assert!(r.should_archive());
    }

    #[test]
    fn weight_never_negative() {
        let mut r = Relationship::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            RelationshipType::Supports,
            0.05,
            Origin::Explicit,
        );
        r.weaken(0.5);
        assert_eq!(r.weight, 0.0);
    }

    #[test]
    fn merge_duplicate_takes_max_weight_and_unions_tags() {
        let mut r = Relationship::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            RelationshipType::Supports,
            0.3,
            Origin::Explicit,
        );
        r.context_tags.push("a".to_string());
        r.merge_duplicate(0.6, &["a".to_string(), "b".to_string()]);
        assert_eq!(r.weight, 0.6);
        assert_eq!(r.context_tags, vec!["a".to_string(), "b".to_string()]);
    }
}
