//! Memory Engine (spec §4.3): chunks, decay, persistence scoring,
//! relationships, consolidation, and implicit-relationship formation.

pub mod chunk;
pub mod consolidation;
pub mod decay;
pub mod engine;
pub mod implicit;
pub mod relationship;
pub mod score;

pub use chunk::{Chunk, ChunkStatus, ChunkType, Confidence, DecayFunction, LearningContext, Source};
pub use consolidation::{ConsolidationReport, Consolidator};
pub use engine::MemoryEngine;
pub use implicit::{apply_contradiction, run_implicit_relationship_job, ImplicitJobReport};
pub use relationship::{Origin, Relationship, RelationshipArchive, RelationshipType};
