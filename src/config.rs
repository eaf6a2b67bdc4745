//! Configuration loading (spec §6): an optional YAML file plus environment
//! overrides, loaded with `dotenv` at process start exactly as the teacher's
//! `main.rs` calls `dotenv::dotenv().ok()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_embedding_dimensions() -> usize {
    384
}
fn default_min_similarity() -> f32 {
    0.15
}
fn default_coretrieval_threshold() -> usize {
    3
}
fn default_activity_trigger_count() -> usize {
    50
}
fn default_orientation_max_tokens() -> usize {
    2000
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_decay_interval_ticks() -> u64 {
    1
}
fn default_consolidation_interval_ticks() -> u64 {
    20
}
fn default_coretrieval_retention_days() -> i64 {
    30
}
fn default_max_tasks_per_session() -> usize {
    20
}
fn default_orientation_max_age_hours() -> i64 {
    24
}
fn default_pivot_similarity_threshold() -> f32 {
    0.75
}
fn default_pivot_keywords() -> Vec<String> {
    vec![
        "change direction".to_string(),
        "change goal".to_string(),
        "different approach".to_string(),
        "pivot".to_string(),
        "forget that".to_string(),
        "never mind".to_string(),
        "instead let's".to_string(),
    ]
}
fn default_executor_timeout_secs() -> u64 {
    120
}
fn default_executor_model() -> String {
    "llama3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub verified: f64,
    pub inferred: f64,
    pub speculative: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self { verified: 1.0, inferred: 0.8, speculative: 0.5 }
    }
}

/// Recognised options enumerated in spec §6, each carrying the documented
/// default so a bare `Config::default()` is already a legal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: String,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default = "default_min_similarity")]
    pub min_similarity_threshold: f32,

    #[serde(default = "default_coretrieval_threshold")]
    pub coretrieval_threshold: usize,

    #[serde(default = "default_activity_trigger_count")]
    pub orientation_activity_trigger_count: usize,

    #[serde(default = "default_orientation_max_tokens")]
    pub orientation_max_tokens: usize,

    #[serde(default = "default_orientation_max_age_hours")]
    pub orientation_max_age_hours: i64,

    #[serde(default = "default_rrf_k")]
    pub retrieval_rrf_k: f64,

    #[serde(default)]
    pub retrieval_confidence_weights: ConfidenceWeights,

    #[serde(default = "default_decay_interval_ticks")]
    pub memory_decay_interval_ticks: u64,

    #[serde(default = "default_consolidation_interval_ticks")]
    pub memory_consolidation_interval_ticks: u64,

    #[serde(default = "default_coretrieval_retention_days")]
    pub memory_coretrieval_retention_days: i64,

    #[serde(default = "default_max_tasks_per_session")]
    pub agent_max_tasks_per_session: usize,

    #[serde(default = "default_pivot_similarity_threshold")]
    pub pivot_similarity_threshold: f32,

    #[serde(default = "default_pivot_keywords")]
    pub pivot_keyword_list: Vec<String>,

    #[serde(default = "default_executor_timeout_secs")]
    pub executor_timeout_secs: u64,

    #[serde(default = "default_executor_model")]
    pub executor_model: String,

    pub artifact_root: String,

    pub ollama_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "visioneer.sqlite3".to_string(),
            embedding_dimensions: default_embedding_dimensions(),
            min_similarity_threshold: default_min_similarity(),
            coretrieval_threshold: default_coretrieval_threshold(),
            orientation_activity_trigger_count: default_activity_trigger_count(),
            orientation_max_tokens: default_orientation_max_tokens(),
            orientation_max_age_hours: default_orientation_max_age_hours(),
            retrieval_rrf_k: default_rrf_k(),
            retrieval_confidence_weights: ConfidenceWeights::default(),
            memory_decay_interval_ticks: default_decay_interval_ticks(),
            memory_consolidation_interval_ticks: default_consolidation_interval_ticks(),
            memory_coretrieval_retention_days: default_coretrieval_retention_days(),
            agent_max_tasks_per_session: default_max_tasks_per_session(),
            pivot_similarity_threshold: default_pivot_similarity_threshold(),
            pivot_keyword_list: default_pivot_keywords(),
            executor_timeout_secs: default_executor_timeout_secs(),
            executor_model: default_executor_model(),
            artifact_root: "artifacts".to_string(),
            ollama_host: None,
        }
    }
}

impl Config {
    /// Load from an optional YAML file, then apply environment overrides.
    /// Matches the teacher's `dotenv::dotenv().ok()` + struct-default style
    /// in `main.rs`, generalized to a full field set.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                serde_yaml::from_str(&raw)?
            }
            _ => Config::default(),
        };

        if let Ok(db) = std::env::var("VISIONEER_DATABASE_PATH") {
            config.database_path = db;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.ollama_host = Some(host);
        }
        if let Ok(root) = std::env::var("VISIONEER_ARTIFACT_ROOT") {
            config.artifact_root = root;
        }
        if let Ok(dim) = std::env::var("VISIONEER_EMBEDDING_DIMENSIONS") {
            if let Ok(v) = dim.parse() {
                config.embedding_dimensions = v;
            }
        }
        if let Ok(model) = std::env::var("VISIONEER_EXECUTOR_MODEL") {
            config.executor_model = model;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let config = Config::default();
        assert_eq!(config.embedding_dimensions, 384);
        assert!(config.min_similarity_threshold > 0.0);
        let sum = config.retrieval_confidence_weights.verified; // sanity touch
        assert!(sum > 0.0);
    }

    #[test]
    fn yaml_round_trips() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.embedding_dimensions, config.embedding_dimensions);
    }
}
