//! Embedding provider collaborator (spec §6).
//!
//! `embed`/`embed_batch` over opaque text. The only hard requirement is
//! dimensional consistency across a project's lifetime (spec §6); swapping
//! providers requires re-embedding every live chunk.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize;
}

fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec {
            *x /= norm;
        }
    }
}

/// Real embedding provider backed by `fastembed`'s `TextEmbedding`,
/// normalizing vectors for cosine-via-dot-product, exactly as the
/// teacher's `memory::vector::VectorMemory::embed` does.
pub struct FastEmbedProvider {
    model: RwLock<fastembed::TextEmbedding>,
    dimensions: usize,
}

impl FastEmbedProvider {
    pub fn new() -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| Error::EmbeddingFailure(e.to_string()))?;
        Ok(Self { model: RwLock::new(model), dimensions: 384 })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingFailure("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.write().await;
        let mut embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::EmbeddingFailure(e.to_string()))?;
        for e in &mut embeddings {
            normalize(e);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic hash-based pseudo-embedding for tests that must not
/// download a model. Same text always yields the same vector; vectors are
/// normalized so cosine-via-dot-product behaves like a real embedding
/// space for fixture purposes.
pub struct DeterministicHashProvider {
    dimensions: usize,
}

impl DeterministicHashProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for DeterministicHashProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicHashProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut vector = vec![0.0f32; self.dimensions];
        if tokens.is_empty() {
            return Ok(vector);
        }
        for token in &tokens {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let seed = hasher.finish();
            for (i, slot) in vector.iter_mut().enumerate() {
                let mut h = DefaultHasher::new();
                (seed, i).hash(&mut h);
                let bit = (h.finish() % 1000) as f32 / 1000.0 - 0.5;
                *slot += bit;
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_provider_is_stable() {
        let provider = DeterministicHashProvider::new(32);
        let a = provider.embed("learn chess openings").await.unwrap();
        let b = provider.embed("learn chess openings").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn deterministic_provider_distinguishes_text() {
        let provider = DeterministicHashProvider::new(32);
        let a = provider.embed("learn chess").await.unwrap();
        let b = provider.embed("bake bread").await.unwrap();
        assert_ne!(a, b);
    }
}
