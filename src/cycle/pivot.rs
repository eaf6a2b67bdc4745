//! Pivot detection (spec §4.7, §9): a lightweight classifier that scans an
//! answered question's answer text for "change direction" signals —
//! explicit keywords plus embedding similarity to stored pivot examples.
//!
//! Thresholds are configuration (`Config::pivot_keyword_list`,
//! `Config::pivot_similarity_threshold`) rather than hardcoded, per the
//! spec's explicit instruction not to guess new values that the source
//! left undocumented (spec §9, Open Questions).

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// A short canonical phrase embedded and compared against the answer; the
/// "stored pivot examples" of spec §4.7. Kept to one phrase since the spec
/// gives no example corpus to seed a richer set from.
const PIVOT_EXEMPLAR: &str = "let's change direction and pursue a different goal instead";

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// True if `answer` looks like a pivot signal: it contains one of
/// `keywords` (case-insensitive substring match), or its embedding is
/// similar enough to the pivot exemplar.
pub async fn detect(
    embedder: &dyn EmbeddingProvider,
    answer: &str,
    keywords: &[String],
    similarity_threshold: f32,
) -> Result<bool> {
    let lower = answer.to_lowercase();
    if keywords.iter().any(|k| !k.is_empty() && lower.contains(&k.to_lowercase())) {
        return Ok(true);
    }

    let answer_vec = embedder.embed(answer).await?;
    let exemplar_vec = embedder.embed(PIVOT_EXEMPLAR).await?;
    Ok(cosine(&answer_vec, &exemplar_vec) > similarity_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicHashProvider;

    #[tokio::test]
    async fn keyword_match_short_circuits_embedding_check() {
        let embedder = DeterministicHashProvider::new(16);
        let keywords = vec!["pivot".to_string()];
        let detected = detect(&embedder, "I want to pivot to something else", &keywords, 2.0).await.unwrap();
        assert!(detected);
    }

    #[tokio::test]
    async fn unrelated_answer_is_not_a_pivot() {
        let embedder = DeterministicHashProvider::new(16);
        let keywords = vec!["pivot".to_string(), "change goal".to_string()];
        let detected = detect(&embedder, "the knight moves in an L shape", &keywords, 0.95).await.unwrap();
        assert!(!detected);
    }
}
