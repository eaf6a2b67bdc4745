//! Hand-written BM25 lexical search (spec §4.4): no dependency in the
//! teacher's or pack's stack supplies lexical ranking, so this is built from
//! scratch over the chunk `content` column, tokenized on non-alphanumeric
//! boundaries.

use std::collections::HashMap;

use uuid::Uuid;

use crate::memory::chunk::Chunk;

const K1: f64 = 1.2;
const B: f64 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

struct Document {
    id: Uuid,
    term_freqs: HashMap<String, usize>,
    len: usize,
}

/// Rank `corpus` against `query` with classic BM25 (`k1=1.2, b=0.75`),
/// returning the top `pool` chunk ids by score, best first.
pub fn search(corpus: &[Chunk], query: &str, pool: usize) -> Vec<(Uuid, f64)> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || corpus.is_empty() {
        return Vec::new();
    }

    let documents: Vec<Document> = corpus
        .iter()
        .map(|chunk| {
            let tokens = tokenize(&chunk.content);
            let len = tokens.len();
            let mut term_freqs = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            Document { id: chunk.id, term_freqs, len }
        })
        .collect();

    let n = documents.len() as f64;
    let avgdl = documents.iter().map(|d| d.len as f64).sum::<f64>() / n.max(1.0);

    let mut idf: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        if idf.contains_key(term.as_str()) {
            continue;
        }
        let df = documents.iter().filter(|d| d.term_freqs.contains_key(term)).count() as f64;
        let value = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        idf.insert(term.as_str(), value);
    }

    let mut scored: Vec<(Uuid, f64)> = documents
        .iter()
        .map(|doc| {
            let score: f64 = query_terms
                .iter()
                .map(|term| {
                    let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let denom = tf + K1 * (1.0 - B + B * doc.len as f64 / avgdl.max(1.0));
                    idf.get(term.as_str()).copied().unwrap_or(0.0) * (tf * (K1 + 1.0)) / denom
                })
                .sum();
            (doc.id, score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(pool);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::chunk::{ChunkType, Confidence, LearningContext, Source};

    fn chunk(project_id: Uuid, content: &str) -> Chunk {
        Chunk::new(
            project_id,
            content,
            ChunkType::Research,
            vec![],
            Confidence::Verified,
            Source::Research,
            0,
            LearningContext::default(),
            false,
        )
    }

    #[test]
    fn ranks_exact_term_match_above_unrelated_document() {
        let pid = Uuid::new_v4();
        let a = chunk(pid, "the rate limiter uses a token bucket algorithm");
        let b = chunk(pid, "the database migration ran successfully last night");
        let a_id = a.id;
        let corpus = vec![a, b];

        let results = search(&corpus, "token bucket rate limiter", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, a_id);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let pid = Uuid::new_v4();
        let corpus = vec![chunk(pid, "some content")];
        assert!(search(&corpus, "   ", 10).is_empty());
    }
}
