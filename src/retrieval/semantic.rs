//! Semantic search source (spec §4.4): embed the query, cosine-search the
//! Store's vector index.

use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::Store;

/// Embed `query` and return the top `pool` chunk ids by cosine similarity,
/// best first, restricted to `allowed` if non-empty.
pub async fn search(
    store: &Store,
    embedder: &dyn EmbeddingProvider,
    project_id: Uuid,
    query: &str,
    pool: usize,
    min_similarity: f32,
    allowed: &[Uuid],
) -> Result<Vec<(Uuid, f32)>> {
    let vector = embedder.embed(query).await?;
    Ok(store.vector_search(project_id, &vector, pool, min_similarity, allowed).await)
}
