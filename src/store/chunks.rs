use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::codec::{decode_vector, encode_vector, from_json, to_json};
use super::Store;
use crate::error::{Error, Result};
use crate::memory::chunk::{
    Chunk, ChunkStatus, ChunkType, Confidence, DecayFunction, LearningContext, Source,
};

/// Filter for the Store's chunk set-query (spec §4.1: "chunks by tags
/// (all / any / none), type, confidence, status, tick range").
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub chunk_type: Option<ChunkType>,
    pub confidence: Option<Confidence>,
    pub status: Option<Vec<ChunkStatus>>,
    pub tags_all: Vec<String>,
    pub tags_any: Vec<String>,
    pub tags_none: Vec<String>,
    pub tick_created_min: Option<u64>,
    pub tick_created_max: Option<u64>,
}

impl ChunkFilter {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(t) = self.chunk_type {
            if chunk.chunk_type != t {
                return false;
            }
        }
        if let Some(c) = self.confidence {
            if chunk.confidence != c {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&chunk.status) {
                return false;
            }
        }
        if !self.tags_all.is_empty() && !self.tags_all.iter().all(|t| chunk.tags.contains(t)) {
            return false;
        }
        if !self.tags_any.is_empty() && !self.tags_any.iter().any(|t| chunk.tags.contains(t)) {
            return false;
        }
        if self.tags_none.iter().any(|t| chunk.tags.contains(t)) {
            return false;
        }
        if let Some(min) = self.tick_created_min {
            if chunk.tick_created < min {
                return false;
            }
        }
        if let Some(max) = self.tick_created_max {
            if chunk.tick_created > max {
                return false;
            }
        }
        true
    }
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let tags: String = row.get("tags")?;
    let learning_context: String = row.get("learning_context")?;
    let last_accessed: Option<String> = row.get("last_accessed")?;
    let last_useful: Option<String> = row.get("last_useful")?;
    let superseded_by: Option<String> = row.get("superseded_by")?;
    let chunk_type: String = row.get("chunk_type")?;
    let confidence: String = row.get("confidence")?;
    let source: String = row.get("source")?;
    let decay_function: String = row.get("decay_function")?;
    let status: String = row.get("status")?;

    let tags: Vec<String> = from_json(&tags).unwrap_or_default();
    let learning_context: LearningContext = from_json(&learning_context).unwrap_or_default();

    Ok(Chunk {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        content: row.get("content")?,
        chunk_type: ChunkType::from_db_str(&chunk_type).unwrap_or(ChunkType::Research),
        tags,
        confidence: Confidence::from_db_str(&confidence).unwrap_or(Confidence::Inferred),
        source: Source::from_db_str(&source).unwrap_or(Source::Research),
        embedding: None,
        tick_created: row.get::<_, i64>("tick_created")? as u64,
        tick_last_accessed: row.get::<_, i64>("tick_last_accessed")? as u64,
        tick_last_useful: row.get::<_, i64>("tick_last_useful")? as u64,
        learning_context,
        initial_strength: row.get("initial_strength")?,
        current_strength: row.get("current_strength")?,
        decay_function: DecayFunction::from_db_str(&decay_function).unwrap_or(DecayFunction::None),
        decay_rate: row.get("decay_rate")?,
        access_count: row.get::<_, i64>("access_count")? as u32,
        successful_uses: row.get::<_, i64>("successful_uses")? as u32,
        last_accessed: last_accessed.and_then(|s| s.parse().ok()),
        last_useful: last_useful.and_then(|s| s.parse().ok()),
        status: ChunkStatus::from_db_str(&status).unwrap_or(ChunkStatus::Active),
        pinned: row.get::<_, i64>("pinned")? != 0,
        superseded_by: superseded_by.and_then(|s| Uuid::parse_str(&s).ok()),
        valid_until_tick: row.get::<_, Option<i64>>("valid_until_tick")?.map(|v| v as u64),
        persistence_score: row.get("persistence_score")?,
    })
}

fn insert_or_replace_chunk(conn: &Connection, chunk: &Chunk) -> Result<()> {
    conn.execute(
        r#"INSERT OR REPLACE INTO chunks (
            id, project_id, content, chunk_type, tags, confidence, source,
            tick_created, tick_last_accessed, tick_last_useful, learning_context,
            initial_strength, current_strength, decay_function, decay_rate,
            access_count, successful_uses, last_accessed, last_useful,
            status, pinned, superseded_by, valid_until_tick, persistence_score
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
        )"#,
        params![
            chunk.id.to_string(),
            chunk.project_id.to_string(),
            chunk.content,
            chunk.chunk_type.db_str(),
            to_json(&chunk.tags)?,
            chunk.confidence.db_str(),
            chunk.source.db_str(),
            chunk.tick_created as i64,
            chunk.tick_last_accessed as i64,
            chunk.tick_last_useful as i64,
            to_json(&chunk.learning_context)?,
            chunk.initial_strength,
            chunk.current_strength,
            chunk.decay_function.db_str(),
            chunk.decay_rate,
            chunk.access_count as i64,
            chunk.successful_uses as i64,
            chunk.last_accessed.map(|t| t.to_rfc3339()),
            chunk.last_useful.map(|t| t.to_rfc3339()),
            chunk.status.db_str(),
            chunk.pinned as i64,
            chunk.superseded_by.map(|u| u.to_string()),
            chunk.valid_until_tick.map(|v| v as i64),
            chunk.persistence_score,
        ],
    )?;
    Ok(())
}

impl Store {
    pub async fn put_chunk(&self, chunk: Chunk) -> Result<()> {
        let embedding = chunk.embedding.clone();
        let project_id = chunk.project_id;
        let id = chunk.id;
        self.with_conn(move |conn| {
            insert_or_replace_chunk(conn, &chunk)?;
            if let Some(ref vector) = embedding {
                conn.execute(
                    "INSERT OR REPLACE INTO chunk_embeddings (chunk_id, project_id, vector) VALUES (?1, ?2, ?3)",
                    params![chunk.id.to_string(), chunk.project_id.to_string(), encode_vector(vector)],
                )?;
            }
            Ok(())
        })
        .await?;
        if let Some(vector) = embedding {
            self.index_upsert(project_id, id, vector).await;
        }
        Ok(())
    }

    pub async fn get_chunk(&self, project_id: Uuid, id: Uuid) -> Result<Chunk> {
        let mut chunk = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT * FROM chunks WHERE project_id = ?1 AND id = ?2",
                    params![project_id.to_string(), id.to_string()],
                    row_to_chunk,
                )
                .optional()
                .map_err(Error::from)?
                .ok_or_else(|| Error::not_found("chunk", id))
            })
            .await?;

        let embedding = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT vector FROM chunk_embeddings WHERE chunk_id = ?1",
                    [id.to_string()],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()
                .map_err(Error::from)
            })
            .await?;
        chunk.embedding = embedding.map(|b| decode_vector(&b));
        Ok(chunk)
    }

    pub async fn query_chunks(&self, project_id: Uuid, filter: ChunkFilter) -> Result<Vec<Chunk>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM chunks WHERE project_id = ?1")?;
            let rows = stmt
                .query_map([project_id.to_string()], row_to_chunk)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().filter(|c| filter.matches(c)).collect())
        })
        .await
    }

    pub async fn delete_chunk(&self, project_id: Uuid, id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM chunks WHERE project_id = ?1 AND id = ?2",
                params![project_id.to_string(), id.to_string()],
            )?;
            conn.execute("DELETE FROM chunk_embeddings WHERE chunk_id = ?1", [id.to_string()])?;
            Ok(())
        })
        .await?;
        self.index_remove(project_id, id).await;
        Ok(())
    }

    pub async fn archive_chunk(&self, archive: crate::domain::ChunkArchive) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO chunks_archive (
                    chunk_id, project_id, content_summary, content_hash,
                    tick_archived, final_strength, final_context
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    archive.chunk_id.to_string(),
                    archive.project_id.to_string(),
                    archive.content_summary,
                    archive.content_hash,
                    archive.tick_archived as i64,
                    archive.final_strength,
                    archive.final_context,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_chunk_archive(&self, chunk_id: Uuid) -> Result<Option<crate::domain::ChunkArchive>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT chunk_id, project_id, content_summary, content_hash, tick_archived, final_strength, final_context FROM chunks_archive WHERE chunk_id = ?1",
                [chunk_id.to_string()],
                |row| {
                    let chunk_id: String = row.get(0)?;
                    let project_id: String = row.get(1)?;
                    Ok(crate::domain::ChunkArchive {
                        chunk_id: Uuid::parse_str(&chunk_id).unwrap_or_default(),
                        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
                        content_summary: row.get(2)?,
                        content_hash: row.get(3)?,
                        tick_archived: row.get::<_, i64>(4)? as u64,
                        final_strength: row.get(5)?,
                        final_context: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::chunk::{Confidence, LearningContext, Source};

    fn sample(project_id: Uuid) -> Chunk {
        Chunk::new(
            project_id,
            "hello world",
            ChunkType::Insight,
            vec!["core".to_string()],
            Confidence::Verified,
            Source::Research,
            1,
            LearningContext::default(),
            false,
        )
    }

    #[tokio::test]
    async fn put_and_get_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut chunk = sample(pid);
        chunk.embedding = Some(vec![0.1, 0.2, 0.3]);
        let id = chunk.id;
        store.put_chunk(chunk.clone()).await.unwrap();

        let fetched = store.get_chunk(pid, id).await.unwrap();
        assert_eq!(fetched.content, chunk.content);
        assert_eq!(fetched.embedding, chunk.embedding);
    }

    #[tokio::test]
    async fn filter_by_tags_all() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut a = sample(pid);
        a.tags = vec!["core".to_string(), "goal".to_string()];
        let mut b = sample(pid);
        b.tags = vec!["core".to_string()];
        store.put_chunk(a.clone()).await.unwrap();
        store.put_chunk(b.clone()).await.unwrap();

        let filter = ChunkFilter { tags_all: vec!["goal".to_string()], ..Default::default() };
        let results = store.query_chunks(pid, filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, a.id);
    }

    #[tokio::test]
    async fn delete_removes_from_vector_index() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let mut chunk = sample(pid);
        chunk.embedding = Some(vec![1.0, 0.0]);
        let id = chunk.id;
        store.put_chunk(chunk).await.unwrap();
        assert_eq!(store.vector_search(pid, &[1.0, 0.0], 5, 0.0, &[]).await.len(), 1);
        store.delete_chunk(pid, id).await.unwrap();
        assert_eq!(store.vector_search(pid, &[1.0, 0.0], 5, 0.0, &[]).await.len(), 0);
    }
}
