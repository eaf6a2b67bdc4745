use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::codec::{from_json, to_json};
use super::Store;
use crate::domain::CoRetrieval;
use crate::error::{Error, Result};
use crate::memory::relationship::{Origin, Relationship, RelationshipArchive, RelationshipType};

fn row_to_relationship(row: &rusqlite::Row) -> rusqlite::Result<Relationship> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let from_chunk_id: String = row.get("from_chunk_id")?;
    let to_chunk_id: String = row.get("to_chunk_id")?;
    let relationship_type: String = row.get("relationship_type")?;
    let origin: String = row.get("origin")?;
    let context_tags: String = row.get("context_tags")?;
    let last_activated: Option<String> = row.get("last_activated")?;

    Ok(Relationship {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: Uuid::parse_str(&project_id).unwrap_or_default(),
        from_chunk_id: Uuid::parse_str(&from_chunk_id).unwrap_or_default(),
        to_chunk_id: Uuid::parse_str(&to_chunk_id).unwrap_or_default(),
        relationship_type: RelationshipType::from_db_str(&relationship_type).unwrap_or(RelationshipType::RelatedTo),
        weight: row.get("weight")?,
        activation_count: row.get::<_, i64>("activation_count")? as u32,
        last_activated: last_activated.and_then(|s| s.parse().ok()),
        context_tags: from_json(&context_tags).unwrap_or_default(),
        origin: Origin::from_db_str(&origin).unwrap_or(Origin::Explicit),
    })
}

impl Store {
    pub async fn find_relationship(
        &self,
        from: Uuid,
        to: Uuid,
        rel_type: RelationshipType,
    ) -> Result<Option<Relationship>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM relationships WHERE from_chunk_id = ?1 AND to_chunk_id = ?2 AND relationship_type = ?3",
                params![from.to_string(), to.to_string(), rel_type.db_str()],
                row_to_relationship,
            )
            .optional()
            .map_err(Error::from)
        })
        .await
    }

    pub async fn put_relationship(&self, rel: Relationship) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO relationships (
                    id, project_id, from_chunk_id, to_chunk_id, relationship_type,
                    weight, activation_count, last_activated, context_tags, origin
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                params![
                    rel.id.to_string(),
                    rel.project_id.to_string(),
                    rel.from_chunk_id.to_string(),
                    rel.to_chunk_id.to_string(),
                    rel.relationship_type.db_str(),
                    rel.weight,
                    rel.activation_count as i64,
                    rel.last_activated.map(|t| t.to_rfc3339()),
                    to_json(&rel.context_tags)?,
                    rel.origin.db_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_relationship(&self, id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM relationships WHERE id = ?1", [id.to_string()])?;
            Ok(())
        })
        .await
    }

    pub async fn archive_relationship(&self, archive: RelationshipArchive) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO relationships_archive (
                    id, project_id, from_chunk_id, to_chunk_id, relationship_type,
                    final_weight, reason, archived_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    archive.id.to_string(),
                    archive.project_id.to_string(),
                    archive.from_chunk_id.to_string(),
                    archive.to_chunk_id.to_string(),
                    archive.relationship_type.db_str(),
                    archive.final_weight,
                    archive.reason,
                    archive.archived_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Move a live relationship to the archive table and delete it from the
    /// live set in one transaction (spec §3: weight < 0.05 moves the edge).
    pub async fn archive_and_delete_relationship(&self, rel: &Relationship, reason: impl Into<String>) -> Result<()> {
        let archive = rel.to_archive(reason);
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"INSERT OR REPLACE INTO relationships_archive (
                    id, project_id, from_chunk_id, to_chunk_id, relationship_type,
                    final_weight, reason, archived_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    archive.id.to_string(),
                    archive.project_id.to_string(),
                    archive.from_chunk_id.to_string(),
                    archive.to_chunk_id.to_string(),
                    archive.relationship_type.db_str(),
                    archive.final_weight,
                    archive.reason,
                    archive.archived_at.to_rfc3339(),
                ],
            )?;
            tx.execute("DELETE FROM relationships WHERE id = ?1", [archive.id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn relationships_by_endpoint(&self, chunk_id: Uuid, outgoing: bool) -> Result<Vec<Relationship>> {
        let column = if outgoing { "from_chunk_id" } else { "to_chunk_id" };
        let sql = format!("SELECT * FROM relationships WHERE {column} = ?1");
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([chunk_id.to_string()], row_to_relationship)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn relationship_count(&self, chunk_id: Uuid) -> Result<usize> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM relationships WHERE from_chunk_id = ?1 OR to_chunk_id = ?1",
                [chunk_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    // ---- CoRetrieval (spec §3, §4.5) ----

    pub async fn record_coretrieval(&self, row: CoRetrieval) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT INTO coretrieval (
                    id, project_id, chunk_a_id, chunk_b_id, session_id, query_context, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    row.id.to_string(),
                    row.project_id.to_string(),
                    row.chunk_a_id.to_string(),
                    row.chunk_b_id.to_string(),
                    row.session_id.to_string(),
                    row.query_context,
                    row.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Group co-retrieval rows by unordered pair, counting distinct
    /// sessions (spec §4.5 step 1).
    pub async fn coretrieval_session_counts(&self, project_id: Uuid) -> Result<Vec<(Uuid, Uuid, usize)>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_a_id, chunk_b_id, session_id FROM coretrieval WHERE project_id = ?1",
            )?;
            let rows = stmt
                .query_map([project_id.to_string()], |row| {
                    let a: String = row.get(0)?;
                    let b: String = row.get(1)?;
                    let session: String = row.get(2)?;
                    Ok((a, b, session))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            use std::collections::{HashMap, HashSet};
            let mut sessions_by_pair: HashMap<(String, String), HashSet<String>> = HashMap::new();
            for (a, b, session) in rows {
                sessions_by_pair.entry((a, b)).or_default().insert(session);
            }
            Ok(sessions_by_pair
                .into_iter()
                .map(|((a, b), sessions)| {
                    (
                        Uuid::parse_str(&a).unwrap_or_default(),
                        Uuid::parse_str(&b).unwrap_or_default(),
                        sessions.len(),
                    )
                })
                .collect())
        })
        .await
    }

    pub async fn prune_coretrieval_older_than(&self, project_id: Uuid, cutoff: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let n = conn.execute(
                "DELETE FROM coretrieval WHERE project_id = ?1 AND timestamp < ?2",
                params![project_id.to_string(), cutoff.to_rfc3339()],
            )?;
            Ok(n)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_find_relationship() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rel = Relationship::new(pid, a, b, RelationshipType::Supports, 0.7, Origin::Explicit);
        store.put_relationship(rel.clone()).await.unwrap();

        let found = store.find_relationship(a, b, RelationshipType::Supports).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().weight, 0.7);
    }

    #[tokio::test]
    async fn coretrieval_counts_distinct_sessions() {
        let store = Store::open_in_memory().await.unwrap();
        let pid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for _ in 0..3 {
            store.record_coretrieval(CoRetrieval::new(pid, a, b, Uuid::new_v4(), "q")).await.unwrap();
        }
        let counts = store.coretrieval_session_counts(pid).await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].2, 3);
    }
}
