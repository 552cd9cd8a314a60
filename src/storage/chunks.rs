//! Chunk storage on SQLite
//!
//! Concrete wrapper around `SqliteDatabase` with the chunk-specific
//! operations. SQLite is the source of truth; the in-memory index is always
//! rebuilt from `list_all`.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use super::types::{ChunkKey, NewChunk, Priority, StoredChunk, StoredIdentity};
use crate::db::{migrations, vectors, SqliteDatabase};
use crate::error::StoreError;

const UPSERT_SQL: &str = "INSERT INTO rag_chunks
        (id, source_path, kind, chunk_index, priority, text, emb, dim, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
     ON CONFLICT(source_path, kind, chunk_index) DO UPDATE SET
        priority = excluded.priority,
        text = excluded.text,
        emb = excluded.emb,
        dim = excluded.dim,
        created_at = excluded.created_at";

/// Durable table of chunk records
pub struct ChunkStore {
    db: SqliteDatabase,
}

impl ChunkStore {
    /// Open the store at `path` without touching the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self {
            db: SqliteDatabase::open(path)?,
        })
    }

    /// In-memory store with the schema applied, for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut store = Self {
            db: SqliteDatabase::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Get reference to underlying database
    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    /// Apply pending schema migrations. Idempotent.
    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        migrations::run(self.db.connection_mut())
    }

    /// Insert a chunk, or update the row with the same natural key.
    ///
    /// On conflict the existing `id` and row position are kept; priority,
    /// text, embedding, dim and timestamp are replaced. Runs in a single
    /// transaction.
    pub fn upsert(&mut self, chunk: &NewChunk) -> Result<(), StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let created_at = Utc::now().to_rfc3339();
        let emb = vectors::vec_f32_to_bytes(&chunk.embedding);

        let tx = self.db.connection_mut().transaction()?;
        tx.execute(
            UPSERT_SQL,
            params![
                id,
                chunk.key.source_path,
                chunk.key.kind,
                chunk.key.chunk_index,
                chunk.priority.as_str(),
                chunk.text,
                emb,
                chunk.embedding.len() as i64,
                created_at,
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Remove every chunk of `source_path`. Returns the number of rows removed.
    pub fn delete_by_source(&mut self, source_path: &str) -> Result<usize, StoreError> {
        let tx = self.db.connection_mut().transaction()?;
        let removed = tx.execute(
            "DELETE FROM rag_chunks WHERE source_path = ?1",
            params![source_path],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Canonical id and dim of the row holding `key`, if any
    pub fn get_by_key(&self, key: &ChunkKey) -> Result<Option<StoredIdentity>, StoreError> {
        let identity = self
            .db
            .connection()
            .query_row(
                "SELECT id, dim FROM rag_chunks
                 WHERE source_path = ?1 AND kind = ?2 AND chunk_index = ?3",
                params![key.source_path, key.kind, key.chunk_index],
                |row| {
                    Ok(StoredIdentity {
                        id: row.get(0)?,
                        dim: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(identity)
    }

    /// Every chunk, in insertion order
    pub fn list_all(&self) -> Result<Vec<StoredChunk>, StoreError> {
        let mut stmt = self.db.connection().prepare(
            "SELECT id, source_path, kind, chunk_index, priority, text, emb, dim, created_at
             FROM rag_chunks ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let priority: Option<String> = row.get(4)?;
                Ok(StoredChunk {
                    id: row.get(0)?,
                    key: ChunkKey {
                        source_path: row.get(1)?,
                        kind: row.get(2)?,
                        chunk_index: row.get(3)?,
                    },
                    priority: Priority::from_stored(priority.as_deref()),
                    text: row.get(5)?,
                    emb: row.get(6)?,
                    dim: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Embedding dimension of any stored row, if the store has rows
    pub fn stored_dim(&self) -> Result<Option<i64>, StoreError> {
        let dim = self
            .db
            .connection()
            .query_row("SELECT dim FROM rag_chunks LIMIT 1", [], |row| row.get(0))
            .optional()?;
        Ok(dim)
    }

    /// Number of stored chunks
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.db
                .connection()
                .query_row("SELECT COUNT(*) FROM rag_chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source_path: &str, kind: &str, chunk_index: i64, text: &str) -> NewChunk {
        NewChunk {
            key: ChunkKey {
                source_path: source_path.to_string(),
                kind: kind.to_string(),
                chunk_index,
            },
            priority: Priority::Normal,
            text: text.to_string(),
            embedding: vec![1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() -> anyhow::Result<()> {
        let mut store = ChunkStore::open_in_memory()?;
        let first = chunk("a.md", "journal", 0, "first");
        store.upsert(&first)?;
        let original = store.get_by_key(&first.key)?.expect("row exists");

        let mut second = chunk("a.md", "journal", 0, "second");
        second.priority = Priority::High;
        second.embedding = vec![0.0, 1.0, 0.0, 0.0];
        store.upsert(&second)?;

        let updated = store.get_by_key(&second.key)?.expect("row exists");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.dim, 4);
        assert_eq!(store.count()?, 1);

        let all = store.list_all()?;
        assert_eq!(all[0].text, "second");
        assert_eq!(all[0].priority, Priority::High);
        Ok(())
    }

    #[test]
    fn test_list_all_keeps_insertion_order() -> anyhow::Result<()> {
        let mut store = ChunkStore::open_in_memory()?;
        store.upsert(&chunk("b.md", "knowledge", 0, "b"))?;
        store.upsert(&chunk("a.md", "journal", 1, "a1"))?;
        store.upsert(&chunk("a.md", "journal", 0, "a0"))?;
        // Updating an existing key must not move it
        store.upsert(&chunk("b.md", "knowledge", 0, "b again"))?;

        let texts: Vec<String> = store.list_all()?.into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["b again", "a1", "a0"]);
        Ok(())
    }

    #[test]
    fn test_delete_by_source() -> anyhow::Result<()> {
        let mut store = ChunkStore::open_in_memory()?;
        store.upsert(&chunk("a.md", "journal", 0, "a0"))?;
        store.upsert(&chunk("a.md", "journal", 1, "a1"))?;
        store.upsert(&chunk("b.md", "journal", 0, "b0"))?;

        assert_eq!(store.delete_by_source("a.md")?, 2);
        assert_eq!(store.delete_by_source("missing.md")?, 0);
        assert_eq!(store.count()?, 1);
        Ok(())
    }

    #[test]
    fn test_stored_dim() -> anyhow::Result<()> {
        let mut store = ChunkStore::open_in_memory()?;
        assert_eq!(store.stored_dim()?, None);
        store.upsert(&chunk("a.md", "journal", 0, "a0"))?;
        assert_eq!(store.stored_dim()?, Some(3));
        Ok(())
    }

    #[test]
    fn test_get_by_key_missing() -> anyhow::Result<()> {
        let store = ChunkStore::open_in_memory()?;
        let key = ChunkKey {
            source_path: "none.md".into(),
            kind: "journal".into(),
            chunk_index: 0,
        };
        assert!(store.get_by_key(&key)?.is_none());
        Ok(())
    }

    #[test]
    fn test_primary_key_collision_is_integrity_error() -> anyhow::Result<()> {
        let mut store = ChunkStore::open_in_memory()?;
        store.database().connection().execute(
            "INSERT INTO rag_chunks (id, source_path, kind, chunk_index, text, emb, dim, created_at)
             VALUES ('fixed', 'x.md', 'journal', 0, 't', x'', 0, 'now')",
            [],
        )?;
        // Same id, different natural key: the conflict clause doesn't cover it
        let err = store
            .database()
            .connection()
            .execute(
                "INSERT INTO rag_chunks (id, source_path, kind, chunk_index, text, emb, dim, created_at)
                 VALUES ('fixed', 'y.md', 'journal', 0, 't', x'', 0, 'now')",
                [],
            )
            .map_err(StoreError::from)
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));

        // The failed statement left nothing behind
        assert_eq!(store.count()?, 1);
        store.upsert(&chunk("z.md", "journal", 0, "ok"))?;
        assert_eq!(store.count()?, 2);
        Ok(())
    }
}
