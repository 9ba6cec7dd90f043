//! SQLite-backed document store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    batch::{DOC_FORMAT_VERSION, DocumentEnvelope, Write, WriteBatch},
    core::now_ms,
};

use super::{Collection, Document, DocumentStore, Filter, PersistError, PersistResult, matches_all};

/// SQLite implementation of [`crate::persist::DocumentStore`].
///
/// Every commit runs in one SQL transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored documents in `collection`.
    pub fn count(&self, collection: Collection) -> PersistResult<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: Collection, id: &str) -> PersistResult<Option<Document>> {
        let payload: Option<Vec<u8>> = self
            .conn()
            .query_row(
                "SELECT payload FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        payload.map(|bytes| decode_document(&bytes)).transpose()
    }

    fn query(&self, collection: Collection, filters: &[Filter]) -> PersistResult<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT payload FROM documents WHERE collection = ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![collection.as_str()], |row| row.get::<_, Vec<u8>>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let doc = decode_document(&row?)?;
            if matches_all(&doc, filters)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: WriteBatch) -> PersistResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO documents(collection, id, updated_ms, payload) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET updated_ms = excluded.updated_ms, payload = excluded.payload",
            )?;
            let mut delete = tx.prepare("DELETE FROM documents WHERE collection = ?1 AND id = ?2")?;
            let ts_ms = now_ms();

            for write in batch.into_writes() {
                match write {
                    Write::Set(doc) => {
                        let collection = doc.collection();
                        let id = doc.id();
                        let payload = serde_json::to_vec(&DocumentEnvelope::new(doc))?;
                        upsert.execute(params![collection.as_str(), id, ts_ms as i64, payload])?;
                    }
                    Write::Delete { collection, id } => {
                        delete.execute(params![collection.as_str(), id])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn decode_document(payload: &[u8]) -> PersistResult<Document> {
    let envelope: DocumentEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != DOC_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "unsupported document format version: {}",
            envelope.format_version
        )));
    }
    Ok(envelope.document)
}

