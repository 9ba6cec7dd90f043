//! In-process document store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

use crate::batch::{Write, WriteBatch};

use super::{Collection, Document, DocumentStore, Filter, PersistResult, matches_all};

type Table = HashMap<String, Document>;

/// [`DocumentStore`] backed by hash maps behind one mutex.
///
/// A commit applies every write under a single lock acquisition, so readers
/// never observe half a batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of documents in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        self.tables().get(&collection).map_or(0, HashMap::len)
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<Collection, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: Collection, id: &str) -> PersistResult<Option<Document>> {
        Ok(self
            .tables()
            .get(&collection)
            .and_then(|table| table.get(id))
            .cloned())
    }

    fn query(&self, collection: Collection, filters: &[Filter]) -> PersistResult<Vec<Document>> {
        let tables = self.tables();
        let Some(table) = tables.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut ids: Vec<&String> = table.keys().collect();
        ids.sort();

        let mut out = Vec::new();
        for id in ids {
            let doc = &table[id];
            if matches_all(doc, filters)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: WriteBatch) -> PersistResult<()> {
        let mut tables = self.tables();
        for write in batch.into_writes() {
            match write {
                Write::Set(doc) => {
                    tables
                        .entry(doc.collection())
                        .or_default()
                        .insert(doc.id(), doc);
                }
                Write::Delete { collection, id } => {
                    if let Some(table) = tables.get_mut(&collection) {
                        table.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}
