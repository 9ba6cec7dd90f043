//! Atomic write batches and persisted document envelopes.

use serde::{Deserialize, Serialize};

use crate::persist::{Collection, Document};

/// Version number for serialized [`DocumentEnvelope`] payloads.
pub const DOC_FORMAT_VERSION: u16 = 1;

/// Single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Create or replace a document.
    Set(Document),
    /// Remove a document; absent documents are ignored.
    Delete {
        /// Target collection.
        collection: Collection,
        /// Target document id.
        id: String,
    },
}

/// Ordered writes that commit together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a create-or-replace of `document`.
    pub fn set(&mut self, document: Document) -> &mut Self {
        self.writes.push(Write::Set(document));
        self
    }

    /// Queues a delete of `collection/id`.
    pub fn delete(&mut self, collection: Collection, id: impl Into<String>) -> &mut Self {
        self.writes.push(Write::Delete {
            collection,
            id: id.into(),
        });
        self
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Queued writes in order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Consumes the batch into its writes.
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped document.
    pub document: Document,
}

impl DocumentEnvelope {
    /// Constructs an envelope using [`DOC_FORMAT_VERSION`].
    pub fn new(document: Document) -> Self {
        Self {
            format_version: DOC_FORMAT_VERSION,
            document,
        }
    }
}
