pub mod memory;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    batch::WriteBatch,
    event::{EntrantRecord, EventRecord, NotificationRecord},
};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Events,
    Entrants,
    Notifications,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Entrants => "entrants",
            Self::Notifications => "notifications",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Document {
    Event(EventRecord),
    Entrant(EntrantRecord),
    Notification(NotificationRecord),
}

impl Document {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Event(_) => Collection::Events,
            Self::Entrant(_) => Collection::Entrants,
            Self::Notification(_) => Collection::Notifications,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Self::Event(event) => event.id.clone(),
            Self::Entrant(entrant) => entrant.id(),
            Self::Notification(notification) => notification.id.clone(),
        }
    }

    /// Field view used to evaluate query filters.
    pub fn fields(&self) -> PersistResult<Value> {
        let value = match self {
            Self::Event(event) => serde_json::to_value(event)?,
            Self::Entrant(entrant) => serde_json::to_value(entrant)?,
            Self::Notification(notification) => serde_json::to_value(notification)?,
        };
        Ok(value)
    }
}

/// Query predicate over a named document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Value) -> bool {
        match self {
            Self::Eq { field, value } => fields.get(field) == Some(value),
            Self::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Returns true when `document` satisfies every filter.
pub fn matches_all(document: &Document, filters: &[Filter]) -> PersistResult<bool> {
    if filters.is_empty() {
        return Ok(true);
    }
    let fields = document.fields()?;
    Ok(filters.iter().all(|filter| filter.matches(&fields)))
}

/// Transactional document store consumed by the lottery core.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> PersistResult<Option<Document>>;

    /// Documents in `collection` matching every filter, ordered by id.
    fn query(&self, collection: Collection, filters: &[Filter]) -> PersistResult<Vec<Document>>;

    /// Applies every write in `batch` or none of them.
    fn commit(&self, batch: WriteBatch) -> PersistResult<()>;

    fn event(&self, id: &str) -> PersistResult<Option<EventRecord>> {
        match self.get(Collection::Events, id)? {
            Some(Document::Event(event)) => Ok(Some(event)),
            Some(other) => Err(unexpected(Collection::Events, &other)),
            None => Ok(None),
        }
    }

    fn entrant(&self, event_id: &str, user_id: &str) -> PersistResult<Option<EntrantRecord>> {
        let id = EntrantRecord::doc_id(event_id, user_id);
        match self.get(Collection::Entrants, &id)? {
            Some(Document::Entrant(entrant)) => Ok(Some(entrant)),
            Some(other) => Err(unexpected(Collection::Entrants, &other)),
            None => Ok(None),
        }
    }

    fn notification(&self, id: &str) -> PersistResult<Option<NotificationRecord>> {
        match self.get(Collection::Notifications, id)? {
            Some(Document::Notification(notification)) => Ok(Some(notification)),
            Some(other) => Err(unexpected(Collection::Notifications, &other)),
            None => Ok(None),
        }
    }

    fn events(&self, filters: &[Filter]) -> PersistResult<Vec<EventRecord>> {
        self.query(Collection::Events, filters)?
            .into_iter()
            .map(|doc| match doc {
                Document::Event(event) => Ok(event),
                other => Err(unexpected(Collection::Events, &other)),
            })
            .collect()
    }

    fn entrants(&self, filters: &[Filter]) -> PersistResult<Vec<EntrantRecord>> {
        self.query(Collection::Entrants, filters)?
            .into_iter()
            .map(|doc| match doc {
                Document::Entrant(entrant) => Ok(entrant),
                other => Err(unexpected(Collection::Entrants, &other)),
            })
            .collect()
    }

    fn notifications(&self, filters: &[Filter]) -> PersistResult<Vec<NotificationRecord>> {
        self.query(Collection::Notifications, filters)?
            .into_iter()
            .map(|doc| match doc {
                Document::Notification(notification) => Ok(notification),
                other => Err(unexpected(Collection::Notifications, &other)),
            })
            .collect()
    }
}

fn unexpected(collection: Collection, document: &Document) -> PersistError {
    PersistError::Message(format!(
        "collection {} holds a {} document",
        collection.as_str(),
        document.collection().as_str()
    ))
}
