//! Document sync adapter.
//!
//! The remote document database is consumed through [`DocumentStore`]:
//! documents are flat JSON objects keyed by collection name and document id.
//! Listener deliveries are queued on unbounded channels and applied by their
//! owner, so a snapshot may be observed before or after any local read.

mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{Error, Result};

pub use memory::{MemoryDocumentStore, StoreSnapshot};

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// A document as delivered by a read or a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
}

/// Identifies a registered listener so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(pub u64);

/// Change feed for a single document.
#[derive(Debug)]
pub struct DocumentListener {
    pub handle: ListenerHandle,
    pub events: UnboundedReceiver<Result<DocumentSnapshot>>,
}

/// Change feed for a whole collection; every event carries the full listing.
#[derive(Debug)]
pub struct CollectionListener {
    pub handle: ListenerHandle,
    pub events: UnboundedReceiver<Result<Vec<DocumentSnapshot>>>,
}

/// Remote document database operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn document_exists(&self, collection: &str, id: &str) -> Result<bool>;

    /// Read a document, failing with [`Error::NotFound`] when absent.
    async fn read_document(&self, collection: &str, id: &str) -> Result<Fields>;

    /// Replace a document's fields, failing with [`Error::SyncFailed`].
    async fn write_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    fn add_document_listener(&self, collection: &str, id: &str) -> Result<DocumentListener>;

    fn add_collection_listener(&self, collection: &str) -> Result<CollectionListener>;

    fn remove_listener(&self, handle: ListenerHandle);
}

/// An entity persisted as one document.
pub trait SyncEntity {
    fn document_id(&self) -> &str;

    fn assign_id(&mut self, id: &str);

    fn to_fields(&self) -> Result<Fields>;

    /// Apply the fields present in `fields`; absent keys keep their value.
    ///
    /// Implementations decode everything before mutating, so an error leaves
    /// the entity untouched.
    fn apply_fields(&mut self, fields: &Fields) -> Result<()>;

    /// Hydrate from a snapshot, adopting its id when the entity has none.
    fn apply_snapshot(&mut self, snapshot: &DocumentSnapshot) -> Result<()> {
        let current = self.document_id();
        if !current.is_empty() && current != snapshot.id {
            return Err(Error::Listener(format!(
                "snapshot for '{}' cannot hydrate entity '{current}'",
                snapshot.id
            )));
        }
        self.apply_fields(&snapshot.fields)?;
        if self.document_id().is_empty() {
            self.assign_id(&snapshot.id);
        }
        Ok(())
    }
}

/// Write an entity under its own id.
pub async fn write_entity<E: SyncEntity + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    entity: &E,
) -> Result<()> {
    let id = entity.document_id();
    if id.is_empty() {
        return Err(Error::InvalidInput(format!(
            "cannot write to {collection} before an id is assigned"
        )));
    }
    store
        .write_document(collection, id, entity.to_fields()?)
        .await
}

/// Serialize a document struct into its field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidInput(format!(
            "document must serialize to an object, got {other}"
        ))),
    }
}

/// Decode a field map, reporting failures as [`Error::Listener`].
pub fn decode_fields<T: DeserializeOwned>(fields: &Fields) -> Result<T> {
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|error| Error::Listener(format!("malformed document payload: {error}")))
}
