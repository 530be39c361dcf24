//! In-process document store with listener delivery.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{
    CollectionListener, DocumentListener, DocumentSnapshot, DocumentStore, Fields, ListenerHandle,
};
use crate::error::{Error, Result};

/// Serializable contents of a [`MemoryDocumentStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub collections: BTreeMap<String, BTreeMap<String, Fields>>,
}

type DocumentSender = UnboundedSender<Result<DocumentSnapshot>>;
type CollectionSender = UnboundedSender<Result<Vec<DocumentSnapshot>>>;

#[derive(Default)]
struct StoreInner {
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
    document_listeners: HashMap<ListenerHandle, (String, String, DocumentSender)>,
    collection_listeners: HashMap<ListenerHandle, (String, CollectionSender)>,
    write_failures: HashMap<String, String>,
    next_handle: u64,
}

impl StoreInner {
    fn allocate_handle(&mut self) -> ListenerHandle {
        self.next_handle += 1;
        ListenerHandle(self.next_handle)
    }

    fn snapshot_of(&self, collection: &str, id: &str) -> Option<DocumentSnapshot> {
        self.collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| DocumentSnapshot {
                collection: collection.to_string(),
                id: id.to_string(),
                fields: fields.clone(),
            })
    }

    fn listing_of(&self, collection: &str) -> Vec<DocumentSnapshot> {
        self.collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| DocumentSnapshot {
                        collection: collection.to_string(),
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push the current state of a document to every interested listener,
    /// pruning listeners whose receiver is gone.
    fn notify(&mut self, collection: &str, id: &str) {
        if let Some(snapshot) = self.snapshot_of(collection, id) {
            self.document_listeners.retain(|_, (listened_collection, listened_id, sender)| {
                if listened_collection != collection || listened_id != id {
                    return true;
                }
                sender.send(Ok(snapshot.clone())).is_ok()
            });
        }

        let listing = self.listing_of(collection);
        self.collection_listeners
            .retain(|_, (listened_collection, sender)| {
                if listened_collection != collection {
                    return true;
                }
                sender.send(Ok(listing.clone())).is_ok()
            });
    }
}

/// Document store kept in memory, shared between clones.
///
/// Writes are delivered synchronously into listener queues in write order.
/// Write failures can be injected per collection to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let inner = StoreInner {
            collections: snapshot.collections,
            ..StoreInner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let inner = self.lock()?;
        Ok(StoreSnapshot {
            collections: inner.collections.clone(),
        })
    }

    /// Load a snapshot file; a missing file yields an empty store.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let snapshot = serde_json::from_str::<StoreSnapshot>(&raw)?;
        tracing::debug!("Loaded document store snapshot from {}", path.display());
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Make every subsequent write to `collection` fail with `message`.
    pub fn fail_writes(&self, collection: &str, message: impl Into<String>) -> Result<()> {
        self.lock()?
            .write_failures
            .insert(collection.to_string(), message.into());
        Ok(())
    }

    pub fn clear_write_failures(&self) -> Result<()> {
        self.lock()?.write_failures.clear();
        Ok(())
    }

    /// Merge fields into an existing document, as a remote partial update would.
    pub fn merge_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut inner = self.lock()?;
        let document = inner
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| Error::NotFound(format!("{collection}/{id}")))?;
        document.extend(fields);
        inner.notify(collection, id);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.lock()
            .map(|inner| inner.document_listeners.len() + inner.collection_listeners.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|error| Error::SyncFailed(format!("document store lock poisoned: {error}")))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn document_exists(&self, collection: &str, id: &str) -> Result<bool> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(collection)
            .is_some_and(|documents| documents.contains_key(id)))
    }

    async fn read_document(&self, collection: &str, id: &str) -> Result<Fields> {
        let inner = self.lock()?;
        inner
            .snapshot_of(collection, id)
            .map(|snapshot| snapshot.fields)
            .ok_or_else(|| Error::NotFound(format!("{collection}/{id}")))
    }

    async fn write_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(message) = inner.write_failures.get(collection) {
            return Err(Error::SyncFailed(format!("{collection}/{id}: {message}")));
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        inner.notify(collection, id);
        Ok(())
    }

    fn add_document_listener(&self, collection: &str, id: &str) -> Result<DocumentListener> {
        let mut inner = self.lock()?;
        let handle = inner.allocate_handle();
        let (sender, events) = mpsc::unbounded_channel();

        if let Some(snapshot) = inner.snapshot_of(collection, id) {
            // Receiver is alive: it is returned below.
            let _ = sender.send(Ok(snapshot));
        }
        inner
            .document_listeners
            .insert(handle, (collection.to_string(), id.to_string(), sender));
        Ok(DocumentListener { handle, events })
    }

    fn add_collection_listener(&self, collection: &str) -> Result<CollectionListener> {
        let mut inner = self.lock()?;
        let handle = inner.allocate_handle();
        let (sender, events) = mpsc::unbounded_channel();

        let _ = sender.send(Ok(inner.listing_of(collection)));
        inner
            .collection_listeners
            .insert(handle, (collection.to_string(), sender));
        Ok(CollectionListener { handle, events })
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        if let Ok(mut inner) = self.lock() {
            inner.document_listeners.remove(&handle);
            inner.collection_listeners.remove(&handle);
        }
    }
}
