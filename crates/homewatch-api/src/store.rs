//! Document persistence with per-document change subscriptions.
//!
//! Documents are JSON values addressed by `(collection, id)`. Writers call
//! [`DocumentStore::put`]; anyone interested in a document can
//! [`subscribe`](DocumentStore::subscribe) and receives every value
//! subsequently written to it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Error;

/// A stored document.
pub type Document = Value;

const WATCH_CAPACITY: usize = 16;

/// Keyed JSON storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, or `None` when it has never been written.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error>;

    /// Create or replace a document and notify its subscribers.
    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), Error>;

    /// Store a document under a fresh id and return that id.
    async fn append(&self, collection: &str, doc: Document) -> Result<String, Error> {
        let id = uuid::Uuid::new_v4().to_string();
        self.put(collection, &id, doc).await?;
        Ok(id)
    }

    /// Receive every value written to `(collection, id)` from now on.
    fn subscribe(&self, collection: &str, id: &str) -> broadcast::Receiver<Document>;
}

// ── Subscriptions ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Watchers {
    senders: DashMap<(String, String), broadcast::Sender<Document>>,
}

impl Watchers {
    fn subscribe(&self, collection: &str, id: &str) -> broadcast::Receiver<Document> {
        self.senders
            .entry((collection.to_owned(), id.to_owned()))
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0)
            .subscribe()
    }

    fn notify(&self, collection: &str, id: &str, doc: &Document) {
        let key = (collection.to_owned(), id.to_owned());
        if let Some(tx) = self.senders.get(&key) {
            // No receivers left is fine.
            let _ = tx.send(doc.clone());
        }
    }
}

// ── In-memory store ──────────────────────────────────────────────────

/// A store that never touches disk.
///
/// Writes can be made to fail on demand so callers can exercise their
/// persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<(String, String), Document>,
    watchers: Watchers,
    puts: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every subsequent `put` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Every document currently in `collection`.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        let key = (collection.to_owned(), id.to_owned());
        Ok(self.docs.get(&key).map(|d| d.value().clone()))
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store {
                collection: collection.to_owned(),
                message: "writes disabled".into(),
            });
        }
        self.docs
            .insert((collection.to_owned(), id.to_owned()), doc.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.watchers.notify(collection, id, &doc);
        Ok(())
    }

    fn subscribe(&self, collection: &str, id: &str) -> broadcast::Receiver<Document> {
        self.watchers.subscribe(collection, id)
    }
}

// ── JSON file store ──────────────────────────────────────────────────

/// One JSON object per collection, stored as `<dir>/<collection>.json`.
///
/// Each write replaces the file through a temporary sibling and a rename,
/// so a crash never leaves a truncated collection behind.
///
/// Writes made through this instance reach subscribers immediately. Writes
/// made by other processes reach them once the collection is being
/// [watched](JsonFileStore::watch). Collections registered with
/// [`with_rotation`](JsonFileStore::with_rotation) are moved aside to
/// `<collection>.1.json` when they fill up.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    watchers: Watchers,
    /// Last known contents of each watched collection.
    observed: DashMap<String, Map<String, Value>>,
    rotations: HashMap<String, usize>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
            watchers: Watchers::default(),
            observed: DashMap::new(),
            rotations: HashMap::new(),
        }
    }

    /// Cap `collection` at `max_docs` documents. A new id arriving at a full
    /// collection replaces the previous rotated file and starts a fresh one.
    #[must_use]
    pub fn with_rotation(mut self, collection: &str, max_docs: usize) -> Self {
        self.rotations.insert(collection.to_owned(), max_docs.max(1));
        self
    }

    /// Poll `collections` every `period` and announce documents whose
    /// on-disk value changed since the last look.
    ///
    /// The current contents are the baseline; nothing already on disk is
    /// announced. The task ends once the store is dropped.
    pub async fn watch(
        self: &Arc<Self>,
        collections: &[&str],
        period: Duration,
    ) -> Result<JoinHandle<()>, Error> {
        {
            let _guard = self.write_lock.lock().await;
            for collection in collections {
                let docs = self.load(collection).await?;
                self.observed.insert((*collection).to_owned(), docs);
            }
        }

        let store = Arc::downgrade(self);
        Ok(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else { break };
                store.poll().await;
            }
            tracing::debug!("file watcher exiting");
        }))
    }

    async fn poll(&self) {
        let _guard = self.write_lock.lock().await;
        let collections: Vec<String> = self.observed.iter().map(|e| e.key().clone()).collect();

        for collection in collections {
            let docs = match self.load(&collection).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(
                        collection = %collection,
                        error = %e,
                        "failed to poll collection"
                    );
                    continue;
                }
            };
            if let Some(mut seen) = self.observed.get_mut(&collection) {
                for (id, doc) in &docs {
                    if seen.get(id) != Some(doc) {
                        tracing::trace!(collection = %collection, %id, "external write detected");
                        self.watchers.notify(&collection, id, doc);
                    }
                }
                *seen = docs;
            }
        }
    }

    async fn rotate(&self, collection: &str) -> Result<(), Error> {
        let rotated = self.dir.join(format!("{collection}.1.json"));
        tokio::fs::rename(self.collection_path(collection), &rotated)
            .await
            .map_err(|e| store_error(collection, &e))?;
        tracing::debug!(collection, path = %rotated.display(), "collection rotated");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn load(&self, collection: &str) -> Result<Map<String, Value>, Error> {
        let path = self.collection_path(collection);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(store_error(collection, &e)),
        };
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{}: {e}", path.display()),
            body,
        })
    }

    async fn save(&self, collection: &str, docs: &Map<String, Value>) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_error(collection, &e))?;

        let body = serde_json::to_vec_pretty(docs).map_err(|e| Error::Store {
            collection: collection.to_owned(),
            message: e.to_string(),
        })?;

        let target = self.collection_path(collection);
        let tmp = self.dir.join(format!(".{collection}.json.tmp"));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| store_error(collection, &e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| store_error(collection, &e))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        Ok(self.load(collection).await?.remove(id))
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), Error> {
        {
            let _guard = self.write_lock.lock().await;
            let mut docs = self.load(collection).await?;
            let full = self
                .rotations
                .get(collection)
                .is_some_and(|&max_docs| docs.len() >= max_docs);
            if full && !docs.contains_key(id) {
                self.rotate(collection).await?;
                docs = Map::new();
            }
            docs.insert(id.to_owned(), doc.clone());
            self.save(collection, &docs).await?;
            if let Some(mut seen) = self.observed.get_mut(collection) {
                *seen = docs;
            }
        }
        tracing::trace!(collection, id, "document written");
        self.watchers.notify(collection, id, &doc);
        Ok(())
    }

    fn subscribe(&self, collection: &str, id: &str) -> broadcast::Receiver<Document> {
        self.watchers.subscribe(collection, id)
    }
}

fn store_error(collection: &str, err: &std::io::Error) -> Error {
    Error::Store {
        collection: collection.to_owned(),
        message: err.to_string(),
    }
}
