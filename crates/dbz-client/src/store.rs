//! The key-value store collaborator used by the storage services.

use std::collections::HashMap;

use dbz_core::Document;
use parking_lot::RwLock;

pub trait DocumentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Document>;
    fn put(&self, key: &str, doc: Document);
    fn remove(&self, key: &str) -> Option<Document>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl DocumentStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<Document> {
        self.docs.read().get(key).cloned()
    }

    fn put(&self, key: &str, doc: Document) {
        self.docs.write().insert(key.to_string(), doc);
    }

    fn remove(&self, key: &str) -> Option<Document> {
        self.docs.write().remove(key)
    }
}
