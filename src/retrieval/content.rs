//! Key to chunk content storage.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub content: String,
    /// Always carries `source`; other keys depend on the source kind.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn new(doc_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

/// A keyed chunk store.
pub trait ContentStore: Send + Sync {
    fn get(&self, doc_id: &str) -> Option<Chunk>;

    /// Stores `chunk`, returning the chunk it replaced.
    fn put(&mut self, chunk: Chunk) -> Option<Chunk>;

    fn remove(&mut self, doc_id: &str) -> Option<Chunk>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored chunk, ordered by doc_id.
    fn chunks(&self) -> Vec<Chunk>;
}

/// In-process [`ContentStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    chunks: HashMap<String, Chunk>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    fn get(&self, doc_id: &str) -> Option<Chunk> {
        self.chunks.get(doc_id).cloned()
    }

    fn put(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.doc_id.clone(), chunk)
    }

    fn remove(&mut self, doc_id: &str) -> Option<Chunk> {
        self.chunks.remove(doc_id)
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn chunks(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.chunks.values().cloned().collect();
        chunks.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_returns_replaced_chunk() {
        let mut store = MemoryContentStore::new();
        assert!(store.put(Chunk::new("a", "one")).is_none());
        let previous = store.put(Chunk::new("a", "two")).unwrap();
        assert_eq!(previous.content, "one");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().content, "two");
    }

    #[test]
    fn test_chunks_sorted_by_id() {
        let mut store = MemoryContentStore::new();
        store.put(Chunk::new("b", "2").with_metadata("source", "doc"));
        store.put(Chunk::new("a", "1"));
        let ids: Vec<String> = store.chunks().into_iter().map(|c| c.doc_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("b").unwrap().source(), Some("doc"));
        assert!(store.remove("a").is_some());
        assert!(store.get("a").is_none());
    }
}
