//! The context store: content store and similarity index kept in lockstep.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::chunking::TextChunker;
use super::content::{Chunk, ContentStore, MemoryContentStore};
use super::embeddings::Embedder;
use super::source::Source;
use super::vector::{DistanceMetric, FlatIndex, IndexEntry, VectorIndex};
use crate::config::VizConfig;
use crate::error::{VizError, VizResult};

/// Similarity index artifact file name.
pub const INDEX_FILE: &str = "index.json";

/// Content store artifact file name.
pub const DOCSTORE_FILE: &str = "docstore.json";

/// Extensions picked up by [`ContextStore::update_knowledge_base`].
const KNOWLEDGE_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source_id: String,
    pub doc_ids: Vec<String>,
    /// How many of `doc_ids` replaced an existing chunk.
    pub replaced: usize,
    /// Chunks of an earlier version of the source that were dropped.
    pub removed: usize,
}

type Previous = (String, Option<Chunk>, Option<Vec<f32>>);

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    embedder: String,
    dimension: usize,
    metric: DistanceMetric,
    entries: Vec<IndexEntry>,
}

struct Backends {
    content: Box<dyn ContentStore>,
    index: Box<dyn VectorIndex>,
}

/// Chunked, embedded and indexed context for analysis prompts.
///
/// Ingestion embeds outside the lock, then writes content first and indexes
/// second under the write lock; a failed index write rolls the content back.
/// Retrieval holds the read lock, so it never observes a chunk that is in the
/// content store but not yet in the index.
pub struct ContextStore {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    dir: Option<PathBuf>,
    backends: RwLock<Backends>,
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("embedder", &self.embedder.name())
            .field("chunker", &self.chunker)
            .field("dir", &self.dir)
            .finish()
    }
}

impl ContextStore {
    /// An empty in-memory store with a flat index.
    pub fn new(embedder: Arc<dyn Embedder>, chunker: TextChunker, metric: DistanceMetric) -> Self {
        let index = FlatIndex::new(embedder.dimension(), metric);
        Self::with_backends(
            embedder,
            chunker,
            Box::new(MemoryContentStore::new()),
            Box::new(index),
        )
    }

    /// A store over caller-supplied backends.
    pub fn with_backends(
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        content: Box<dyn ContentStore>,
        index: Box<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            chunker,
            dir: None,
            backends: RwLock::new(Backends { content, index }),
        }
    }

    /// Opens the store persisted in `dir`, or an empty one bound to `dir`.
    pub fn open(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        metric: DistanceMetric,
    ) -> VizResult<Self> {
        let dir = dir.into();
        let index_path = dir.join(INDEX_FILE);
        let docstore_path = dir.join(DOCSTORE_FILE);

        let mut store = Self::new(embedder.clone(), chunker, metric);
        store.dir = Some(dir.clone());

        if !index_path.exists() && !docstore_path.exists() {
            debug!(dir = %dir.display(), "No persisted context store, starting empty");
            return Ok(store);
        }

        let artifact: IndexArtifact = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
        let chunks: Vec<Chunk> = serde_json::from_str(&std::fs::read_to_string(&docstore_path)?)?;

        if artifact.dimension != embedder.dimension() {
            return Err(VizError::Ingestion {
                source_id: dir.display().to_string(),
                reason: format!(
                    "persisted index has dimension {}, embedder produces {}",
                    artifact.dimension,
                    embedder.dimension()
                ),
            });
        }
        if artifact.embedder != embedder.name() {
            warn!(
                persisted = %artifact.embedder,
                current = %embedder.name(),
                "Persisted index was built with a different embedder"
            );
        }

        if artifact.metric != metric {
            warn!(
                persisted = ?artifact.metric,
                requested = ?metric,
                "Persisted index uses a different distance metric, keeping the persisted one"
            );
        }

        let mut index = FlatIndex::new(artifact.dimension, artifact.metric);
        for entry in artifact.entries {
            index.upsert(&entry.doc_id, entry.vector)?;
        }
        let mut content = MemoryContentStore::new();
        for chunk in chunks {
            content.put(chunk);
        }
        let chunk_ids: BTreeSet<String> = content.chunks().into_iter().map(|c| c.doc_id).collect();
        let vector_ids: BTreeSet<String> = index.entries().into_iter().map(|e| e.doc_id).collect();
        if chunk_ids != vector_ids {
            let missing_vectors = chunk_ids.difference(&vector_ids).count();
            let missing_chunks = vector_ids.difference(&chunk_ids).count();
            return Err(VizError::Ingestion {
                source_id: dir.display().to_string(),
                reason: format!(
                    "docstore and index disagree: {} chunks without vectors, {} vectors without chunks",
                    missing_vectors, missing_chunks
                ),
            });
        }

        info!(dir = %dir.display(), count = index.len(), "Loaded context store");
        store.backends = RwLock::new(Backends {
            content: Box::new(content),
            index: Box::new(index),
        });
        Ok(store)
    }

    /// Opens the store described by `config`.
    pub fn from_config(config: &VizConfig, embedder: Arc<dyn Embedder>) -> VizResult<Self> {
        Self::open(
            config.store_dir.clone(),
            embedder,
            TextChunker::new(config.chunk_size, config.chunk_overlap),
            config.distance_metric,
        )
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, doc_id: &str) -> Option<Chunk> {
        self.backends.read().await.content.get(doc_id)
    }

    /// Chunks, embeds and stores `source`.
    ///
    /// Re-ingesting a source replaces all of its chunks, including ones the
    /// new version no longer produces. On failure both stores are left as
    /// they were and [`VizError::Ingestion`] is returned.
    pub async fn ingest(&self, source: Source) -> VizResult<IngestReport> {
        let source_id = source.id().to_string();
        let kind = source.kind();
        let owner_key = source.owner_key();
        let chunks = source.into_chunks(&self.chunker);
        if chunks.is_empty() {
            debug!(source = %source_id, kind, "Source produced no chunks");
            return Ok(IngestReport {
                source_id,
                doc_ids: Vec::new(),
                replaced: 0,
                removed: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| VizError::Ingestion {
                source_id: source_id.clone(),
                reason: format!("embedding failed: {}", e),
            })?;
        if vectors.len() != chunks.len() {
            return Err(VizError::Ingestion {
                source_id,
                reason: format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            });
        }

        let mut guard = self.backends.write().await;
        let backends = &mut *guard;

        let doc_ids: Vec<String> = chunks.iter().map(|c| c.doc_id.clone()).collect();
        let stale: Vec<Chunk> = backends
            .content
            .chunks()
            .into_iter()
            .filter(|c| {
                c.source() == Some(kind)
                    && c.metadata.get(owner_key).map(String::as_str) == Some(source_id.as_str())
                    && !doc_ids.contains(&c.doc_id)
            })
            .collect();

        let mut previous: Vec<Previous> = Vec::new();
        for chunk in chunks {
            let doc_id = chunk.doc_id.clone();
            let old_vector = backends.index.get(&doc_id);
            let old_chunk = backends.content.put(chunk);
            previous.push((doc_id, old_chunk, old_vector));
        }

        let mut removed: Vec<(Chunk, Option<Vec<f32>>)> = Vec::with_capacity(stale.len());
        for chunk in stale {
            let old_vector = backends.index.get(&chunk.doc_id);
            backends.content.remove(&chunk.doc_id);
            backends.index.remove(&chunk.doc_id);
            removed.push((chunk, old_vector));
        }

        for (i, vector) in vectors.into_iter().enumerate() {
            if let Err(err) = backends.index.upsert(&doc_ids[i], vector) {
                rollback(backends, &previous, i);
                restore(backends, removed);
                warn!(source = %source_id, error = %err, "Ingestion rolled back");
                return Err(VizError::Ingestion {
                    source_id,
                    reason: err.to_string(),
                });
            }
        }

        let replaced = previous.iter().filter(|(_, old, _)| old.is_some()).count();
        info!(
            source = %source_id,
            kind,
            count = doc_ids.len(),
            replaced,
            removed = removed.len(),
            "Ingested source"
        );
        Ok(IngestReport {
            source_id,
            doc_ids,
            replaced,
            removed: removed.len(),
        })
    }

    /// The `k` chunks nearest to `query`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> VizResult<Vec<RetrievedChunk>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors.pop().unwrap_or_default();

        let backends = self.backends.read().await;
        let hits = backends
            .index
            .query(&vector, k)
            .into_iter()
            .filter_map(|hit| {
                backends.content.get(&hit.doc_id).map(|chunk| RetrievedChunk {
                    chunk,
                    score: hit.score,
                })
            })
            .collect::<Vec<_>>();
        debug!(k, count = hits.len(), "Retrieved context");
        Ok(hits)
    }

    /// Writes both artifacts into the store directory.
    pub async fn persist(&self) -> VizResult<()> {
        let dir = self.dir.as_ref().ok_or_else(|| {
            VizError::InvalidInput("context store has no directory to persist to".to_string())
        })?;
        std::fs::create_dir_all(dir)?;

        let backends = self.backends.read().await;
        let artifact = IndexArtifact {
            embedder: self.embedder.name().to_string(),
            dimension: backends.index.dimension(),
            metric: backends.index.metric(),
            entries: backends.index.entries(),
        };
        let chunks = backends.content.chunks();

        write_atomic(&dir.join(INDEX_FILE), &serde_json::to_vec(&artifact)?)?;
        write_atomic(&dir.join(DOCSTORE_FILE), &serde_json::to_vec_pretty(&chunks)?)?;
        info!(dir = %dir.display(), count = chunks.len(), "Persisted context store");
        Ok(())
    }

    /// Ingests every `.txt`/`.md` file under `dir`.
    ///
    /// A missing directory is logged and ingests nothing.
    pub async fn update_knowledge_base(&self, dir: impl AsRef<Path>) -> VizResult<Vec<IngestReport>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Knowledge base directory not found");
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| KNOWLEDGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path)?;
            let id = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            reports.push(self.ingest(Source::document(id, text)).await?);
        }
        info!(dir = %dir.display(), documents = reports.len(), "Knowledge base updated");
        Ok(reports)
    }
}

/// Restores both stores after the index write for `doc_ids[failed_at]` failed.
fn rollback(backends: &mut Backends, previous: &[Previous], failed_at: usize) {
    for (i, (doc_id, old_chunk, old_vector)) in previous.iter().enumerate() {
        match old_chunk {
            Some(chunk) => {
                backends.content.put(chunk.clone());
            }
            None => {
                backends.content.remove(doc_id);
            }
        }
        if i < failed_at {
            match old_vector {
                Some(vector) => {
                    if let Err(err) = backends.index.upsert(doc_id, vector.clone()) {
                        warn!(doc_id = %doc_id, error = %err, "Failed to restore vector");
                    }
                }
                None => {
                    backends.index.remove(doc_id);
                }
            }
        }
    }
}

/// Puts back chunks dropped as stale during a failed ingestion.
fn restore(backends: &mut Backends, removed: Vec<(Chunk, Option<Vec<f32>>)>) {
    for (chunk, old_vector) in removed {
        if let Some(vector) = old_vector {
            if let Err(err) = backends.index.upsert(&chunk.doc_id, vector) {
                warn!(doc_id = %chunk.doc_id, error = %err, "Failed to restore vector");
            }
        }
        backends.content.put(chunk);
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> VizResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| VizError::Io(e.error))?;
    Ok(())
}
