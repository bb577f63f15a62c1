//! Retrieval-augmented context store.
//!
//! Sources (documents, web text, dataset descriptions, summaries) are split
//! into overlapping windows, embedded, and written to two backends that are
//! kept in lockstep under the same doc_id: a [`ContentStore`] for keyed
//! lookup and a [`VectorIndex`] for similarity search.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vizforge::retrieval::{ContextStore, DistanceMetric, HashEmbedder, Source, TextChunker};
//!
//! let store = ContextStore::new(
//!     Arc::new(HashEmbedder::default()),
//!     TextChunker::new(1000, 100),
//!     DistanceMetric::Cosine,
//! );
//! store.ingest(Source::document("notes.md", text)).await?;
//! let hits = store.retrieve("holiday sales", 3).await?;
//! ```

pub mod chunking;
pub mod content;
pub mod embeddings;
pub mod source;
pub mod store;
pub mod vector;

pub use chunking::TextChunker;
pub use content::{Chunk, ContentStore, MemoryContentStore};
pub use embeddings::{embedder_from_config, Embedder, HashEmbedder, RemoteEmbedder};
pub use source::Source;
pub use store::{ContextStore, IngestReport, RetrievedChunk, DOCSTORE_FILE, INDEX_FILE};
pub use vector::{DistanceMetric, FlatIndex, IndexEntry, ScoredId, VectorIndex};
