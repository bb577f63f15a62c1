//! Ingestion sources and deterministic doc_id derivation.

use crate::data::DataFrame;
use crate::datamodel::Summary;

use super::chunking::TextChunker;
use super::content::Chunk;

/// Something that can be ingested into the context store.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A text document, chunked. `id` is usually a path or title.
    Document { id: String, text: String },
    /// Text scraped from a web page, chunked.
    Web { url: String, text: String },
    /// Statistical description of a dataset, one chunk.
    DataFrame { name: String, description: String },
    /// Context rendering of a summary, one chunk.
    Summary { name: String, text: String },
}

impl Source {
    pub fn document(id: impl Into<String>, text: impl Into<String>) -> Self {
        Source::Document {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn web(url: impl Into<String>, text: impl Into<String>) -> Self {
        Source::Web {
            url: url.into(),
            text: text.into(),
        }
    }

    /// Describes the cleaned dataset.
    pub fn dataframe(frame: &DataFrame) -> Self {
        Source::DataFrame {
            name: frame.name().to_string(),
            description: frame.clean().describe(),
        }
    }

    pub fn summary(summary: &Summary) -> Self {
        Source::Summary {
            name: summary.name.clone(),
            text: summary.to_context_text(),
        }
    }

    /// Identity used in errors and logs.
    pub fn id(&self) -> &str {
        match self {
            Source::Document { id, .. } => id,
            Source::Web { url, .. } => url,
            Source::DataFrame { name, .. } | Source::Summary { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Source::Document { .. } => "document",
            Source::Web { .. } => "web",
            Source::DataFrame { .. } => "dataframe",
            Source::Summary { .. } => "summary",
        }
    }

    /// Metadata key under which this source's chunks record its id.
    pub fn owner_key(&self) -> &'static str {
        match self {
            Source::Document { .. } => "document",
            Source::Web { .. } => "url",
            Source::DataFrame { .. } | Source::Summary { .. } => "name",
        }
    }

    /// Chunks the source and assigns doc_ids and metadata.
    pub fn into_chunks(self, chunker: &TextChunker) -> Vec<Chunk> {
        let kind = self.kind();
        match self {
            Source::Document { id, text } => chunker
                .split(&text)
                .into_iter()
                .enumerate()
                .map(|(i, content)| {
                    Chunk::new(chunked_id("doc", &id, i), content)
                        .with_metadata("source", kind)
                        .with_metadata("document", id.clone())
                        .with_metadata("chunk_index", i.to_string())
                })
                .collect(),
            Source::Web { url, text } => chunker
                .split(&text)
                .into_iter()
                .enumerate()
                .map(|(i, content)| {
                    Chunk::new(chunked_id("web", &url, i), content)
                        .with_metadata("source", kind)
                        .with_metadata("url", url.clone())
                        .with_metadata("chunk_index", i.to_string())
                })
                .collect(),
            Source::DataFrame { name, description } => single(
                format!("dataframe_{}", name),
                description,
                kind,
                name,
            ),
            Source::Summary { name, text } => single(format!("summary_{}", name), text, kind, name),
        }
    }
}

fn chunked_id(prefix: &str, source_id: &str, index: usize) -> String {
    format!("{}_{}_{}", prefix, urlencoding::encode(source_id), index)
}

fn single(doc_id: String, content: String, kind: &str, name: String) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    vec![Chunk::new(doc_id, content)
        .with_metadata("source", kind)
        .with_metadata("name", name)]
}
