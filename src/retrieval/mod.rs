//! Hybrid retrieval against an OpenSearch backend.
//!
//! Ingestion chunks local documents, embeds them, and bulk-indexes the
//! vectors; query time issues one hybrid request combining a full-text
//! match with a kNN vector clause.

pub mod chunker;
pub mod hybrid;
pub mod opensearch;

use async_trait::async_trait;

use crate::core::errors::ApiError;

pub use chunker::{Chunker, ChunkerConfig, TextChunk};
pub use hybrid::{HybridRetriever, Snippet};
pub use opensearch::{IndexDoc, OpenSearchClient};

/// Retrieves context snippets for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Snippet>, ApiError>;
}
