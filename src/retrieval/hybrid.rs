use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::opensearch::OpenSearchClient;
use super::Retriever;
use crate::core::errors::ApiError;
use crate::llm::provider::LlmProvider;

/// A retrieved snippet with matched-query diagnostics. The flags say
/// which hybrid sub-query produced the hit; they are informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    pub matched_text: bool,
    pub matched_vector: bool,
}

/// Issues one hybrid (full-text + kNN) query per retrieval and maps the
/// hits to plain text snippets for prompt augmentation.
pub struct HybridRetriever {
    search: Arc<OpenSearchClient>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
    index: String,
    k: usize,
    pipeline: Option<String>,
}

impl HybridRetriever {
    pub fn new(
        search: Arc<OpenSearchClient>,
        provider: Arc<dyn LlmProvider>,
        embedding_model: impl Into<String>,
        index: impl Into<String>,
        k: usize,
    ) -> Self {
        Self {
            search,
            provider,
            embedding_model: embedding_model.into(),
            index: index.into(),
            k,
            pipeline: None,
        }
    }

    /// Route search requests through a named search pipeline (RRF).
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }
}

/// Hybrid query body: a `match` clause over `text` and a `knn` clause
/// over `vector`, both named so hits report which one matched.
pub fn build_hybrid_query(query_text: &str, vector: &[f32], k: usize) -> Value {
    json!({
        "query": {
            "hybrid": {
                "queries": [
                    {
                        "match": {
                            "text": {
                                "query": query_text,
                                "_name": "textQuery"
                            }
                        }
                    },
                    {
                        "knn": {
                            "vector": {
                                "vector": vector,
                                "k": k,
                                "_name": "knnQuery"
                            }
                        }
                    }
                ]
            }
        }
    })
}

/// Map a search response to snippets. Hits without a `text` source field
/// become empty snippets rather than failures.
pub fn parse_hits(response: &Value) -> Vec<Snippet> {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let text = hit["_source"]["text"].as_str().unwrap_or("").to_string();
                    let matched: Vec<&str> = hit["matched_queries"]
                        .as_array()
                        .map(|names| names.iter().filter_map(|v| v.as_str()).collect())
                        .unwrap_or_default();

                    Snippet {
                        text,
                        matched_text: matched.contains(&"textQuery"),
                        matched_vector: matched.contains(&"knnQuery"),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Snippet>, ApiError> {
        let embeddings = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await?;
        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Provider("embedding service returned no vector".to_string()))?;

        let body = build_hybrid_query(query, &vector, self.k);
        let response = self
            .search
            .search(&self.index, &body, self.pipeline.as_deref())
            .await?;

        let snippets = parse_hits(&response);
        for snippet in &snippets {
            tracing::info!(
                "---- textQuery={} knnQuery={}",
                snippet.matched_text,
                snippet.matched_vector
            );
        }

        Ok(snippets)
    }
}
