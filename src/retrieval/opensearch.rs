use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

/// Narrow OpenSearch client covering what the demos need: index
/// creation with a kNN mapping, the RRF search pipeline, bulk
/// ingestion, and search.
pub struct OpenSearchClient {
    base_url: String,
    client: Client,
}

/// One document for bulk ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDoc {
    #[serde(skip)]
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl OpenSearchClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create the index with a full-text `text` field and a `vector`
    /// kNN field (hnsw over faiss). An already-existing index is fine.
    pub async fn create_index(&self, index: &str, dimensions: usize) -> Result<(), ApiError> {
        let body = json!({
            "settings": {
                "index": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0,
                    "knn": true,
                    "knn.algo_param.ef_search": 100
                }
            },
            "mappings": {
                "properties": {
                    "vector": {
                        "type": "knn_vector",
                        "dimension": dimensions,
                        "method": {
                            "name": "hnsw",
                            "engine": "faiss"
                        }
                    },
                    "text": {
                        "type": "text",
                        "analyzer": "standard"
                    },
                    "metadata": { "type": "object" }
                }
            }
        });

        let url = format!("{}/{}", self.base_url, index);
        let res = self.client.put(&url).json(&body).send().await?;

        if res.status().is_success() {
            tracing::info!("Created index {}", index);
            return Ok(());
        }

        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if text.contains("resource_already_exists_exception") {
            tracing::debug!("Index {} already exists", index);
            return Ok(());
        }

        Err(ApiError::Search(format!(
            "index creation failed ({}): {}",
            status, text
        )))
    }

    /// Install the search pipeline that combines hybrid sub-query scores
    /// with reciprocal rank fusion.
    pub async fn create_rrf_pipeline(&self, name: &str) -> Result<(), ApiError> {
        let body = json!({
            "description": "Post processor for hybrid RRF search",
            "phase_results_processors": [
                {
                    "score-ranker-processor": {
                        "combination": { "technique": "rrf" }
                    }
                }
            ]
        });

        let url = format!("{}/_search/pipeline/{}", self.base_url, name);
        let res = self.client.put(&url).json(&body).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Search(format!(
                "search pipeline creation failed ({}): {}",
                status, text
            )));
        }

        tracing::info!("Installed search pipeline {}", name);
        Ok(())
    }

    /// Bulk-index documents. Returns the number of documents indexed;
    /// any per-item failure fails the whole call.
    pub async fn bulk_index(&self, index: &str, docs: &[IndexDoc]) -> Result<usize, ApiError> {
        if docs.is_empty() {
            return Ok(0);
        }

        let mut payload = String::new();
        for doc in docs {
            let action = json!({ "index": { "_index": index, "_id": doc.id } });
            payload.push_str(&action.to_string());
            payload.push('\n');
            payload.push_str(&serde_json::to_string(doc).map_err(ApiError::search)?);
            payload.push('\n');
        }

        let url = format!("{}/_bulk?refresh=true", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Search(format!(
                "bulk indexing failed ({}): {}",
                status, text
            )));
        }

        let response: Value = res.json().await.map_err(ApiError::search)?;
        if response["errors"].as_bool().unwrap_or(false) {
            let first_error = response["items"]
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .find_map(|item| item["index"]["error"]["reason"].as_str())
                })
                .unwrap_or("unknown item failure");
            return Err(ApiError::Search(format!(
                "bulk indexing reported item failures: {}",
                first_error
            )));
        }

        Ok(docs.len())
    }

    /// Run a search request, optionally through a named search pipeline.
    pub async fn search(
        &self,
        index: &str,
        body: &Value,
        pipeline: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut url = format!("{}/{}/_search", self.base_url, index);
        if let Some(pipeline) = pipeline {
            url.push_str("?search_pipeline=");
            url.push_str(pipeline);
        }

        let res = self.client.post(&url).json(body).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Search(format!(
                "search failed ({}): {}",
                status, text
            )));
        }

        res.json().await.map_err(ApiError::search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_doc_serializes_without_id_field() {
        let doc = IndexDoc {
            id: "chunk-1".to_string(),
            text: "hello".to_string(),
            vector: vec![0.1, 0.2],
            metadata: None,
        };

        let value = serde_json::to_value(&doc).expect("serialize");

        assert_eq!(value["text"], "hello");
        assert!(value.get("id").is_none());
        assert!(value.get("metadata").is_none());
    }

    #[tokio::test]
    async fn bulk_index_on_empty_input_is_a_no_op() {
        let client = OpenSearchClient::new("http://localhost:9200/".to_string());
        assert_eq!(client.base_url, "http://localhost:9200");

        let indexed = client.bulk_index("sample-index", &[]).await.expect("bulk");
        assert_eq!(indexed, 0);
    }
}
