//! RAG demo: chunk local documents, embed and index them in OpenSearch,
//! then answer a question via hybrid retrieval plus a chat completion.
//!
//! Usage: `rag-demo [docs-dir]` (defaults to `./docs`).

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use uuid::Uuid;

use canopy::assistant::{Assistant, ChatOutcome};
use canopy::core::config::Settings;
use canopy::core::logging;
use canopy::llm::provider::LlmProvider;
use canopy::llm::LmStudioProvider;
use canopy::retrieval::{Chunker, HybridRetriever, IndexDoc, OpenSearchClient};

const RRF_PIPELINE: &str = "rrf-pipeline";
const EMBED_BATCH_SIZE: usize = 32;
const DEMO_QUESTION: &str = "Recommend a DDD folder structure for a new service?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let settings = Settings::load().context("Failed to load settings")?;

    let provider: Arc<dyn LlmProvider> =
        Arc::new(LmStudioProvider::new(settings.chat_base_url.clone()));
    if !provider.health_check().await? {
        anyhow::bail!("Model server not reachable at {}", settings.chat_base_url);
    }

    tracing::info!("Setting up OpenSearch index");

    let search = Arc::new(OpenSearchClient::new(settings.opensearch_url.clone()));
    search
        .create_index(&settings.index_name, settings.embedding_dimensions)
        .await
        .context("Failed to create index")?;
    search
        .create_rrf_pipeline(RRF_PIPELINE)
        .await
        .context("Failed to install search pipeline")?;

    let docs_dir = env::args().nth(1).unwrap_or_else(|| "docs".to_string());
    tracing::info!("Collecting chunks from {}", docs_dir);

    let chunks = Chunker::default().collect_from_dir(Path::new(&docs_dir))?;
    if chunks.is_empty() {
        anyhow::bail!("No .md or .txt documents found under {}", docs_dir);
    }
    tracing::info!("Collected {} chunks", chunks.len());

    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = provider
            .embed(&texts, &settings.embedding_model)
            .await
            .context("Embedding failed")?;

        let docs: Vec<IndexDoc> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexDoc {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                vector,
                metadata: Some(serde_json::json!({
                    "source": chunk.source,
                    "chunk_index": chunk.chunk_index,
                })),
            })
            .collect();

        let indexed = search.bulk_index(&settings.index_name, &docs).await?;
        tracing::info!("Indexed {} chunks", indexed);
    }

    let retriever = HybridRetriever::new(
        Arc::clone(&search),
        Arc::clone(&provider),
        settings.embedding_model.clone(),
        settings.index_name.clone(),
        settings.retrieval_k,
    )
    .with_pipeline(RRF_PIPELINE);

    let assistant = Assistant::builder(Arc::clone(&provider), settings.chat_model.clone())
        .retriever(Arc::new(retriever))
        .build();

    tracing::info!("Asking: {}", DEMO_QUESTION);

    match assistant.chat(DEMO_QUESTION).await.context("Chat request failed")? {
        ChatOutcome::Answer(text) => println!("{}", text),
        ChatOutcome::Aborted(reason) => println!("Request aborted: {}", reason),
        ChatOutcome::RewriteRequested(reason) => println!("Rewrite requested: {}", reason),
    }

    Ok(())
}
