use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::errors::ApiError;

const CONFIG_FILE: &str = "config.toml";

/// Demo configuration: model server, detector and embedding models, and
/// the OpenSearch index used for hybrid retrieval.
///
/// Values resolve in order: built-in defaults, then `config.toml` if
/// present, then `CANOPY_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the OpenAI-compatible model server (LM Studio).
    pub chat_base_url: String,
    /// Model used for assistant chat completions.
    pub chat_model: String,
    /// Model used by the injection detector.
    pub detector_model: String,
    /// Model used for embeddings at ingestion and query time.
    pub embedding_model: String,
    /// Base URL of the OpenSearch cluster.
    pub opensearch_url: String,
    /// Index holding ingested chunks.
    pub index_name: String,
    /// Dimension of the embedding vectors (384 for all-MiniLM-L6-v2).
    pub embedding_dimensions: usize,
    /// Number of nearest neighbors requested by the kNN clause.
    pub retrieval_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_base_url: "http://localhost:1234".to_string(),
            chat_model: "phi-3-mini-4k-instruct".to_string(),
            detector_model: "phi-3-mini-4k-instruct".to_string(),
            embedding_model: "text-embedding-all-minilm-l6-v2".to_string(),
            opensearch_url: "http://localhost:9200".to_string(),
            index_name: "sample-index".to_string(),
            embedding_dimensions: 384,
            retrieval_k: 10,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ApiError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ApiError> {
        let mut settings = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|err| ApiError::Config(format!("failed to read {}: {}", path.display(), err)))?;
            toml::from_str(&raw)
                .map_err(|err| ApiError::Config(format!("invalid {}: {}", path.display(), err)))?
        } else {
            Settings::default()
        };

        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("CANOPY_CHAT_BASE_URL") {
            self.chat_base_url = value;
        }
        if let Ok(value) = env::var("CANOPY_CHAT_MODEL") {
            self.chat_model = value;
        }
        if let Ok(value) = env::var("CANOPY_DETECTOR_MODEL") {
            self.detector_model = value;
        }
        if let Ok(value) = env::var("CANOPY_EMBEDDING_MODEL") {
            self.embedding_model = value;
        }
        if let Ok(value) = env::var("CANOPY_OPENSEARCH_URL") {
            self.opensearch_url = value;
        }
        if let Ok(value) = env::var("CANOPY_INDEX_NAME") {
            self.index_name = value;
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.embedding_dimensions == 0 {
            return Err(ApiError::Config("embedding_dimensions must be positive".to_string()));
        }
        if self.retrieval_k == 0 {
            return Err(ApiError::Config("retrieval_k must be positive".to_string()));
        }
        if self.index_name.trim().is_empty() {
            return Err(ApiError::Config("index_name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.embedding_dimensions, 384);
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(file, "index_name = \"docs\"\nretrieval_k = 5").expect("write config");

        let settings = Settings::load_from(&path).expect("load");

        assert_eq!(settings.index_name, "docs");
        assert_eq!(settings.retrieval_k, 5);
        assert_eq!(settings.chat_base_url, Settings::default().chat_base_url);
    }

    #[test]
    fn rejects_zero_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "embedding_dimensions = 0").expect("write config");

        let result = Settings::load_from(&path);

        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent/config.toml")).expect("load");
        assert_eq!(settings.index_name, "sample-index");
    }
}
