use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the PDF question-answering server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the hosted Gemini API. Optional only for the local embedding provider.
    pub google_api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub gemini_api_base_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the local provider.
    pub embedding_dimension: usize,
    /// Chat model used to answer questions.
    pub chat_model: String,
    /// Sampling temperature for answer generation.
    pub chat_temperature: f32,
    /// Maximum chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub text_splitter_chunk_overlap: usize,
    /// Number of chunks sent per embedding request.
    pub embedding_batch_size: usize,
    /// Pause between embedding batches, in milliseconds.
    pub embedding_batch_delay_ms: u64,
    /// Number of chunks retrieved per question.
    pub search_top_k: usize,
    /// Directory holding the current upload batch.
    pub upload_dir: PathBuf,
    /// Directory holding the persisted vector index snapshot.
    pub vector_store_dir: PathBuf,
    /// Directory serving the landing page assets.
    pub static_dir: PathBuf,
    /// Aggregate upload limit in megabytes.
    pub max_upload_mb: u64,
    /// Request body limit in megabytes.
    pub max_request_mb: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Hosted Gemini embeddings API.
    Gemini,
    /// Deterministic in-process hashing embedder.
    Local,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = load_env_optional("EMBEDDING_PROVIDER")
            .map(|value| {
                value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
            })
            .transpose()?
            .unwrap_or(EmbeddingProvider::Gemini);

        let google_api_key = load_env_optional("GOOGLE_API_KEY");
        if embedding_provider == EmbeddingProvider::Gemini && google_api_key.is_none() {
            return Err(ConfigError::MissingVariable("GOOGLE_API_KEY".into()));
        }

        let config = Self {
            google_api_key,
            gemini_api_base_url: load_env_optional("GEMINI_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE_URL.to_string()),
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "models/embedding-001".to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 768)?,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            chat_temperature: parse_env_or("CHAT_TEMPERATURE", 0.3)?,
            text_splitter_chunk_size: parse_env_or("TEXT_SPLITTER_CHUNK_SIZE", 10_000)?,
            text_splitter_chunk_overlap: parse_env_or("TEXT_SPLITTER_CHUNK_OVERLAP", 2_000)?,
            embedding_batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 10)?,
            embedding_batch_delay_ms: parse_env_or("EMBEDDING_BATCH_DELAY_MS", 1_000)?,
            search_top_k: parse_env_or("SEARCH_TOP_K", 4)?,
            upload_dir: load_env_optional("UPLOAD_DIR")
                .unwrap_or_else(|| "uploads".into())
                .into(),
            vector_store_dir: load_env_optional("VECTOR_STORE_DIR")
                .unwrap_or_else(|| "vector_store/index".into())
                .into(),
            static_dir: load_env_optional("STATIC_DIR")
                .unwrap_or_else(|| "static".into())
                .into(),
            max_upload_mb: parse_env_or("MAX_UPLOAD_MB", 20)?,
            max_request_mb: parse_env_or("MAX_REQUEST_MB", 25)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.search_top_k == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_TOP_K".into()));
        }
        Ok(())
    }

    /// Aggregate upload limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    /// Request body limit in bytes.
    pub fn max_request_bytes(&self) -> u64 {
        self.max_request_mb * 1024 * 1024
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        batch_size = config.embedding_batch_size,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    Config {
        google_api_key: Some("test-key".into()),
        gemini_api_base_url: "http://127.0.0.1:9".into(),
        embedding_provider: EmbeddingProvider::Local,
        embedding_model: "models/embedding-001".into(),
        embedding_dimension: 64,
        chat_model: "gemini-2.0-flash".into(),
        chat_temperature: 0.3,
        text_splitter_chunk_size: 200,
        text_splitter_chunk_overlap: 40,
        embedding_batch_size: 2,
        embedding_batch_delay_ms: 0,
        search_top_k: 4,
        upload_dir: root.join("uploads"),
        vector_store_dir: root.join("vector_store").join("index"),
        static_dir: root.join("static"),
        max_upload_mb: 20,
        max_request_mb: 25,
        server_port: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!(
            "Gemini".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Gemini)
        );
        assert_eq!(
            " local ".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Local)
        );
        assert!("ollama".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn validate_rejects_overlap_not_below_chunk_size() {
        let mut config = test_config(std::path::Path::new("/tmp"));
        config.text_splitter_chunk_overlap = config.text_splitter_chunk_size;
        let error = config.validate().unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue(key) if key == "TEXT_SPLITTER_CHUNK_OVERLAP"
        ));
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = test_config(std::path::Path::new("/tmp"));
        config.embedding_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn byte_limits_scale_megabytes() {
        let config = test_config(std::path::Path::new("/tmp"));
        assert_eq!(config.max_upload_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.max_request_bytes(), 25 * 1024 * 1024);
    }
}
