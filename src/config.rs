use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration shared by the worker and the QA server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// AWS access key used for S3 and SQS request signing.
    pub aws_access_key_id: String,
    /// AWS secret key used for S3 and SQS request signing.
    pub aws_secret_access_key: String,
    /// Optional session token for temporary credentials.
    pub aws_session_token: Option<String>,
    /// AWS region the queue and bucket live in.
    pub aws_region: String,
    /// Full URL of the ingestion queue.
    pub sqs_queue_url: String,
    /// Bucket holding uploaded documents.
    pub s3_bucket: String,
    /// Optional custom S3 endpoint (LocalStack, MinIO); switches to path-style addressing.
    pub s3_endpoint: Option<String>,
    /// Delivery count after which a failing job is reported and dropped.
    pub max_ingest_attempts: u32,
    /// Maximum messages pulled per receive call.
    pub worker_batch_size: usize,
    /// Long-poll wait applied to each receive call, in seconds.
    pub worker_wait_time_secs: u64,
    /// Base URL of the Chroma instance that stores fragment embeddings.
    pub chroma_url: String,
    /// Name of the Chroma collection used for document storage.
    pub chroma_collection: String,
    /// Base URL of the document status service.
    pub status_api_url: String,
    /// Service identifier presented during credential exchange.
    pub status_service_id: String,
    /// Service secret presented during credential exchange.
    pub status_service_secret: String,
    /// Base URL of the Ollama runtime used for embeddings and completion.
    pub ollama_url: String,
    /// Completion model identifier.
    pub ollama_model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Fragment window size, in characters.
    pub chunk_size: usize,
    /// Overlap carried between consecutive fragments, in characters.
    pub chunk_overlap: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            aws_access_key_id: load_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: load_env("AWS_SECRET_ACCESS_KEY")?,
            aws_session_token: load_env_optional("AWS_SESSION_TOKEN"),
            aws_region: load_env_optional("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            sqs_queue_url: load_env("SQS_QUEUE_URL")?,
            s3_bucket: load_env("S3_BUCKET")?,
            s3_endpoint: load_env_optional("S3_ENDPOINT"),
            max_ingest_attempts: parse_or("MAX_INGEST_ATTEMPTS", 3)?,
            worker_batch_size: parse_or("WORKER_BATCH_SIZE", 10)?,
            worker_wait_time_secs: parse_or("WORKER_WAIT_TIME_SECS", 20)?,
            chroma_url: load_env("CHROMA_URL")?,
            chroma_collection: load_env_optional("CHROMA_COLLECTION")
                .unwrap_or_else(|| "documents".to_string()),
            status_api_url: load_env("STATUS_API_URL")?,
            status_service_id: load_env_optional("STATUS_SERVICE_ID")
                .unwrap_or_else(|| "docuvec-worker".to_string()),
            status_service_secret: load_env("STATUS_SERVICE_SECRET")?,
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ollama_model: load_env_optional("OLLAMA_MODEL")
                .unwrap_or_else(|| "llama2".to_string()),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "all-minilm".to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 384)?,
            chunk_size: parse_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 200)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
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
        queue = %config.sqs_queue_url,
        bucket = %config.s3_bucket,
        chroma = %config.chroma_url,
        collection = %config.chroma_collection,
        max_attempts = config.max_ingest_attempts,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
