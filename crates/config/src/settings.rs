//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer composer configuration
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_retrieval()?;
        self.validate_composer()?;
        self.validate_session()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_sessions".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&retrieval.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.min_score".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", retrieval.min_score),
            });
        }

        if retrieval.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.max_attempts".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.embedding_dim".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.embedder == EmbedderBackend::Http && retrieval.embedder_endpoint.is_none() {
            return Err(ConfigError::MissingField(
                "retrieval.embedder_endpoint".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_composer(&self) -> Result<(), ConfigError> {
        if self.composer.max_context_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "composer.max_context_chars".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.composer.max_answer_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "composer.max_answer_tokens".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let session = &self.session;

        if session.idle_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.idle_timeout_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if session.response_deadline_ms < 500 {
            return Err(ConfigError::InvalidValue {
                field: "session.response_deadline_ms".to_string(),
                message: "Response deadline too low (minimum 500ms)".to_string(),
            });
        }

        if session.utterance_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.utterance_buffer".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if session.transcript_backlog == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.transcript_backlog".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = permissive, for development only)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Knowledge base file path (Question:/Answer: text, YAML, or JSON)
    #[serde(default = "default_knowledge_path")]
    pub knowledge_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    256
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_knowledge_path() -> String {
    "config/knowledge.txt".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            knowledge_path: default_knowledge_path(),
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// Deterministic in-process token-hash embedding
    #[default]
    Hash,
    /// Remote embedding model over HTTP
    Http,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of candidates returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity score for a candidate to count as grounding
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Embedding backend
    #[serde(default)]
    pub embedder: EmbedderBackend,

    /// Embedding endpoint URL (required when embedder = "http")
    #[serde(default)]
    pub embedder_endpoint: Option<String>,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Total attempts per embed call when the backend is unavailable
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay between attempts, doubled each retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_initial_ms: u64,
}

fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.3
}
fn default_embedding_dim() -> usize {
    384
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    50
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            embedder: EmbedderBackend::default(),
            embedder_endpoint: None,
            embedding_dim: default_embedding_dim(),
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_ms(),
        }
    }
}

/// Answer composer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Maximum characters of retrieved context included in the prompt
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Token budget for the generated answer
    #[serde(default = "default_max_answer_tokens")]
    pub max_answer_tokens: u32,

    /// Generation temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Generation endpoint URL (OpenAI-style chat completions)
    #[serde(default = "default_generation_endpoint")]
    pub generation_endpoint: String,

    /// Model name passed to the generation backend
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_max_context_chars() -> usize {
    4000
}
fn default_max_answer_tokens() -> u32 {
    256
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generation_endpoint() -> String {
    "http://127.0.0.1:11434/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "llama3.2:3b".to_string()
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            max_answer_tokens: default_max_answer_tokens(),
            temperature: default_temperature(),
            generation_endpoint: default_generation_endpoint(),
            model: default_model(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds without a final utterance before the session closes
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,

    /// Wall-clock deadline for one answer, from final utterance to publish
    #[serde(default = "default_response_deadline_ms")]
    pub response_deadline_ms: u64,

    /// Bounded capacity of the per-session utterance channel
    #[serde(default = "default_utterance_buffer")]
    pub utterance_buffer: usize,

    /// Transcript broadcast backlog per subscriber
    #[serde(default = "default_transcript_backlog")]
    pub transcript_backlog: usize,

    /// Bounded retry attempts for a failed generation before fallback
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,
}

fn default_idle_timeout() -> u64 {
    300
}
fn default_response_deadline_ms() -> u64 {
    10_000
}
fn default_utterance_buffer() -> usize {
    64
}
fn default_transcript_backlog() -> usize {
    256
}
fn default_generation_attempts() -> u32 {
    2
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            response_deadline_ms: default_response_deadline_ms(),
            utterance_buffer: default_utterance_buffer(),
            transcript_backlog: default_transcript_backlog(),
            generation_attempts: default_generation_attempts(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (FAQ_AGENT_ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("FAQ_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
