use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM provider used to extract medication names
    #[serde(default)]
    pub llm: LlmConfig,
    /// Medication database settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Normalization pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// OCR service settings
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the storefront frontend, served for unmatched routes
    pub static_dir: Option<String>,
    /// Carts untouched for this many seconds are dropped
    #[serde(default = "default_cart_idle_ttl")]
    pub cart_idle_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cart_idle_ttl_secs: default_cart_idle_ttl(),
        }
    }
}

/// Configuration for the LLM completion provider
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider identifier ("openrouter" or "openai")
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    /// Model identifier (e.g., "openai/gpt-3.5-turbo")
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key for authentication (can also be set via environment variable)
    pub api_key: Option<String>,
    /// Base URL for API endpoint (for custom or proxy endpoints)
    pub base_url: Option<String>,
    /// Value for the HTTP-Referer attribution header
    pub referer: Option<String>,
    /// Value for the X-Title attribution header
    pub title: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key: None,
            base_url: None,
            referer: None,
            title: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Path of the SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Create the schema and a demo catalog when the table is empty
    #[serde(default = "default_true")]
    pub seed: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            seed: true,
        }
    }
}

/// Which LLM failures trigger keyword extraction
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Any LLM failure or empty LLM result falls back to keyword extraction
    #[default]
    Uniform,
    /// Only rejected credentials and rate limiting fall back
    AuthAndRateLimit,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Per-name stock lookup timeout in milliseconds
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Maximum stock lookups in flight for one request
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OcrConfig {
    /// Google Cloud Vision API key (falls back to GOOGLE_API_KEY)
    pub api_key: Option<String>,
    /// Base URL override for the Vision API
    pub base_url: Option<String>,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cart_idle_ttl() -> u64 {
    24 * 60 * 60
}

fn default_llm_provider() -> String {
    "openrouter".to_string()
}

fn default_model() -> String {
    "openai/gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_store_path() -> String {
    "medicamentos.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrent_lookups() -> usize {
    8
}

/// Load configuration from file and environment variables
///
/// Configuration is loaded with the following priority (highest to lowest):
/// 1. Environment variables with RECETASCAN__ prefix
/// 2. config.toml file in current directory
/// 3. Default values
///
/// Environment variable format: RECETASCAN__LLM__API_KEY
pub fn load_config() -> Result<AppConfig, ConfigError> {
    // Optional config file (can be missing)
    layered(File::with_name("config").required(false), environment())
}

// Use double underscore for nested: RECETASCAN__PIPELINE__FALLBACK
fn environment() -> Environment {
    Environment::with_prefix("RECETASCAN")
        .separator("__")
        .try_parsing(true)
}

fn layered<S>(file: S, env: Environment) -> Result<AppConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?
        .try_deserialize()
}
