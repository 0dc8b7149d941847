use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_SUPERVISOR_MODEL: &str = "deepseek-reasoner";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found. Make sure it's set in your environment or .env file")]
    MissingVar(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0}")]
    Validation(String),
}

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Config {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = non_empty(lookup("DEEPSEEK_API_KEY"))
            .ok_or(ConfigError::MissingVar("DEEPSEEK_API_KEY"))?;

        let config = Self {
            api_key,
            base_url: non_empty(lookup("DEEPSEEK_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty(lookup("DEEPSEEK_MODEL")).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_or(lookup, "DEEPSEEK_MAX_TOKENS", 4096)?,
            temperature: parse_or(lookup, "DEEPSEEK_TEMPERATURE", 0.2)?,
            timeout: parse_or(lookup, "DEEPSEEK_TIMEOUT", 120)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Validation("api key must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("base url must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Validation("max_tokens must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature must be within [0.0, 2.0], got {}",
                self.temperature
            )));
        }
        if self.timeout == 0 {
            return Err(ConfigError::Validation("timeout must be greater than 0".into()));
        }
        Ok(())
    }

    /// Same endpoint, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        let mut cfg = self.clone();
        cfg.model = model.into();
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container runtime binary, e.g. `docker` or `podman`
    pub runtime: String,
    pub image: String,
    pub timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "python:3.9-slim".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./vector_db"),
            collection: "codebase_collection".to_string(),
        }
    }
}

/// Everything the binary needs, assembled from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: Config,
    pub supervisor_model: String,
    pub vision: Config,
    pub embedding: Config,
    pub sandbox: SandboxConfig,
    pub store: StoreConfig,
    pub max_tool_iterations: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let llm = Config::from_lookup(&lookup)?;

        let vision = secondary_endpoint(
            &lookup,
            &llm,
            ("VISION_API_KEY", "VISION_BASE_URL", "VISION_MODEL"),
            DEFAULT_VISION_MODEL,
        );
        vision.validate()?;

        let embedding = secondary_endpoint(
            &lookup,
            &llm,
            ("EMBEDDING_API_KEY", "EMBEDDING_BASE_URL", "EMBEDDING_MODEL"),
            DEFAULT_EMBEDDING_MODEL,
        );
        embedding.validate()?;

        let sandbox_defaults = SandboxConfig::default();
        let sandbox = SandboxConfig {
            runtime: non_empty(lookup("SANDBOX_RUNTIME")).unwrap_or(sandbox_defaults.runtime),
            image: non_empty(lookup("SANDBOX_IMAGE")).unwrap_or(sandbox_defaults.image),
            timeout: Duration::from_secs(parse_or(&lookup, "SANDBOX_TIMEOUT", 120u64)?),
        };

        let store_defaults = StoreConfig::default();
        let store = StoreConfig {
            db_path: non_empty(lookup("VECTOR_DB_PATH"))
                .map(PathBuf::from)
                .unwrap_or(store_defaults.db_path),
            collection: non_empty(lookup("VECTOR_COLLECTION")).unwrap_or(store_defaults.collection),
        };

        let max_tool_iterations = parse_or(&lookup, "AGENT_MAX_ITERATIONS", 25usize)?;
        if max_tool_iterations == 0 {
            return Err(ConfigError::Validation(
                "AGENT_MAX_ITERATIONS must be greater than 0".into(),
            ));
        }

        Ok(Self {
            supervisor_model: non_empty(lookup("SUPERVISOR_MODEL"))
                .unwrap_or_else(|| DEFAULT_SUPERVISOR_MODEL.to_string()),
            llm,
            vision,
            embedding,
            sandbox,
            store,
            max_tool_iterations,
        })
    }

    pub fn supervisor(&self) -> Config {
        self.llm.with_model(self.supervisor_model.clone())
    }
}

fn secondary_endpoint(
    lookup: &dyn Fn(&str) -> Option<String>,
    primary: &Config,
    (key_var, url_var, model_var): (&str, &str, &str),
    default_model: &str,
) -> Config {
    Config {
        api_key: non_empty(lookup(key_var)).unwrap_or_else(|| primary.api_key.clone()),
        base_url: non_empty(lookup(url_var)).unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        model: non_empty(lookup(model_var)).unwrap_or_else(|| default_model.to_string()),
        ..primary.clone()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(lookup(key)) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
