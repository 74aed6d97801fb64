//! Console configuration.
//!
//! Values come from defaults, then environment variables, then CLI flags
//! (applied by the caller through the builder setters).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::agent::{
    default_connector_specs, load_connector_specs, AgentSettings, ConnectorError, ConnectorSpec,
    LazyAgent, McpServerConnector, ToolConnector, DEFAULT_MAX_TOOL_STEPS,
};
use crate::llm::{LiteLlmClient, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::prompts::DEFAULT_REFERENCE_ORG;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing API key: set LITELLM_API_KEY or OPENROUTER_API_KEY")]
    MissingApiKey,

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Connector file {path}: {source}")]
    ConnectorFile {
        path: PathBuf,
        #[source]
        source: ConnectorError,
    },
}

/// Configuration for the console and its agent.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Tool calls per agent invocation.
    pub max_tool_steps: usize,

    /// Root directory for saved analyses.
    pub projects_dir: PathBuf,
    /// GitHub organization searched for similar projects.
    pub reference_org: String,

    /// Per-connector handshake and tool call timeout.
    pub connector_timeout: Duration,
    pub connectors_enabled: bool,
    /// YAML file replacing the default connector list.
    pub connector_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,

            projects_dir: PathBuf::from("./projects"),
            reference_org: DEFAULT_REFERENCE_ORG.to_string(),

            connector_timeout: Duration::from_secs(60),
            connectors_enabled: true,
            connector_file: None,
        }
    }
}

impl ConsoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LITELLM_API_BASE`: API base URL (default: OpenRouter)
    /// - `LITELLM_API_KEY`, then `OPENROUTER_API_KEY`: API key
    /// - `LITELLM_DEFAULT_MODEL`: Model identifier
    /// - `CDP_TEMPERATURE`: Sampling temperature (0.0-2.0)
    /// - `CDP_MAX_TOKENS`: Completion token limit
    /// - `CDP_MAX_TOOL_STEPS`: Tool calls per agent invocation (default: 10)
    /// - `CDP_PROJECTS_DIR`: Directory for saved analyses (default: ./projects)
    /// - `CDP_REFERENCE_ORG`: GitHub organization for similar projects
    /// - `CDP_CONNECTOR_TIMEOUT_SECS`: Connector handshake and tool call timeout (default: 60)
    /// - `CDP_DISABLE_CONNECTORS`: Skip tool connectors entirely
    /// - `CDP_CONNECTORS_FILE`: YAML connector list
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConsoleConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("LITELLM_API_BASE") {
            config.api_base = val;
        }
        config.api_key = lookup("LITELLM_API_KEY")
            .or_else(|| lookup("OPENROUTER_API_KEY"))
            .filter(|key| !key.trim().is_empty());
        if let Some(val) = lookup("LITELLM_DEFAULT_MODEL") {
            config.model = val;
        }
        if let Some(val) = lookup("CDP_TEMPERATURE") {
            config.temperature = Some(parse_env_value(&val, "CDP_TEMPERATURE")?);
        }
        if let Some(val) = lookup("CDP_MAX_TOKENS") {
            config.max_tokens = Some(parse_env_value(&val, "CDP_MAX_TOKENS")?);
        }
        if let Some(val) = lookup("CDP_MAX_TOOL_STEPS") {
            config.max_tool_steps = parse_env_value(&val, "CDP_MAX_TOOL_STEPS")?;
        }

        if let Some(val) = lookup("CDP_PROJECTS_DIR") {
            config.projects_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("CDP_REFERENCE_ORG") {
            config.reference_org = val;
        }

        if let Some(val) = lookup("CDP_CONNECTOR_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "CDP_CONNECTOR_TIMEOUT_SECS")?;
            config.connector_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("CDP_DISABLE_CONNECTORS") {
            config.connectors_enabled = !parse_env_bool(&val, "CDP_DISABLE_CONNECTORS")?;
        }
        if let Some(val) = lookup("CDP_CONNECTORS_FILE") {
            config.connector_file = Some(PathBuf::from(val));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api_base cannot be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationFailed(
                    "temperature must be between 0.0 and 2.0".to_string(),
                ));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.connector_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "connector_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the endpoint is the hosted OpenRouter API, which needs a key.
    pub fn requires_api_key(&self) -> bool {
        self.api_base.trim_end_matches('/') == DEFAULT_API_BASE
    }

    /// Build the LLM client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingApiKey`] when OpenRouter is targeted without a
    /// key. Self-hosted proxies may run keyless.
    pub fn llm_client(&self) -> Result<LiteLlmClient, ConfigError> {
        if self.api_key.is_none() && self.requires_api_key() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(LiteLlmClient::new(
            self.api_base.clone(),
            self.api_key.clone(),
            self.model.clone(),
        ))
    }

    pub fn agent_settings(&self) -> AgentSettings {
        let mut settings = AgentSettings::default()
            .with_model(self.model.clone())
            .with_max_tool_steps(self.max_tool_steps);
        if let Some(temperature) = self.temperature {
            settings = settings.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            settings = settings.with_max_tokens(max_tokens);
        }
        settings
    }

    /// Connector specs to start, empty when connectors are disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConnectorFile`] if the YAML file cannot be read.
    pub fn connector_specs(&self) -> Result<Vec<ConnectorSpec>, ConfigError> {
        if !self.connectors_enabled {
            return Ok(Vec::new());
        }
        match &self.connector_file {
            Some(path) => read_connector_file(path),
            None => Ok(default_connector_specs()),
        }
    }

    /// The process-wide lazy agent.
    ///
    /// # Errors
    ///
    /// Fails on a missing API key or unreadable connector file.
    pub fn build_agent(&self) -> Result<LazyAgent, ConfigError> {
        let client = self.llm_client()?;
        let connectors: Vec<Box<dyn ToolConnector>> =
            McpServerConnector::from_specs(self.connector_specs()?, self.connector_timeout);
        Ok(LazyAgent::new(
            Arc::new(client),
            self.agent_settings(),
            connectors,
        ))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_projects_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.projects_dir = dir.into();
        self
    }

    pub fn with_reference_org(mut self, org: impl Into<String>) -> Self {
        self.reference_org = org.into();
        self
    }

    pub fn with_max_tool_steps(mut self, max_tool_steps: usize) -> Self {
        self.max_tool_steps = max_tool_steps;
        self
    }

    pub fn with_connector_timeout(mut self, timeout: Duration) -> Self {
        self.connector_timeout = timeout;
        self
    }

    pub fn with_connectors_enabled(mut self, enabled: bool) -> Self {
        self.connectors_enabled = enabled;
        self
    }

    pub fn with_connector_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.connector_file = Some(path.into());
        self
    }
}

fn read_connector_file(path: &Path) -> Result<Vec<ConnectorSpec>, ConfigError> {
    load_connector_specs(path).map_err(|source| ConfigError::ConnectorFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses an environment variable value into the specified type.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Parses a boolean environment variable value.
fn parse_env_bool(val: &str, key: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean, got '{}'", val),
        }),
    }
}
