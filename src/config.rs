//! Application configuration.
//!
//! Layers, lowest priority first: built-in defaults, a YAML file
//! (`--config` / `CONFIG_FILE`, else `./config.yaml` when present),
//! `CHAT_`-prefixed environment variables (`CHAT_SERVER__PORT=8000`), and
//! finally command line flags. The API credential is read separately from
//! `OPENROUTER_API_KEY` and is never defaulted.

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE, LlmSettings, Provider};

/// Env var holding the provider credential.
pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// System prompt used when a request does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Answer in a dry, formal register. \
     Unless instructed otherwise, keep answers brief: two or three paragraphs.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Model identifier sent to the provider
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Default sampling temperature (0.0 - 2.0)
    #[arg(long, env = "LLM_TEMPERATURE")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub app_url: String,
    pub app_title: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub system_prompt: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Cli(e.to_string()))?;
        Self::from_cli(cli)
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("llm.base_url", DEFAULT_BASE_URL)?
            .set_default("llm.model", DEFAULT_MODEL)?
            .set_default("llm.temperature", f64::from(DEFAULT_TEMPERATURE))?
            .set_default("llm.timeout_secs", 60)?
            .set_default("llm.app_url", "http://localhost:3000")?
            .set_default("llm.app_title", "session-chat")?
            .set_default("chat.system_prompt", DEFAULT_SYSTEM_PROMPT)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::new("config.yaml", FileFormat::Yaml).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their plain env fallbacks) win over everything else.
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("llm.model", model)?;
        }
        if let Some(t) = cli.temperature {
            builder = builder.set_override("llm.temperature", f64::from(t))?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        validate_temperature(cfg.llm.temperature)?;
        Ok(cfg)
    }

    /// Connection settings for the model client builder.
    #[must_use]
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            provider: Provider::detect_from_url(&self.llm.base_url),
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            timeout_secs: self.llm.timeout_secs,
            app_url: self.llm.app_url.clone(),
            app_title: self.llm.app_title.clone(),
        }
    }
}

/// Read the provider credential from the environment.
///
/// # Errors
///
/// [`ConfigError::MissingApiKey`] when the variable is unset or blank.
pub fn load_api_key() -> Result<String, ConfigError> {
    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey { var: API_KEY_VAR })
}

/// Reject temperatures the completion API would refuse.
pub fn validate_temperature(t: f32) -> Result<f32, ConfigError> {
    if (0.0..=2.0).contains(&t) {
        Ok(t)
    } else {
        Err(ConfigError::InvalidTemperature(t))
    }
}
