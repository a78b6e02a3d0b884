use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, SubmeterError};

// Default values for optional settings
fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    20
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub translate: TranslateConfig,
    pub billing: BillingConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum accepted size of an uploaded subtitle file
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Bearer token for the admin API; admin routes are closed without one
    #[serde(default)]
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Which provider backend to use
    pub provider: ProviderKind,
    /// Base URL of the provider API
    pub endpoint: String,
    /// Model to request from the provider
    pub model: String,
    /// API key (required for OpenAI)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Number of subtitle entries sent per provider call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// HTTP timeout for a single provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions API
    OpenAi,
    /// Local Ollama server
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Number of subtitle entries covered by one charge unit
    pub batch_size: usize,
    /// Credits charged per started batch
    #[serde(with = "rust_decimal::serde::float")]
    pub credits_per_batch: Decimal,
    /// Seconds between refund reconciliation passes (0 disables)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON snapshot file; the ledger is memory-only when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    pub directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_upload_bytes: default_max_upload_bytes(),
                admin_token: None,
            },
            translate: TranslateConfig {
                provider: ProviderKind::OpenAi,
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                chunk_size: default_chunk_size(),
                timeout_secs: default_timeout_secs(),
            },
            billing: BillingConfig {
                batch_size: 20,
                credits_per_batch: Decimal::new(7, 1),
                reconcile_interval_secs: default_reconcile_interval_secs(),
            },
            ledger: LedgerConfig {
                path: Some(PathBuf::from(".submeter/ledger.json")),
            },
            logging: LoggingConfig {
                directory: PathBuf::from(".submeter/log"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubmeterError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubmeterError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubmeterError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubmeterError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Fill secrets that were left out of the file from the environment
    pub fn apply_env_overrides(&mut self) {
        if self.translate.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                if !key.trim().is_empty() {
                    self.translate.api_key = Some(key);
                }
            }
        }

        if self.server.admin_token.is_none() {
            if let Ok(token) = std::env::var("SUBMETER_ADMIN_TOKEN") {
                if !token.trim().is_empty() {
                    self.server.admin_token = Some(token);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.billing.batch_size == 0 {
            return Err(SubmeterError::Config("billing.batch_size must be at least 1".to_string()));
        }
        if self.billing.credits_per_batch <= Decimal::ZERO {
            return Err(SubmeterError::Config(
                "billing.credits_per_batch must be positive".to_string(),
            ));
        }
        if self.translate.chunk_size == 0 {
            return Err(SubmeterError::Config("translate.chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.billing.batch_size, 20);
        assert_eq!(config.billing.credits_per_batch, Decimal::new(7, 1));
    }

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.translate.provider = ProviderKind::Ollama;
        config.server.port = 9000;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.provider, ProviderKind::Ollama);
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.billing.credits_per_batch, Decimal::new(7, 1));
    }

    #[test]
    fn test_optional_fields_fall_back_to_defaults() {
        let content = r#"
[server]
host = "0.0.0.0"
port = 3000

[translate]
provider = "Ollama"
endpoint = "http://localhost:11434"
model = "llama3.2:3b"

[billing]
batch_size = 20
credits_per_batch = 0.7

[ledger]

[logging]
directory = "log"
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.translate.chunk_size, 20);
        assert_eq!(config.translate.timeout_secs, 300);
        assert_eq!(config.server.max_upload_bytes, 5 * 1024 * 1024);
        assert!(config.ledger.path.is_none());
        assert!(config.server.admin_token.is_none());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.billing.batch_size = 0;
        assert!(matches!(config.validate(), Err(SubmeterError::Config(_))));
    }
}
