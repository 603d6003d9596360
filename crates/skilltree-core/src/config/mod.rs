//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Skilltree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Settings for the LLM-backed concept extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Only ever read so a key placed in the file can be rejected
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// Settings for the dependency graph engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub lock_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub repair_mode: RepairMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// How `validate_category` repairs difficulty ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// One greedy pass in listing order, direct prerequisites only
    SinglePass,
    /// Repeat passes until no concept changes
    #[default]
    FixedPoint,
}

impl RepairMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePass => "single_pass",
            Self::FixedPoint => "fixed_point",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single_pass" | "single" => Some(Self::SinglePass),
            "fixed_point" | "fixpoint" => Some(Self::FixedPoint),
            _ => None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "google/gemini-2.0-flash-001".to_string(),
            temperature: 0.2,
            max_tokens: 8192,
            timeout_secs: 120,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            store_timeout_ms: 10_000,
            repair_mode: RepairMode::FixedPoint,
        }
    }
}

impl GraphConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl ExtractionConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("SKILLTREE_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    format!("***{}", &key[key.len() - 4..])
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Extraction API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl StorageConfig {
    /// Database path: `SKILLTREE_DB`, then the configured path, then the default
    pub fn resolved_database_path(&self) -> anyhow::Result<PathBuf> {
        if let Ok(path) = env::var("SKILLTREE_DB") {
            return Ok(PathBuf::from(path));
        }
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_dir()?.join("skilltree.db")),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("SKILLTREE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("skilltree")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.extraction.enforce_env_only()?;
        if self.graph.lock_timeout_ms == 0 || self.graph.store_timeout_ms == 0 {
            return Err(anyhow!("Graph timeouts must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "extraction.base_url" => Ok(self.extraction.base_url.clone()),
            "extraction.model" => Ok(self.extraction.model.clone()),
            "extraction.temperature" => Ok(self.extraction.temperature.to_string()),
            "extraction.max_tokens" => Ok(self.extraction.max_tokens.to_string()),
            "extraction.timeout_secs" => Ok(self.extraction.timeout_secs.to_string()),

            "graph.lock_timeout_ms" => Ok(self.graph.lock_timeout_ms.to_string()),
            "graph.store_timeout_ms" => Ok(self.graph.store_timeout_ms.to_string()),
            "graph.repair_mode" => Ok(self.graph.repair_mode.as_str().to_string()),

            "storage.database_path" => Ok(self
                .storage
                .resolved_database_path()?
                .display()
                .to_string()),

            "extraction.api_key" | "api_key" => match self.extraction.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use SKILLTREE_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `skilltree config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "extraction.base_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.extraction.base_url = value.trim_end_matches('/').to_string();
            }
            "extraction.model" => {
                self.extraction.model = value.to_string();
            }
            "extraction.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.extraction.temperature = temp;
            }
            "extraction.max_tokens" => {
                self.extraction.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "extraction.timeout_secs" => {
                self.extraction.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "graph.lock_timeout_ms" | "graph.store_timeout_ms" => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout value: {}", value))?;
                if ms == 0 {
                    return Err(anyhow!("Timeouts must be greater than zero"));
                }
                if key == "graph.lock_timeout_ms" {
                    self.graph.lock_timeout_ms = ms;
                } else {
                    self.graph.store_timeout_ms = ms;
                }
            }
            "graph.repair_mode" => {
                self.graph.repair_mode = RepairMode::parse(value).ok_or_else(|| {
                    anyhow!(
                        "Invalid repair mode: {}. Valid options: single_pass, fixed_point",
                        value
                    )
                })?;
            }

            "storage.database_path" => {
                self.storage.database_path = Some(PathBuf::from(value));
            }

            "extraction.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the SKILLTREE_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `skilltree config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "extraction.base_url",
            "extraction.model",
            "extraction.temperature",
            "extraction.max_tokens",
            "extraction.timeout_secs",
            "extraction.api_key",
            "graph.lock_timeout_ms",
            "graph.store_timeout_ms",
            "graph.repair_mode",
            "storage.database_path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
