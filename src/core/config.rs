//! Run configuration from YAML

use crate::api::config::{DEFAULT_API_VERSION, DEFAULT_BASE_URL};
use crate::api::ClientConfig;
use crate::core::policy::RetryPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Bearer token; the CLI flag and `LEAP_API_KEY` take precedence
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub version: String,

    /// Timeout for a single HTTP request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry policy per polled stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "RetryPolicy::image")]
    pub image: RetryPolicy,

    #[serde(default = "RetryPolicy::remix")]
    pub remix: RetryPolicy,

    #[serde(default = "RetryPolicy::training")]
    pub training: RetryPolicy,

    #[serde(default = "RetryPolicy::archive")]
    pub archive: RetryPolicy,
}

impl PollingConfig {
    /// Every policy must allow at least one attempt
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("image", &self.image),
            ("remix", &self.remix),
            ("training", &self.training),
            ("archive", &self.archive),
        ] {
            policy
                .validate()
                .map_err(|e| anyhow::anyhow!("polling.{}: {}", name, e))?;
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            image: RetryPolicy::image(),
            remix: RetryPolicy::remix(),
            training: RetryPolicy::training(),
            archive: RetryPolicy::archive(),
        }
    }
}

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub api: ApiSettings,

    /// Where materialized images are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Model used when a command does not name one (catalog name or id)
    #[serde(default)]
    pub default_model: Option<String>,

    /// Worker limit for fan-out and archive calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub polling: PollingConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_concurrency() -> usize {
    4
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            output_dir: default_output_dir(),
            default_model: None,
            concurrency: default_concurrency(),
            polling: PollingConfig::default(),
        }
    }
}

impl RunConfig {
    /// Default location: `<config dir>/leap-pipeline/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("leap-pipeline").join("config.yaml"))
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.api.version.trim().is_empty() {
            anyhow::bail!("api.version must not be empty");
        }
        self.polling.validate()
    }

    /// Build the client configuration; `api_key` overrides the file
    pub fn client_config(&self, api_key: Option<String>) -> Result<ClientConfig> {
        let key = api_key
            .or_else(|| self.api.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("no API key: pass --api-key, set LEAP_API_KEY or add api.api_key to the config")
            })?;

        let mut config = ClientConfig::new(key)
            .with_base_url(self.api.base_url.clone())
            .with_api_version(self.api.version.clone())
            .with_timeout(self.api.timeout_secs);
        if let Some(model) = &self.default_model {
            config = config.with_default_model(crate::core::catalog::PreTrainedModel::resolve(model));
        }
        Ok(config)
    }
}
