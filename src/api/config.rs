//! Client configuration

use crate::api::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.tryleap.ai/";
pub const DEFAULT_API_VERSION: &str = "v1";

/// Configuration for the API client
///
/// Built once and handed to [`LeapClient`](crate::api::LeapClient); the
/// bearer token never lives anywhere else.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token attached to every request
    pub api_key: String,

    /// Base URL of the service
    pub base_url: String,

    /// Version segment used in every endpoint path
    pub api_version: String,

    /// Timeout for a single HTTP request in seconds
    pub timeout_secs: u64,

    /// Model used when a call does not name one
    pub default_model_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 60,
            default_model_id: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("default_model_id", &self.default_model_id)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_default_model(mut self, model_id: impl Into<String>) -> Self {
        self.default_model_id = Some(model_id.into());
        self
    }

    /// Reject configurations that could never authenticate or route
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::validation("apiKey", "must not be empty"));
        }
        if self.api_version.trim().is_empty() {
            return Err(ApiError::validation("apiVersion", "must not be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ApiError::validation("baseUrl", "must not be empty"));
        }
        Ok(())
    }
}
