//! Remote service configuration.

use std::time::Duration;

use derive_builder::Builder;

use crate::error::ConfigError;

/// Upper bound on one remote synthesis call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENDPOINT_VAR: &str = "TTS_API_URL";
pub const TIMEOUT_VAR: &str = "TTS_REQUEST_TIMEOUT_SECS";

/// Where and how to reach the remote synthesis service.
///
/// ```
/// use voicesynth::ServiceConfigBuilder;
///
/// let config = ServiceConfigBuilder::default()
///     .endpoint("https://tts.example.com/dev/tts")
///     .build()?;
/// assert!(config.request_timeout.is_some());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ServiceConfig {
    /// Absolute http(s) URL the request is POSTed to.
    pub endpoint: String,
    /// `None` disables the timeout.
    #[builder(default = "Some(DEFAULT_REQUEST_TIMEOUT)")]
    pub request_timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Read `TTS_API_URL` and `TTS_REQUEST_TIMEOUT_SECS`, loading a `.env`
    /// file first when one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup(ENDPOINT_VAR).ok_or(ConfigError::MissingVar(ENDPOINT_VAR))?;

        let mut builder = ServiceConfigBuilder::default();
        builder.endpoint(endpoint);
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
                name: TIMEOUT_VAR,
                value: raw.clone(),
            })?;
            builder.request_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }

        let config = builder.build()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }
}
