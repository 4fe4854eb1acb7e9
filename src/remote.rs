//! Remote synthesis call.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::envelope::{self, AudioLocation};
use crate::error::{ConfigError, OrchestrationError, ValidationError};
use crate::params::VoiceParameters;
use crate::validate::validate;

/// One validated user submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    voice: VoiceParameters,
}

impl SynthesisRequest {
    /// Validate `text` and snapshot `voice`. The stored text is trimmed.
    pub fn new(text: &str, voice: VoiceParameters) -> Result<Self, ValidationError> {
        let text = validate(text)?.to_string();
        Ok(Self { text, voice })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &VoiceParameters {
        &self.voice
    }
}

#[derive(Serialize)]
struct RemotePayload<'a> {
    text: &'a str,
}

/// Sends requests to the remote service and turns responses into an
/// [`AudioLocation`].
///
/// Performs exactly one HTTP call per [`submit`](Self::submit) and never
/// retries. Callers treat every error as "fall back to the local engine".
#[derive(Debug, Clone)]
pub struct RequestOrchestrator {
    client: reqwest::Client,
    endpoint: String,
}

impl RequestOrchestrator {
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn submit(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioLocation, OrchestrationError> {
        log::debug!(
            "POST {} ({} chars)",
            self.endpoint,
            request.text().chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&RemotePayload {
                text: request.text(),
            })
            .send()
            .await?;

        let status = response.status();
        log::debug!("Synthesis service responded with {status}");
        if !status.is_success() {
            return Err(OrchestrationError::Network {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let location = envelope::parse_str(&body)?;
        log::info!("Synthesis service returned audio at {location}");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_requires_valid_text() {
        assert_eq!(
            SynthesisRequest::new("  ", VoiceParameters::default()),
            Err(ValidationError::Empty)
        );
        let request = SynthesisRequest::new(" hi there ", VoiceParameters::default()).unwrap();
        assert_eq!(request.text(), "hi there");
    }

    #[test]
    fn payload_carries_only_text() {
        let body = serde_json::to_value(RemotePayload { text: "hello" }).unwrap();
        assert_eq!(body, serde_json::json!({ "text": "hello" }));
    }

    #[test]
    fn rejects_relative_endpoint() {
        let config = ServiceConfig {
            endpoint: "/tts".into(),
            request_timeout: None,
        };
        assert!(matches!(
            RequestOrchestrator::new(&config),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }
}
