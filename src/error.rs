//! Error taxonomy for the synthesis pipeline.
//!
//! Only [`ValidationError`] and [`SpeakError::BothFailed`] are meant to reach
//! the user. Remote failures ([`OrchestrationError`]) are recovered by the
//! local fallback and only logged.

use crate::validate::MAX_TEXT_CHARS;

/// Rejected user input. Blocks submission before any network or engine call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter some text")]
    Empty,
    #[error("Text is too long. Maximum {max} characters allowed.")]
    TooLong { max: usize },
}

impl ValidationError {
    pub(crate) fn too_long() -> Self {
        Self::TooLong {
            max: MAX_TEXT_CHARS,
        }
    }
}

/// The response envelope did not yield an audio location.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("No audio URL found in response")]
    MissingField,
    #[error("Response body is not JSON: {0}")]
    Undecodable(String),
}

/// Why the remote synthesis call did not produce an audio location.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("HTTP error! status: {status}")]
    Network { status: u16 },
    #[error("Request failed: {reason}")]
    Transport { reason: String, timed_out: bool },
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] EnvelopeError),
}

impl OrchestrationError {
    /// Short, user-readable description of the failure class.
    pub fn summary(&self) -> String {
        match self {
            Self::Network { status } => format!("service returned status {status}"),
            Self::Transport {
                timed_out: true, ..
            } => "service timed out".to_string(),
            Self::Transport { .. } => "service unreachable".to_string(),
            Self::MalformedResponse(_) => "service returned no audio".to_string(),
        }
    }
}

impl From<reqwest::Error> for OrchestrationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            timed_out: err.is_timeout(),
            reason: err.to_string(),
        }
    }
}

/// Local engine failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The engine is missing, unsupported or blocked on this device.
    #[error("Speech synthesis unavailable: {reason}")]
    Unavailable { reason: String },
    /// The engine accepted the utterance but could not speak it.
    #[error("Speech synthesis error: {reason}")]
    Failed { reason: String },
}

impl SynthesisError {
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "local speech engine unavailable",
            Self::Failed { .. } => "local speech engine error",
        }
    }
}

/// The audio sink refused a source or a control.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Audio output unavailable: {0}")]
    Output(String),
    #[error("Cannot play audio source: {0}")]
    Source(String),
}

/// Outcome of a failed [`PlaybackController::submit`](crate::PlaybackController::submit).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeakError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A previous submission is still loading.
    #[error("A request is already in progress")]
    Busy,
    /// The cycle was stopped or superseded before audio started.
    #[error("Request cancelled")]
    Cancelled,
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("Both API and speech synthesis failed ({}; {})", network.summary(), synthesis.summary())]
    BothFailed {
        network: OrchestrationError,
        synthesis: SynthesisError,
    },
}

/// Invalid or missing configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Builder(#[from] crate::config::ServiceConfigBuilderError),
}
