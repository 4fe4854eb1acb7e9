//! # voicesynth
//!
//! Text-to-speech client that asks a remote synthesis service for an audio
//! file and falls back to a local speech engine when the service cannot
//! deliver one.
//!
//! ## Features
//!
//! - **Remote synthesis**: POSTs the text and accepts both flat and
//!   gateway-wrapped (string-encoded) responses
//! - **Transparent fallback**: any remote failure hands the text to a local
//!   [`SpeechEngine`]; the user only sees an error when both paths fail
//! - **One playback state machine**: [`PlaybackController`] owns the audio
//!   output and applies pause/resume/stop uniformly to either source
//!
//! Concrete collaborators are enabled via Cargo features:
//! - `espeak` - [`engines::espeak::EspeakEngine`], drives the `espeak-ng` binary
//! - `rodio` - [`sinks::rodio::RodioSink`], plays remote audio on the default output device
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use voicesynth::{engines::espeak::EspeakEngine, sinks::rodio::RodioSink};
//! use voicesynth::{PlaybackController, ServiceConfig, VoiceParameters};
//!
//! let controller = PlaybackController::from_config(
//!     &ServiceConfig::from_env()?,
//!     Arc::new(EspeakEngine::new()),
//!     Box::new(RodioSink::new()?),
//! )?;
//! let outcome = controller.submit("Hello, world!", &VoiceParameters::default()).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod envelope;
pub mod error;
pub mod fallback;
pub mod params;
pub mod playback;
pub mod remote;
pub mod sinks;
pub mod validate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use envelope::AudioLocation;
pub use error::{
    ConfigError, EnvelopeError, OrchestrationError, SinkError, SpeakError, SynthesisError,
    ValidationError,
};
pub use fallback::{FallbackSynthesizer, LifecycleEvent, UtteranceEvents};
pub use params::{to_engine_params, EngineParams, VoiceParameters};
pub use playback::{AudioSink, PlaybackController, PlaybackState, SinkNotifier, SpeakOutcome};
pub use remote::{RequestOrchestrator, SynthesisRequest};

/// A voice offered by a local engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Engine-specific identifier passed back in [`Utterance::voice`].
    pub id: String,
    /// Human-readable name, matched against the UI voice label.
    pub name: String,
    pub language: String,
}

/// Everything a local engine needs to speak one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speed multiplier, 0.5–2.0.
    pub rate: f32,
    /// Pitch multiplier, 0.5–2.0.
    pub pitch: f32,
    /// Gain, 0.0–1.0.
    pub volume: f32,
    /// `None` selects the engine default voice.
    pub voice: Option<VoiceDescriptor>,
}

/// Common interface for device-resident speech engines.
///
/// Engines speak directly to the output device; no audio is returned.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Enumerate the voices this engine can use.
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, SynthesisError>;

    /// Begin speaking `utterance`.
    ///
    /// The returned channel carries [`LifecycleEvent::Started`] followed by
    /// one terminal event. Once `cancel` fires the engine stops speaking and
    /// drops the sender without emitting anything further.
    fn speak(
        &self,
        utterance: Utterance,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LifecycleEvent>, SynthesisError>;

    /// Stop the utterance currently being spoken, if any.
    fn cancel(&self);
}
