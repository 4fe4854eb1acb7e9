//! Local speech engines.
//!
//! This module contains implementations of [`SpeechEngine`](crate::SpeechEngine)
//! used by the fallback path.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `espeak` - espeak-ng command-line synthesizer (espeak-ng required)

#[cfg(feature = "espeak")]
pub mod espeak;
