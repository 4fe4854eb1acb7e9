//! Audio sinks for remote audio files.
//!
//! Implementations of [`AudioSink`](crate::AudioSink), enabled via Cargo features:
//! - `rodio` - default output device through rodio, fetching with `reqwest`

#[cfg(feature = "rodio")]
pub mod rodio;
