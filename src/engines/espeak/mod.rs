//! espeak-ng speech engine implementation.
//!
//! Speaks through the `espeak-ng` binary, which plays directly to the
//! default audio device. Nothing is buffered in process.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Parameter Mapping
//!
//! | Utterance field | espeak-ng flag | Range | 1.0 maps to |
//! |---|---|---|---|
//! | `rate` | `-s` (words per minute) | 80–450 | 175 |
//! | `pitch` | `-p` | 0–99 | 50 |
//! | `volume` | `-a` (amplitude) | 0–200 | 100 |
//!
//! # Voices
//!
//! Voices come from `espeak-ng --voices` and are listed once per engine.
//! Names are reported with spaces (`English (America)`), and the language
//! code (`en-us`) is used as the voice id.

pub mod engine;
pub mod voices;

pub use engine::EspeakEngine;
