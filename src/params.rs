//! Voice parameters as the UI presents them and their engine-native mapping.

use serde::{Deserialize, Serialize};

use crate::VoiceDescriptor;

/// Voice labels offered in the voice picker, `"<Name> - <Variant>"`.
pub const VOICE_LABELS: [&str; 7] = [
    "English (US) - Female",
    "English (US) - Male",
    "English (UK) - Female",
    "English (UK) - Male",
    "Spanish - Female",
    "French - Female",
    "German - Female",
];

/// UI-facing voice settings. Sliders run from 0 to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceParameters {
    pub rate: u8,
    pub pitch: u8,
    pub volume: u8,
    pub voice_name: String,
}

impl Default for VoiceParameters {
    fn default() -> Self {
        Self {
            rate: 50,
            pitch: 60,
            volume: 80,
            voice_name: VOICE_LABELS[0].to_string(),
        }
    }
}

/// Parameters in the ranges the local engine expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    /// Speed multiplier, 0.5–2.0, 1.0 is normal.
    pub rate: f32,
    /// Pitch multiplier, 0.5–2.0, 1.0 is normal.
    pub pitch: f32,
    /// Output gain, 0.0–1.0.
    pub volume: f32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Map UI slider values onto engine-native ranges.
///
/// `rate` and `pitch` are divided by 50 and `volume` by 100; the results are
/// clamped so slider values near zero still give an audible utterance.
pub fn to_engine_params(ui: &VoiceParameters) -> EngineParams {
    EngineParams {
        rate: (f32::from(ui.rate) / 50.0).clamp(0.5, 2.0),
        pitch: (f32::from(ui.pitch) / 50.0).clamp(0.5, 2.0),
        volume: (f32::from(ui.volume) / 100.0).clamp(0.0, 1.0),
    }
}

/// Pick the first catalog voice whose name contains the `<Name>` part of
/// `label`. `None` means "use the engine default".
pub fn resolve_voice<'a>(catalog: &'a [VoiceDescriptor], label: &str) -> Option<&'a VoiceDescriptor> {
    let wanted = label.split(" - ").next().unwrap_or(label);
    catalog.iter().find(|voice| voice.name.contains(wanted))
}
