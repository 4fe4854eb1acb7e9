use std::sync::Arc;
use std::time::Instant;

use voicesynth::{
    engines::espeak::EspeakEngine, params::VOICE_LABELS, sinks::rodio::RodioSink,
    PlaybackController, ServiceConfig, SpeakOutcome, VoiceParameters,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let text = if text.is_empty() {
        "Hello! This is VoiceSynth. If the synthesis service is unreachable, \
         you are hearing the local espeak-ng voice instead."
            .to_string()
    } else {
        text
    };

    let config = ServiceConfig::from_env()?;
    println!("Using API URL: {}", config.endpoint);
    println!("Available voice labels: {VOICE_LABELS:?}");

    let controller = PlaybackController::from_config(
        &config,
        Arc::new(EspeakEngine::new()),
        Box::new(RodioSink::new()?),
    )?;

    let voice = VoiceParameters::default();
    let start = Instant::now();
    match controller.submit(&text, &voice).await? {
        SpeakOutcome::Remote(location) => {
            println!("Playing service audio from {location} after {:.2?}", start.elapsed())
        }
        SpeakOutcome::Local => println!("Speaking locally after {:.2?}", start.elapsed()),
    }

    let state = controller.settled().await;
    println!("Finished in state {state:?} ({:.2?} total)", start.elapsed());
    Ok(())
}
