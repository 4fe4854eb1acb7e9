//! Local speech synthesis used when the remote service cannot deliver audio.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SynthesisError;
use crate::params::{resolve_voice, EngineParams};
use crate::{SpeechEngine, Utterance};

/// Progress of one local utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Completed,
    Failed(String),
}

impl LifecycleEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// Events of a single utterance. Ends after the first terminal event, or
/// when the engine drops its sender (cancelled utterances end silently).
#[derive(Debug)]
pub struct UtteranceEvents {
    rx: mpsc::Receiver<LifecycleEvent>,
    finished: bool,
}

impl UtteranceEvents {
    pub fn new(rx: mpsc::Receiver<LifecycleEvent>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(e) if !e.is_terminal() => {}
            _ => {
                self.finished = true;
                self.rx.close();
            }
        }
        event
    }
}

/// Drives a [`SpeechEngine`], one utterance at a time.
///
/// Starting an utterance cancels the one before it.
pub struct FallbackSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    current: Mutex<Option<CancellationToken>>,
}

impl FallbackSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            current: Mutex::new(None),
        }
    }

    /// Speak `text` with the voice best matching `voice_label`.
    ///
    /// `cancel` ends the utterance early; [`cancel`](Self::cancel) does the
    /// same for whatever utterance is current.
    pub async fn speak(
        &self,
        text: &str,
        params: &EngineParams,
        voice_label: &str,
        cancel: CancellationToken,
    ) -> Result<UtteranceEvents, SynthesisError> {
        self.cancel();

        let catalog = match self.engine.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                log::warn!("Could not list local voices, using engine default: {e}");
                Vec::new()
            }
        };
        let voice = resolve_voice(&catalog, voice_label).cloned();
        match &voice {
            Some(v) => log::debug!("Using local voice '{}' for '{voice_label}'", v.name),
            None => log::debug!("No local voice matches '{voice_label}', using default"),
        }

        if cancel.is_cancelled() {
            return Err(SynthesisError::Failed {
                reason: "cancelled".to_string(),
            });
        }
        *self.current.lock() = Some(cancel.clone());

        let utterance = Utterance {
            text: text.to_string(),
            rate: params.rate,
            pitch: params.pitch,
            volume: params.volume,
            voice,
        };
        let rx = self.engine.speak(utterance, cancel)?;
        Ok(UtteranceEvents::new(rx))
    }

    /// Cancel the current utterance, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
            self.engine.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoiceDescriptor;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingEngine {
        spoken: Mutex<Vec<Utterance>>,
        cancels: Mutex<usize>,
        tokens: Mutex<Vec<CancellationToken>>,
    }

    #[async_trait]
    impl SpeechEngine for RecordingEngine {
        async fn voices(&self) -> Result<Vec<VoiceDescriptor>, SynthesisError> {
            Ok(vec![VoiceDescriptor {
                id: "fr".into(),
                name: "French (France)".into(),
                language: "fr".into(),
            }])
        }

        fn speak(
            &self,
            utterance: Utterance,
            cancel: CancellationToken,
        ) -> Result<mpsc::Receiver<LifecycleEvent>, SynthesisError> {
            let (tx, rx) = mpsc::channel(4);
            tx.try_send(LifecycleEvent::Started).unwrap();
            tx.try_send(LifecycleEvent::Completed).unwrap();
            tx.try_send(LifecycleEvent::Started).unwrap();
            self.spoken.lock().push(utterance);
            self.tokens.lock().push(cancel);
            Ok(rx)
        }

        fn cancel(&self) {
            *self.cancels.lock() += 1;
        }
    }

    #[tokio::test]
    async fn events_stop_after_terminal_event() {
        let engine = Arc::new(RecordingEngine::default());
        let synth = FallbackSynthesizer::new(engine.clone());
        let mut events = synth
            .speak("bonjour", &EngineParams::default(), "French - Female", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(events.next().await, Some(LifecycleEvent::Started));
        assert_eq!(events.next().await, Some(LifecycleEvent::Completed));
        assert_eq!(events.next().await, None);

        let spoken = engine.spoken.lock();
        assert_eq!(spoken[0].text, "bonjour");
        assert_eq!(spoken[0].voice.as_ref().map(|v| v.id.as_str()), Some("fr"));
    }

    #[tokio::test]
    async fn new_utterance_cancels_previous() {
        let engine = Arc::new(RecordingEngine::default());
        let synth = FallbackSynthesizer::new(engine.clone());
        let params = EngineParams::default();

        let _first = synth
            .speak("one", &params, "German - Female", CancellationToken::new())
            .await
            .unwrap();
        let _second = synth
            .speak("two", &params, "German - Female", CancellationToken::new())
            .await
            .unwrap();

        let tokens = engine.tokens.lock();
        assert!(tokens[0].is_cancelled());
        assert!(!tokens[1].is_cancelled());
        assert_eq!(*engine.cancels.lock(), 1);
        assert!(engine.spoken.lock()[0].voice.is_none());
    }

    #[tokio::test]
    async fn refuses_already_cancelled_token() {
        let engine = Arc::new(RecordingEngine::default());
        let synth = FallbackSynthesizer::new(engine.clone());
        let token = CancellationToken::new();
        token.cancel();

        let result = synth
            .speak("late", &EngineParams::default(), "", token)
            .await;
        assert!(matches!(result, Err(SynthesisError::Failed { .. })));
        assert!(engine.spoken.lock().is_empty());
    }
}
