//! Test doubles for the local engine and the audio sink.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use voicesynth::{
    AudioLocation, AudioSink, LifecycleEvent, PlaybackController, ServiceConfigBuilder, SinkError,
    SinkNotifier, SpeechEngine, SynthesisError, Utterance, VoiceDescriptor,
};

pub enum EngineBehavior {
    /// Emit `Started` and keep the utterance open until the test finishes it.
    Speak,
    /// Emit `Failed(reason)` as the first event.
    FailOnStart(String),
    /// Refuse to start at all.
    Unavailable(String),
}

pub struct MockEngine {
    behavior: EngineBehavior,
    pub spoken: Mutex<Vec<Utterance>>,
    pub tokens: Mutex<Vec<CancellationToken>>,
    pub cancels: Mutex<usize>,
    senders: Mutex<Vec<mpsc::Sender<LifecycleEvent>>>,
}

impl MockEngine {
    pub fn new(behavior: EngineBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            spoken: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            cancels: Mutex::new(0),
            senders: Mutex::new(Vec::new()),
        })
    }

    /// Deliver `event` on the most recent utterance.
    pub fn emit(&self, event: LifecycleEvent) {
        let senders = self.senders.lock();
        let tx = senders.last().expect("no utterance in progress");
        tx.try_send(event).expect("event channel full");
    }

    /// Drop the most recent utterance's sender without a terminal event.
    pub fn hang_up(&self) {
        self.senders.lock().pop().expect("no utterance in progress");
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken.lock().iter().map(|u| u.text.clone()).collect()
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, SynthesisError> {
        Ok(vec![
            VoiceDescriptor {
                id: "en-gb".into(),
                name: "Google English (UK)".into(),
                language: "en-GB".into(),
            },
            VoiceDescriptor {
                id: "en-us".into(),
                name: "Google English (US)".into(),
                language: "en-US".into(),
            },
        ])
    }

    fn speak(
        &self,
        utterance: Utterance,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LifecycleEvent>, SynthesisError> {
        self.spoken.lock().push(utterance);
        self.tokens.lock().push(cancel);
        let (tx, rx) = mpsc::channel(8);
        match &self.behavior {
            EngineBehavior::Speak => {
                tx.try_send(LifecycleEvent::Started).unwrap();
                self.senders.lock().push(tx);
            }
            EngineBehavior::FailOnStart(reason) => {
                tx.try_send(LifecycleEvent::Failed(reason.clone())).unwrap();
            }
            EngineBehavior::Unavailable(reason) => {
                return Err(SynthesisError::Unavailable {
                    reason: reason.clone(),
                })
            }
        }
        Ok(rx)
    }

    fn cancel(&self) {
        *self.cancels.lock() += 1;
    }
}

#[derive(Default)]
pub struct SinkLog {
    pub sources: Vec<String>,
    pub playing: bool,
    pub position: Duration,
    pub stops: usize,
    pub fail_play: bool,
    notifier: Option<SinkNotifier>,
}

/// In-memory sink. Clones share the same log.
#[derive(Clone, Default)]
pub struct MockSink(pub Arc<Mutex<SinkLog>>);

impl MockSink {
    pub fn advance(&self, by: Duration) {
        let mut log = self.0.lock();
        assert!(log.playing, "advancing a silent sink");
        log.position += by;
    }

    pub fn playing(&self) -> bool {
        self.0.lock().playing
    }

    pub fn sources(&self) -> Vec<String> {
        self.0.lock().sources.clone()
    }

    pub fn stops(&self) -> usize {
        self.0.lock().stops
    }

    /// Report natural end of the current source.
    pub fn finish(&self) {
        let notifier = self.0.lock().notifier.take().expect("no source");
        notifier.ended();
    }

    /// Report that the current source could not be loaded.
    pub fn fail_load(&self, reason: &str) {
        let notifier = self.0.lock().notifier.take().expect("no source");
        notifier.failed(reason);
    }
}

impl AudioSink for MockSink {
    fn set_source(
        &mut self,
        location: &AudioLocation,
        notifier: SinkNotifier,
    ) -> Result<(), SinkError> {
        let mut log = self.0.lock();
        log.sources.push(location.to_string());
        log.notifier = Some(notifier);
        log.position = Duration::ZERO;
        log.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), SinkError> {
        let mut log = self.0.lock();
        if log.fail_play {
            return Err(SinkError::Output("device busy".into()));
        }
        log.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut log = self.0.lock();
        log.playing = false;
        log.position = Duration::ZERO;
        log.stops += 1;
    }

    fn position(&self) -> Duration {
        self.0.lock().position
    }
}

pub fn controller(endpoint: &str, engine: Arc<MockEngine>, sink: MockSink) -> PlaybackController {
    controller_with_timeout(endpoint, engine, sink, Duration::from_secs(5))
}

pub fn controller_with_timeout(
    endpoint: &str,
    engine: Arc<MockEngine>,
    sink: MockSink,
    request_timeout: Duration,
) -> PlaybackController {
    let config = ServiceConfigBuilder::default()
        .endpoint(endpoint)
        .request_timeout(Some(request_timeout))
        .build()
        .unwrap();
    PlaybackController::from_config(&config, engine, Box::new(sink)).unwrap()
}
