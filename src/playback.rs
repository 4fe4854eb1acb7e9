//! Playback state machine.
//!
//! [`PlaybackController`] is the only owner of the audio output. It runs
//! the remote-then-fallback flow for each submission and applies user
//! controls to whichever source is active:
//!
//! ```text
//!   Idle ─submit→ Loading ─remoteReady→ PlayingRemote ─naturalEnd→ Idle
//!                    │                      │  ▲
//!                    │                   pause resume
//!                    │                      ▼  │
//!                    ├─localStarted→ PlayingLocal ─pause→ Paused ─resume→ Idle
//!                    │                   │ completed → Idle
//!                    └─bothFailed→ Error
//!
//!   Loading | Playing* | Paused ─stop→ Stopped        any ─fatal→ Error
//! ```
//!
//! Each submission opens a new generation. Notifications from an older
//! generation (late remote results, sink completions, engine events) are
//! dropped, so at most one source is ever audible.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::envelope::AudioLocation;
use crate::error::{ConfigError, OrchestrationError, SinkError, SpeakError, SynthesisError};
use crate::fallback::{FallbackSynthesizer, LifecycleEvent, UtteranceEvents};
use crate::params::{to_engine_params, VoiceParameters};
use crate::remote::{RequestOrchestrator, SynthesisRequest};
use crate::SpeechEngine;

/// What is currently audible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    PlayingRemote,
    PlayingLocal,
    Paused,
    Stopped,
    Error(String),
}

impl PlaybackState {
    /// `true` once a cycle is over and a new submission is accepted.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Error(_))
    }

    fn next(&self, transition: &Transition) -> Option<Self> {
        use PlaybackState::*;
        match (self, transition) {
            (Idle | Stopped | Error(_), Transition::Submit) => Some(Loading),
            (Loading, Transition::RemoteReady) => Some(PlayingRemote),
            (Loading, Transition::LocalStarted) => Some(PlayingLocal),
            (Loading, Transition::BothFailed(message)) => Some(Error(message.clone())),
            (PlayingRemote | PlayingLocal, Transition::Pause) => Some(Paused),
            (Paused, Transition::Resume(Source::Remote)) => Some(PlayingRemote),
            // A local utterance cannot continue mid-way.
            (Paused, Transition::Resume(Source::Local)) => Some(Idle),
            (Loading | PlayingRemote | PlayingLocal | Paused, Transition::Stop) => Some(Stopped),
            (PlayingRemote, Transition::NaturalEnd) => Some(Idle),
            (PlayingLocal, Transition::Completed) => Some(Idle),
            (_, Transition::Fatal(message)) => Some(Error(message.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    Submit,
    RemoteReady,
    LocalStarted,
    BothFailed(String),
    Pause,
    Resume(Source),
    Stop,
    NaturalEnd,
    Completed,
    Fatal(String),
}

/// How a successful submission is being voiced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// The remote file is playing through the [`AudioSink`].
    Remote(AudioLocation),
    /// The local engine is speaking.
    Local,
}

/// Output device for remote audio files.
///
/// Only [`PlaybackController`] calls these methods, always while holding
/// its state lock: implementations must not call back into the
/// [`SinkNotifier`] from inside them.
pub trait AudioSink: Send {
    /// Replace the current source. Nothing is heard until [`play`](Self::play).
    fn set_source(&mut self, location: &AudioLocation, notifier: SinkNotifier)
        -> Result<(), SinkError>;

    fn play(&mut self) -> Result<(), SinkError>;

    /// Pause, keeping the position.
    fn pause(&mut self);

    /// Silence the source so that the next one starts from the beginning.
    /// Called even when no source is set.
    fn stop(&mut self);

    fn position(&self) -> Duration;
}

/// Lets an [`AudioSink`] report what happened to the source it was given.
#[derive(Debug)]
pub struct SinkNotifier {
    shared: Weak<Shared>,
    generation: u64,
}

impl SinkNotifier {
    /// The source played to the end.
    pub fn ended(self) {
        self.deliver(Transition::NaturalEnd);
    }

    /// The source could not be fetched or decoded.
    pub fn failed(self, reason: impl std::fmt::Display) {
        self.deliver(Transition::Fatal(format!("Audio playback failed: {reason}")));
    }

    /// A notifier bound to no controller; every notification is dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shared: Weak::new(),
            generation: 0,
        }
    }

    fn deliver(self, transition: Transition) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock();
        if inner.generation != self.generation {
            log::debug!("Dropping stale sink notification {transition:?}");
            return;
        }
        shared.apply(&mut inner, transition);
    }
}

struct Inner {
    state: PlaybackState,
    paused: Option<Source>,
    generation: u64,
    cycle: Option<CancellationToken>,
    sink: Box<dyn AudioSink>,
}

struct Shared {
    orchestrator: RequestOrchestrator,
    fallback: FallbackSynthesizer,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<PlaybackState>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("endpoint", &self.orchestrator.endpoint())
            .field("state", &self.inner.try_lock().map(|inner| inner.state.clone()))
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn apply(&self, inner: &mut Inner, transition: Transition) -> bool {
        match inner.state.next(&transition) {
            Some(next) => {
                log::debug!("{:?} --{transition:?}--> {next:?}", inner.state);
                inner.state = next.clone();
                self.state_tx.send_replace(next);
                true
            }
            None => {
                log::debug!("Ignoring {transition:?} in state {:?}", inner.state);
                false
            }
        }
    }

    /// Silence both sources and retire the current generation.
    fn silence(&self, inner: &mut Inner) {
        if let Some(cycle) = inner.cycle.take() {
            cycle.cancel();
        }
        self.fallback.cancel();
        inner.sink.stop();
        inner.paused = None;
        inner.generation += 1;
    }

    fn fail_both(
        &self,
        inner: &mut Inner,
        network: OrchestrationError,
        synthesis: SynthesisError,
    ) -> SpeakError {
        let err = SpeakError::BothFailed { network, synthesis };
        log::error!("{err}: {err:?}");
        self.apply(inner, Transition::BothFailed(err.to_string()));
        err
    }
}

/// Owns the playback state and the audio output for one session.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(
        orchestrator: RequestOrchestrator,
        fallback: FallbackSynthesizer,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            shared: Arc::new(Shared {
                orchestrator,
                fallback,
                inner: Mutex::new(Inner {
                    state: PlaybackState::Idle,
                    paused: None,
                    generation: 0,
                    cycle: None,
                    sink,
                }),
                state_tx,
            }),
        }
    }

    pub fn from_config(
        config: &ServiceConfig,
        engine: Arc<dyn SpeechEngine>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            RequestOrchestrator::new(config)?,
            FallbackSynthesizer::new(engine),
            sink,
        ))
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state.clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the current cycle is over (idle, stopped or failed).
    pub async fn settled(&self) -> PlaybackState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(PlaybackState::is_settled).await;
        match settled {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this is unreachable in practice.
            Err(_) => self.state(),
        }
    }

    /// Position of the remote source.
    pub fn position(&self) -> Duration {
        self.shared.inner.lock().sink.position()
    }

    /// Speak `text`, remotely if possible and locally otherwise.
    ///
    /// Returns once audio has started. Rejected with [`SpeakError::Busy`]
    /// while a previous submission is loading; anything already playing is
    /// stopped first.
    pub async fn submit(
        &self,
        text: &str,
        voice: &VoiceParameters,
    ) -> Result<SpeakOutcome, SpeakError> {
        let request = SynthesisRequest::new(text, voice.clone())?;
        let (generation, cycle) = self.begin_cycle()?;

        let remote = tokio::select! {
            _ = cycle.cancelled() => return Err(SpeakError::Cancelled),
            result = self.shared.orchestrator.submit(&request) => result,
        };

        match remote {
            Ok(location) => self.start_remote(generation, location),
            Err(network) => {
                log::warn!("Remote synthesis failed, falling back to local speech: {network}");
                self.start_local(generation, &cycle, &request, network).await
            }
        }
    }

    /// Pause the active source. Returns `false` when nothing is playing.
    ///
    /// A local utterance is discarded; resuming it goes back to `Idle`.
    pub fn pause(&self) -> bool {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            PlaybackState::PlayingRemote => {
                inner.sink.pause();
                inner.paused = Some(Source::Remote);
            }
            PlaybackState::PlayingLocal => {
                shared.fallback.cancel();
                inner.generation += 1;
                inner.paused = Some(Source::Local);
            }
            _ => return false,
        }
        shared.apply(inner, Transition::Pause)
    }

    /// Continue after [`pause`](Self::pause). Returns `false` when not paused.
    pub fn resume(&self) -> bool {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.state != PlaybackState::Paused {
            return false;
        }
        let Some(source) = inner.paused.take() else {
            return false;
        };
        if source == Source::Remote {
            if let Err(e) = inner.sink.play() {
                log::error!("Cannot resume remote audio: {e}");
                shared.apply(&mut inner, Transition::Fatal(e.to_string()));
                return false;
            }
        }
        shared.apply(&mut inner, Transition::Resume(source))
    }

    /// Silence everything and rewind remote audio. Returns `false` when
    /// there was nothing to stop.
    pub fn stop(&self) -> bool {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.state.is_settled() {
            return false;
        }
        shared.silence(&mut inner);
        shared.apply(&mut inner, Transition::Stop)
    }

    fn begin_cycle(&self) -> Result<(u64, CancellationToken), SpeakError> {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            PlaybackState::Loading => {
                log::warn!("Rejecting submission while another one is loading");
                return Err(SpeakError::Busy);
            }
            PlaybackState::PlayingRemote
            | PlaybackState::PlayingLocal
            | PlaybackState::Paused => {
                log::info!("Stopping current playback for new submission");
                shared.silence(inner);
                shared.apply(inner, Transition::Stop);
            }
            _ => {}
        }
        shared.apply(inner, Transition::Submit);
        inner.generation += 1;
        let cycle = CancellationToken::new();
        inner.cycle = Some(cycle.clone());
        Ok((inner.generation, cycle))
    }

    fn start_remote(
        &self,
        generation: u64,
        location: AudioLocation,
    ) -> Result<SpeakOutcome, SpeakError> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.generation != generation {
            log::debug!("Discarding remote audio for a cancelled request");
            return Err(SpeakError::Cancelled);
        }

        let notifier = SinkNotifier {
            shared: Arc::downgrade(shared),
            generation,
        };
        let started = match inner.sink.set_source(&location, notifier) {
            Ok(()) => inner.sink.play(),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            log::error!("Cannot play {location}: {e}");
            inner.sink.stop();
            shared.apply(&mut inner, Transition::Fatal(e.to_string()));
            return Err(e.into());
        }

        shared.apply(&mut inner, Transition::RemoteReady);
        Ok(SpeakOutcome::Remote(location))
    }

    async fn start_local(
        &self,
        generation: u64,
        cycle: &CancellationToken,
        request: &SynthesisRequest,
        network: OrchestrationError,
    ) -> Result<SpeakOutcome, SpeakError> {
        let params = to_engine_params(request.voice());
        let speak = self.shared.fallback.speak(
            request.text(),
            &params,
            &request.voice().voice_name,
            cycle.child_token(),
        );
        let spoken = tokio::select! {
            _ = cycle.cancelled() => return Err(SpeakError::Cancelled),
            result = speak => result,
        };
        let mut events = match spoken {
            Ok(events) => events,
            Err(synthesis) => {
                let shared = &self.shared;
                let mut inner = shared.inner.lock();
                if inner.generation != generation {
                    return Err(SpeakError::Cancelled);
                }
                return Err(shared.fail_both(&mut inner, network, synthesis));
            }
        };

        let first = tokio::select! {
            _ = cycle.cancelled() => return Err(SpeakError::Cancelled),
            event = events.next() => event,
        };

        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.generation != generation {
            return Err(SpeakError::Cancelled);
        }
        match first {
            Some(LifecycleEvent::Started) => {
                log::info!("Local speech started");
                shared.apply(&mut inner, Transition::LocalStarted);
                drop(inner);
                self.follow_utterance(generation, events, network);
                Ok(SpeakOutcome::Local)
            }
            Some(LifecycleEvent::Completed) => {
                shared.apply(&mut inner, Transition::LocalStarted);
                shared.apply(&mut inner, Transition::Completed);
                Ok(SpeakOutcome::Local)
            }
            Some(LifecycleEvent::Failed(reason)) => Err(shared.fail_both(
                &mut inner,
                network,
                SynthesisError::Failed { reason },
            )),
            None => Err(shared.fail_both(
                &mut inner,
                network,
                SynthesisError::Failed {
                    reason: "engine ended without speaking".to_string(),
                },
            )),
        }
    }

    /// Apply the rest of a local utterance's lifecycle in the background.
    fn follow_utterance(
        &self,
        generation: u64,
        mut events: UtteranceEvents,
        network: OrchestrationError,
    ) {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let mut inner = shared.inner.lock();
                if inner.generation != generation {
                    log::debug!("Dropping {event:?} from a superseded utterance");
                    return;
                }
                match event {
                    LifecycleEvent::Started => {}
                    LifecycleEvent::Completed => {
                        log::info!("Local speech completed");
                        shared.apply(&mut inner, Transition::Completed);
                    }
                    LifecycleEvent::Failed(reason) => {
                        fail_utterance(&shared, &mut inner, &network, reason);
                    }
                }
            }

            // The engine hung up without a terminal event.
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = shared.inner.lock();
            if inner.generation == generation && inner.state == PlaybackState::PlayingLocal {
                fail_utterance(
                    &shared,
                    &mut inner,
                    &network,
                    "engine stopped without finishing the utterance".to_string(),
                );
            }
        });
    }
}

fn fail_utterance(shared: &Shared, inner: &mut Inner, network: &OrchestrationError, reason: String) {
    let err = SpeakError::BothFailed {
        network: network.clone(),
        synthesis: SynthesisError::Failed { reason },
    };
    log::error!("{err}: {err:?}");
    shared.apply(inner, Transition::Fatal(err.to_string()));
}

#[cfg(test)]
mod tests {
    use super::PlaybackState::*;
    use super::*;

    fn run(from: PlaybackState, transitions: &[Transition]) -> Vec<Option<PlaybackState>> {
        let mut state = from;
        transitions
            .iter()
            .map(|t| {
                let next = state.next(t);
                if let Some(s) = &next {
                    state = s.clone();
                }
                next
            })
            .collect()
    }

    #[test]
    fn remote_cycle_with_pause_resume_and_stop() {
        let states = run(
            Idle,
            &[
                Transition::Submit,
                Transition::RemoteReady,
                Transition::Pause,
                Transition::Resume(Source::Remote),
                Transition::Stop,
            ],
        );
        assert_eq!(
            states,
            vec![
                Some(Loading),
                Some(PlayingRemote),
                Some(Paused),
                Some(PlayingRemote),
                Some(Stopped)
            ]
        );
    }

    #[test]
    fn resuming_local_pause_returns_to_idle() {
        let states = run(
            PlayingLocal,
            &[Transition::Pause, Transition::Resume(Source::Local)],
        );
        assert_eq!(states, vec![Some(Paused), Some(Idle)]);
    }

    #[test]
    fn completions_return_to_idle() {
        assert_eq!(PlayingRemote.next(&Transition::NaturalEnd), Some(Idle));
        assert_eq!(PlayingLocal.next(&Transition::Completed), Some(Idle));
        assert_eq!(PlayingLocal.next(&Transition::NaturalEnd), None);
        assert_eq!(Paused.next(&Transition::NaturalEnd), None);
    }

    #[test]
    fn submit_only_from_settled_states() {
        for state in [Idle, Stopped, Error("x".into())] {
            assert_eq!(state.next(&Transition::Submit), Some(Loading));
        }
        for state in [Loading, PlayingRemote, PlayingLocal, Paused] {
            assert_eq!(state.next(&Transition::Submit), None);
        }
    }

    #[test]
    fn failures_end_in_error() {
        assert_eq!(
            Loading.next(&Transition::BothFailed("both".into())),
            Some(Error("both".into()))
        );
        assert_eq!(PlayingRemote.next(&Transition::BothFailed("both".into())), None);
        for state in [Idle, Loading, PlayingLocal, Paused, Stopped] {
            assert_eq!(
                state.next(&Transition::Fatal("boom".into())),
                Some(Error("boom".into()))
            );
        }
    }

    #[test]
    fn stop_is_ignored_when_settled() {
        assert_eq!(Idle.next(&Transition::Stop), None);
        assert_eq!(Error("x".into()).next(&Transition::Stop), None);
        for state in [Loading, PlayingRemote, PlayingLocal, Paused] {
            assert_eq!(state.next(&Transition::Stop), Some(Stopped));
        }
        assert_eq!(Idle.next(&Transition::Pause), None);
        assert_eq!(Idle.next(&Transition::Resume(Source::Remote)), None);
    }
}
