//! Remote audio playback via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so it lives on a
//! dedicated thread for as long as the sink exists; only the `Send` stream
//! handle and per-source `Sink`s cross threads.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use ::rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use crate::envelope::AudioLocation;
use crate::error::SinkError;
use crate::playback::{AudioSink, SinkNotifier};

struct LoadedSource {
    sink: Arc<Sink>,
    retired: Arc<AtomicBool>,
}

impl LoadedSource {
    fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}

/// Plays remote audio files on the default output device.
///
/// Setting a source starts a background download; `play` may be called
/// before the download finishes and takes effect as soon as audio arrives.
pub struct RodioSink {
    handle: OutputStreamHandle,
    current: Option<LoadedSource>,
    keepalive: Option<mpsc::Sender<()>>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl RodioSink {
    /// Open the default output device.
    pub fn new() -> Result<Self, SinkError> {
        let (init_tx, init_rx) = mpsc::channel::<Result<OutputStreamHandle, SinkError>>();
        let (keepalive_tx, keepalive_rx) = mpsc::channel::<()>();

        let stream_thread = thread::Builder::new()
            .name("voicesynth-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = init_tx.send(Ok(handle));
                    // Returns once the sink drops its sender.
                    let _ = keepalive_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = init_tx.send(Err(SinkError::Output(e.to_string())));
                }
            })
            .map_err(|e| SinkError::Output(e.to_string()))?;

        let handle = init_rx
            .recv()
            .map_err(|_| SinkError::Output("audio output thread exited".into()))??;
        log::info!("Audio playback initialized on default output device");

        Ok(Self {
            handle,
            current: None,
            keepalive: Some(keepalive_tx),
            stream_thread: Some(stream_thread),
        })
    }

    fn active(&self) -> Option<&Sink> {
        self.current.as_ref().map(|source| source.sink.as_ref())
    }
}

impl AudioSink for RodioSink {
    fn set_source(
        &mut self,
        location: &AudioLocation,
        notifier: SinkNotifier,
    ) -> Result<(), SinkError> {
        if let Some(previous) = self.current.take() {
            previous.retire();
        }

        let sink = Sink::try_new(&self.handle).map_err(|e| SinkError::Output(e.to_string()))?;
        sink.pause();
        let source = LoadedSource {
            sink: Arc::new(sink),
            retired: Arc::new(AtomicBool::new(false)),
        };

        let url = location.as_str().to_string();
        let sink = Arc::clone(&source.sink);
        let retired = Arc::clone(&source.retired);
        thread::Builder::new()
            .name("voicesynth-fetch".into())
            .spawn(move || load_and_watch(&url, &sink, &retired, notifier))
            .map_err(|e| SinkError::Source(e.to_string()))?;

        self.current = Some(source);
        Ok(())
    }

    fn play(&mut self) -> Result<(), SinkError> {
        let sink = self
            .active()
            .ok_or_else(|| SinkError::Source("no audio source set".into()))?;
        sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = self.active() {
            sink.pause();
        }
    }

    /// Not every decoder can seek (minimp3 cannot), so the source is
    /// released instead of rewound. A stopped source is never resumed.
    fn stop(&mut self) {
        if let Some(source) = self.current.take() {
            source.retire();
        }
    }

    fn position(&self) -> Duration {
        self.active().map(Sink::get_pos).unwrap_or_default()
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        if let Some(source) = self.current.take() {
            source.retire();
        }
        self.keepalive.take();
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.join();
        }
    }
}

fn fetch(url: &str) -> Result<Vec<u8>, String> {
    let response = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| e.to_string())?;
    let bytes = response.bytes().map_err(|e| e.to_string())?;
    Ok(bytes.to_vec())
}

fn load_and_watch(url: &str, sink: &Sink, retired: &AtomicBool, notifier: SinkNotifier) {
    let decoded = fetch(url).and_then(|bytes| {
        log::debug!("Fetched {} bytes of audio", bytes.len());
        Decoder::new(Cursor::new(bytes)).map_err(|e| e.to_string())
    });
    let source = match decoded {
        Ok(source) => source,
        Err(e) => {
            log::error!("Failed to load audio from {url}: {e}");
            notifier.failed(e);
            return;
        }
    };

    if retired.load(Ordering::SeqCst) {
        return;
    }
    sink.append(source);

    // Returns when the queue drains or the sink is stopped by `retire`.
    sink.sleep_until_end();
    if retired.load(Ordering::SeqCst) {
        return;
    }
    log::debug!("Playback finished naturally");
    notifier.ended();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_releases_the_source() {
        // Skip when no output device is available in the execution environment.
        let Ok(mut sink) = RodioSink::new() else {
            return;
        };
        let location =
            crate::envelope::parse_str(r#"{"s3_url": "http://127.0.0.1:9/missing.mp3"}"#).unwrap();
        sink.set_source(&location, SinkNotifier::detached()).unwrap();
        assert!(sink.current.is_some());

        sink.stop();
        assert!(sink.current.is_none());
        assert_eq!(sink.position(), Duration::ZERO);
        assert!(matches!(sink.play(), Err(SinkError::Source(_))));
    }
}
