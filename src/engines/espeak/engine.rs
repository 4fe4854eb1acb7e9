use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, OnceCell};
use tokio_util::sync::CancellationToken;

use super::voices::parse_voice_table;
use crate::error::SynthesisError;
use crate::fallback::LifecycleEvent;
use crate::{SpeechEngine, Utterance, VoiceDescriptor};

/// espeak-ng speaking rate at a 1.0 multiplier, in words per minute.
pub const DEFAULT_WORDS_PER_MINUTE: f32 = 175.0;

const ESPEAK_NOT_FOUND: &str = "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
     macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download";

/// Local speech engine backed by the `espeak-ng` command-line synthesizer.
///
/// Each utterance runs one `espeak-ng` process that plays straight to the
/// default output device. Cancelling kills the process.
///
/// # Quick Start
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voicesynth::{engines::espeak::EspeakEngine, FallbackSynthesizer};
///
/// // Uses espeak-ng from PATH
/// let fallback = FallbackSynthesizer::new(Arc::new(EspeakEngine::new()));
/// ```
///
/// # Bundled espeak-ng
///
/// ```rust,no_run
/// use voicesynth::engines::espeak::EspeakEngine;
/// use std::path::PathBuf;
///
/// let engine = EspeakEngine::with_binary(PathBuf::from("/app/resources/espeak-ng/espeak-ng"));
/// ```
pub struct EspeakEngine {
    bin_path: Option<PathBuf>,
    voices: OnceCell<Vec<VoiceDescriptor>>,
    current: Mutex<Option<CancellationToken>>,
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakEngine {
    /// Create an engine that runs `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self {
            bin_path: None,
            voices: OnceCell::new(),
            current: Mutex::new(None),
        }
    }

    /// Create an engine that runs the given `espeak-ng` binary.
    pub fn with_binary(bin_path: PathBuf) -> Self {
        Self {
            bin_path: Some(bin_path),
            voices: OnceCell::new(),
            current: Mutex::new(None),
        }
    }

    fn command(&self) -> Command {
        match &self.bin_path {
            Some(path) => Command::new(path),
            None => Command::new("espeak-ng"),
        }
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Command-line arguments for one utterance. Text goes through stdin.
pub fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let words_per_minute = (DEFAULT_WORDS_PER_MINUTE * utterance.rate)
        .round()
        .clamp(80.0, 450.0) as u32;
    let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
    let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;

    let mut args = vec![
        "-s".to_string(),
        words_per_minute.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
    ];
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }
    args.push("--stdin".to_string());
    args
}

/// espeak-ng reads stdin line by line; an unterminated last line can be
/// cut short.
fn canonicalize_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn spawn_error(e: std::io::Error) -> SynthesisError {
    match e.kind() {
        std::io::ErrorKind::NotFound => SynthesisError::Unavailable {
            reason: ESPEAK_NOT_FOUND.to_string(),
        },
        std::io::ErrorKind::PermissionDenied => SynthesisError::Unavailable {
            reason: format!("espeak-ng cannot be executed: {e}"),
        },
        _ => SynthesisError::Failed {
            reason: format!("failed to start espeak-ng: {e}"),
        },
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>, SynthesisError> {
        self.voices
            .get_or_try_init(|| async {
                let output = self
                    .command()
                    .arg("--voices")
                    .output()
                    .await
                    .map_err(spawn_error)?;
                if !output.status.success() {
                    return Err(SynthesisError::Failed {
                        reason: format!(
                            "espeak-ng --voices exited with code {:?}: {}",
                            output.status.code(),
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    });
                }
                let voices = parse_voice_table(&String::from_utf8_lossy(&output.stdout));
                log::info!("Loaded {} espeak-ng voices", voices.len());
                Ok(voices)
            })
            .await
            .cloned()
    }

    fn speak(
        &self,
        utterance: Utterance,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LifecycleEvent>, SynthesisError> {
        let args = espeak_args(&utterance);
        log::debug!("Running espeak-ng {}", args.join(" "));

        let mut child = self
            .command()
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(previous) = self.current.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let payload = canonicalize_stdin_payload(&utterance.text).into_owned();
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    let _ = child.kill().await;
                    let _ = tx
                        .send(LifecycleEvent::Failed(format!("cannot write to espeak-ng: {e}")))
                        .await;
                    return;
                }
            }

            if tx.send(LifecycleEvent::Started).await.is_err() {
                let _ = child.kill().await;
                return;
            }

            let status = tokio::select! {
                _ = cancel.cancelled() => None,
                status = child.wait() => Some(status),
            };
            let Some(status) = status else {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill espeak-ng: {e}");
                }
                log::debug!("espeak-ng utterance cancelled");
                return;
            };

            let event = match status {
                Ok(status) if status.success() => LifecycleEvent::Completed,
                Ok(status) => {
                    let mut message = String::new();
                    if let Some(mut stderr) = stderr {
                        let _ = stderr.read_to_string(&mut message).await;
                    }
                    LifecycleEvent::Failed(format!(
                        "espeak-ng exited with code {:?}: {}",
                        status.code(),
                        message.trim()
                    ))
                }
                Err(e) => LifecycleEvent::Failed(e.to_string()),
            };
            let _ = tx.send(event).await;
        });

        Ok(rx)
    }

    fn cancel(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }
}
