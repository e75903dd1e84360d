//! The speech capability port.
//!
//! The platform offers more than one equivalent way to construct a
//! recognition session; callers see a single trait plus an availability
//! probe that picks the first usable constructor. The probed factory is
//! kept around so the capture controller can re-initialize after a
//! synchronous start failure.

use crate::config::SpeechConfig;
use crossbeam_channel::Receiver;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    /// Microphone or service access denied.
    NotAllowed,
    /// Transient transport failure; a restart may recover.
    Network,
    /// Audio capture failure.
    Audio,
    Other,
}

#[derive(Debug, Clone)]
pub struct RecognizerError {
    pub kind: RecognizerErrorKind,
    pub message: String,
}

impl RecognizerError {
    pub fn new(kind: RecognizerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RecognizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// One recognized stretch of speech, with ranked alternatives.
#[derive(Debug, Clone, Default)]
pub struct RecognitionSegment {
    pub alternatives: Vec<String>,
}

impl RecognitionSegment {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
        }
    }

    /// Highest-ranked transcript, if any.
    pub fn top(&self) -> Option<&str> {
        self.alternatives.first().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// A recognition session began.
    Started,
    /// Sound activity on the microphone.
    SoundDetected,
    /// The current utterance's audio ended.
    AudioEnded,
    /// Cumulative snapshot of every segment recognized so far, in order.
    Result(Vec<RecognitionSegment>),
    Error(RecognizerError),
    /// The session ended.
    Ended,
}

/// Space-joined concatenation of each segment's top transcript.
pub fn snapshot_text(segments: &[RecognitionSegment]) -> String {
    segments
        .iter()
        .filter_map(RecognitionSegment::top)
        .collect::<Vec<_>>()
        .join(" ")
}

pub trait SpeechRecognizer: Send {
    /// Begin a continuous session. Fails synchronously when the
    /// capability cannot be started at all; runtime failures arrive as
    /// [`RecognizerEvent::Error`].
    fn start(&mut self) -> crate::Result<()>;

    /// End the session. The recognizer finishes pending work and emits
    /// [`RecognizerEvent::Ended`].
    fn stop(&mut self);

    fn events(&self) -> Receiver<RecognizerEvent>;
}

pub type RecognizerFactory = Box<dyn Fn() -> crate::Result<Box<dyn SpeechRecognizer>> + Send>;

/// Probe the platform for a usable recognition constructor.
///
/// Providers are tried in configuration order; the first one that is
/// configured on a machine with an input device wins. `None` means
/// speech input is unsupported for this process.
#[cfg(feature = "audio-io")]
pub fn probe(config: &SpeechConfig) -> Option<RecognizerFactory> {
    use crate::audio::Microphone;
    use crate::speech::engine::StreamingRecognizer;
    use std::time::Duration;
    use tracing::info;

    if !Microphone::is_available() {
        info!("No audio input device; speech input unsupported");
        return None;
    }

    for provider in &config.providers {
        if !provider.is_configured() {
            continue;
        }
        info!(
            "Speech input backed by {} ('{}')",
            provider.label, provider.id
        );

        let provider = provider.clone();
        let language = config.language.clone();
        let vad_threshold = config.vad_threshold;
        let utterance_silence = Duration::from_millis(config.utterance_silence_ms);

        return Some(Box::new(move || {
            StreamingRecognizer::new(
                provider.clone(),
                language.clone(),
                vad_threshold,
                utterance_silence,
            )
            .map(|r| Box::new(r) as Box<dyn SpeechRecognizer>)
        }));
    }

    info!("No configured transcription provider; speech input unsupported");
    None
}

#[cfg(not(feature = "audio-io"))]
pub fn probe(_config: &SpeechConfig) -> Option<RecognizerFactory> {
    None
}
