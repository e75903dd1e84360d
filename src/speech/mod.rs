//! Continuous speech capture.
//!
//! `recognizer` is the capability port (trait, events, availability
//! probe), `engine` the provider-backed production implementation, and
//! `controller` the state machine that adds silence auto-stop and
//! debounced restart on top.

pub mod controller;
#[cfg(feature = "audio-io")]
pub mod engine;
pub mod recognizer;

pub use controller::{CaptureEvent, CaptureState, CaptureTimings, VoiceCaptureController};
pub use recognizer::{
    probe, RecognitionSegment, RecognizerError, RecognizerErrorKind, RecognizerEvent,
    RecognizerFactory, SpeechRecognizer,
};
