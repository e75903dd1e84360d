//! Audio capture and preprocessing for the recognition engine.

#[cfg(feature = "audio-io")]
pub mod input;
pub mod resampler;
pub mod vad;

#[cfg(feature = "audio-io")]
pub use input::Microphone;
pub use resampler::MonoResampler;
pub use vad::SpeechDetector;
