use crate::{ReverieError, Result};
use voice_activity_detector::VoiceActivityDetector;

/// Speech/silence classification over fixed 32 ms chunks (Silero VAD).
pub struct SpeechDetector {
    detector: VoiceActivityDetector,
    threshold: f32,
}

impl SpeechDetector {
    pub const SAMPLE_RATE: u32 = 16_000;
    /// 32 ms at 16 kHz.
    pub const CHUNK_SIZE: usize = 512;
    pub const CHUNK_MILLIS: u64 = 32;

    pub fn new(threshold: f32) -> Result<Self> {
        let detector = VoiceActivityDetector::builder()
            .sample_rate(Self::SAMPLE_RATE as i32)
            .chunk_size(Self::CHUNK_SIZE)
            .build()
            .map_err(|e| ReverieError::Recognition(format!("Failed to create VAD: {e:?}")))?;

        Ok(Self {
            detector,
            threshold: threshold.clamp(0.0, 1.0),
        })
    }

    /// True when the chunk crosses the speech probability threshold.
    pub fn is_speech(&mut self, chunk: &[f32]) -> bool {
        self.detector.predict(chunk.iter().copied()) >= self.threshold
    }

    /// Reset session state between utterances.
    pub fn reset(&mut self) {
        self.detector.reset();
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
