//! Provider-backed streaming recognition engine.
//!
//! Captures microphone audio, segments it into utterances with VAD, and
//! transcribes each finished utterance through the configured provider.
//! Every successful transcription re-publishes the cumulative segment
//! snapshot, so the caller always sees the full transcript so far.

use crate::audio::{Microphone, MonoResampler, SpeechDetector};
use crate::config::TranscriptionProvider;
use crate::speech::recognizer::{
    RecognitionSegment, RecognizerError, RecognizerErrorKind, RecognizerEvent, SpeechRecognizer,
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Hard cap so a runaway utterance cannot grow without bound.
const MAX_UTTERANCE_SECS: usize = 30;

/// Spacing of sound-activity events during continuous speech.
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(250);

pub struct StreamingRecognizer {
    provider: TranscriptionProvider,
    language: String,
    vad_threshold: f32,
    utterance_silence: Duration,
    mic: Microphone,
    running: Arc<AtomicBool>,
    event_tx: Sender<RecognizerEvent>,
    event_rx: Receiver<RecognizerEvent>,
    worker: Option<JoinHandle<()>>,
}

impl StreamingRecognizer {
    pub fn new(
        provider: TranscriptionProvider,
        language: String,
        vad_threshold: f32,
        utterance_silence: Duration,
    ) -> crate::Result<Self> {
        let (event_tx, event_rx) = unbounded();
        Ok(Self {
            provider,
            language,
            vad_threshold,
            utterance_silence,
            mic: Microphone::new()?,
            running: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx,
            worker: None,
        })
    }
}

impl SpeechRecognizer for StreamingRecognizer {
    fn start(&mut self) -> crate::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let (audio_tx, audio_rx) = bounded(64);
        self.running.store(true, Ordering::SeqCst);

        if let Err(e) = self.mic.start(audio_tx, Arc::clone(&self.running)) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let session = RecognitionSession {
            provider: self.provider.clone(),
            language: self.language.clone(),
            vad_threshold: self.vad_threshold,
            utterance_silence: self.utterance_silence,
            input_rate: self.mic.sample_rate(),
            running: Arc::clone(&self.running),
            event_tx: self.event_tx.clone(),
        };
        self.worker = Some(thread::spawn(move || session.run(audio_rx)));

        let _ = self.event_tx.send(RecognizerEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the stream disconnects the audio channel; the worker
        // flushes its pending utterance and emits Ended.
        self.mic.stop();
    }

    fn events(&self) -> Receiver<RecognizerEvent> {
        self.event_rx.clone()
    }
}

impl Drop for StreamingRecognizer {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// One recognition session: owns the VAD state, the utterance buffer,
/// and the cumulative segment list for its lifetime.
struct RecognitionSession {
    provider: TranscriptionProvider,
    language: String,
    vad_threshold: f32,
    utterance_silence: Duration,
    input_rate: u32,
    running: Arc<AtomicBool>,
    event_tx: Sender<RecognizerEvent>,
}

impl RecognitionSession {
    fn run(self, audio_rx: Receiver<Vec<f32>>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                self.fail(RecognizerErrorKind::Other, format!("Runtime creation failed: {e}"));
                return;
            }
        };

        let client = match reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                self.fail(RecognizerErrorKind::Other, format!("HTTP client failed: {e}"));
                return;
            }
        };

        let mut detector = match SpeechDetector::new(self.vad_threshold) {
            Ok(d) => d,
            Err(e) => {
                self.fail(RecognizerErrorKind::Audio, e.to_string());
                return;
            }
        };

        let mut resampler = if self.input_rate != SpeechDetector::SAMPLE_RATE {
            match MonoResampler::new(self.input_rate, SpeechDetector::SAMPLE_RATE) {
                Ok(r) => Some(r),
                Err(e) => {
                    self.fail(RecognizerErrorKind::Audio, e.to_string());
                    return;
                }
            }
        } else {
            None
        };

        let endpoint_chunks =
            (self.utterance_silence.as_millis() as u64 / SpeechDetector::CHUNK_MILLIS).max(1) as usize;
        let max_utterance = SpeechDetector::SAMPLE_RATE as usize * MAX_UTTERANCE_SECS;

        let mut pending: Vec<f32> = Vec::new();
        let mut utterance: Vec<f32> = Vec::new();
        let mut segments: Vec<RecognitionSegment> = Vec::new();
        let mut in_speech = false;
        let mut silence_chunks = 0usize;
        let mut last_keepalive = Instant::now();
        let mut failed = false;

        debug!("Recognition session started (provider '{}')", self.provider.id);

        'session: loop {
            match audio_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(samples) => {
                    let resampled = match &mut resampler {
                        Some(r) => match r.push(&samples) {
                            Ok(s) => s,
                            Err(e) => {
                                self.emit(RecognizerEvent::Error(RecognizerError::new(
                                    RecognizerErrorKind::Audio,
                                    e.to_string(),
                                )));
                                failed = true;
                                break 'session;
                            }
                        },
                        None => samples,
                    };
                    pending.extend_from_slice(&resampled);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'session,
            }

            while pending.len() >= SpeechDetector::CHUNK_SIZE {
                let chunk: Vec<f32> = pending.drain(..SpeechDetector::CHUNK_SIZE).collect();

                if detector.is_speech(&chunk) {
                    if !in_speech || last_keepalive.elapsed() >= KEEPALIVE_INTERVAL {
                        self.emit(RecognizerEvent::SoundDetected);
                        last_keepalive = Instant::now();
                    }
                    in_speech = true;
                    silence_chunks = 0;
                    utterance.extend_from_slice(&chunk);

                    if utterance.len() >= max_utterance {
                        in_speech = false;
                        self.emit(RecognizerEvent::AudioEnded);
                        if !self.finish_utterance(&runtime, &client, &mut utterance, &mut segments)
                        {
                            failed = true;
                            break 'session;
                        }
                        detector.reset();
                    }
                } else if in_speech {
                    utterance.extend_from_slice(&chunk);
                    silence_chunks += 1;

                    if silence_chunks >= endpoint_chunks {
                        in_speech = false;
                        silence_chunks = 0;
                        self.emit(RecognizerEvent::AudioEnded);
                        if !self.finish_utterance(&runtime, &client, &mut utterance, &mut segments)
                        {
                            failed = true;
                            break 'session;
                        }
                        detector.reset();
                    }
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break 'session;
            }
        }

        // Flush whatever was being spoken when the session ended.
        if !failed && in_speech && !utterance.is_empty() {
            self.emit(RecognizerEvent::AudioEnded);
            let _ = self.finish_utterance(&runtime, &client, &mut utterance, &mut segments);
        }

        self.running.store(false, Ordering::SeqCst);
        self.emit(RecognizerEvent::Ended);
        debug!("Recognition session ended");
    }

    /// Transcribe the buffered utterance and publish the new snapshot.
    /// Returns false when the session cannot continue.
    fn finish_utterance(
        &self,
        runtime: &tokio::runtime::Runtime,
        client: &reqwest::Client,
        utterance: &mut Vec<f32>,
        segments: &mut Vec<RecognitionSegment>,
    ) -> bool {
        let samples = std::mem::take(utterance);
        if samples.is_empty() {
            return true;
        }

        let wav = match encode_wav(&samples) {
            Ok(wav) => wav,
            Err(e) => {
                self.emit(RecognizerEvent::Error(e));
                return false;
            }
        };

        match runtime.block_on(request_transcript(client, &self.provider, &self.language, wav)) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    segments.push(RecognitionSegment::from_text(text));
                    self.emit(RecognizerEvent::Result(segments.clone()));
                }
                true
            }
            Err(e) => {
                warn!("Transcription failed: {e}");
                self.emit(RecognizerEvent::Error(e));
                false
            }
        }
    }

    fn fail(&self, kind: RecognizerErrorKind, message: String) {
        self.emit(RecognizerEvent::Error(RecognizerError::new(kind, message)));
        self.running.store(false, Ordering::SeqCst);
        self.emit(RecognizerEvent::Ended);
    }

    fn emit(&self, event: RecognizerEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Encode 16 kHz mono samples as a 16-bit PCM WAV in memory.
fn encode_wav(samples: &[f32]) -> std::result::Result<Vec<u8>, RecognizerError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SpeechDetector::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).map_err(|e| {
            RecognizerError::new(RecognizerErrorKind::Other, format!("WAV writer failed: {e}"))
        })?;
        for &sample in samples {
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(value).map_err(|e| {
                RecognizerError::new(RecognizerErrorKind::Other, format!("WAV write failed: {e}"))
            })?;
        }
        writer.finalize().map_err(|e| {
            RecognizerError::new(RecognizerErrorKind::Other, format!("WAV finalize failed: {e}"))
        })?;
    }

    Ok(buffer.into_inner())
}

async fn request_transcript(
    client: &reqwest::Client,
    provider: &TranscriptionProvider,
    language: &str,
    wav: Vec<u8>,
) -> std::result::Result<String, RecognizerError> {
    let url = format!(
        "{}/audio/transcriptions",
        provider.base_url.trim_end_matches('/')
    );

    let part = reqwest::multipart::Part::bytes(wav)
        .file_name("utterance.wav")
        .mime_str("audio/wav")
        .map_err(|e| RecognizerError::new(RecognizerErrorKind::Other, e.to_string()))?;

    let mut form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", provider.model.clone())
        .text("response_format", "text")
        .text("temperature", "0");
    if !language.is_empty() {
        form = form.text("language", language.to_string());
    }

    let mut request = client.post(&url).multipart(form);
    if let Some(key) = &provider.api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| RecognizerError::new(RecognizerErrorKind::Network, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let kind = if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            RecognizerErrorKind::NotAllowed
        } else {
            RecognizerErrorKind::Network
        };
        return Err(RecognizerError::new(
            kind,
            format!("transcription service returned {status}"),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| RecognizerError::new(RecognizerErrorKind::Network, e.to_string()))
}
