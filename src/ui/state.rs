//! Application state management.
//!
//! Bridges the voice capture controller and the conversation
//! orchestrator: voice transcript snapshots land in the pending-input
//! buffer, and submission always wins over continued capture.

use crate::conversation::Orchestrator;
use crate::speech::{CaptureEvent, VoiceCaptureController};
use std::time::{Duration, Instant};

/// How long the per-message copy acknowledgment stays visible.
const COPY_ACK_TTL: Duration = Duration::from_secs(2);

/// How long notices stay visible.
const NOTICE_TTL: Duration = Duration::from_secs(4);

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub voice: VoiceCaptureController,
    notice: Option<(String, Instant)>,
    copied: Option<(String, Instant)>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, voice: VoiceCaptureController) -> Self {
        Self {
            orchestrator,
            voice,
            notice: None,
            copied: None,
        }
    }

    /// Submit the pending input, stopping voice capture first if a
    /// session is active.
    pub fn send_message(&mut self) {
        if self.voice.is_listening() {
            self.voice.stop();
        }
        self.orchestrator.submit();
    }

    pub fn toggle_voice(&mut self) {
        self.voice.toggle();
    }

    /// Clear the conversation and stop any active capture.
    pub fn reset(&mut self) {
        if self.voice.is_listening() {
            self.voice.stop();
        }
        self.orchestrator.reset();
    }

    /// Drain background events; called once per frame.
    pub fn poll_events(&mut self) {
        while let Some(event) = self.voice.try_recv_event() {
            match event {
                // Each snapshot replaces the whole buffer.
                CaptureEvent::TranscriptChanged(text) => *self.orchestrator.input_mut() = text,
                CaptureEvent::Notice(text) => self.show_notice(text),
                CaptureEvent::StateChanged(_) => {}
            }
        }

        self.orchestrator.poll();
        self.prune();
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now() + NOTICE_TTL));
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(text, _)| text.as_str())
    }

    pub fn mark_copied(&mut self, message_id: &str) {
        self.copied = Some((message_id.to_string(), Instant::now() + COPY_ACK_TTL));
    }

    pub fn just_copied(&self, message_id: &str) -> bool {
        self.copied
            .as_ref()
            .map(|(id, expires_at)| id == message_id && Instant::now() < *expires_at)
            .unwrap_or(false)
    }

    fn prune(&mut self) {
        let now = Instant::now();
        if self.notice.as_ref().is_some_and(|(_, e)| now >= *e) {
            self.notice = None;
        }
        if self.copied.as_ref().is_some_and(|(_, e)| now >= *e) {
            self.copied = None;
        }
    }
}
