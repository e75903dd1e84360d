//! Voice capture controller.
//!
//! Wraps a probed [`SpeechRecognizer`] behind a start/stop/toggle
//! contract, adding two behaviors the capability does not provide:
//! silence-based auto-stop (a periodic poll plus an immediate check on
//! audio end) and a debounced single-restart on transient network
//! errors. Runs on its own worker thread; the UI polls [`CaptureEvent`]s
//! and reads the published state.

use crate::speech::recognizer::{
    snapshot_text, RecognizerError, RecognizerErrorKind, RecognizerEvent, RecognizerFactory,
    SpeechRecognizer,
};
use crate::ReverieError;
use crossbeam_channel::{at, bounded, never, select, tick, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const UNAVAILABLE_NOTICE: &str = "Voice input is unavailable.";
pub const MIC_DENIED_NOTICE: &str =
    "Microphone access was denied. Voice input has been disabled.";

/// Timings for silence detection and restart debouncing. Injectable so
/// tests can run on millisecond scales.
#[derive(Clone, Debug)]
pub struct CaptureTimings {
    /// Quiet time after which a listening session auto-stops.
    pub silence_threshold: Duration,
    /// Interval of the periodic silence check.
    pub silence_poll: Duration,
    /// Delay before a restart after a network-class error.
    pub restart_debounce: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(3000),
            silence_poll: Duration::from_millis(500),
            restart_debounce: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No usable capability; terminal.
    Unsupported,
    Idle,
    Listening,
    /// A restart is pending after a transient error.
    Restarting,
}

#[derive(Debug)]
enum CaptureCommand {
    Start,
    Stop,
    Toggle,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    StateChanged(CaptureState),
    /// Full resnapshot of the live transcript.
    TranscriptChanged(String),
    /// User-facing notice.
    Notice(String),
}

pub struct VoiceCaptureController {
    command_tx: Sender<CaptureCommand>,
    event_rx: Receiver<CaptureEvent>,
    state: Arc<Mutex<CaptureState>>,
    worker: Option<JoinHandle<()>>,
}

impl VoiceCaptureController {
    pub fn new(factory: Option<RecognizerFactory>, timings: CaptureTimings) -> Self {
        let (command_tx, command_rx) = bounded(16);
        let (event_tx, event_rx) = unbounded();

        let initial = if factory.is_some() {
            CaptureState::Idle
        } else {
            CaptureState::Unsupported
        };
        let state = Arc::new(Mutex::new(initial));

        let shared = Arc::clone(&state);
        let worker = thread::spawn(move || {
            CaptureWorker::new(factory, timings, shared, event_tx, command_rx).run();
        });

        Self {
            command_tx,
            event_rx,
            state,
            worker: Some(worker),
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn is_supported(&self) -> bool {
        self.state() != CaptureState::Unsupported
    }

    /// True while a session is active, including a pending restart.
    pub fn is_listening(&self) -> bool {
        matches!(
            self.state(),
            CaptureState::Listening | CaptureState::Restarting
        )
    }

    pub fn start(&self) {
        let _ = self.command_tx.send(CaptureCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.command_tx.send(CaptureCommand::Stop);
    }

    pub fn toggle(&self) {
        let _ = self.command_tx.send(CaptureCommand::Toggle);
    }

    pub fn try_recv_event(&self) -> Option<CaptureEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl Drop for VoiceCaptureController {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct CaptureWorker {
    factory: Option<RecognizerFactory>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    timings: CaptureTimings,
    shared_state: Arc<Mutex<CaptureState>>,
    state: CaptureState,
    event_tx: Sender<CaptureEvent>,
    command_rx: Receiver<CaptureCommand>,
    last_sound: Instant,
    session_active: bool,
    restart_at: Option<Instant>,
}

impl CaptureWorker {
    fn new(
        factory: Option<RecognizerFactory>,
        timings: CaptureTimings,
        shared_state: Arc<Mutex<CaptureState>>,
        event_tx: Sender<CaptureEvent>,
        command_rx: Receiver<CaptureCommand>,
    ) -> Self {
        // Mirror the handle's optimistic initial state; initialize()
        // corrects it if construction fails.
        let state = if factory.is_some() {
            CaptureState::Idle
        } else {
            CaptureState::Unsupported
        };

        let mut worker = Self {
            factory,
            recognizer: None,
            timings,
            shared_state,
            state,
            event_tx,
            command_rx,
            last_sound: Instant::now(),
            session_active: false,
            restart_at: None,
        };
        worker.initialize();
        worker
    }

    fn initialize(&mut self) {
        match &self.factory {
            Some(factory) => match factory() {
                Ok(recognizer) => self.recognizer = Some(recognizer),
                Err(e) => {
                    warn!("Speech recognizer initialization failed: {e}");
                    self.set_state(CaptureState::Unsupported);
                }
            },
            None => info!("Speech input unsupported"),
        }
    }

    fn run(mut self) {
        let command_rx = self.command_rx.clone();
        let poll = tick(self.timings.silence_poll);

        loop {
            let recognizer_rx = match &self.recognizer {
                Some(r) => r.events(),
                None => never(),
            };
            let debounce = match self.restart_at {
                Some(deadline) => at(deadline),
                None => never(),
            };

            select! {
                recv(command_rx) -> command => match command {
                    Ok(CaptureCommand::Start) => self.handle_start(),
                    Ok(CaptureCommand::Stop) => self.stop_session(),
                    Ok(CaptureCommand::Toggle) => self.handle_toggle(),
                    Ok(CaptureCommand::Shutdown) | Err(_) => {
                        self.stop_session();
                        break;
                    }
                },
                recv(recognizer_rx) -> event => {
                    if let Ok(event) = event {
                        self.handle_recognizer_event(event);
                    }
                },
                recv(poll) -> _ => self.check_silence(),
                recv(debounce) -> _ => self.attempt_restart(),
            }
        }
    }

    fn handle_start(&mut self) {
        match self.state {
            CaptureState::Unsupported => self.notice(UNAVAILABLE_NOTICE),
            // One session at a time; starting while active is a no-op.
            CaptureState::Listening | CaptureState::Restarting => {}
            CaptureState::Idle => {
                if let Err(e) = self.try_start() {
                    warn!("Voice capture start failed: {e}");
                    self.notice(UNAVAILABLE_NOTICE);
                }
            }
        }
    }

    fn handle_toggle(&mut self) {
        match self.state {
            CaptureState::Unsupported => self.notice(UNAVAILABLE_NOTICE),
            CaptureState::Listening | CaptureState::Restarting => self.stop_session(),
            CaptureState::Idle => {
                self.emit(CaptureEvent::TranscriptChanged(String::new()));
                if let Err(first) = self.try_start() {
                    warn!("Voice capture start failed ({first}), re-initializing recognizer");
                    self.recognizer = self.factory.as_ref().and_then(|f| f().ok());
                    if self.recognizer.is_none() || self.try_start().is_err() {
                        self.session_active = false;
                        self.set_state(CaptureState::Unsupported);
                        self.notice(UNAVAILABLE_NOTICE);
                    }
                }
            }
        }
    }

    fn try_start(&mut self) -> crate::Result<()> {
        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or_else(|| ReverieError::Recognition("No recognizer available".into()))?;
        recognizer.start()?;

        self.session_active = true;
        self.last_sound = Instant::now();
        self.restart_at = None;
        self.set_state(CaptureState::Listening);
        Ok(())
    }

    fn stop_session(&mut self) {
        self.session_active = false;
        self.restart_at = None;
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        if matches!(self.state, CaptureState::Listening | CaptureState::Restarting) {
            self.set_state(CaptureState::Idle);
        }
    }

    fn check_silence(&mut self) {
        if self.state == CaptureState::Listening
            && self.last_sound.elapsed() >= self.timings.silence_threshold
        {
            debug!("Silence threshold reached, stopping capture");
            self.stop_session();
        }
    }

    fn attempt_restart(&mut self) {
        self.restart_at = None;
        if !self.session_active {
            // Stopped during the debounce window.
            return;
        }

        let started = self.recognizer.as_mut().map(|r| r.start());
        match started {
            Some(Ok(())) => {
                self.last_sound = Instant::now();
                self.set_state(CaptureState::Listening);
            }
            _ => {
                warn!("Recognizer restart failed, stopping capture");
                self.stop_session();
            }
        }
    }

    fn handle_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Started => debug!("Recognition session started"),
            RecognizerEvent::SoundDetected => {
                if self.session_active {
                    self.last_sound = Instant::now();
                }
            }
            RecognizerEvent::AudioEnded => {
                // The capability's own end-of-audio signal performs the
                // same comparison the poll does, immediately.
                if self.state == CaptureState::Listening
                    && self.last_sound.elapsed() >= self.timings.silence_threshold
                {
                    self.stop_session();
                }
            }
            RecognizerEvent::Result(segments) => {
                if self.session_active {
                    self.last_sound = Instant::now();
                    self.emit(CaptureEvent::TranscriptChanged(snapshot_text(&segments)));
                }
            }
            RecognizerEvent::Error(error) => self.handle_recognizer_error(error),
            RecognizerEvent::Ended => {
                // Natural end; honored only when no restart is pending.
                if self.state == CaptureState::Listening && self.restart_at.is_none() {
                    self.session_active = false;
                    self.set_state(CaptureState::Idle);
                }
            }
        }
    }

    fn handle_recognizer_error(&mut self, error: RecognizerError) {
        match error.kind {
            RecognizerErrorKind::Network => {
                if self.session_active {
                    debug!("Transient recognition error: {}", error.message);
                    // Re-arming replaces any pending deadline, so bursts
                    // of errors collapse into one restart.
                    self.restart_at = Some(Instant::now() + self.timings.restart_debounce);
                    self.set_state(CaptureState::Restarting);
                }
            }
            RecognizerErrorKind::NotAllowed => {
                warn!("Recognition permission denied: {}", error.message);
                self.session_active = false;
                self.restart_at = None;
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.stop();
                }
                self.set_state(CaptureState::Unsupported);
                self.notice(MIC_DENIED_NOTICE);
            }
            _ => {
                warn!("Recognition error: {}", error.message);
                self.stop_session();
            }
        }
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state {
            return;
        }
        debug!("capture state: {:?} -> {:?}", self.state, state);
        self.state = state;
        *self.shared_state.lock() = state;
        self.emit(CaptureEvent::StateChanged(state));
    }

    fn emit(&self, event: CaptureEvent) {
        let _ = self.event_tx.send(event);
    }

    fn notice(&self, text: &str) {
        self.emit(CaptureEvent::Notice(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::recognizer::RecognitionSegment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recognizer driven entirely by the test through a shared event
    /// channel. `fail_starts` makes the next N `start()` calls fail.
    struct ScriptedRecognizer {
        event_rx: Receiver<RecognizerEvent>,
        starts: Arc<AtomicUsize>,
        fail_starts: Arc<AtomicUsize>,
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn start(&mut self) -> crate::Result<()> {
            if self.fail_starts.load(Ordering::SeqCst) > 0 {
                self.fail_starts.fetch_sub(1, Ordering::SeqCst);
                return Err(ReverieError::Recognition("scripted start failure".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) {}

        fn events(&self) -> Receiver<RecognizerEvent> {
            self.event_rx.clone()
        }
    }

    struct Scripted {
        controller: VoiceCaptureController,
        events: Sender<RecognizerEvent>,
        starts: Arc<AtomicUsize>,
        fail_starts: Arc<AtomicUsize>,
        factory_calls: Arc<AtomicUsize>,
    }

    fn fast_timings() -> CaptureTimings {
        CaptureTimings {
            silence_threshold: Duration::from_millis(120),
            silence_poll: Duration::from_millis(10),
            restart_debounce: Duration::from_millis(50),
        }
    }

    fn scripted(timings: CaptureTimings) -> Scripted {
        let (event_tx, event_rx) = unbounded();
        let starts = Arc::new(AtomicUsize::new(0));
        let fail_starts = Arc::new(AtomicUsize::new(0));
        let factory_calls = Arc::new(AtomicUsize::new(0));

        let factory: RecognizerFactory = {
            let event_rx = event_rx.clone();
            let starts = Arc::clone(&starts);
            let fail_starts = Arc::clone(&fail_starts);
            let factory_calls = Arc::clone(&factory_calls);
            Box::new(move || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedRecognizer {
                    event_rx: event_rx.clone(),
                    starts: Arc::clone(&starts),
                    fail_starts: Arc::clone(&fail_starts),
                }) as Box<dyn SpeechRecognizer>)
            })
        };

        Scripted {
            controller: VoiceCaptureController::new(Some(factory), timings),
            events: event_tx,
            starts,
            fail_starts,
            factory_calls,
        }
    }

    fn wait_for_state(controller: &VoiceCaptureController, state: CaptureState) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.state() != state {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {:?}, still {:?}",
                state,
                controller.state()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn drain_events(controller: &VoiceCaptureController) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Some(event) = controller.try_recv_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_silence_poll_stops_session() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        // No sound events at all: the poll should bring it back to Idle.
        wait_for_state(&fixture.controller, CaptureState::Idle);
    }

    #[test]
    fn test_audio_end_checks_silence_immediately() {
        // Poll far in the future so only the audio-end path can stop.
        let timings = CaptureTimings {
            silence_threshold: Duration::from_millis(50),
            silence_poll: Duration::from_secs(60),
            restart_debounce: Duration::from_millis(50),
        };
        let fixture = scripted(timings);
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        thread::sleep(Duration::from_millis(80));
        fixture.events.send(RecognizerEvent::AudioEnded).unwrap();
        wait_for_state(&fixture.controller, CaptureState::Idle);
    }

    #[test]
    fn test_sound_activity_keeps_session_alive() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        // Feed activity well inside the 120 ms threshold.
        for _ in 0..10 {
            fixture.events.send(RecognizerEvent::SoundDetected).unwrap();
            thread::sleep(Duration::from_millis(30));
            assert_eq!(fixture.controller.state(), CaptureState::Listening);
        }

        // Activity stops; the session should wind down on its own.
        wait_for_state(&fixture.controller, CaptureState::Idle);
    }

    #[test]
    fn test_network_errors_coalesce_into_one_restart() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 1);

        let network = || {
            RecognizerEvent::Error(RecognizerError::new(RecognizerErrorKind::Network, "drop"))
        };
        fixture.events.send(network()).unwrap();
        thread::sleep(Duration::from_millis(10));
        fixture.events.send(network()).unwrap();

        // Two errors inside the window, exactly one restart.
        let deadline = Instant::now() + Duration::from_secs(2);
        while fixture.starts.load(Ordering::SeqCst) < 2 {
            assert!(Instant::now() < deadline, "restart never happened");
            thread::sleep(Duration::from_millis(5));
        }
        wait_for_state(&fixture.controller, CaptureState::Listening);
        thread::sleep(Duration::from_millis(120));
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_cancels_pending_restart() {
        // Long debounce so the stop always lands inside the window.
        let timings = CaptureTimings {
            silence_threshold: Duration::from_millis(500),
            silence_poll: Duration::from_millis(10),
            restart_debounce: Duration::from_millis(300),
        };
        let fixture = scripted(timings);
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        fixture
            .events
            .send(RecognizerEvent::Error(RecognizerError::new(
                RecognizerErrorKind::Network,
                "drop",
            )))
            .unwrap();
        wait_for_state(&fixture.controller, CaptureState::Restarting);

        fixture.controller.stop();
        wait_for_state(&fixture.controller, CaptureState::Idle);

        // The debounce deadline must not resurrect the session.
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fixture.controller.state(), CaptureState::Idle);
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_restart_is_a_hard_stop() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        fixture.fail_starts.store(1, Ordering::SeqCst);
        fixture
            .events
            .send(RecognizerEvent::Error(RecognizerError::new(
                RecognizerErrorKind::Network,
                "drop",
            )))
            .unwrap();

        wait_for_state(&fixture.controller, CaptureState::Idle);
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_permission_denied_downgrades_to_unsupported() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        fixture
            .events
            .send(RecognizerEvent::Error(RecognizerError::new(
                RecognizerErrorKind::NotAllowed,
                "denied",
            )))
            .unwrap();
        wait_for_state(&fixture.controller, CaptureState::Unsupported);

        let events = drain_events(&fixture.controller);
        assert!(events.iter().any(
            |e| matches!(e, CaptureEvent::Notice(text) if text == MIC_DENIED_NOTICE)
        ));
    }

    #[test]
    fn test_natural_end_returns_to_idle() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        fixture.events.send(RecognizerEvent::Ended).unwrap();
        wait_for_state(&fixture.controller, CaptureState::Idle);
    }

    #[test]
    fn test_results_resnapshot_the_transcript() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);
        let _ = drain_events(&fixture.controller);

        fixture
            .events
            .send(RecognizerEvent::Result(vec![
                RecognitionSegment::from_text("i was flying"),
                RecognitionSegment::from_text("over water"),
            ]))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut transcript = None;
        while transcript.is_none() && Instant::now() < deadline {
            for event in drain_events(&fixture.controller) {
                if let CaptureEvent::TranscriptChanged(text) = event {
                    transcript = Some(text);
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(transcript.as_deref(), Some("i was flying over water"));
    }

    #[test]
    fn test_toggle_clears_transcript_and_starts() {
        let fixture = scripted(fast_timings());
        fixture.controller.toggle();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        let events = drain_events(&fixture.controller);
        assert!(events
            .iter()
            .any(|e| matches!(e, CaptureEvent::TranscriptChanged(text) if text.is_empty())));

        // Toggling again stops.
        fixture.controller.toggle();
        wait_for_state(&fixture.controller, CaptureState::Idle);
    }

    #[test]
    fn test_toggle_reinitializes_after_sync_start_failure() {
        let fixture = scripted(fast_timings());
        assert_eq!(fixture.factory_calls.load(Ordering::SeqCst), 1);

        // First start fails once; the rebuilt recognizer succeeds.
        fixture.fail_starts.store(1, Ordering::SeqCst);
        fixture.controller.toggle();
        wait_for_state(&fixture.controller, CaptureState::Listening);
        assert_eq!(fixture.factory_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_toggle_gives_up_after_retry_fails() {
        let fixture = scripted(fast_timings());

        fixture.fail_starts.store(2, Ordering::SeqCst);
        fixture.controller.toggle();
        wait_for_state(&fixture.controller, CaptureState::Unsupported);

        let events = drain_events(&fixture.controller);
        assert!(events.iter().any(
            |e| matches!(e, CaptureEvent::Notice(text) if text == UNAVAILABLE_NOTICE)
        ));
    }

    #[test]
    fn test_unsupported_toggle_reports_notice() {
        let controller = VoiceCaptureController::new(None, fast_timings());
        assert_eq!(controller.state(), CaptureState::Unsupported);

        controller.toggle();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if drain_events(&controller).iter().any(
                |e| matches!(e, CaptureEvent::Notice(text) if text == UNAVAILABLE_NOTICE),
            ) {
                break;
            }
            assert!(Instant::now() < deadline, "no notice arrived");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(controller.state(), CaptureState::Unsupported);
    }

    #[test]
    fn test_start_while_listening_is_a_no_op() {
        let fixture = scripted(fast_timings());
        fixture.controller.start();
        wait_for_state(&fixture.controller, CaptureState::Listening);

        fixture.controller.start();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 1);
    }
}
