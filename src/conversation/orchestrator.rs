//! Conversation orchestration.
//!
//! Turns the pending-input buffer into a persisted user message, issues
//! exactly one interpretation request per submission, and reconciles the
//! asynchronous outcome into exactly one assistant message. Failures are
//! absorbed into the conversation so a turn never dangles.

use crate::chat::{ChatCommand, ChatEvent};
use crate::messages::{Message, MessageStorage};
use crate::session::SessionStore;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};
use uuid::Uuid;

/// Fixed reply when the request itself fails.
pub const INTERPRETER_APOLOGY: &str =
    "Sorry, I couldn't reach the dream interpreter just now. Please try again in a moment.";

/// Fixed reply when the service answers without any text.
pub const UNREADABLE_REPLY: &str =
    "Sorry, I couldn't make sense of the interpreter's reply. Please try again.";

pub struct Orchestrator {
    messages: MessageStorage,
    store: SessionStore,
    chat_tx: Sender<ChatCommand>,
    chat_rx: Receiver<ChatEvent>,
    pending_input: String,
    in_flight: Option<Uuid>,
}

impl Orchestrator {
    pub fn new(store: SessionStore, chat_tx: Sender<ChatCommand>, chat_rx: Receiver<ChatEvent>) -> Self {
        Self {
            messages: MessageStorage::new(),
            store,
            chat_tx,
            chat_rx,
            pending_input: String::new(),
            in_flight: None,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.get_all()
    }

    pub fn input(&self) -> &str {
        &self.pending_input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.pending_input
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Submit the pending input. No-op on blank input or while a prior
    /// request is outstanding. Returns whether a request was issued.
    pub fn submit(&mut self) -> bool {
        let text = self.pending_input.trim().to_string();
        if text.is_empty() || self.in_flight.is_some() {
            return false;
        }

        self.messages.append(Message::user(text.clone()));
        self.persist();
        self.pending_input.clear();

        let request_id = Uuid::new_v4();
        let command = ChatCommand::Interpret {
            message: text,
            conversation: self.messages.project(),
            request_id,
        };
        self.in_flight = Some(request_id);

        if self.chat_tx.send(command).is_err() {
            // The worker is gone; no reply will ever arrive. Balance the
            // turn immediately instead of leaving the flag dangling.
            warn!("Chat pipeline unavailable, absorbing failure");
            self.messages.append(Message::assistant(INTERPRETER_APOLOGY, None));
            self.persist();
            self.in_flight = None;
        }

        true
    }

    /// Reconcile any completed chat work into the message sequence.
    pub fn poll(&mut self) {
        while let Ok(event) = self.chat_rx.try_recv() {
            match event {
                ChatEvent::Completed { request_id, reply } => {
                    if self.in_flight != Some(request_id) {
                        warn!("Dropping reply for unknown request {request_id}");
                        continue;
                    }
                    let content = reply
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| UNREADABLE_REPLY.to_string());
                    self.messages.append(Message::assistant(content, reply.id));
                    self.persist();
                    self.in_flight = None;
                }
                ChatEvent::Failed { request_id, error } => {
                    if self.in_flight != Some(request_id) {
                        warn!("Dropping failure for unknown request {request_id}");
                        continue;
                    }
                    warn!("Interpretation request failed: {error}");
                    self.messages.append(Message::assistant(INTERPRETER_APOLOGY, None));
                    self.persist();
                    self.in_flight = None;
                }
                ChatEvent::Shutdown => debug!("Chat pipeline shut down"),
            }
        }
    }

    /// Clear the conversation, its persisted mirror, and the pending
    /// input. The caller stops voice capture in the same action.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending_input.clear();
        // Invalidate any outstanding request so a stale reply cannot
        // append to the fresh conversation.
        self.in_flight = None;
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session store: {e}");
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.messages.get_all()) {
            warn!("Failed to persist conversation: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::InterpretResponse;
    use crate::messages::{Role, Sender as MessageSender};
    use crossbeam_channel::bounded;

    struct Harness {
        orchestrator: Orchestrator,
        commands: Receiver<ChatCommand>,
        events: Sender<ChatEvent>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("conversation.json")).unwrap();
        let (chat_tx, commands) = bounded(16);
        let (events, chat_rx) = bounded(16);

        Harness {
            orchestrator: Orchestrator::new(store, chat_tx, chat_rx),
            commands,
            events,
            _dir: dir,
        }
    }

    fn in_flight_id(orchestrator: &Orchestrator) -> Uuid {
        orchestrator.in_flight.expect("a request should be in flight")
    }

    #[test]
    fn test_submit_appends_and_issues_one_request() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("I was flying");
        assert!(h.orchestrator.submit());

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, MessageSender::User);
        assert_eq!(messages[0].content, "I was flying");
        assert!(h.orchestrator.input().is_empty());
        assert!(h.orchestrator.is_in_flight());

        let command = h.commands.try_recv().unwrap();
        match command {
            ChatCommand::Interpret {
                message,
                conversation,
                ..
            } => {
                assert_eq!(message, "I was flying");
                // History includes the just-appended user message.
                assert_eq!(conversation.len(), 1);
                assert_eq!(conversation[0].role, Role::User);
                assert!(conversation[0].id.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(h.commands.try_recv().is_err(), "exactly one request");
    }

    #[test]
    fn test_blank_input_is_a_no_op() {
        let mut h = harness();
        assert!(!h.orchestrator.submit());

        h.orchestrator.input_mut().push_str("   \n  ");
        assert!(!h.orchestrator.submit());

        assert!(h.orchestrator.messages().is_empty());
        assert!(h.commands.try_recv().is_err());
    }

    #[test]
    fn test_in_flight_guard_blocks_resubmission() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("first");
        assert!(h.orchestrator.submit());

        h.orchestrator.input_mut().push_str("second");
        assert!(!h.orchestrator.submit());
        assert_eq!(h.orchestrator.messages().len(), 1);
        assert_eq!(h.orchestrator.input(), "second");

        // Once the reply lands, submission works again.
        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse {
                    id: None,
                    message: Some("ok".into()),
                },
            })
            .unwrap();
        h.orchestrator.poll();
        assert!(!h.orchestrator.is_in_flight());
        assert!(h.orchestrator.submit());
    }

    #[test]
    fn test_success_reconciliation_uses_server_id_and_text() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("I was flying");
        h.orchestrator.submit();

        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse {
                    id: Some("a1".into()),
                    message: Some("Flying often symbolizes freedom.".into()),
                },
            })
            .unwrap();
        h.orchestrator.poll();

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, MessageSender::Assistant);
        assert_eq!(messages[1].id, "a1");
        assert_eq!(messages[1].content, "Flying often symbolizes freedom.");
        assert!(!h.orchestrator.is_in_flight());
    }

    #[test]
    fn test_empty_reply_falls_back_to_notice() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("a dream");
        h.orchestrator.submit();

        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse::default(),
            })
            .unwrap();
        h.orchestrator.poll();

        let messages = h.orchestrator.messages();
        assert_eq!(messages[1].content, UNREADABLE_REPLY);
        assert!(!messages[1].id.is_empty());
    }

    #[test]
    fn test_failure_is_absorbed_as_apology() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("a dream");
        h.orchestrator.submit();

        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Failed {
                request_id: id,
                error: "connection refused".into(),
            })
            .unwrap();
        h.orchestrator.poll();

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, MessageSender::Assistant);
        assert_eq!(messages[1].content, INTERPRETER_APOLOGY);
        assert!(!h.orchestrator.is_in_flight());
    }

    #[test]
    fn test_turns_stay_balanced_across_outcomes() {
        let mut h = harness();

        for round in 0..3 {
            h.orchestrator.input_mut().push_str("dream entry");
            assert!(h.orchestrator.submit());
            let id = in_flight_id(&h.orchestrator);

            // Alternate success and failure.
            let event = if round % 2 == 0 {
                ChatEvent::Completed {
                    request_id: id,
                    reply: InterpretResponse {
                        id: None,
                        message: Some("an interpretation".into()),
                    },
                }
            } else {
                ChatEvent::Failed {
                    request_id: id,
                    error: "boom".into(),
                }
            };
            h.events.send(event).unwrap();
            h.orchestrator.poll();
        }

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 {
                MessageSender::User
            } else {
                MessageSender::Assistant
            };
            assert_eq!(message.sender, expected);
        }
    }

    #[test]
    fn test_persisted_mirror_tracks_sequence() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("I was falling");
        h.orchestrator.submit();

        let stored = h.orchestrator.store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "I was falling");

        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse {
                    id: Some("a1".into()),
                    message: Some("Loss of control, perhaps.".into()),
                },
            })
            .unwrap();
        h.orchestrator.poll();

        let stored = h.orchestrator.store.load().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].id, "a1");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("a dream");
        h.orchestrator.submit();
        let id = in_flight_id(&h.orchestrator);
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse {
                    id: None,
                    message: Some("meaning".into()),
                },
            })
            .unwrap();
        h.orchestrator.poll();

        h.orchestrator.input_mut().push_str("half-typed");
        h.orchestrator.reset();

        assert!(h.orchestrator.messages().is_empty());
        assert!(h.orchestrator.input().is_empty());
        assert!(h.orchestrator.store.load().unwrap().is_empty());
    }

    #[test]
    fn test_reset_while_in_flight_drops_the_stale_reply() {
        let mut h = harness();
        h.orchestrator.input_mut().push_str("a dream");
        h.orchestrator.submit();
        let id = in_flight_id(&h.orchestrator);

        h.orchestrator.reset();
        assert!(!h.orchestrator.is_in_flight());

        // The old reply arrives after the reset; it must not resurface.
        h.events
            .send(ChatEvent::Completed {
                request_id: id,
                reply: InterpretResponse {
                    id: None,
                    message: Some("late interpretation".into()),
                },
            })
            .unwrap();
        h.orchestrator.poll();

        assert!(h.orchestrator.messages().is_empty());
        assert!(h.orchestrator.store.load().unwrap().is_empty());

        // New submissions are not blocked by the stale request.
        h.orchestrator.input_mut().push_str("a new dream");
        assert!(h.orchestrator.submit());
    }

    #[test]
    fn test_dead_pipeline_still_balances_the_turn() {
        let mut h = harness();
        drop(h.commands);

        h.orchestrator.input_mut().push_str("a dream");
        assert!(h.orchestrator.submit());

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, INTERPRETER_APOLOGY);
        assert!(!h.orchestrator.is_in_flight());
    }
}
