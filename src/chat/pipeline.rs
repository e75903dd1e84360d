//! Channel-based worker around the interpretation client.
//!
//! The UI thread never blocks on the network: commands go in, events
//! come out, and the worker owns its own tokio runtime.

use crate::chat::client::{InterpretRequest, InterpretResponse, InterpreterClient};
use crate::config::ChatConfig;
use crate::messages::ConversationMessage;
use crate::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use tokio::runtime::Runtime;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Request an interpretation of the latest message.
    Interpret {
        message: String,
        conversation: Vec<ConversationMessage>,
        request_id: Uuid,
    },

    /// Shut down the worker.
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The service answered.
    Completed {
        request_id: Uuid,
        reply: InterpretResponse,
    },

    /// Transport or protocol failure.
    Failed { request_id: Uuid, error: String },

    /// The worker has shut down.
    Shutdown,
}

pub struct ChatPipeline {
    config: ChatConfig,
    command_tx: Sender<ChatCommand>,
    command_rx: Receiver<ChatCommand>,
    event_tx: Sender<ChatEvent>,
    event_rx: Receiver<ChatEvent>,
}

impl ChatPipeline {
    pub fn new(config: ChatConfig) -> Self {
        let (command_tx, command_rx) = bounded(16);
        let (event_tx, event_rx) = bounded(16);

        Self {
            config,
            command_tx,
            command_rx,
            event_tx,
            event_rx,
        }
    }

    pub fn command_sender(&self) -> Sender<ChatCommand> {
        self.command_tx.clone()
    }

    pub fn event_receiver(&self) -> Receiver<ChatEvent> {
        self.event_rx.clone()
    }

    /// Spawn the worker thread. Consumes the pipeline; keep the channel
    /// handles obtained beforehand.
    pub fn start_worker(self) -> Result<()> {
        let config = self.config.clone();
        let command_rx = self.command_rx.clone();
        let event_tx = self.event_tx.clone();

        std::thread::spawn(move || {
            info!("Chat pipeline worker starting");

            let runtime = match Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime: {e}");
                    let _ = event_tx.send(ChatEvent::Shutdown);
                    return;
                }
            };

            let client = match InterpreterClient::new(&config) {
                Ok(client) => client,
                Err(e) => {
                    error!("Failed to create interpreter client: {e}");
                    let _ = event_tx.send(ChatEvent::Shutdown);
                    return;
                }
            };

            loop {
                match command_rx.recv() {
                    Ok(ChatCommand::Interpret {
                        message,
                        conversation,
                        request_id,
                    }) => {
                        let request = InterpretRequest {
                            message,
                            conversation,
                        };
                        let event = match runtime.block_on(client.interpret(&request)) {
                            Ok(reply) => ChatEvent::Completed { request_id, reply },
                            Err(e) => ChatEvent::Failed {
                                request_id,
                                error: e.to_string(),
                            },
                        };
                        let _ = event_tx.send(event);
                    }
                    Ok(ChatCommand::Shutdown) | Err(_) => {
                        let _ = event_tx.send(ChatEvent::Shutdown);
                        break;
                    }
                }
            }

            info!("Chat pipeline worker stopped");
        });

        Ok(())
    }
}
