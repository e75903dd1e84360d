pub mod audio;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod messages;
pub mod session;
pub mod speech;
pub mod ui;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ReverieError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Chat request error: {0}")]
    ChatRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<std::io::Error> for ReverieError {
    fn from(e: std::io::Error) -> Self {
        ReverieError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReverieError>;
