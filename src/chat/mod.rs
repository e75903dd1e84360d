pub mod client;
pub mod pipeline;

pub use client::{InterpretRequest, InterpretResponse, InterpreterClient};
pub use pipeline::{ChatCommand, ChatEvent, ChatPipeline};
