pub mod orchestrator;

pub use orchestrator::{Orchestrator, INTERPRETER_APOLOGY, UNREADABLE_REPLY};
