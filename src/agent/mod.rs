//! Agent module - session lifecycle and command orchestration

pub mod interaction;

pub use interaction::InteractionAgent;
