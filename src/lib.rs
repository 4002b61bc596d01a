//! Kinesis - Natural-Language UI Automation
//!
//! Translates a natural-language command into a single UI action and executes
//! it against either a DOM-aware browser or a pixel-level OS automation
//! surface, using an external language model as the command interpreter.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Translation boundary over an OpenAI-compatible endpoint
//! - **Browser**: Structural backend (CSS-selector addressing)
//! - **OS**: Pixel backend (template matching + synthesized input)
//! - **Agent**: Session lifecycle and per-command orchestration
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use kinesis::{Config, InteractionAgent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut agent = InteractionAgent::new(Config::load()).unwrap();
//!     agent.setup("https://example.com").await.unwrap();
//!
//!     let result = agent.interact("Click the login button").await;
//!     println!("{:?}", result);
//!
//!     agent.close().await.unwrap();
//! }
//! ```

pub mod agent;
pub mod browser;
pub mod cli;
pub mod core;
pub mod llm;
pub mod os;

// Re-export commonly used items
pub use agent::InteractionAgent;
pub use cli::Repl;
pub use core::{
    ActionPlan, BackendMode, Config, ExecutionResult, KinesisError, Result, ScreenState,
};
