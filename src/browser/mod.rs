//! Structural (DOM-aware) automation backend
//!
//! Elements are addressable by CSS selector; the engine trait keeps the
//! browser dependency behind a narrow contract.

pub mod controller;
pub mod engine;

pub use controller::BrowserController;
pub use engine::{AgentBrowserEngine, BrowserEngine};
