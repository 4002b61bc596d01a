//! Translator trait for abstracting the external language model
//!
//! The model is an untrusted collaborator: implementations return the raw
//! response JSON and the translation boundary re-validates everything.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Result, ScreenState};

/// Trait for command translation providers
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a natural-language command against the current UI state
    ///
    /// Returns the raw `{action, parameters}` response object. The state is
    /// size-bounded by the implementation before serialization; the caller
    /// owns the ceiling timeout and the validation of the returned value.
    async fn translate(&self, command: &str, state: &ScreenState) -> Result<Value>;

    /// Extract structured data matching `query` from page text content
    ///
    /// Returns whatever JSON object the model produced; an empty object
    /// means the information was not found.
    async fn extract(&self, query: &str, content: &str) -> Result<Value>;

    /// Provider name for diagnostics
    fn name(&self) -> &str;
}
