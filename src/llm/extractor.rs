//! LLM-backed structured data extraction
//!
//! Given an extraction query and the current UI state, asks the model to
//! pull the requested information out of the state's text content. Vision
//! extraction over raw screenshots is deliberately not wired; text is the
//! single extraction path.

use serde_json::Value;

use crate::core::{KinesisError, Result, ScreenState};
use crate::llm::traits::Translator;

/// Extract structured data matching `query` from the state's text content
///
/// Pixel states contribute their OCR text; structural states contribute a
/// rendering of url, title and harvested elements. A state with nothing
/// readable is an error, not a model call.
pub async fn extract_data(
    translator: &dyn Translator,
    query: &str,
    state: &ScreenState,
) -> Result<Value> {
    let content = state
        .text_content()
        .ok_or_else(|| KinesisError::translation("no text content available for extraction"))?;

    translator.extract(query, &content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedTranslator;

    #[async_trait]
    impl Translator for CannedTranslator {
        async fn translate(&self, _command: &str, _state: &ScreenState) -> Result<Value> {
            unreachable!("extraction never translates commands")
        }

        async fn extract(&self, _query: &str, content: &str) -> Result<Value> {
            Ok(json!({ "seen": content.contains("Log In") }))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_extract_uses_ocr_text() {
        let state = ScreenState::pixel("Welcome! Log In here", None);
        let out = extract_data(&CannedTranslator, "login text", &state)
            .await
            .unwrap();
        assert_eq!(out["seen"], true);
    }

    #[tokio::test]
    async fn test_extract_renders_structural_elements() {
        use crate::core::ElementDescriptor;
        let state = ScreenState::structural(
            "https://example.com",
            "Example",
            vec![ElementDescriptor::new("button").with_attr("text", "Log In")],
        );
        let out = extract_data(&CannedTranslator, "login text", &state)
            .await
            .unwrap();
        assert_eq!(out["seen"], true);
    }

    #[tokio::test]
    async fn test_extract_without_content_is_an_error() {
        let state = ScreenState::structural("https://example.com", "Example", vec![]);
        let err = extract_data(&CannedTranslator, "anything", &state)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no text content"));
    }
}
