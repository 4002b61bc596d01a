//! LLM module - the translation boundary
//!
//! Abstracts the external language model behind the [`Translator`] trait;
//! the Groq client is the primary implementation.

pub mod extractor;
pub mod groq;
pub mod traits;

pub use extractor::extract_data;
pub use groq::GroqTranslator;
pub use traits::Translator;
