//! Answer generation: prompt assembly plus the text-generation seam.
pub mod gemini;
pub mod prompt;

use thiserror::Error;

pub use prompt::{PromptBuilder, format_snippet};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("generation request failed: {0}")]
    RequestFailed(String),

    #[error("generation service returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("generation returned no text")]
    EmptyAnswer,
}

/// Turns a finished prompt into answer text.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
