//! OpenAI HTTP client module.
//!
//! Thin async client over the Assistants v2, Chat Completions and Images
//! endpoints; responses are passed through as raw JSON.

mod client;
mod error;

pub use client::OpenAiClient;
pub use error::{OpenAiError, OpenAiResult};
