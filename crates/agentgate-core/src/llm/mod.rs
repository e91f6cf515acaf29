//! Language-model collaborator
//!
//! The orchestrator only sees the [`ChatModel`] trait; [`OpenAiClient`] is the
//! HTTP implementation for OpenAI-compatible endpoints.

mod client;
mod types;

pub use client::{ChatModel, OpenAiClient};
pub use types::{ChatCompletion, Choice, CompletionRequest, Usage};

#[cfg(test)]
pub use client::MockChatModel;
