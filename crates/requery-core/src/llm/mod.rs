//! LLM integration
//!
//! Provides traits and implementations for:
//! - Chat completions via external services (OpenAI, OpenRouter, vLLM, etc.)
//! - Model preset resolution (experiment names to provider model ids)
//! - Prompt templates with variable substitution

mod client;
mod prompts;

pub use client::{
    resolve_model, ChatMessage, CompletionClient, LlmSettings, OpenAiClient, Provider,
};
pub use prompts::{PromptBank, PromptMessage, PromptTemplate};
