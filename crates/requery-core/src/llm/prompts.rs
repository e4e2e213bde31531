//! Prompt bank: loads and renders chat templates from a JSON file
//!
//! The prompts file is a JSON object keyed by prompt id. Each entry carries
//! a `messages` list (OpenAI-style roles) whose contents may hold
//! `{variable}` placeholders.

use crate::error::{RequeryError, Result};
use crate::llm::ChatMessage;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// Prompt templates keyed by id, with `{variable}` substitution
pub struct PromptBank {
    bank: HashMap<String, PromptTemplate>,
}

impl PromptBank {
    /// Load a prompt bank from a JSON file keyed by prompt id
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let bank = serde_json::from_str(&content)?;
        Ok(Self { bank })
    }

    /// Build a bank from an in-memory JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let bank = serde_json::from_value(value)?;
        Ok(Self { bank })
    }

    /// Whether the bank contains `prompt_id`
    pub fn has(&self, prompt_id: &str) -> bool {
        self.bank.contains_key(prompt_id)
    }

    /// Render a template into a chat message list, substituting every
    /// `{name}` placeholder named in `vars`. Unknown placeholders are left
    /// in place.
    pub fn render(&self, prompt_id: &str, vars: &[(&str, &str)]) -> Result<Vec<ChatMessage>> {
        let entry = self
            .bank
            .get(prompt_id)
            .ok_or_else(|| RequeryError::PromptNotFound(prompt_id.to_string()))?;

        Ok(entry
            .messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.clone(),
                content: substitute(&msg.content, vars),
            })
            .collect())
    }

    /// All available prompt ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.bank.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
