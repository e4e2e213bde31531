//! Pseudo-document generation methods

use super::compose;
use super::{MethodParams, ReformulatedQuery, ReformulationMethod};
use crate::data::Query;
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionClient, PromptBank};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Prompting variant for pseudo-document generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query2DocVariant {
    ZeroShot,
    FewShot,
    ChainOfThought,
}

impl Query2DocVariant {
    /// Registry name, which doubles as the prompt id
    pub fn name(self) -> &'static str {
        match self {
            Self::ZeroShot => "q2d_zs",
            Self::FewShot => "q2d_fs",
            Self::ChainOfThought => "q2d_cot",
        }
    }
}

/// Generate an answer-style pseudo-document and weight it against the
/// repeated query. The few-shot variant injects in-context examples into
/// its prompt; the variants otherwise differ only by prompt id.
///
/// Expansion pattern: `(q x 5) + P`
pub struct Query2Doc {
    variant: Query2DocVariant,
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl Query2Doc {
    pub fn new(
        variant: Query2DocVariant,
        llm: Arc<dyn CompletionClient>,
        prompts: Arc<PromptBank>,
        params: MethodParams,
    ) -> Self {
        Self {
            variant,
            llm,
            prompts,
            params,
        }
    }

    fn build_messages(&self, query: &Query) -> Result<Vec<ChatMessage>> {
        let prompt_id = self.variant.name();
        match self.variant {
            Query2DocVariant::FewShot => {
                let examples = self.params.examples.as_deref().unwrap_or("");
                self.prompts
                    .render(prompt_id, &[("query", &query.text), ("examples", examples)])
            }
            _ => self.prompts.render(prompt_id, &[("query", &query.text)]),
        }
    }
}

#[async_trait]
impl ReformulationMethod for Query2Doc {
    fn name(&self) -> &'static str {
        self.variant.name()
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let query_repeats = self.params.query_repeats.unwrap_or(5);

        let msgs = self.build_messages(query)?;
        let passage = self.llm.generate_one(&msgs).await?;
        let reformulated = compose::repeat(&query.text, &passage, query_repeats);

        let mut metadata = serde_json::Map::new();
        metadata.insert("pseudo_document".to_string(), json!(passage));

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}

/// Consolidate several independent pseudo-documents, repeating the query
/// adaptively so long generations do not drown it out.
pub struct Mugi {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl Mugi {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        prompts: Arc<PromptBank>,
        params: MethodParams,
    ) -> Self {
        Self {
            llm,
            prompts,
            params,
        }
    }
}

#[async_trait]
impl ReformulationMethod for Mugi {
    fn name(&self) -> &'static str {
        "mugi"
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let num_docs = self.params.num_docs.unwrap_or(5);
        let adaptive_ratio = self.params.adaptive_ratio.unwrap_or(5);

        let mut pseudo_docs = Vec::with_capacity(num_docs);
        for _ in 0..num_docs {
            let msgs = self.prompts.render("mugi", &[("query", &query.text)])?;
            pseudo_docs.push(self.llm.generate_one(&msgs).await?);
        }

        let generated = pseudo_docs.join(" ");
        let reformulated = compose::adaptive(&query.text, &generated, adaptive_ratio);

        let mut metadata = serde_json::Map::new();
        metadata.insert("pseudo_docs".to_string(), json!(pseudo_docs));

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}
