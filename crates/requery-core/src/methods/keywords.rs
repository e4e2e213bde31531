//! Keyword-level expansion methods

use super::compose;
use super::{MethodParams, ReformulatedQuery, ReformulationMethod};
use crate::data::Query;
use crate::error::Result;
use crate::llm::{CompletionClient, PromptBank};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Keyword expansion through several independent completions of the same
/// prompt. The keyword sets are appended after the plain query with no
/// query repetition; diversity across calls is the signal, so they are not
/// deduplicated.
///
/// Expansion pattern: `q + K1 + K2 + ... + Kn`
pub struct GenQr {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl GenQr {
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
impl ReformulationMethod for GenQr {
    fn name(&self) -> &'static str {
        "genqr"
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let num_calls = self.params.num_calls.unwrap_or(5);

        let mut all_keywords = Vec::with_capacity(num_calls);
        for _ in 0..num_calls {
            let msgs = self.prompts.render("genqr", &[("query", &query.text)])?;
            all_keywords.push(self.llm.generate_one(&msgs).await?);
        }

        let keyword_text = all_keywords.join(" ");
        let reformulated = compose::clean(&format!("{} {}", query.text, keyword_text));

        let mut metadata = serde_json::Map::new();
        metadata.insert("keywords".to_string(), json!(all_keywords));

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}

/// Keyword expansion over ten paraphrased instructions (`genqr_ens_1` ...
/// `genqr_ens_10`), merged behind the repeated query.
pub struct GenQrEnsemble {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl GenQrEnsemble {
    pub const NUM_INSTRUCTIONS: usize = 10;

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
impl ReformulationMethod for GenQrEnsemble {
    fn name(&self) -> &'static str {
        "genqr_ensemble"
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let query_repeats = self.params.query_repeats.unwrap_or(5);

        let mut keyword_sets = Vec::with_capacity(Self::NUM_INSTRUCTIONS);
        for i in 1..=Self::NUM_INSTRUCTIONS {
            let prompt_id = format!("genqr_ens_{i}");
            let msgs = self.prompts.render(&prompt_id, &[("query", &query.text)])?;
            keyword_sets.push(self.llm.generate_one(&msgs).await?);
        }

        let keyword_text = keyword_sets.join(" ");
        let reformulated = compose::repeat(&query.text, &keyword_text, query_repeats);

        let mut metadata = serde_json::Map::new();
        metadata.insert("keyword_sets".to_string(), json!(keyword_sets));

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}

/// Single-call keyword expansion: map the query to related terms in one
/// completion, folded in behind the repeated query.
pub struct Query2Keyword {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl Query2Keyword {
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
impl ReformulationMethod for Query2Keyword {
    fn name(&self) -> &'static str {
        "q2k"
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let query_repeats = self.params.query_repeats.unwrap_or(5);

        let msgs = self.prompts.render("q2k", &[("query", &query.text)])?;
        let keywords = self.llm.generate_one(&msgs).await?;

        let reformulated = compose::repeat(&query.text, &keywords, query_repeats);

        let mut metadata = serde_json::Map::new();
        metadata.insert("keywords".to_string(), json!(keywords));

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}
