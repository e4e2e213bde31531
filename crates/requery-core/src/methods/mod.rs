//! Query reformulation methods
//!
//! Each method turns one benchmark query into an expanded query string via
//! one or more LLM completion calls, optionally grounded in retrieved
//! passages. Methods share a small set of composition primitives and are
//! built by registry name, so experiment code treats them uniformly.

pub mod compose;
mod grounded;
mod keywords;
mod parsing;
mod pseudo_docs;
mod qa_expand;

pub use grounded::{Csqe, Lamer};
pub use keywords::{GenQr, GenQrEnsemble, Query2Keyword};
pub use parsing::{keyed_values, kept_indices, KeptIndices, KeyedValues, ParseSource};
pub use pseudo_docs::{Mugi, Query2Doc, Query2DocVariant};
pub use qa_expand::QaExpand;

use crate::data::Query;
use crate::error::{RequeryError, Result};
use crate::llm::{CompletionClient, PromptBank};
use crate::retrieval::ContextMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output of one reformulation call
#[derive(Debug, Clone, Serialize)]
pub struct ReformulatedQuery {
    pub qid: String,
    pub original: String,
    pub reformulated: String,
    /// Method-specific artifacts (raw generations, kept indices, ...),
    /// recorded in insertion order for auditing
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Per-method hyper-parameters from the experiment config
///
/// One instance is built per (LLM, method) pair and never mutated. Methods
/// carrying the `dataset` field are rebuilt once per dataset instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MethodParams {
    /// Independent completion calls (genqr)
    pub num_calls: Option<usize>,
    /// Query repetitions for `repeat` composition
    pub query_repeats: Option<usize>,
    /// Pseudo-documents generated (mugi)
    pub num_docs: Option<usize>,
    /// Ratio for `adaptive` composition (mugi)
    pub adaptive_ratio: Option<usize>,
    /// Sub-questions per query (qa_expand)
    pub num_subquestions: Option<usize>,
    /// Completions per expansion track (csqe)
    pub n_expansions: Option<usize>,
    /// Retrieved passages rendered into grounded prompts (csqe, lamer)
    pub context_k: Option<usize>,
    /// Generated passages (lamer)
    pub num_passages: Option<usize>,
    /// In-context examples text (q2d_fs)
    pub examples: Option<String>,
    /// Dataset tag for dataset-specific prompt selection (lamer). Setting
    /// this opts the method into per-dataset reconstruction.
    pub dataset: Option<String>,
}

impl MethodParams {
    /// Copy with the dataset tag replaced
    pub fn with_dataset(mut self, dataset: &str) -> Self {
        self.dataset = Some(dataset.to_string());
        self
    }

    /// Whether the method must be rebuilt for each dataset
    pub fn dataset_sensitive(&self) -> bool {
        self.dataset.is_some()
    }
}

/// A query reformulation method
///
/// Implementations hold their client, prompt bank and parameters, and stay
/// stateless across calls.
#[async_trait]
pub trait ReformulationMethod: Send + Sync {
    /// Registry name of this method
    fn name(&self) -> &'static str;

    /// Whether the caller must supply retrieved contexts
    fn requires_contexts(&self) -> bool {
        false
    }

    /// Reformulate a single query
    async fn reformulate(&self, query: &Query, contexts: &[String]) -> Result<ReformulatedQuery>;
}

/// All registered method names
pub const METHOD_NAMES: &[&str] = &[
    "genqr",
    "genqr_ensemble",
    "q2k",
    "q2d_zs",
    "q2d_fs",
    "q2d_cot",
    "qa_expand",
    "mugi",
    "csqe",
    "lamer",
];

/// Fail fast on unknown method names
pub fn validate_name(name: &str) -> Result<()> {
    if METHOD_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(RequeryError::UnknownMethod {
            name: name.to_string(),
            available: METHOD_NAMES.to_vec(),
        })
    }
}

/// Build a method by registry name
pub fn build_method(
    name: &str,
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
) -> Result<Box<dyn ReformulationMethod>> {
    match name {
        "genqr" => Ok(Box::new(GenQr::new(llm, prompts, params))),
        "genqr_ensemble" => Ok(Box::new(GenQrEnsemble::new(llm, prompts, params))),
        "q2k" => Ok(Box::new(Query2Keyword::new(llm, prompts, params))),
        "q2d_zs" => Ok(Box::new(Query2Doc::new(
            Query2DocVariant::ZeroShot,
            llm,
            prompts,
            params,
        ))),
        "q2d_fs" => Ok(Box::new(Query2Doc::new(
            Query2DocVariant::FewShot,
            llm,
            prompts,
            params,
        ))),
        "q2d_cot" => Ok(Box::new(Query2Doc::new(
            Query2DocVariant::ChainOfThought,
            llm,
            prompts,
            params,
        ))),
        "qa_expand" => Ok(Box::new(QaExpand::new(llm, prompts, params))),
        "mugi" => Ok(Box::new(Mugi::new(llm, prompts, params))),
        "csqe" => Ok(Box::new(Csqe::new(llm, prompts, params))),
        "lamer" => Ok(Box::new(Lamer::new(llm, prompts, params))),
        _ => Err(RequeryError::UnknownMethod {
            name: name.to_string(),
            available: METHOD_NAMES.to_vec(),
        }),
    }
}

/// Apply one method to an ordered query list.
///
/// Produces one output per input, in input order. Contexts are looked up by
/// qid and default to empty. A per-query failure aborts the whole batch;
/// isolating failures between experiment cells is the pipeline's job.
pub async fn reformulate_batch<F>(
    method: &dyn ReformulationMethod,
    queries: &[Query],
    ctx_map: Option<&ContextMap>,
    mut progress_callback: Option<F>,
) -> Result<Vec<ReformulatedQuery>>
where
    F: FnMut(usize, usize),
{
    let total = queries.len();
    let mut results = Vec::with_capacity(total);
    for (i, query) in queries.iter().enumerate() {
        let contexts = ctx_map
            .and_then(|m| m.get(&query.qid))
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        results.push(method.reformulate(query, contexts).await?);
        if let Some(ref mut callback) = progress_callback {
            callback(i + 1, total);
        }
    }
    Ok(results)
}
