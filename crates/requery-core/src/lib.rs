//! Requery Core Library
//!
//! LLM-based query reformulation for retrieval research: given a benchmark
//! query, produce an expanded query string that improves downstream
//! retrieval effectiveness.
//!
//! # Features
//! - Ten reformulation methods (keyword expansion, pseudo-documents,
//!   sub-question QA, corpus-grounded rewriting) behind one trait
//! - OpenAI-compatible completion client with model presets and retry
//! - Pyserini retrieval and trec_eval adapters for TREC DL and BEIR
//! - Cache-aware experiment pipeline over the {LLM × method × dataset ×
//!   retriever} grid with per-cell failure isolation

pub mod config;
pub mod data;
pub mod datasets;
pub mod error;
pub mod eval;
pub mod llm;
pub mod methods;
pub mod pipeline;
pub mod retrieval;

pub use config::ExperimentConfig;
pub use data::{load_queries_tsv, save_reformulated_tsv, Query};
pub use datasets::{dataset, dataset_names, DatasetGroup, DatasetSpec, DATASETS};
pub use error::{Error, RequeryError, Result};
pub use eval::{
    evaluate_all, write_eval_report, write_grid_report, EvalBackend, EvalResults, GridResults,
    MetricsRecord, TrecEval,
};
pub use llm::{ChatMessage, CompletionClient, LlmSettings, OpenAiClient, PromptBank};
pub use methods::{
    build_method, reformulate_batch, validate_name, MethodParams, ReformulatedQuery,
    ReformulationMethod, METHOD_NAMES,
};
pub use pipeline::Pipeline;
pub use retrieval::{
    gather_contexts, retriever, retriever_names, ContextMap, PyseriniSearch, RetrievalRequest,
    SearchBackend,
};
