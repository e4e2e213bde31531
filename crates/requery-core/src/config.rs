//! Experiment configuration loaded from YAML
//!
//! One file describes a whole experiment grid: the completion service
//! settings, per-method hyper-parameters, the dataset and retriever lists,
//! and the filesystem layout. CLI flags override individual fields.

use crate::error::Result;
use crate::methods::MethodParams;
use crate::llm::LlmSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level experiment configuration (`configs/default.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Completion service settings shared by all methods
    pub llm: LlmSettings,

    /// Models to sweep in grid runs; empty means just `llm.model`
    pub llms: Vec<String>,

    /// Method name → hyper-parameters. Grid runs iterate these keys.
    pub methods: BTreeMap<String, MethodParams>,

    /// Datasets to run; empty means every registered dataset
    pub datasets: Vec<String>,

    /// Retrievers to run; empty means every registered retriever
    pub retrievers: Vec<String>,

    pub paths: PathsConfig,
    pub retrieval: RetrievalConfig,
    pub context_retrieval: ContextRetrievalConfig,
}

/// Filesystem layout for inputs and artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for reformulated queries, run files and reports
    pub output: PathBuf,
    /// Prompt bank JSON
    pub prompts: PathBuf,
    /// Directory holding `{dataset}.tsv` query files
    pub queries: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("outputs"),
            prompts: PathBuf::from("prompts/prompts.json"),
            queries: PathBuf::from("data/queries"),
        }
    }
}

/// Full-retrieval parameters passed to the retrieval collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub hits: usize,
    pub threads: usize,
    pub batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hits: 1000,
            threads: 16,
            batch_size: 512,
        }
    }
}

/// Context-retrieval parameters for corpus-grounded methods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRetrievalConfig {
    pub retriever: String,
    pub k: usize,
    pub threads: usize,
}

impl Default for ContextRetrievalConfig {
    fn default() -> Self {
        Self {
            retriever: "bm25".to_string(),
            k: 10,
            threads: 16,
        }
    }
}

impl ExperimentConfig {
    /// Load a config from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Hyper-parameters for `method`, defaulting when unconfigured
    pub fn method_params(&self, method: &str) -> MethodParams {
        self.methods.get(method).cloned().unwrap_or_default()
    }

    /// Models to sweep: the `llms` list, or the single configured model
    pub fn grid_llms(&self) -> Vec<String> {
        if self.llms.is_empty() {
            vec![self.llm.model.clone()]
        } else {
            self.llms.clone()
        }
    }

    /// Datasets to run, defaulting to every registered dataset
    pub fn grid_datasets(&self) -> Vec<String> {
        if self.datasets.is_empty() {
            crate::datasets::dataset_names()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.datasets.clone()
        }
    }

    /// Retrievers to run, defaulting to every registered retriever
    pub fn grid_retrievers(&self) -> Vec<String> {
        if self.retrievers.is_empty() {
            crate::retrieval::retriever_names()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.retrievers.clone()
        }
    }

    /// Methods to run: the configured method keys, sorted by name.
    /// Cell outputs are keyed by file path, so run order never affects
    /// results; sorted order keeps logs stable across runs.
    pub fn grid_methods(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }
}
