//! Benchmark dataset registry (TREC Deep Learning and BEIR)
//!
//! Each entry carries the Pyserini topic/qrels identifiers and prebuilt
//! index names for every supported retriever, so experiment code only ever
//! refers to datasets by their short name.

use crate::error::{RequeryError, Result};

/// Benchmark family a dataset belongs to. Dense retrieval treats the two
/// groups differently on the query side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetGroup {
    Trec,
    Beir,
}

/// Static metadata for one benchmark dataset.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: &'static str,
    /// Pyserini topics identifier.
    pub topics: &'static str,
    /// Pyserini qrels identifier; `None` when the caller must supply a path.
    pub qrels: Option<&'static str>,
    pub index_bm25: &'static str,
    pub index_splade: &'static str,
    pub index_bge: &'static str,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    /// Metrics reported for this dataset (config-style names).
    pub metrics: &'static [&'static str],
    /// Judgment pool depth used when the runs were built.
    pub eval_depth: usize,
    /// Extra trec_eval arguments.
    pub trec_args: &'static [&'static str],
    pub group: DatasetGroup,
}

const TREC_METRICS: &[&str] = &["ndcg_cut_10", "recall_1000"];
const BEIR_METRICS: &[&str] = &["ndcg_cut_10", "recall_100"];

/// All registered benchmark datasets.
pub const DATASETS: &[DatasetSpec] = &[
    // TREC Deep Learning (MS MARCO V1 passage)
    DatasetSpec {
        name: "dl19",
        topics: "dl19-passage",
        qrels: Some("dl19-passage"),
        index_bm25: "msmarco-v1-passage",
        index_splade: "msmarco-v1-passage-splade-pp-ed",
        index_bge: "msmarco-v1-passage.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: TREC_METRICS,
        eval_depth: 1000,
        trec_args: &["-c", "-l", "2"],
        group: DatasetGroup::Trec,
    },
    DatasetSpec {
        name: "dl20",
        topics: "dl20-passage",
        qrels: Some("dl20-passage"),
        index_bm25: "msmarco-v1-passage",
        index_splade: "msmarco-v1-passage-splade-pp-ed",
        index_bge: "msmarco-v1-passage.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: TREC_METRICS,
        eval_depth: 1000,
        trec_args: &["-c", "-l", "2"],
        group: DatasetGroup::Trec,
    },
    // DL-Hard reuses the MS MARCO indexes; queries and qrels come from files.
    DatasetSpec {
        name: "dlhard",
        topics: "dl19-passage",
        qrels: None,
        index_bm25: "msmarco-v1-passage",
        index_splade: "msmarco-v1-passage-splade-pp-ed",
        index_bge: "msmarco-v1-passage.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: TREC_METRICS,
        eval_depth: 1000,
        trec_args: &["-c", "-l", "2"],
        group: DatasetGroup::Trec,
    },
    // BEIR
    DatasetSpec {
        name: "scifact",
        topics: "beir-v1.0.0-scifact-test",
        qrels: Some("beir-v1.0.0-scifact-test"),
        index_bm25: "beir-v1.0.0-scifact.flat",
        index_splade: "beir-v1.0.0-scifact-splade-pp-ed",
        index_bge: "beir-v1.0.0-scifact.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
    DatasetSpec {
        name: "arguana",
        topics: "beir-v1.0.0-arguana-test",
        qrels: Some("beir-v1.0.0-arguana-test"),
        index_bm25: "beir-v1.0.0-arguana.flat",
        index_splade: "beir-v1.0.0-arguana-splade-pp-ed",
        index_bge: "beir-v1.0.0-arguana.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
    DatasetSpec {
        name: "covid",
        topics: "beir-v1.0.0-trec-covid-test",
        qrels: Some("beir-v1.0.0-trec-covid-test"),
        index_bm25: "beir-v1.0.0-trec-covid.flat",
        index_splade: "beir-v1.0.0-trec-covid-splade-pp-ed",
        index_bge: "beir-v1.0.0-trec-covid.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
    DatasetSpec {
        name: "fiqa",
        topics: "beir-v1.0.0-fiqa-test",
        qrels: Some("beir-v1.0.0-fiqa-test"),
        index_bm25: "beir-v1.0.0-fiqa.flat",
        index_splade: "beir-v1.0.0-fiqa-splade-pp-ed",
        index_bge: "beir-v1.0.0-fiqa.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
    DatasetSpec {
        name: "dbpedia",
        topics: "beir-v1.0.0-dbpedia-entity-test",
        qrels: Some("beir-v1.0.0-dbpedia-entity-test"),
        index_bm25: "beir-v1.0.0-dbpedia-entity.flat",
        index_splade: "beir-v1.0.0-dbpedia-entity-splade-pp-ed",
        index_bge: "beir-v1.0.0-dbpedia-entity.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
    DatasetSpec {
        name: "news",
        topics: "beir-v1.0.0-trec-news-test",
        qrels: Some("beir-v1.0.0-trec-news-test"),
        index_bm25: "beir-v1.0.0-trec-news.flat",
        index_splade: "beir-v1.0.0-trec-news-splade-pp-ed",
        index_bge: "beir-v1.0.0-trec-news.bge-base-en-v1.5",
        bm25_k1: 0.9,
        bm25_b: 0.4,
        metrics: BEIR_METRICS,
        eval_depth: 1000,
        trec_args: &["-c"],
        group: DatasetGroup::Beir,
    },
];

/// Look up a dataset by name, failing fast on unknown names.
pub fn dataset(name: &str) -> Result<&'static DatasetSpec> {
    DATASETS
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| RequeryError::UnknownDataset {
            name: name.to_string(),
            available: dataset_names(),
        })
}

/// All registered dataset names, in registry order.
pub fn dataset_names() -> Vec<&'static str> {
    DATASETS.iter().map(|d| d.name).collect()
}
