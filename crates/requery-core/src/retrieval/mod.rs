//! Retrieval collaborator adapters
//!
//! Two narrow operations back the experiment pipeline:
//!
//! 1. **Full retrieval** ([`SearchBackend::retrieve_to_run_file`]): produce
//!    TREC-format run files for evaluation (top-1000).
//! 2. **Context retrieval** ([`SearchBackend::fetch_contexts`]): fetch
//!    top-k passage texts at reformulation time. Corpus-grounded methods
//!    (csqe, lamer) condition their prompts on this evidence.
//!
//! The production implementation shells out to Pyserini with bounded
//! timeouts; tests substitute in-memory backends.

mod contexts;

pub use contexts::{extract_passage_text, gather_contexts, ContextMap};

use crate::data::Query;
use crate::datasets::{DatasetGroup, DatasetSpec};
use crate::error::{RequeryError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Search engine family a retriever runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearcherKind {
    Lucene,
    Faiss,
}

/// Static configuration for one retriever
#[derive(Debug, Clone)]
pub struct RetrieverSpec {
    pub name: &'static str,
    pub kind: SearcherKind,
    pub extra_args: &'static [&'static str],
}

impl RetrieverSpec {
    /// Prebuilt index name for this retriever on `dataset`
    pub fn index_for(&self, dataset: &DatasetSpec) -> &'static str {
        match self.name {
            "splade" => dataset.index_splade,
            "bge" => dataset.index_bge,
            _ => dataset.index_bm25,
        }
    }
}

/// All registered retrievers
pub const RETRIEVERS: &[RetrieverSpec] = &[
    RetrieverSpec {
        name: "bm25",
        kind: SearcherKind::Lucene,
        extra_args: &[],
    },
    RetrieverSpec {
        name: "splade",
        kind: SearcherKind::Lucene,
        extra_args: &["--impact", "--pretokenized"],
    },
    RetrieverSpec {
        name: "bge",
        kind: SearcherKind::Faiss,
        extra_args: &[
            "--encoder-class",
            "auto",
            "--encoder",
            "BAAI/bge-base-en-v1.5",
            "--l2-norm",
        ],
    },
];

/// Look up a retriever by name, failing fast on unknown names
pub fn retriever(name: &str) -> Result<&'static RetrieverSpec> {
    RETRIEVERS
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| RequeryError::UnknownRetriever {
            name: name.to_string(),
            available: retriever_names(),
        })
}

/// All registered retriever names, in registry order
pub fn retriever_names() -> Vec<&'static str> {
    RETRIEVERS.iter().map(|r| r.name).collect()
}

/// Instruction prefix dense BGE encoders expect on the query side
pub const BGE_QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages:";

/// Query-side flags for a (dataset, retriever) pair: the literal prefix
/// prepended to every query, and whether to suppress echoing raw query
/// terms (dense retrieval over BEIR).
pub fn query_side_flags(dataset: &DatasetSpec, retriever: &RetrieverSpec) -> (&'static str, bool) {
    if retriever.name == "bge" {
        (BGE_QUERY_PREFIX, dataset.group == DatasetGroup::Beir)
    } else {
        ("", false)
    }
}

/// One full-retrieval invocation
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// TSV file with `qid \t query` rows
    pub queries_tsv: PathBuf,
    pub dataset: &'static DatasetSpec,
    pub retriever: &'static RetrieverSpec,
    /// Where to write the TREC-format run file
    pub output_run: PathBuf,
    pub hits: usize,
    pub threads: usize,
    pub batch_size: usize,
    pub remove_query: bool,
    pub query_prefix: String,
}

/// A retrieved document with its stored representation
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedDoc {
    pub docid: String,
    #[serde(default)]
    pub score: f64,
    /// Raw stored form (JSON blob or plain text), when the index keeps one
    #[serde(default)]
    pub raw: Option<String>,
    /// Direct contents field (flat indexes)
    #[serde(default)]
    pub contents: Option<String>,
}

/// Narrow interface to the retrieval collaborator
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Produce a TREC-format run file for a query TSV
    async fn retrieve_to_run_file(&self, request: &RetrievalRequest) -> Result<()>;

    /// Ranked stored documents per qid, for context grounding
    async fn fetch_contexts(
        &self,
        queries: &[Query],
        dataset: &DatasetSpec,
        retriever: &str,
        k: usize,
        threads: usize,
    ) -> Result<HashMap<String, Vec<RetrievedDoc>>>;
}

/// One-shot bridge over Pyserini's `LuceneSearcher`: query TSV on stdin,
/// `{qid, hits}` JSON lines on stdout.
const CONTEXT_BRIDGE: &str = r#"
import json, sys
from pyserini.search.lucene import LuceneSearcher

index, k, k1, b, threads = sys.argv[1], int(sys.argv[2]), float(sys.argv[3]), float(sys.argv[4]), int(sys.argv[5])
searcher = LuceneSearcher.from_prebuilt_index(index)
searcher.set_bm25(k1=k1, b=b)

pairs = [line.rstrip("\n").split("\t", 1) for line in sys.stdin if line.strip()]
qids = [p[0] for p in pairs]
texts = [p[1] for p in pairs]
results = searcher.batch_search(texts, qids, k=k, threads=threads)

for qid in qids:
    hits = []
    for hit in results.get(qid, []):
        doc = hit.lucene_document
        hits.append({
            "docid": hit.docid,
            "score": hit.score,
            "raw": doc.get("raw"),
            "contents": doc.get("contents"),
        })
    print(json.dumps({"qid": qid, "hits": hits}))
"#;

/// Pyserini-backed implementation shelling out to its CLI and Python API
pub struct PyseriniSearch {
    python_bin: String,
    retrieval_timeout: Duration,
    context_timeout: Duration,
}

impl Default for PyseriniSearch {
    fn default() -> Self {
        Self::new("python")
    }
}

impl PyseriniSearch {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
            retrieval_timeout: Duration::from_secs(7200),
            context_timeout: Duration::from_secs(3600),
        }
    }
}

#[async_trait]
impl SearchBackend for PyseriniSearch {
    async fn retrieve_to_run_file(&self, request: &RetrievalRequest) -> Result<()> {
        if let Some(parent) = request.output_run.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let module = match request.retriever.kind {
            SearcherKind::Faiss => "pyserini.search.faiss",
            SearcherKind::Lucene => "pyserini.search.lucene",
        };
        let index = request.retriever.index_for(request.dataset);

        let mut cmd = tokio::process::Command::new(&self.python_bin);
        cmd.arg("-m")
            .arg(module)
            .arg("--threads")
            .arg(request.threads.to_string())
            .arg("--batch-size")
            .arg(request.batch_size.to_string())
            .arg("--index")
            .arg(index)
            .arg("--topics")
            .arg(&request.queries_tsv)
            .arg("--output")
            .arg(&request.output_run)
            .arg("--hits")
            .arg(request.hits.to_string())
            .args(request.retriever.extra_args);

        if !request.query_prefix.is_empty() {
            cmd.arg("--query-prefix").arg(&request.query_prefix);
        }
        if request.remove_query {
            cmd.arg("--remove-query");
        }

        tracing::info!(
            retriever = request.retriever.name,
            dataset = request.dataset.name,
            index,
            "Running retrieval"
        );

        let output = run_with_timeout(cmd, self.retrieval_timeout).await?;
        if !output.status.success() {
            return Err(RequeryError::Retrieval {
                status: output.status.code().unwrap_or(-1),
                stderr: truncate_diagnostic(&String::from_utf8_lossy(&output.stderr), 1000),
            });
        }

        tracing::info!(run = %request.output_run.display(), "Retrieval written");
        Ok(())
    }

    async fn fetch_contexts(
        &self,
        queries: &[Query],
        dataset: &DatasetSpec,
        retriever: &str,
        k: usize,
        threads: usize,
    ) -> Result<HashMap<String, Vec<RetrievedDoc>>> {
        // Context retrieval is lexical regardless of the evaluation
        // retriever; grounded methods expect BM25 evidence.
        if retriever != "bm25" {
            tracing::warn!(retriever, "Context retrieval uses the BM25 index");
        }
        let index = dataset.index_bm25;

        tracing::info!(
            index,
            k,
            k1 = dataset.bm25_k1,
            b = dataset.bm25_b,
            "Fetching contexts"
        );

        let mut cmd = tokio::process::Command::new(&self.python_bin);
        cmd.arg("-c")
            .arg(CONTEXT_BRIDGE)
            .arg(index)
            .arg(k.to_string())
            .arg(dataset.bm25_k1.to_string())
            .arg(dataset.bm25_b.to_string())
            .arg(threads.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            let mut payload = String::new();
            for query in queries {
                payload.push_str(&query.qid);
                payload.push('\t');
                payload.push_str(&query.text);
                payload.push('\n');
            }
            stdin.write_all(payload.as_bytes()).await?;
        }

        let output = match tokio::time::timeout(self.context_timeout, child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_) => {
                return Err(RequeryError::Retrieval {
                    status: -1,
                    stderr: format!(
                        "context retrieval timed out after {}s",
                        self.context_timeout.as_secs()
                    ),
                })
            }
        };

        if !output.status.success() {
            return Err(RequeryError::Retrieval {
                status: output.status.code().unwrap_or(-1),
                stderr: truncate_diagnostic(&String::from_utf8_lossy(&output.stderr), 1000),
            });
        }

        #[derive(Deserialize)]
        struct ContextLine {
            qid: String,
            hits: Vec<RetrievedDoc>,
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut hits_by_qid = HashMap::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let parsed: ContextLine = serde_json::from_str(line)?;
            hits_by_qid.insert(parsed.qid, parsed.hits);
        }
        Ok(hits_by_qid)
    }
}

async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Duration,
) -> Result<std::process::Output> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd.spawn()?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(RequeryError::Retrieval {
            status: -1,
            stderr: format!("timed out after {}s", timeout.as_secs()),
        }),
    }
}

fn truncate_diagnostic(stderr: &str, max_chars: usize) -> String {
    stderr.trim().chars().take(max_chars).collect()
}
