//! Evaluation collaborator: trec_eval over TREC run files
//!
//! Metrics are computed one at a time by shelling out to
//! `pyserini.eval.trec_eval`; a failed or unparseable metric yields NaN
//! with a warning so one broken judgment file never sinks a whole report.

mod report;

pub use report::{eval_report_csv, grid_report_csv, write_eval_report, write_grid_report};

use crate::datasets::DatasetSpec;
use crate::error::{RequeryError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// Metric name → aggregate value (NaN when computation failed)
pub type MetricsRecord = BTreeMap<String, f64>;

/// Nested evaluation results: dataset → retriever → metrics
pub type EvalResults = BTreeMap<String, BTreeMap<String, MetricsRecord>>;

/// Grid results keyed `llm/method/dataset/retriever`
pub type GridResults = BTreeMap<String, MetricsRecord>;

/// Narrow interface to the evaluation collaborator
#[async_trait]
pub trait EvalBackend: Send + Sync {
    /// Evaluate one run file, returning every configured metric.
    ///
    /// `qrels_override` replaces the dataset's registered judgment file
    /// (required for datasets that register none); `metrics_override`
    /// replaces the dataset's metric list.
    async fn evaluate_run(
        &self,
        run_file: &Path,
        dataset: &DatasetSpec,
        qrels_override: Option<&Path>,
        metrics_override: Option<&[String]>,
    ) -> Result<MetricsRecord>;
}

/// Map a config-style metric name to trec_eval's grammar.
///
/// trec_eval separates the cutoff with a dot: `ndcg_cut_10` →
/// `ndcg_cut.10`, `recall_100` → `recall.100`. Names without a numeric
/// suffix pass through unchanged.
fn trec_metric_name(metric: &str) -> String {
    match metric.rsplit_once('_') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_digit()) => {
            format!("{head}.{tail}")
        }
        _ => metric.to_string(),
    }
}

/// Pull the aggregate value out of trec_eval's tabular stdout: the row
/// whose second column is the literal `all`.
fn parse_aggregate(stdout: &str) -> Option<f64> {
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 && parts[1] == "all" {
            if let Ok(value) = parts[2].parse() {
                return Some(value);
            }
        }
    }
    None
}

/// Production evaluation backend shelling out to `pyserini.eval.trec_eval`
pub struct TrecEval {
    python_bin: String,
    timeout: Duration,
}

impl Default for TrecEval {
    fn default() -> Self {
        Self::new("python")
    }
}

impl TrecEval {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
            timeout: Duration::from_secs(300),
        }
    }

    async fn run_metric(
        &self,
        metric: &str,
        trec_args: &[&str],
        qrels: &str,
        run_file: &Path,
    ) -> Result<f64> {
        let trec_metric = trec_metric_name(metric);

        let mut cmd = tokio::process::Command::new(&self.python_bin);
        cmd.arg("-m")
            .arg("pyserini.eval.trec_eval")
            .args(trec_args)
            .arg("-m")
            .arg(&trec_metric)
            .arg(qrels)
            .arg(run_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(RequeryError::Evaluation(format!(
                    "{trec_metric} timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(300)
                .collect();
            return Err(RequeryError::Evaluation(format!(
                "{trec_metric} failed (exit {}): {stderr}",
                output.status.code().unwrap_or(-1)
            )));
        }

        parse_aggregate(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            RequeryError::Evaluation(format!("no aggregate row in {trec_metric} output"))
        })
    }
}

#[async_trait]
impl EvalBackend for TrecEval {
    async fn evaluate_run(
        &self,
        run_file: &Path,
        dataset: &DatasetSpec,
        qrels_override: Option<&Path>,
        metrics_override: Option<&[String]>,
    ) -> Result<MetricsRecord> {
        let qrels = match qrels_override {
            Some(path) => path.display().to_string(),
            None => dataset
                .qrels
                .map(String::from)
                .ok_or_else(|| {
                    RequeryError::Evaluation(format!(
                        "dataset '{}' registers no qrels; supply an override",
                        dataset.name
                    ))
                })?,
        };

        let metric_names: Vec<String> = match metrics_override {
            Some(metrics) => metrics.to_vec(),
            None => dataset.metrics.iter().map(|m| m.to_string()).collect(),
        };

        let mut record = MetricsRecord::new();
        for metric in &metric_names {
            match self
                .run_metric(metric, dataset.trec_args, &qrels, run_file)
                .await
            {
                Ok(value) => {
                    record.insert(metric.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(metric, run = %run_file.display(), "Evaluation failed: {e}");
                    record.insert(metric.clone(), f64::NAN);
                }
            }
        }
        Ok(record)
    }
}

/// Batch-evaluate every `{dataset}.{retriever}.run` file under `run_dir`.
///
/// Missing run files are skipped silently; a per-run evaluation failure is
/// logged and that (dataset, retriever) cell is left out of the result.
pub async fn evaluate_all(
    backend: &dyn EvalBackend,
    run_dir: &Path,
    datasets: &[String],
    retrievers: &[String],
    qrels_overrides: &BTreeMap<String, PathBuf>,
) -> Result<EvalResults> {
    let mut results = EvalResults::new();

    for ds_name in datasets {
        let ds = crate::datasets::dataset(ds_name)?;
        for ret_name in retrievers {
            let run_file = run_dir.join(format!("{ds_name}.{ret_name}.run"));
            if !run_file.exists() {
                continue;
            }
            let qrels = qrels_overrides.get(ds_name).map(PathBuf::as_path);
            match backend.evaluate_run(&run_file, ds, qrels, None).await {
                Ok(record) => {
                    results
                        .entry(ds_name.clone())
                        .or_default()
                        .insert(ret_name.clone(), record);
                }
                Err(e) => {
                    tracing::warn!(dataset = %ds_name, retriever = %ret_name, "Skipping cell: {e}");
                }
            }
        }
    }

    Ok(results)
}
