//! Experiment pipeline: reformulation → retrieval → evaluation
//!
//! Runs the full {LLM × method × dataset × retriever} grid. Each stage is
//! cached by file presence, so re-running a finished grid touches nothing
//! and costs zero completion calls. Failures are isolated at cell
//! granularity: a broken dataset, retriever, or judgment file is logged
//! and skipped while every independent sibling still runs.
//!
//! Caching is existence-checks only. Two orchestrators writing into the
//! same output directory can race between check and write; run one at a
//! time per output root.

use crate::config::ExperimentConfig;
use crate::data::{load_queries_tsv, save_reformulated_tsv};
use crate::datasets::dataset;
use crate::error::Result;
use crate::eval::{write_grid_report, EvalBackend, GridResults};
use crate::llm::{CompletionClient, LlmSettings, OpenAiClient, PromptBank};
use crate::methods::{build_method, reformulate_batch, validate_name, MethodParams};
use crate::retrieval::{
    gather_contexts, query_side_flags, retriever, RetrievalRequest, SearchBackend,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type ClientFactory = Box<dyn Fn(&str) -> Result<Arc<dyn CompletionClient>> + Send + Sync>;

/// Grid orchestrator over pluggable collaborator backends
pub struct Pipeline {
    config: ExperimentConfig,
    prompts: Arc<PromptBank>,
    search: Arc<dyn SearchBackend>,
    eval: Arc<dyn EvalBackend>,
    client_factory: ClientFactory,
    qrels_overrides: BTreeMap<String, PathBuf>,
}

impl Pipeline {
    /// Build a pipeline with the production completion client
    pub fn new(
        config: ExperimentConfig,
        prompts: Arc<PromptBank>,
        search: Arc<dyn SearchBackend>,
        eval: Arc<dyn EvalBackend>,
    ) -> Self {
        let base_settings = config.llm.clone();
        let client_factory: ClientFactory = Box::new(move |llm_name: &str| {
            let settings = LlmSettings {
                model: llm_name.to_string(),
                ..base_settings.clone()
            };
            Ok(Arc::new(OpenAiClient::new(settings)?) as Arc<dyn CompletionClient>)
        });
        Self {
            config,
            prompts,
            search,
            eval,
            client_factory,
            qrels_overrides: BTreeMap::new(),
        }
    }

    /// Substitute the completion-client factory (tests use scripted stubs)
    pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = factory;
        self
    }

    /// Use `path` as the judgment file for `dataset_name`
    pub fn with_qrels_override(mut self, dataset_name: &str, path: impl Into<PathBuf>) -> Self {
        self.qrels_overrides.insert(dataset_name.to_string(), path.into());
        self
    }

    /// Run the whole grid, returning every successfully evaluated cell.
    ///
    /// Fails fast on unknown method/dataset/retriever names before any
    /// work starts; after that, per-cell failures are logged and skipped.
    /// Writes `all_results.{csv,json}` under the output root at the end.
    pub async fn run(&self) -> Result<GridResults> {
        let llms = self.config.grid_llms();
        let methods = self.config.grid_methods();
        let datasets = self.config.grid_datasets();
        let retrievers = self.config.grid_retrievers();

        for name in &methods {
            validate_name(name)?;
        }
        for name in &datasets {
            dataset(name)?;
        }
        for name in &retrievers {
            retriever(name)?;
        }

        let out_root = self.config.paths.output.clone();
        let mut all_results = GridResults::new();

        for llm_name in &llms {
            tracing::info!(llm = %llm_name, "Starting grid pass");
            let client = (self.client_factory)(llm_name)?;

            for method_name in &methods {
                let base_params = self.config.method_params(method_name);

                for ds_name in &datasets {
                    let cell_dir = out_root.join(llm_name).join(method_name);
                    if let Err(e) = self
                        .run_cell(
                            client.clone(),
                            method_name,
                            &base_params,
                            ds_name,
                            &retrievers,
                            &cell_dir,
                            &mut all_results,
                            llm_name,
                        )
                        .await
                    {
                        tracing::error!(
                            llm = %llm_name,
                            method = %method_name,
                            dataset = %ds_name,
                            "Cell failed: {e}"
                        );
                    }
                }
            }
        }

        write_grid_report(&all_results, &out_root)?;
        tracing::info!(
            cells = all_results.len(),
            out = %out_root.display(),
            "Grid complete"
        );
        Ok(all_results)
    }

    /// One (LLM, method, dataset) cell: reformulate once, then retrieve
    /// and evaluate per retriever.
    #[allow(clippy::too_many_arguments)]
    async fn run_cell(
        &self,
        client: Arc<dyn CompletionClient>,
        method_name: &str,
        base_params: &MethodParams,
        ds_name: &str,
        retrievers: &[String],
        cell_dir: &Path,
        all_results: &mut GridResults,
        llm_name: &str,
    ) -> Result<()> {
        let ds = dataset(ds_name)?;

        let queries_file = self.config.paths.queries.join(format!("{ds_name}.tsv"));
        if !queries_file.exists() {
            tracing::warn!(file = %queries_file.display(), "Query file missing, skipping");
            return Ok(());
        }

        // Stage 1: reformulate (keyed by LLM/method/dataset only)
        let reform_file = cell_dir.join(format!("{ds_name}.tsv"));
        if reform_file.exists() {
            tracing::info!(file = %reform_file.display(), "Reformulation cached");
        } else {
            let params = if base_params.dataset_sensitive() {
                base_params.clone().with_dataset(ds_name)
            } else {
                base_params.clone()
            };
            let method = build_method(method_name, client, self.prompts.clone(), params)?;

            let queries = load_queries_tsv(&queries_file)?;
            tracing::info!(
                method = %method_name,
                dataset = %ds_name,
                queries = queries.len(),
                "Reformulating"
            );

            let ctx_map = if method.requires_contexts() {
                let ctx_cfg = &self.config.context_retrieval;
                let k = base_params.context_k.unwrap_or(ctx_cfg.k);
                Some(
                    gather_contexts(
                        self.search.as_ref(),
                        &queries,
                        ds,
                        &ctx_cfg.retriever,
                        k,
                        ctx_cfg.threads,
                    )
                    .await?,
                )
            } else {
                None
            };

            let results = reformulate_batch(
                method.as_ref(),
                &queries,
                ctx_map.as_ref(),
                None::<fn(usize, usize)>,
            )
            .await?;
            save_reformulated_tsv(&results, &reform_file)?;
        }

        // Stage 2: retrieve per retriever, isolated
        let run_dir = cell_dir.join("runs");
        for ret_name in retrievers {
            let ret = retriever(ret_name)?;
            let run_file = run_dir.join(format!("{ds_name}.{ret_name}.run"));
            if run_file.exists() {
                tracing::info!(file = %run_file.display(), "Run file cached");
                continue;
            }

            let (query_prefix, remove_query) = query_side_flags(ds, ret);
            let request = RetrievalRequest {
                queries_tsv: reform_file.clone(),
                dataset: ds,
                retriever: ret,
                output_run: run_file,
                hits: self.config.retrieval.hits,
                threads: self.config.retrieval.threads,
                batch_size: self.config.retrieval.batch_size,
                remove_query,
                query_prefix: query_prefix.to_string(),
            };

            if let Err(e) = self.search.retrieve_to_run_file(&request).await {
                tracing::warn!(retriever = %ret_name, dataset = %ds_name, "Retrieval failed: {e}");
            }
        }

        // Stage 3: evaluate every retriever that produced a run file
        for ret_name in retrievers {
            let run_file = run_dir.join(format!("{ds_name}.{ret_name}.run"));
            if !run_file.exists() {
                continue;
            }

            let qrels = self.qrels_overrides.get(ds_name).map(PathBuf::as_path);
            match self.eval.evaluate_run(&run_file, ds, qrels, None).await {
                Ok(metrics) => {
                    let key = format!("{llm_name}/{method_name}/{ds_name}/{ret_name}");
                    let summary = metrics
                        .iter()
                        .map(|(m, v)| format!("{m}={v:.4}"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    tracing::info!(cell = %key, "{summary}");
                    all_results.insert(key, metrics);
                }
                Err(e) => {
                    tracing::warn!(retriever = %ret_name, dataset = %ds_name, "Evaluation failed: {e}");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextRetrievalConfig, PathsConfig, RetrievalConfig};
    use crate::data::Query;
    use crate::datasets::DatasetSpec;
    use crate::error::RequeryError;
    use crate::eval::MetricsRecord;
    use crate::llm::testing::{identity_bank, ScriptedClient};
    use crate::retrieval::RetrievedDoc;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Retrieval stub: writes a marker run file, optionally failing for
    /// one retriever
    struct StubSearch {
        fail_retriever: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubSearch {
        fn new(fail_retriever: Option<&'static str>) -> Self {
            Self {
                fail_retriever,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for StubSearch {
        async fn retrieve_to_run_file(&self, request: &RetrievalRequest) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(request.retriever.name) == self.fail_retriever {
                return Err(RequeryError::Retrieval {
                    status: 1,
                    stderr: "index unavailable".to_string(),
                });
            }
            if let Some(parent) = request.output_run.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&request.output_run, "q1 Q0 d1 1 10.0 stub\n")?;
            Ok(())
        }

        async fn fetch_contexts(
            &self,
            queries: &[Query],
            _dataset: &DatasetSpec,
            _retriever: &str,
            _k: usize,
            _threads: usize,
        ) -> Result<HashMap<String, Vec<RetrievedDoc>>> {
            Ok(queries
                .iter()
                .map(|q| {
                    (
                        q.qid.clone(),
                        vec![RetrievedDoc {
                            docid: "d1".to_string(),
                            score: 1.0,
                            raw: None,
                            contents: Some(format!("passage for {}", q.qid)),
                        }],
                    )
                })
                .collect())
        }
    }

    /// Evaluation stub returning a fixed metric, recording evaluated runs
    struct StubEval {
        evaluated: Mutex<Vec<String>>,
    }

    impl StubEval {
        fn new() -> Self {
            Self {
                evaluated: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EvalBackend for StubEval {
        async fn evaluate_run(
            &self,
            run_file: &Path,
            _dataset: &DatasetSpec,
            _qrels_override: Option<&Path>,
            _metrics_override: Option<&[String]>,
        ) -> Result<MetricsRecord> {
            self.evaluated
                .lock()
                .unwrap()
                .push(run_file.file_name().unwrap().to_string_lossy().into_owned());
            let mut record = MetricsRecord::new();
            record.insert("ndcg_cut_10".to_string(), 0.5);
            Ok(record)
        }
    }

    fn test_config(dir: &TempDir, retrievers: &[&str]) -> ExperimentConfig {
        let queries_dir = dir.path().join("queries");
        std::fs::create_dir_all(&queries_dir).unwrap();
        std::fs::write(
            queries_dir.join("dl19.tsv"),
            "q1\tclimate change\nq2\tsolar panels\n",
        )
        .unwrap();

        let mut methods = BTreeMap::new();
        methods.insert("q2k".to_string(), MethodParams::default());

        ExperimentConfig {
            llms: vec!["stub-model".to_string()],
            methods,
            datasets: vec!["dl19".to_string()],
            retrievers: retrievers.iter().map(|s| s.to_string()).collect(),
            paths: PathsConfig {
                output: dir.path().join("out"),
                prompts: PathBuf::from("unused"),
                queries: queries_dir,
            },
            retrieval: RetrievalConfig::default(),
            context_retrieval: ContextRetrievalConfig::default(),
            ..Default::default()
        }
    }

    fn scripted_factory(client: Arc<ScriptedClient>) -> ClientFactory {
        Box::new(move |_| Ok(client.clone() as Arc<dyn CompletionClient>))
    }

    #[tokio::test]
    async fn test_full_grid_produces_report() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["bm25"]);
        let out_root = config.paths.output.clone();

        let client = Arc::new(ScriptedClient::new(vec![
            "warming, emissions",
            "photovoltaic, energy",
        ]));
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["q2k"])),
            Arc::new(StubSearch::new(None)),
            Arc::new(StubEval::new()),
        )
        .with_client_factory(scripted_factory(client));

        let results = pipeline.run().await.unwrap();
        assert_eq!(results.len(), 1);
        let record = &results["stub-model/q2k/dl19/bm25"];
        assert_eq!(record["ndcg_cut_10"], 0.5);

        // artifacts: reformulated TSV with the default 5-repeat form,
        // run file, and both consolidated reports
        let reform = std::fs::read_to_string(
            out_root.join("stub-model/q2k/dl19.tsv"),
        )
        .unwrap();
        let first_line = reform.lines().next().unwrap();
        assert_eq!(
            first_line,
            "q1\tclimate change climate change climate change climate change \
             climate change warming, emissions"
        );
        assert!(out_root.join("stub-model/q2k/runs/dl19.bm25.run").exists());
        assert!(out_root.join("all_results.json").exists());
        let csv = std::fs::read_to_string(out_root.join("all_results.csv")).unwrap();
        assert!(csv.starts_with("llm,method,dataset,retriever,ndcg_cut_10"));
        assert!(csv.contains("stub-model,q2k,dl19,bm25,0.5000"));
    }

    #[tokio::test]
    async fn test_second_run_hits_cache_with_zero_completions() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["bm25"]);

        let client = Arc::new(ScriptedClient::new(vec!["kw1", "kw2"]));
        let search = Arc::new(StubSearch::new(None));
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["q2k"])),
            search.clone(),
            Arc::new(StubEval::new()),
        )
        .with_client_factory(scripted_factory(client.clone()));

        let first = pipeline.run().await.unwrap();
        assert_eq!(client.call_count(), 2);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);

        let second = pipeline.run().await.unwrap();
        // identical report, no new completion or retrieval calls
        assert_eq!(first, second);
        assert_eq!(client.call_count(), 2);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_retriever_does_not_abort_siblings() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["bm25", "splade"]);

        let client = Arc::new(ScriptedClient::new(vec!["kw1", "kw2"]));
        let eval = Arc::new(StubEval::new());
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["q2k"])),
            Arc::new(StubSearch::new(Some("bm25"))),
            eval.clone(),
        )
        .with_client_factory(scripted_factory(client));

        let results = pipeline.run().await.unwrap();

        // bm25 failed: absent from the report, not zero-filled
        assert!(!results.contains_key("stub-model/q2k/dl19/bm25"));
        assert!(results.contains_key("stub-model/q2k/dl19/splade"));
        assert_eq!(
            eval.evaluated.lock().unwrap().as_slice(),
            ["dl19.splade.run"]
        );
    }

    #[tokio::test]
    async fn test_grounded_method_gets_contexts() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &["bm25"]);
        config.methods.clear();
        config.methods.insert(
            "lamer".to_string(),
            MethodParams {
                num_passages: Some(1),
                dataset: Some("msmarco".to_string()),
                ..Default::default()
            },
        );
        let out_root = config.paths.output.clone();

        let client = Arc::new(ScriptedClient::new(vec!["rewrite one", "rewrite two"]));
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["lamer_msmarco", "lamer_dl19"])),
            Arc::new(StubSearch::new(None)),
            Arc::new(StubEval::new()),
        )
        .with_client_factory(scripted_factory(client.clone()));

        pipeline.run().await.unwrap();

        // dataset-sensitive params select the per-dataset prompt
        let requests = client.requests();
        assert!(requests[0][0].content.starts_with("lamer_dl19:"));
        // the prompt saw retrieved evidence for the right query
        assert!(requests[0][0].content.contains("passage for q1"));

        let reform =
            std::fs::read_to_string(out_root.join("stub-model/lamer/dl19.tsv")).unwrap();
        assert!(reform.starts_with("q1\tclimate change rewrite one\n"));
    }

    #[tokio::test]
    async fn test_unknown_names_fail_before_any_work() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &["bm25"]);
        config.methods.insert("hyde".to_string(), MethodParams::default());

        let client = Arc::new(ScriptedClient::new(Vec::<String>::new()));
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["q2k"])),
            Arc::new(StubSearch::new(None)),
            Arc::new(StubEval::new()),
        )
        .with_client_factory(scripted_factory(client.clone()));

        let err = pipeline.run().await.unwrap_err();
        assert!(err.to_string().contains("hyde"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_query_file_skips_dataset() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &["bm25"]);
        config.datasets = vec!["dl19".to_string(), "scifact".to_string()];

        let client = Arc::new(ScriptedClient::new(vec!["kw1", "kw2"]));
        let pipeline = Pipeline::new(
            config,
            Arc::new(identity_bank(&["q2k"])),
            Arc::new(StubSearch::new(None)),
            Arc::new(StubEval::new()),
        )
        .with_client_factory(scripted_factory(client));

        let results = pipeline.run().await.unwrap();
        // scifact has no query file; only dl19 produced a cell
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("stub-model/q2k/dl19/bm25"));
    }
}
