//! `requery pipeline` — the full experiment grid in one run

use crate::app::PipelineArgs;
use anyhow::Result;
use requery_core::eval::TrecEval;
use requery_core::llm::PromptBank;
use requery_core::retrieval::PyseriniSearch;
use requery_core::Pipeline;
use std::sync::Arc;

pub async fn run(args: PipelineArgs) -> Result<()> {
    let mut config = super::load_config(&args.config)?;

    if !args.methods.is_empty() {
        let selected = args.methods.clone();
        config.methods = selected
            .into_iter()
            .map(|name| {
                let params = config.method_params(&name);
                (name, params)
            })
            .collect();
    }
    if !args.llms.is_empty() {
        config.llms = args.llms.clone();
    }
    if !args.datasets.is_empty() {
        config.datasets = args.datasets.clone();
    }
    if !args.retrievers.is_empty() {
        config.retrievers = args.retrievers.clone();
    }
    if let Some(queries_dir) = &args.queries_dir {
        config.paths.queries = queries_dir.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.paths.output = output_dir.clone();
    }

    let prompts = Arc::new(PromptBank::load(&config.paths.prompts)?);
    let out_root = config.paths.output.clone();

    let mut pipeline = Pipeline::new(
        config,
        prompts,
        Arc::new(PyseriniSearch::default()),
        Arc::new(TrecEval::default()),
    );
    if let Some(qrels) = &args.dlhard_qrels {
        pipeline = pipeline.with_qrels_override("dlhard", qrels);
    }

    let results = pipeline.run().await?;
    println!(
        "Evaluated {} grid cells; results in {}",
        results.len(),
        out_root.join("all_results.csv").display()
    );
    Ok(())
}
