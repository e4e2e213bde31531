//! `requery evaluate` — batch-evaluate run files into a results table

use crate::app::EvaluateArgs;
use anyhow::Result;
use requery_core::eval::{evaluate_all, write_eval_report, TrecEval};
use requery_core::{dataset_names, retriever_names};
use std::collections::BTreeMap;

pub async fn run(args: EvaluateArgs) -> Result<()> {
    let datasets = if args.datasets.is_empty() {
        dataset_names().iter().map(|s| s.to_string()).collect()
    } else {
        args.datasets.clone()
    };
    let retrievers = if args.retrievers.is_empty() {
        retriever_names().iter().map(|s| s.to_string()).collect()
    } else {
        args.retrievers.clone()
    };

    let mut qrels_overrides = BTreeMap::new();
    if let Some(qrels) = &args.dlhard_qrels {
        qrels_overrides.insert("dlhard".to_string(), qrels.clone());
    }

    let backend = TrecEval::default();
    let results = evaluate_all(&backend, &args.run_dir, &datasets, &retrievers, &qrels_overrides)
        .await?;

    let json_path = args.output.as_ref().map(|p| p.with_extension("json"));
    let table = write_eval_report(&results, args.output.as_deref(), json_path.as_deref())?;
    print!("{table}");

    if let Some(output) = &args.output {
        println!("Saved results to {}", output.display());
    }
    Ok(())
}
