//! `requery reformulate` — one method, one LLM, one dataset

use crate::app::ReformulateArgs;
use crate::progress::ProgressReporter;
use anyhow::Result;
use requery_core::llm::{LlmSettings, OpenAiClient, PromptBank};
use requery_core::methods::{build_method, reformulate_batch, validate_name};
use requery_core::retrieval::{gather_contexts, PyseriniSearch};
use requery_core::{dataset, load_queries_tsv, save_reformulated_tsv};
use std::sync::Arc;

pub async fn run(args: ReformulateArgs) -> Result<()> {
    validate_name(&args.method)?;
    let ds = dataset(&args.dataset)?;
    let config = super::load_config(&args.config)?;

    let mut params = config.method_params(&args.method);
    if params.dataset_sensitive() {
        params = params.with_dataset(&args.dataset);
    }

    let settings = LlmSettings {
        model: args.llm.clone(),
        max_tokens: args.max_tokens.unwrap_or(config.llm.max_tokens),
        temperature: args.temperature.unwrap_or(config.llm.temperature),
        ..config.llm.clone()
    };
    let client = Arc::new(OpenAiClient::new(settings)?);

    let prompts_path = args.prompts.as_deref().unwrap_or(&config.paths.prompts);
    let prompts = Arc::new(PromptBank::load(prompts_path)?);

    let context_k = params.context_k.unwrap_or(config.context_retrieval.k);
    let method = build_method(&args.method, client, prompts, params)?;

    let queries = load_queries_tsv(&args.queries)?;
    println!("Loaded {} queries from {}", queries.len(), args.queries.display());

    let ctx_map = if method.requires_contexts() {
        let retriever = args
            .contexts_from
            .as_deref()
            .unwrap_or(&config.context_retrieval.retriever);
        println!(
            "Retrieving top-{context_k} contexts via {retriever} for {}",
            args.dataset
        );
        let search = PyseriniSearch::default();
        Some(
            gather_contexts(
                &search,
                &queries,
                ds,
                retriever,
                context_k,
                config.context_retrieval.threads,
            )
            .await?,
        )
    } else {
        None
    };

    let mut reporter = ProgressReporter::new(format!("{} ({})", args.method, args.llm), queries.len());
    let results = reformulate_batch(
        method.as_ref(),
        &queries,
        ctx_map.as_ref(),
        Some(|done, _total| reporter.update(done)),
    )
    .await?;
    reporter.finish();

    save_reformulated_tsv(&results, &args.output)?;
    println!("Saved {} reformulated queries to {}", results.len(), args.output.display());
    Ok(())
}
