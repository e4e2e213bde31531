//! `requery retrieve` — produce run files for one reformulated query file

use crate::app::RetrieveArgs;
use anyhow::Result;
use requery_core::dataset;
use requery_core::retrieval::{
    query_side_flags, retriever, PyseriniSearch, RetrievalRequest, SearchBackend,
};

pub async fn run(args: RetrieveArgs) -> Result<()> {
    let ds = dataset(&args.dataset)?;
    let search = PyseriniSearch::default();

    for ret_name in &args.retrievers {
        let ret = retriever(ret_name)?;
        let run_file = args
            .output_dir
            .join(format!("{}.{ret_name}.run", args.dataset));

        let (query_prefix, remove_query) = query_side_flags(ds, ret);
        let request = RetrievalRequest {
            queries_tsv: args.queries.clone(),
            dataset: ds,
            retriever: ret,
            output_run: run_file.clone(),
            hits: args.hits,
            threads: args.threads,
            batch_size: args.batch_size,
            remove_query,
            query_prefix: query_prefix.to_string(),
        };

        println!("[{}] Running retrieval on {}", ret_name.to_uppercase(), args.dataset);
        search.retrieve_to_run_file(&request).await?;
        println!("[{}] Done -> {}", ret_name.to_uppercase(), run_file.display());
    }

    Ok(())
}
