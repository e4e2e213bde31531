//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "requery")]
#[command(
    author,
    version,
    about = "LLM query reformulation experiments over TREC and BEIR benchmarks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reformulate queries with one method and LLM
    Reformulate(ReformulateArgs),

    /// Run retrieval over a reformulated query file
    Retrieve(RetrieveArgs),

    /// Evaluate run files and produce a results table
    Evaluate(EvaluateArgs),

    /// Run the full reformulation → retrieval → evaluation grid
    Pipeline(PipelineArgs),
}

#[derive(Args)]
pub struct ReformulateArgs {
    /// Reformulation method name (e.g. genqr, q2d_zs, csqe)
    #[arg(long)]
    pub method: String,

    /// LLM identifier (preset name or provider model id)
    #[arg(long, default_value = "gpt-4.1")]
    pub llm: String,

    /// Dataset name (e.g. dl19, scifact)
    #[arg(long)]
    pub dataset: String,

    /// Input queries TSV (qid \t text)
    #[arg(long)]
    pub queries: PathBuf,

    /// Output TSV for reformulated queries
    #[arg(long)]
    pub output: PathBuf,

    /// Experiment config YAML
    #[arg(long, default_value = "configs/default.yaml")]
    pub config: PathBuf,

    /// Override the prompt bank path
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Retriever for fetching contexts (needed by csqe and lamer)
    #[arg(long)]
    pub contexts_from: Option<String>,

    /// Override max output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Override sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

#[derive(Args)]
pub struct RetrieveArgs {
    /// Reformulated queries TSV
    #[arg(long)]
    pub queries: PathBuf,

    /// Dataset name
    #[arg(long)]
    pub dataset: String,

    /// Directory for run files
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Retrievers to run
    #[arg(long, num_args = 1.., default_values = ["bm25", "splade", "bge"])]
    pub retrievers: Vec<String>,

    #[arg(long, default_value_t = 1000)]
    pub hits: usize,

    #[arg(long, default_value_t = 16)]
    pub threads: usize,

    #[arg(long, default_value_t = 512)]
    pub batch_size: usize,
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Directory containing {dataset}.{retriever}.run files
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Datasets to evaluate (default: all registered)
    #[arg(long, num_args = 1..)]
    pub datasets: Vec<String>,

    /// Retrievers to evaluate (default: all registered)
    #[arg(long, num_args = 1..)]
    pub retrievers: Vec<String>,

    /// Judgment file for the dlhard dataset
    #[arg(long)]
    pub dlhard_qrels: Option<PathBuf>,

    /// Output CSV path (a sibling .json is written alongside)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PipelineArgs {
    /// Experiment config YAML
    #[arg(long, default_value = "configs/default.yaml")]
    pub config: PathBuf,

    /// Override the methods list
    #[arg(long, num_args = 1..)]
    pub methods: Vec<String>,

    /// Override the LLMs list
    #[arg(long, num_args = 1..)]
    pub llms: Vec<String>,

    /// Override the datasets list
    #[arg(long, num_args = 1..)]
    pub datasets: Vec<String>,

    /// Override the retrievers list
    #[arg(long, num_args = 1..)]
    pub retrievers: Vec<String>,

    /// Directory with {dataset}.tsv query files
    #[arg(long)]
    pub queries_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Judgment file for the dlhard dataset
    #[arg(long)]
    pub dlhard_qrels: Option<PathBuf>,
}
