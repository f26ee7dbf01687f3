use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use stubsearch_core::error::SearchError;
use stubsearch_core::rerank::{PairOptions, export_pairs, write_pairs};
use stubsearch_core::store::read_records;

#[derive(Args, Debug)]
pub struct PairsArgs {
    /// Trial log files written by `stubsearch search`
    #[arg(long = "log", required = true, num_args = 1..)]
    pub logs: Vec<PathBuf>,

    /// Output JSONL file
    #[arg(long)]
    pub out: PathBuf,

    /// Cap on pairs per project
    #[arg(long)]
    pub max_pairs_per_project: Option<usize>,

    /// Keep trials whose injection was invalid
    #[arg(long)]
    pub allow_invalid: bool,
}

pub fn run(args: &PairsArgs) -> anyhow::Result<()> {
    let mut records = Vec::new();
    for log in &args.logs {
        let mut read = read_records(log)
            .map_err(SearchError::from)
            .with_context(|| format!("Cannot read trial log {}", log.display()))?;
        records.append(&mut read);
    }
    let pairs = export_pairs(
        &records,
        &PairOptions {
            max_pairs_per_project: args.max_pairs_per_project,
            allow_invalid: args.allow_invalid,
        },
    );
    write_pairs(&args.out, &pairs)
        .map_err(SearchError::from)
        .with_context(|| format!("Cannot write {}", args.out.display()))?;
    println!(
        "Wrote {} pairs from {} projects to {}",
        pairs.len(),
        records.len(),
        args.out.display()
    );
    Ok(())
}
