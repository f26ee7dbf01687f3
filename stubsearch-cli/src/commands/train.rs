use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use stubsearch_core::error::SearchError;
use stubsearch_core::rerank::{TrainOptions, read_pairs, train};

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pair file written by `stubsearch pairs`
    #[arg(long)]
    pub pairs: PathBuf,

    /// Where to write the model JSON
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.05)]
    pub lr: f64,

    /// L2 penalty
    #[arg(long, default_value_t = 1e-4)]
    pub l2: f64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Probability that a project is held out for testing
    #[arg(long, default_value_t = 0.2)]
    pub test_frac: f64,
}

pub fn run(args: &TrainArgs) -> anyhow::Result<()> {
    let pairs = read_pairs(&args.pairs)
        .map_err(SearchError::from)
        .with_context(|| format!("Cannot read pairs {}", args.pairs.display()))?;
    let opts = TrainOptions {
        epochs: args.epochs,
        lr: args.lr,
        l2: args.l2,
        seed: args.seed,
        test_frac: args.test_frac,
        ..TrainOptions::default()
    };
    let (model, report) = train(&pairs, &opts).map_err(SearchError::from)?;
    model
        .save(&args.out)
        .map_err(SearchError::from)
        .with_context(|| format!("Cannot write model {}", args.out.display()))?;

    println!(
        "Trained on {} pairs ({} projects), held out {} pairs ({} projects)",
        report.train_pairs, report.train_projects, report.test_pairs, report.test_projects
    );
    println!("  train accuracy: {:.3}", report.train_accuracy);
    match report.test_accuracy {
        Some(acc) => println!("  test accuracy:  {acc:.3}"),
        None => println!("  test accuracy:  n/a"),
    }
    println!("Model: {}", args.out.display());
    Ok(())
}
