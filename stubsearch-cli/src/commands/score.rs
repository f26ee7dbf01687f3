use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use stubsearch_core::error::SearchError;
use stubsearch_core::rerank::{FeatureMap, RerankerModel};

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Model JSON written by `stubsearch train`
    #[arg(long)]
    pub model: PathBuf,

    /// Feature map of candidate A as a JSON object
    #[arg(long)]
    pub a: String,

    /// Feature map of candidate B as a JSON object
    #[arg(long)]
    pub b: String,
}

pub fn run(args: &ScoreArgs) -> anyhow::Result<()> {
    let model = RerankerModel::load(&args.model)
        .map_err(SearchError::from)
        .with_context(|| format!("Cannot load model {}", args.model.display()))?;
    let a: FeatureMap = serde_json::from_str(&args.a).context("--a is not a JSON feature map")?;
    let b: FeatureMap = serde_json::from_str(&args.b).context("--b is not a JSON feature map")?;
    println!("{:.6}", model.score(&a, &b));
    Ok(())
}
