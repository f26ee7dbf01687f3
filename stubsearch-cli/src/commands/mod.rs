pub mod init;
pub mod pairs;
pub mod score;
pub mod search;
pub mod train;

use std::path::Path;

use anyhow::Context;
use clap::Subcommand;

use stubsearch_core::config::{CONFIG_FILE, SearchConfig};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default stubsearch.toml
    Init(init::InitArgs),
    /// Search declaration patches for one or more projects
    Search(search::SearchArgs),
    /// Export pairwise reranker training data from trial logs
    Pairs(pairs::PairsArgs),
    /// Train the pairwise reranker
    Train(train::TrainArgs),
    /// Score two feature vectors with a trained reranker
    Score(score::ScoreArgs),
}

pub async fn run(cmd: Command, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(&args),
        Command::Search(args) => search::run(args, quiet).await,
        Command::Pairs(args) => pairs::run(&args),
        Command::Train(args) => train::run(&args),
        Command::Score(args) => score::run(&args),
    }
}

/// Load an explicit config file, else `./stubsearch.toml` when present,
/// else defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<SearchConfig> {
    if let Some(path) = explicit {
        return SearchConfig::load(path).with_context(|| format!("Cannot load config {}", path.display()));
    }
    let local = Path::new(CONFIG_FILE);
    if local.is_file() {
        return SearchConfig::load(local).with_context(|| format!("Cannot load config {CONFIG_FILE}"));
    }
    Ok(SearchConfig::default())
}
