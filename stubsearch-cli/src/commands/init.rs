use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use stubsearch_core::config::{CONFIG_FILE, SearchConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the config file
    #[arg(long, default_value = CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    if args.path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            args.path.display()
        );
    }
    let text = SearchConfig::default()
        .to_toml()
        .context("Cannot render default config")?;
    std::fs::write(&args.path, text)
        .with_context(|| format!("Cannot write {}", args.path.display()))?;
    println!("Wrote {}", args.path.display());
    Ok(())
}
