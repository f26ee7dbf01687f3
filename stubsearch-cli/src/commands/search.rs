use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use stubsearch_core::error::{ConfigError, SearchError};
use stubsearch_core::oracle::TscOracle;
use stubsearch_core::pipeline::{RunSummary, SearchRunner};
use stubsearch_core::progress::{IndicatifReporter, NoopReporter, ProgressReporter};
use stubsearch_core::rerank::RerankerModel;
use stubsearch_core::store::ProjectRecord;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Project roots (each with a tsconfig.json)
    pub projects: Vec<PathBuf>,

    /// File listing one project root per line (`#` comments allowed)
    #[arg(long)]
    pub projects_file: Option<PathBuf>,

    /// Config file (default: ./stubsearch.toml when present)
    #[arg(long, env = "STUBSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory for the trial log and patches
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Projects searched in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Oracle calls per project, baseline included
    #[arg(long)]
    pub trial_max: Option<usize>,

    /// Reranker model to order candidates with
    #[arg(long)]
    pub model: Option<PathBuf>,
}

pub async fn run(args: SearchArgs, quiet: bool) -> anyhow::Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(dir) = args.out_dir {
        config.output.dir = dir;
    }
    if let Some(n) = args.concurrency {
        config.search.concurrency = n;
    }
    if let Some(n) = args.trial_max {
        config.search.trial_max = n;
    }
    if let Some(model) = args.model {
        config.rerank.model = Some(model);
    }
    config.validate().map_err(SearchError::from)?;

    let mut projects = args.projects;
    if let Some(list) = &args.projects_file {
        let text = std::fs::read_to_string(list)
            .with_context(|| format!("Cannot read projects file {}", list.display()))?;
        projects.extend(parse_project_list(&text));
    }
    if projects.is_empty() {
        return Err(SearchError::from(ConfigError::Invalid(
            "no projects given; pass paths or --projects-file".into(),
        ))
        .into());
    }

    info!(
        projects = projects.len(),
        concurrency = config.search.concurrency,
        trial_max = config.search.trial_max,
        "Starting search"
    );
    let oracle = Arc::new(TscOracle::new(&config.oracle));
    let reporter: Arc<dyn ProgressReporter> = if quiet {
        Arc::new(NoopReporter)
    } else {
        Arc::new(IndicatifReporter::new())
    };
    let model = match &config.rerank.model {
        Some(path) => Some(
            RerankerModel::load(path)
                .map_err(SearchError::from)
                .with_context(|| format!("Cannot load reranker model {}", path.display()))?,
        ),
        None => None,
    };

    let mut runner = SearchRunner::new(config, oracle).with_reporter(reporter);
    if let Some(model) = model {
        runner = runner.with_model(model);
    }
    let summary = runner.run(&projects).await.context("Search run failed")?;
    if !quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn parse_project_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

fn print_summary(summary: &RunSummary) {
    for record in &summary.records {
        println!("{:<48} {}", record.project, describe(record));
    }
    println!();
    println!(
        "{} projects, {} searched, {} improved",
        summary.records.len(),
        summary.searched(),
        summary.improved()
    );
    println!("Trial log: {}", summary.log_path.display());
}

fn describe(record: &ProjectRecord) -> String {
    if let Some(reason) = &record.skip_reason {
        return format!("skipped ({reason})");
    }
    let Some(outcome) = &record.outcome else {
        return "no outcome".to_string();
    };
    let before = record.baseline.as_ref().map_or(0, |b| b.core_total);
    match record.chosen_trial() {
        Some(chosen) => format!(
            "{} core {before} -> {} ({} trials, {})",
            chosen.trial.candidate_id,
            chosen.trial.core_diagnostic_count,
            outcome.trials_run,
            outcome.stop_reason.as_str()
        ),
        None => format!(
            "no valid trial ({} trials, {})",
            outcome.trials_run,
            outcome.stop_reason.as_str()
        ),
    }
}
