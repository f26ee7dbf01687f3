use clap::Parser;

use stubsearch_core::error::{ConfigError, OracleError, RerankError, SearchError, StoreError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "stubsearch",
    version,
    about = "Search for declaration patches that quiet a TypeScript project's type errors"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
///   0  success
///   1  general/unknown error
///   2  configuration error
///   3  type checker unavailable
///   4  trial log, pair file or model I/O
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<SearchError>() {
            return match e {
                SearchError::Config(_) => 2,
                SearchError::Oracle(OracleError::Unavailable { .. }) => 3,
                SearchError::Store(_) | SearchError::Rerank(_) => 4,
                _ => 1,
            };
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
        if matches!(cause.downcast_ref::<OracleError>(), Some(OracleError::Unavailable { .. })) {
            return 3;
        }
        if cause.is::<StoreError>() || cause.is::<RerankError>() {
            return 4;
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command, cli.quiet)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
