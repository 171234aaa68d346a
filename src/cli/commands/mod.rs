//! Command implementations for the wtmp-qaqc CLI
//!
//! Each subcommand lives in its own module:
//! - `flag`: one logger file through the QAQC pipeline into the tidy folder
//! - `compile`: a station's tidy files into the annual record
//! - `summary`: flag counts and statistics for one tidy file

pub mod compile;
pub mod flag;
pub mod shared;
pub mod summary;

use crate::cli::args::{Args, Commands};
use anyhow::Result;
use tracing::debug;

/// Set up logging and dispatch to the subcommand
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);

    let show_progress = args.show_progress();
    match args.command {
        Some(Commands::Flag(flag_args)) => flag::run_flag(flag_args, show_progress).await,
        Some(Commands::Compile(compile_args)) => {
            compile::run_compile(compile_args, show_progress).await
        }
        Some(Commands::Summary(summary_args)) => summary::run_summary(summary_args).await,
        None => Ok(()),
    }
}

/// Structured logging to stderr, level from -v/-q or `RUST_LOG`
fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wtmp_qaqc={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}
