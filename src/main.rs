//! Thin CLI entry point: wraps a child command and, on crash, drives the
//! pipeline. Argument parsing is the minimal `clap::Parser` surface needed
//! to accept a command line - help/version text, interactive confirmation,
//! and TUI rendering of the diff are external collaborators by design.

use clap::Parser;
use tokio::sync::watch;
use tsugix::config::Config;
use tsugix::pipeline::{Outcome, Pipeline};
use tsugix::runner;

#[derive(Debug, Parser)]
#[command(name = "tsugix", about = "Wrap a command, diagnose its crash, and ask an LLM for a fix")]
struct Args {
    /// The command to run, e.g. `tsugix -- python app.py`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.command.is_empty() {
        eprintln!("tsugix: no command given");
        std::process::exit(1);
    }

    let command = args.command.join(" ");
    let working_directory = std::env::current_dir()?;

    let Some(report) = runner::run(&command, &working_directory).await? else {
        return Ok(());
    };

    let config = Config::load();
    let mut pipeline = Pipeline::new(config.clone());
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let confirm = |_fix: &tsugix::model::FixSuggestion| config.auto_apply;

    let outcome = pipeline.run(&report, &confirm, &cancel_rx).await;

    match outcome {
        Outcome::Applied(result) => {
            eprintln!(
                "tsugix: applied fix (backup at {})",
                result.backup_path.display()
            );
        }
        Outcome::Rejected => eprintln!("tsugix: fix rejected"),
        Outcome::Failed(result) => {
            eprintln!(
                "tsugix: failed to apply fix: {}",
                result.error_message.unwrap_or_default()
            );
        }
        Outcome::Skipped => eprintln!("tsugix: skipped (no client or cancelled)"),
        Outcome::NoFix => eprintln!("tsugix: model returned no usable fix"),
        Outcome::AiError(message) => eprintln!("tsugix: LLM request failed: {message}"),
    }

    std::process::exit(report.exit_code);
}
