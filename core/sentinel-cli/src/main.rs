//! hotreload-sentinel: watches .NET Hot Reload sessions and collects
//! per-change verdicts.
//!
//! ## Subcommands
//!
//! - `watch-start` / `watch-stop`: manage the background watcher
//! - `status`, `diagnose`, `report`: read the shared state file
//! - `watch-follow`: stream status changes and confirm change atoms
//! - `pending-atoms`, `record-verdict`, `draft-issue`: verdict workflow
//! - `mcp`: stdio request/response server exposing the same operations
//! - `_watch-run`: the watcher daemon itself (spawned by `watch-start`)

mod commands;
mod follow;
mod logging;
mod mcp;
mod signals;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sentinel_core::state::RecordOutcome;
use sentinel_core::report;

use commands::AppContext;
use follow::{FollowOptions, DEFAULT_INTERVAL_SECS};

#[derive(Parser)]
#[command(name = "hotreload-sentinel")]
#[command(about = "Hot Reload session watcher and verdict collector")]
#[command(version)]
struct Cli {
    /// Config file (default: $HOTRELOAD_SENTINEL_CONFIG or ~/.hotreload-sentinel/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the background watcher
    WatchStart,

    /// Stop the background watcher
    WatchStop,

    /// Print the current status
    Status,

    /// Check the environment and summarize counters
    Diagnose,

    /// Summarize the state file with hints
    Report,

    /// Stream status changes and apply events
    WatchFollow {
        /// Duration in seconds; 0 streams until interrupted
        #[arg(long, default_value_t = sentinel_protocol::DEFAULT_FOLLOW_SECONDS)]
        seconds: u64,

        /// Poll interval in seconds
        #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Don't prompt for atom verdicts
        #[arg(long)]
        no_confirm: bool,
    },

    /// Print unconfirmed change atoms as JSON
    PendingAtoms,

    /// Record per-atom verdicts for one apply event
    RecordVerdict {
        #[arg(long)]
        apply_index: u64,

        /// JSON object mapping atom index to yes/no/partial
        #[arg(long, value_name = "JSON")]
        verdicts_json: String,
    },

    /// Write a markdown issue draft from recorded verdicts
    DraftIssue {
        /// Also list changes confirmed as working
        #[arg(long)]
        include_successful: bool,
    },

    /// Serve the sentinel tools over stdio
    Mcp,

    /// Watcher daemon (spawned by watch-start)
    #[command(name = "_watch-run", hide = true)]
    WatchRun,
}

fn print(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", text);
    let _ = stdout.flush();
}

fn fail(message: &str) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let (ctx, config_error) = AppContext::load(cli.config);

    let _logging_guard = match cli.command {
        Commands::WatchRun => {
            logging::init_file(&ctx.paths.watch_log, logging::DAEMON_DEFAULT_LEVEL)
        }
        _ => {
            logging::init_stderr(logging::COMMAND_DEFAULT_LEVEL);
            None
        }
    };
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "Failed to load config; using defaults");
    }

    match cli.command {
        Commands::WatchStart => match commands::watch_start(&ctx) {
            Ok(line) => print(&line),
            Err(err) => fail(&err.to_string()),
        },
        Commands::WatchStop => match commands::watch_stop(&ctx) {
            Ok(line) => print(&line),
            Err(err) => fail(&err.to_string()),
        },
        Commands::Status => print(&commands::status(&ctx)),
        Commands::Diagnose => print(&commands::diagnose(&ctx)),
        Commands::Report => print(&commands::report(&ctx)),
        Commands::WatchFollow {
            seconds,
            interval,
            no_confirm,
        } => {
            match commands::watch_start(&ctx) {
                Ok(line) => print(&line),
                Err(err) => tracing::warn!(error = %err, "Could not start watcher"),
            }
            let options = FollowOptions {
                seconds,
                interval: Duration::from_secs(interval.max(1)),
                confirm: !no_confirm,
            };
            let cancel = signals::install();
            let mut stdout = std::io::stdout().lock();
            if let Err(err) = follow::stream(&ctx, &options, &cancel, &mut stdout) {
                fail(&err.to_string());
            }
        }
        Commands::PendingAtoms => match commands::pending_atoms(&ctx) {
            Ok(text) => print(&text),
            Err(err) => fail(&err.to_string()),
        },
        Commands::RecordVerdict {
            apply_index,
            verdicts_json,
        } => {
            let verdicts = match commands::parse_verdicts(&verdicts_json) {
                Ok(verdicts) => verdicts,
                Err(message) => fail(&message),
            };
            match commands::record_verdict(&ctx, apply_index, verdicts) {
                Ok(RecordOutcome::Recorded(verdict)) => {
                    print(&report::recorded_verdict_json(apply_index, verdict).to_string())
                }
                Ok(RecordOutcome::NotFound) => fail(&format!(
                    "no verdict entry found for apply_index={}",
                    apply_index
                )),
                Err(err) => fail(&err.to_string()),
            }
        }
        Commands::DraftIssue { include_successful } => {
            match commands::draft_issue(&ctx, include_successful) {
                Ok(line) => print(&line),
                Err(err) => fail(&err.to_string()),
            }
        }
        Commands::Mcp => {
            let cancel = signals::install();
            if let Err(err) = mcp::run(ctx, &cancel) {
                tracing::error!(error = %err, "Stdio server failed");
                std::process::exit(1);
            }
        }
        Commands::WatchRun => {
            let cancel = signals::install();
            if let Err(err) = commands::watch_run(&ctx, &cancel) {
                tracing::error!(error = %err, "Watcher failed");
                std::process::exit(1);
            }
        }
    }
}
