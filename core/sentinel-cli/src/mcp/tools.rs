//! `tools/call` handlers. Each returns the text payload or a structured
//! error; panics are caught one level up.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sentinel_core::report;
use sentinel_core::state::RecordOutcome;
use sentinel_core::{process, SentinelError};
use sentinel_protocol::{
    DraftIssueArgs, RecordVerdictArgs, RpcError, ToolName, WatchFollowArgs, DEFAULT_FOLLOW_SECONDS,
};

use crate::commands::{self, AppContext};

fn server_error(err: SentinelError) -> RpcError {
    RpcError::server_error(err.to_string())
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, RpcError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|err| RpcError::server_error(format!("Invalid arguments: {}", err)))
}

/// Effective follow duration: zero means the default, capped at `max`.
pub fn follow_seconds(requested: u64, max: u64) -> u64 {
    let seconds = if requested == 0 {
        DEFAULT_FOLLOW_SECONDS
    } else {
        requested
    };
    seconds.min(max.max(1))
}

fn watch_follow(ctx: &AppContext, args: WatchFollowArgs) -> Result<String, RpcError> {
    let seconds = follow_seconds(args.seconds, ctx.config.server.max_follow_secs);
    let seconds_arg = seconds.to_string();
    let args = ctx.child_args(&["watch-follow", "--no-confirm", "--seconds", &seconds_arg]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let timeout = Duration::from_secs(seconds) + ctx.config.server.command_timeout();

    let output = process::run_with_timeout(&ctx.exe, &args, timeout).map_err(server_error)?;
    Ok(output.stdout)
}

fn record_verdict(ctx: &AppContext, args: RecordVerdictArgs) -> Result<String, RpcError> {
    match commands::record_verdict(ctx, args.apply_index, args.verdicts).map_err(server_error)? {
        RecordOutcome::Recorded(verdict) => {
            Ok(report::recorded_verdict_json(args.apply_index, verdict).to_string())
        }
        RecordOutcome::NotFound => Err(RpcError::server_error(format!(
            "No verdict entry found for apply_index={}",
            args.apply_index
        ))),
    }
}

pub fn call(ctx: &AppContext, tool: ToolName, arguments: Value) -> Result<String, RpcError> {
    tracing::debug!(tool = %tool, "Tool call");
    match tool {
        ToolName::WatchStart => commands::watch_start(ctx).map_err(server_error),
        ToolName::WatchStop => commands::watch_stop(ctx).map_err(server_error),
        ToolName::Status => Ok(commands::status(ctx)),
        ToolName::Diagnose => Ok(commands::diagnose(ctx)),
        ToolName::Report => Ok(commands::report(ctx)),
        ToolName::WatchFollow => watch_follow(ctx, parse_args(arguments)?),
        ToolName::PendingAtoms => commands::pending_atoms(ctx).map_err(server_error),
        ToolName::RecordVerdict => record_verdict(ctx, parse_args(arguments)?),
        ToolName::DraftIssue => {
            let args: DraftIssueArgs = parse_args(arguments)?;
            commands::draft_issue(ctx, args.include_successful).map_err(server_error)
        }
    }
}
