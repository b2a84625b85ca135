//! Command implementations shared by the CLI and the stdio tools.
//!
//! Each command returns the text it would print so the tool handlers can
//! wrap the same output.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sentinel_core::config::{load_config, SentinelConfig, SentinelPaths};
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::state::{RecordOutcome, SentinelStatus, VerdictStore};
use sentinel_core::{diagnose, issue, process, report, CancelToken, StatusThresholds, WatchLoop};
use sentinel_protocol::AtomVerdict;

pub const BIN_NAME: &str = "hotreload-sentinel";
pub const WATCH_RUN_COMMAND: &str = "_watch-run";

const STOP_WAIT: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(100);

pub struct AppContext {
    pub config: SentinelConfig,
    pub config_path: Option<PathBuf>,
    pub paths: SentinelPaths,
    /// Binary re-invoked for the daemon and follow subprocesses.
    pub exe: PathBuf,
}

impl AppContext {
    /// Resolves paths from the environment. A config file that fails to
    /// load is returned alongside a default-config context so the caller
    /// can report it once logging is up.
    pub fn load(config_path: Option<PathBuf>) -> (Self, Option<SentinelError>) {
        let (config, error) = match load_config(config_path.clone()) {
            Ok(config) => (config, None),
            Err(err) => (SentinelConfig::default(), Some(err)),
        };
        let paths = SentinelPaths::from_env(&config.paths);
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from(BIN_NAME));
        let ctx = Self {
            config,
            config_path,
            paths,
            exe,
        };
        (ctx, error)
    }

    pub fn store(&self) -> VerdictStore {
        VerdictStore::new(self.paths.state_file.clone())
    }

    pub fn thresholds(&self) -> StatusThresholds {
        self.config.watch.thresholds()
    }

    /// Arguments for a child invocation of this binary, forwarding
    /// `--config` when one was given.
    pub fn child_args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(rest.len() + 2);
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        args.extend(rest.iter().map(|arg| arg.to_string()));
        args
    }
}

pub fn watch_start(ctx: &AppContext) -> Result<String> {
    if let Some(pid) = process::running_pid(&ctx.paths.pid_file) {
        return Ok(format!("hr_watch_start: already_running pid={}", pid));
    }

    let args = ctx.child_args(&[WATCH_RUN_COMMAND]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let pid = process::spawn_detached(&ctx.exe, &args, &ctx.paths.watch_log)?;
    // The daemon rewrites this with the same pid once it is up.
    process::write_pid_file(&ctx.paths.pid_file, pid)?;
    tracing::info!(pid, log = %ctx.paths.watch_log.display(), "Watcher spawned");
    Ok(format!("hr_watch_start: started pid={}", pid))
}

fn mark_stopped(store: &VerdictStore) {
    let result = store.update(|state| {
        state.watcher_alive = false;
        state.status = Some(SentinelStatus::Idle);
    });
    if let Err(err) = result {
        tracing::warn!(error = %err, "Failed to mark watcher stopped");
    }
}

pub fn watch_stop(ctx: &AppContext) -> Result<String> {
    let Some(pid) = process::running_pid(&ctx.paths.pid_file) else {
        process::remove_pid_file(&ctx.paths.pid_file);
        mark_stopped(&ctx.store());
        return Ok("hr_watch_stop: not_running".to_string());
    };

    if !process::terminate(pid) {
        return Err(SentinelError::CommandFailed {
            command: "watch-stop".to_string(),
            details: format!("failed to signal pid {}", pid),
        });
    }
    let deadline = Instant::now() + STOP_WAIT;
    while process::is_pid_alive(pid) && Instant::now() < deadline {
        std::thread::sleep(STOP_POLL);
    }
    if process::is_pid_alive(pid) {
        tracing::warn!(pid, "Watcher still running after SIGTERM");
    }

    process::remove_pid_file(&ctx.paths.pid_file);
    mark_stopped(&ctx.store());
    Ok(format!("hr_watch_stop: stopped pid={}", pid))
}

pub fn status(ctx: &AppContext) -> String {
    report::status_report(&ctx.paths, &ctx.store(), &ctx.thresholds())
}

pub fn diagnose(ctx: &AppContext) -> String {
    let state = report::live_state(&ctx.paths, &ctx.store());
    let checks = diagnose::run_checks(&ctx.paths, &state, |name| {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    });
    diagnose::render(&ctx.paths, &state, &ctx.thresholds(), &checks)
}

pub fn report(ctx: &AppContext) -> String {
    report::report_line(&report::live_state(&ctx.paths, &ctx.store()))
}

pub fn pending_atoms(ctx: &AppContext) -> Result<String> {
    let body = report::pending_atoms_json(&ctx.store().pending());
    serde_json::to_string_pretty(&body).map_err(|err| SentinelError::json("rendering pending atoms", err))
}

/// Parses `{"0": "yes", "1": "n", ...}` as given on the command line.
pub fn parse_verdicts(raw: &str) -> std::result::Result<BTreeMap<String, AtomVerdict>, String> {
    let answers: BTreeMap<String, String> =
        serde_json::from_str(raw).map_err(|err| format!("invalid JSON for verdicts: {}", err))?;
    answers
        .into_iter()
        .map(|(index, answer)| match AtomVerdict::parse(&answer) {
            Some(verdict) => Ok((index, verdict)),
            None => Err(format!("invalid verdict '{}' for atom {}", answer, index)),
        })
        .collect()
}

pub fn record_verdict(
    ctx: &AppContext,
    apply_index: u64,
    verdicts: BTreeMap<String, AtomVerdict>,
) -> Result<RecordOutcome> {
    ctx.store().record_verdict(apply_index, verdicts)
}

pub fn draft_issue(ctx: &AppContext, include_successful: bool) -> Result<String> {
    let (path, _) = issue::draft_issue(&ctx.store(), &ctx.paths, include_successful)?;
    Ok(format!("draft_issue: written to {}", path.display()))
}

/// Daemon body: owns the PID file for as long as the loop runs.
pub fn watch_run(ctx: &AppContext, cancel: &CancelToken) -> Result<()> {
    let pid = std::process::id();
    process::write_pid_file(&ctx.paths.pid_file, pid)?;

    let result = WatchLoop::new(ctx.paths.clone(), &ctx.config.watch)
        .and_then(|mut watch| watch.run(cancel));

    if process::read_pid_file(&ctx.paths.pid_file) == Some(pid) {
        process::remove_pid_file(&ctx.paths.pid_file);
    }
    result
}

#[cfg(test)]
pub(crate) fn test_context(dir: &std::path::Path) -> AppContext {
    use sentinel_core::config::PathsConfig;

    let config = SentinelConfig::default();
    let paths = SentinelPaths::resolve(
        &PathsConfig {
            tmp_dir: Some(dir.to_path_buf()),
            ..PathsConfig::default()
        },
        |_| None,
    );
    AppContext {
        config,
        config_path: None,
        paths,
        exe: PathBuf::from("/nonexistent/hotreload-sentinel"),
    }
}
