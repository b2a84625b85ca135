//! The watcher daemon's polling loop.
//!
//! Each cycle:
//!
//! 1. re-reads the state file (other processes may have recorded verdicts)
//! 2. scans new session log lines and adds them to the cumulative counters
//! 3. discovers heartbeat endpoints and probes them, first reachable wins;
//!    heartbeat fields are overwritten, never accumulated
//! 4. on an apply-count increase, turns the newest unseen artifact pair into
//!    change atoms and appends an unconfirmed verdict entry
//! 5. recomputes the status and writes the state back
//!
//! A failing cycle is logged and skipped. Only cancellation ends the loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crate::artifacts;
use crate::atoms;
use crate::cancel::CancelToken;
use crate::config::{SentinelPaths, WatchConfig};
use crate::endpoints;
use crate::error::Result;
use crate::heartbeat::HeartbeatPoller;
use crate::logtail::LogTailer;
use crate::state::{push_verdict, SentinelState, SentinelStatus, VerdictEntry, VerdictStore};
use crate::status::{compute_status, now_epoch_secs, StatusThresholds};

pub struct WatchLoop {
    paths: SentinelPaths,
    store: VerdictStore,
    poller: HeartbeatPoller,
    tailer: LogTailer,
    thresholds: StatusThresholds,
    interval: Duration,
    pid: u32,
    last_apply_count: u64,
    last_artifact_mtime: Option<f64>,
    /// Set when applies were counted but their artifact hasn't landed yet.
    awaiting_artifact: bool,
}

impl WatchLoop {
    pub fn new(paths: SentinelPaths, config: &WatchConfig) -> Result<Self> {
        Ok(Self {
            store: VerdictStore::new(paths.state_file.clone()),
            poller: HeartbeatPoller::new(config.heartbeat_timeout())?,
            tailer: LogTailer::new(),
            thresholds: config.thresholds(),
            interval: config.poll_interval(),
            pid: std::process::id(),
            last_apply_count: 0,
            last_artifact_mtime: None,
            awaiting_artifact: false,
            paths,
        })
    }

    pub fn store(&self) -> &VerdictStore {
        &self.store
    }

    /// Marks the watcher alive and snapshots the starting point: log end,
    /// apply count, and newest existing artifact. Nothing before this point
    /// is attributed to later applies.
    pub fn start(&mut self) -> Result<()> {
        self.tailer.seek_to_end(&self.paths.session_log);
        self.last_artifact_mtime =
            artifacts::find_latest(&self.paths.hot_reload_dir, None).map(|pair| pair.mtime);

        let now = now_epoch_secs();
        let state = self.store.update(|state| {
            state.watcher_alive = true;
            state.watcher_pid = Some(self.pid);
            state.started_at = Some(now);
            state.session_log_offset = self.tailer.offset();
            state.status = Some(compute_status(state, now, &self.thresholds));
        })?;
        self.last_apply_count = state.counters.apply_count;

        tracing::info!(
            pid = self.pid,
            session_log = %self.paths.session_log.display(),
            offset = self.tailer.offset(),
            apply_count = self.last_apply_count,
            "Watcher started"
        );
        Ok(())
    }

    /// Runs one poll cycle and persists the result.
    pub fn run_cycle(&mut self) -> Result<SentinelStatus> {
        let mut state = self.store.read();
        state.watcher_alive = true;
        state.watcher_pid = Some(self.pid);

        self.merge_log(&mut state);
        self.merge_heartbeat(&mut state);
        self.record_applies(&mut state);

        let status = compute_status(&state, now_epoch_secs(), &self.thresholds);
        state.status = Some(status);
        self.store.write(&state)?;
        Ok(status)
    }

    fn merge_log(&mut self, state: &mut SentinelState) {
        let markers = self.tailer.scan(&self.paths.session_log);
        state.session_log_offset = self.tailer.offset();
        if !markers.has_activity {
            return;
        }

        state.last_log_activity_ts = Some(now_epoch_secs());
        state.counters.absorb(&markers);
        if let Some(line) = markers.last_solution_update {
            state.last_solution_update = Some(line);
        }
        tracing::debug!(
            apply_count = state.counters.apply_count,
            save_count = state.counters.save_count,
            "Session log activity"
        );
    }

    fn merge_heartbeat(&self, state: &mut SentinelState) {
        let endpoints = endpoints::discover(&self.paths.port_glob);
        state.endpoints = endpoints.iter().map(|endpoint| endpoint.url.clone()).collect();
        state.heartbeat_ok = false;
        state.last_poll_error = None;

        let pass = self.poller.poll_first_reachable(&endpoints);
        match pass.selected {
            Some((endpoint, result)) => {
                state.heartbeat_ok = true;
                state.last_heartbeat_ts = Some(now_epoch_secs());
                state.selected_endpoint = Some(endpoint.url);
                state.selected_pid = result.pid;
                state.last_heartbeat_update_count = result.update_count;
                state.last_heartbeat_update_ts = result.last_update_timestamp;
            }
            None => state.last_poll_error = pass.last_error,
        }
    }

    fn record_applies(&mut self, state: &mut SentinelState) {
        let apply_count = state.counters.apply_count;
        if apply_count > self.last_apply_count {
            self.awaiting_artifact = true;
        }
        // Another process may have reset the state file.
        self.last_apply_count = apply_count;

        if !self.awaiting_artifact {
            return;
        }
        let Some(pair) = artifacts::find_latest(&self.paths.hot_reload_dir, self.last_artifact_mtime)
        else {
            return;
        };
        self.awaiting_artifact = false;
        self.last_artifact_mtime = Some(pair.mtime);

        let atoms = atoms::extract(&pair.old_path, &pair.new_path);
        tracing::info!(
            apply_index = apply_count,
            artifact = %pair.source_file,
            atoms = atoms.len(),
            "Apply observed"
        );
        if !atoms.is_empty() {
            push_verdict(state, VerdictEntry::unconfirmed(apply_count, pair.name, &atoms));
        }
    }

    fn shutdown(&self) {
        let result = self.store.update(|state| {
            state.watcher_alive = false;
            state.status = Some(SentinelStatus::Idle);
        });
        if let Err(err) = result {
            tracing::warn!(error = %err, "Failed to mark watcher stopped");
        }
        tracing::info!(pid = self.pid, "Watcher stopped");
    }

    /// Starts, then cycles until `cancel` trips. The state is marked not
    /// alive on the way out.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        self.start()?;

        while !cancel.is_cancelled() {
            match catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(status)) => tracing::trace!(status = %status, "Cycle complete"),
                Ok(Err(err)) => tracing::warn!(error = %err, "Watch cycle failed"),
                Err(_) => tracing::error!("Watch cycle panicked"),
            }
            if !cancel.sleep(self.interval) {
                break;
            }
        }

        self.shutdown();
        Ok(())
    }
}
