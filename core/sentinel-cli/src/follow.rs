//! `watch-follow`: a foreground stream over the watcher's state file.
//!
//! The follower never writes verdict entries itself; it prints the ones the
//! watcher recorded and, on a terminal, asks the developer to confirm each
//! atom.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use sentinel_core::artifacts::{self, DEFAULT_PREVIEW_LINES};
use sentinel_core::diagnose::display_opt;
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::state::{RecordOutcome, SentinelState, VerdictEntry};
use sentinel_core::status::{compute_status, now_epoch_secs};
use sentinel_core::{report, CancelToken, SentinelStatus};
use sentinel_protocol::AtomVerdict;

use crate::commands::AppContext;

pub const DEFAULT_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowOptions {
    /// Zero streams until cancelled.
    pub seconds: u64,
    pub interval: Duration,
    pub confirm: bool,
}

fn io_err(err: io::Error) -> SentinelError {
    SentinelError::io("writing follow output", err)
}

pub fn header(options: &FollowOptions) -> String {
    let duration = if options.seconds == 0 {
        "unlimited".to_string()
    } else {
        format!("{}s", options.seconds)
    };
    format!(
        "hr_watch_follow: streaming (interval={}s, duration={}, confirm={})",
        options.interval.as_secs_f64(),
        duration,
        options.confirm
    )
}

pub fn status_line(state: &SentinelState, status: SentinelStatus) -> String {
    format!(
        "follow status={} apply_count={} heartbeat_update_count={} selected_pid={}",
        status,
        state.counters.apply_count,
        display_opt(&state.last_heartbeat_update_count),
        display_opt(&state.selected_pid),
    )
}

pub fn apply_hint(state: &SentinelState) -> &'static str {
    let advanced = state
        .last_heartbeat_update_count
        .is_some_and(|count| count >= state.counters.apply_count);
    if advanced {
        "follow_hint=Hot Reload apply observed and heartbeat advanced (likely successful)."
    } else {
        "follow_hint=Hot Reload apply observed but heartbeat did not advance (possible failure/stale process)."
    }
}

pub fn entry_lines(entry: &VerdictEntry) -> Vec<String> {
    let mut lines = vec![format!("follow_atoms_count={}", entry.atoms.len())];
    for (index, atom) in entry.atoms.iter().enumerate() {
        lines.push(format!(
            "follow_atom[{}]={} | control={} | {}:{}",
            index, atom.change_summary, atom.control_hint, atom.file, atom.line_hint
        ));
    }
    lines.push(format!(
        "follow_pending_confirmation=true apply_index={}",
        entry.apply_index
    ));
    lines
}

/// Asks about each atom in turn. An empty answer skips the atom; EOF stops
/// asking.
pub fn prompt_verdicts<R: BufRead, W: Write>(
    entry: &VerdictEntry,
    input: &mut R,
    out: &mut W,
) -> io::Result<BTreeMap<String, AtomVerdict>> {
    let mut verdicts = BTreeMap::new();
    'atoms: for (index, atom) in entry.atoms.iter().enumerate() {
        loop {
            write!(
                out,
                "confirm atom[{}] {} (y/n/p, empty to skip): ",
                index, atom.change_summary
            )?;
            out.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                break 'atoms;
            }
            if answer.trim().is_empty() {
                continue 'atoms;
            }
            match AtomVerdict::parse(&answer) {
                Some(verdict) => {
                    verdicts.insert(index.to_string(), verdict);
                    continue 'atoms;
                }
                None => writeln!(out, "please answer y, n or p")?,
            }
        }
    }
    Ok(verdicts)
}

struct Follower {
    last_line: Option<String>,
    last_apply_count: u64,
    last_entry_index: u64,
    /// Only artifacts newer than this belong to applies seen while following.
    last_artifact_mtime: Option<f64>,
}

impl Follower {
    fn new(state: &SentinelState, last_artifact_mtime: Option<f64>) -> Self {
        Self {
            last_line: None,
            last_artifact_mtime,
            last_apply_count: state.counters.apply_count,
            last_entry_index: state
                .verdicts
                .iter()
                .map(|entry| entry.apply_index)
                .max()
                .unwrap_or(0),
        }
    }
}

/// Streams until the duration elapses or `cancel` trips.
pub fn stream<W: Write>(
    ctx: &AppContext,
    options: &FollowOptions,
    cancel: &CancelToken,
    out: &mut W,
) -> Result<()> {
    let store = ctx.store();
    let thresholds = ctx.thresholds();
    let deadline = (options.seconds > 0)
        .then(|| Instant::now() + Duration::from_secs(options.seconds));
    let prompt = options.confirm && io::IsTerminal::is_terminal(&io::stdin());

    writeln!(out, "{}", header(options)).map_err(io_err)?;
    let mut follower = Follower::new(
        &store.read(),
        artifacts::find_latest(&ctx.paths.hot_reload_dir, None).map(|pair| pair.mtime),
    );

    loop {
        let state = report::live_state(&ctx.paths, &store);
        let status = compute_status(&state, now_epoch_secs(), &thresholds);

        let line = status_line(&state, status);
        if follower.last_line.as_deref() != Some(line.as_str()) {
            writeln!(out, "{}", line).map_err(io_err)?;
            follower.last_line = Some(line);
        }

        if state.counters.apply_count > follower.last_apply_count {
            writeln!(out, "{}", apply_hint(&state)).map_err(io_err)?;
            let latest =
                artifacts::find_latest(&ctx.paths.hot_reload_dir, follower.last_artifact_mtime);
            if let Some(pair) = latest {
                follower.last_artifact_mtime = Some(pair.mtime);
                writeln!(out, "follow_change_file={}", pair.source_file).map_err(io_err)?;
                let preview =
                    artifacts::diff_preview(&pair.old_path, &pair.new_path, DEFAULT_PREVIEW_LINES);
                if !preview.is_empty() {
                    writeln!(out, "follow_change_preview={}", preview).map_err(io_err)?;
                }
            }
        }
        follower.last_apply_count = state.counters.apply_count;

        let seen = follower.last_entry_index;
        for entry in state.verdicts.iter().filter(|entry| entry.apply_index > seen) {
            for line in entry_lines(entry) {
                writeln!(out, "{}", line).map_err(io_err)?;
            }
            if prompt && entry.is_pending() {
                confirm(ctx, entry, out)?;
            }
            follower.last_entry_index = entry.apply_index;
        }
        out.flush().map_err(io_err)?;

        if cancel.is_cancelled() || deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if !cancel.sleep(options.interval) {
            break;
        }
    }

    writeln!(out, "hr_watch_follow: completed").map_err(io_err)?;
    Ok(())
}

fn confirm<W: Write>(ctx: &AppContext, entry: &VerdictEntry, out: &mut W) -> Result<()> {
    let stdin = io::stdin();
    let verdicts = prompt_verdicts(entry, &mut stdin.lock(), out).map_err(io_err)?;
    let written = match ctx.store().record_verdict(entry.apply_index, verdicts)? {
        RecordOutcome::Recorded(verdict) => writeln!(
            out,
            "follow_verdict apply_index={} verdict={}",
            entry.apply_index, verdict
        ),
        RecordOutcome::NotFound => writeln!(
            out,
            "follow_verdict apply_index={} error=entry no longer present",
            entry.apply_index
        ),
    };
    written.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;
    use sentinel_core::atoms::ChangeKind;
    use sentinel_core::state::AtomInfo;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn entry(apply_index: u64) -> VerdictEntry {
        let atom = |summary: &str| AtomInfo {
            kind: ChangeKind::Modify,
            control_hint: "Label".into(),
            change_summary: summary.into(),
            file: "Page.cs".into(),
            line_hint: 6,
        };
        VerdictEntry {
            apply_index,
            artifact_pair: "Page.1.1".into(),
            verdict: None,
            atoms: vec![atom("first"), atom("second"), atom("third")],
            atom_verdicts: BTreeMap::new(),
        }
    }

    #[test]
    fn header_describes_unlimited_duration() {
        let options = FollowOptions {
            seconds: 0,
            interval: Duration::from_secs(2),
            confirm: false,
        };
        assert_eq!(
            header(&options),
            "hr_watch_follow: streaming (interval=2s, duration=unlimited, confirm=false)"
        );
    }

    #[test]
    fn hint_depends_on_heartbeat_progress() {
        let mut state = SentinelState::default();
        state.counters.apply_count = 2;
        assert!(apply_hint(&state).contains("did not advance"));

        state.last_heartbeat_update_count = Some(2);
        assert!(apply_hint(&state).contains("likely successful"));
    }

    #[test]
    fn entry_lines_list_atoms() {
        let lines = entry_lines(&entry(4));

        assert_eq!(lines[0], "follow_atoms_count=3");
        assert_eq!(lines[1], "follow_atom[0]=first | control=Label | Page.cs:6");
        assert_eq!(lines[4], "follow_pending_confirmation=true apply_index=4");
    }

    #[test]
    fn prompt_collects_answers_and_skips_blanks() {
        let mut input = Cursor::new("y\n\nwhat\np\n");
        let mut out = Vec::new();

        let verdicts = prompt_verdicts(&entry(1), &mut input, &mut out).unwrap();

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts["0"], AtomVerdict::Yes);
        assert_eq!(verdicts["2"], AtomVerdict::Partial);
        assert!(String::from_utf8(out).unwrap().contains("please answer y, n or p"));
    }

    #[test]
    fn prompt_stops_at_eof() {
        let mut input = Cursor::new("n\n");
        let mut out = Vec::new();

        let verdicts = prompt_verdicts(&entry(1), &mut input, &mut out).unwrap();

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts["0"], AtomVerdict::No);
    }

    #[test]
    fn stream_reports_new_entries_once() {
        let temp = tempdir().unwrap();
        let ctx = test_context(temp.path());
        let options = FollowOptions {
            seconds: 1,
            interval: Duration::from_millis(100),
            confirm: false,
        };
        let cancel = CancelToken::new();
        let writer = {
            let store = ctx.store();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(250));
                store
                    .update(|state| {
                        state.counters.apply_count = 1;
                        state.verdicts.push(entry(1));
                    })
                    .unwrap();
            })
        };

        let mut out = Vec::new();
        stream(&ctx, &options, &cancel, &mut out).unwrap();
        writer.join().unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("hr_watch_follow: streaming (interval=0.1s, duration=1s"));
        assert!(text.contains("follow status=IDLE apply_count=0"));
        assert!(text.contains("follow status=IDLE apply_count=1"));
        assert!(text.contains("follow_hint=Hot Reload apply observed but heartbeat did not advance"));
        assert_eq!(text.matches("follow_pending_confirmation=true apply_index=1").count(), 1);
        assert!(text.ends_with("hr_watch_follow: completed\n"));
    }

    fn write_pair(dir: &std::path::Path, stem: &str, old: &str, new: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{}.new.cs", stem)), new).unwrap();
        std::fs::write(dir.join(format!("{}.old.cs", stem)), old).unwrap();
    }

    #[test]
    fn stream_reports_only_artifacts_from_this_session() {
        let temp = tempdir().unwrap();
        let ctx = test_context(temp.path());
        let dir = ctx.paths.hot_reload_dir.clone();
        write_pair(&dir, "Stale.1.1", "a\n", "b\n");
        let options = FollowOptions {
            seconds: 1,
            interval: Duration::from_millis(100),
            confirm: false,
        };
        let cancel = CancelToken::new();
        let writer = {
            let store = ctx.store();
            let dir = dir.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(250));
                write_pair(&dir, "Fresh.2.1", "x\n", "y\n");
                store.update(|state| state.counters.apply_count = 1).unwrap();
                std::thread::sleep(Duration::from_millis(300));
                store.update(|state| state.counters.apply_count = 2).unwrap();
            })
        };

        let mut out = Vec::new();
        stream(&ctx, &options, &cancel, &mut out).unwrap();
        writer.join().unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(!text.contains("Stale.1.1.old.cs"), "{}", text);
        assert!(!text.contains("-a | +b"), "{}", text);
        assert_eq!(text.matches("follow_change_file=").count(), 1, "{}", text);
        assert!(text.contains("follow_change_file=Fresh.2.1.old.cs"), "{}", text);
        assert!(text.contains("follow_change_preview=-x | +y"), "{}", text);
        assert_eq!(text.matches("follow_hint=").count(), 2, "{}", text);
    }
}
