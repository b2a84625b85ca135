//! Incremental session log tailing.
//!
//! The runtime appends to `Session.log` while we read it, so every scan
//! opens the file in shared read mode, seeks to the saved offset and
//! consumes complete lines only. A trailing line without its newline is left
//! for the next scan; two partial scans therefore count exactly what one
//! whole-file scan would.
//!
//! Classification is a table of `(pattern, marker)` pairs evaluated in order
//! for every line. Patterns are independent: a line matching several of them
//! bumps every matching counter. The one exception is the "changes not
//! applied" pair, where the stricter other-target-framework pattern is tested
//! first and exactly one counter moves.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::{
    RE_APPLY, RE_CONNECTION_LOST, RE_ENC1008, RE_LAST_SOLUTION_UPDATE, RE_NOT_APPLIED,
    RE_NOT_APPLIED_OTHER_TFM, RE_RESULT_BLOCKED, RE_RESULT_SUCCESS, RE_SAVE,
    RE_XAML_APPLY, RE_XAML_CHANGE, RE_XAML_CODE_BEHIND_CHANGE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Save,
    Apply,
    XamlCodeBehindChange,
    XamlChange,
    XamlApply,
    Enc1008,
    ResultSuccess,
    ResultFailure,
    ConnectionLost,
}

static CLASSIFIERS: Lazy<Vec<(&'static Regex, Marker)>> = Lazy::new(|| {
    vec![
        (&*RE_SAVE, Marker::Save),
        (&*RE_APPLY, Marker::Apply),
        (&*RE_XAML_CODE_BEHIND_CHANGE, Marker::XamlCodeBehindChange),
        (&*RE_XAML_CHANGE, Marker::XamlChange),
        (&*RE_XAML_APPLY, Marker::XamlApply),
        (&*RE_ENC1008, Marker::Enc1008),
        (&*RE_RESULT_SUCCESS, Marker::ResultSuccess),
        (&*RE_RESULT_BLOCKED, Marker::ResultFailure),
        (&*RE_CONNECTION_LOST, Marker::ConnectionLost),
    ]
});

/// Counts observed in one incremental scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMarkers {
    pub save_count: u32,
    pub apply_count: u32,
    pub xaml_code_behind_change_count: u32,
    pub xaml_change_count: u32,
    pub xaml_apply_count: u32,
    pub enc1008_count: u32,
    pub result_success_count: u32,
    pub result_failure_count: u32,
    pub not_applied_count: u32,
    pub not_applied_other_tfm_count: u32,
    pub connection_lost_count: u32,
    pub last_solution_update: Option<String>,
    pub has_activity: bool,
}

impl LogMarkers {
    fn bump(&mut self, marker: Marker) {
        let counter = match marker {
            Marker::Save => &mut self.save_count,
            Marker::Apply => &mut self.apply_count,
            Marker::XamlCodeBehindChange => &mut self.xaml_code_behind_change_count,
            Marker::XamlChange => &mut self.xaml_change_count,
            Marker::XamlApply => &mut self.xaml_apply_count,
            Marker::Enc1008 => &mut self.enc1008_count,
            Marker::ResultSuccess => &mut self.result_success_count,
            Marker::ResultFailure => &mut self.result_failure_count,
            Marker::ConnectionLost => &mut self.connection_lost_count,
        };
        *counter += 1;
    }

    /// Classifies one log line into these markers.
    pub fn observe_line(&mut self, line: &str) {
        for (pattern, marker) in CLASSIFIERS.iter() {
            if pattern.is_match(line) {
                self.bump(*marker);
            }
        }

        if RE_NOT_APPLIED.is_match(line) {
            if RE_NOT_APPLIED_OTHER_TFM.is_match(line) {
                self.not_applied_other_tfm_count += 1;
            } else {
                self.not_applied_count += 1;
            }
        }

        if let Some(found) = RE_LAST_SOLUTION_UPDATE.find(line) {
            self.last_solution_update = Some(found.as_str().to_string());
        }

        self.has_activity = true;
    }
}

/// Stateful tailer remembering how far into the log it has read.
#[derive(Debug, Clone, Default)]
pub struct LogTailer {
    offset: u64,
}

impl LogTailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(offset: u64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Skips everything already in the log, so only new activity is counted.
    pub fn seek_to_end(&mut self, log_path: &Path) {
        self.offset = std::fs::metadata(log_path).map(|m| m.len()).unwrap_or(0);
    }

    /// Scans new complete lines since the saved offset.
    ///
    /// A missing file yields empty markers and leaves the offset alone. Any
    /// I/O failure does the same; the next scan simply retries.
    pub fn scan(&mut self, log_path: &Path) -> LogMarkers {
        match self.try_scan(log_path) {
            Ok(markers) => markers,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(
                        error = %err,
                        path = %log_path.display(),
                        "Session log scan failed; skipping this cycle"
                    );
                }
                LogMarkers::default()
            }
        }
    }

    fn try_scan(&mut self, log_path: &Path) -> std::io::Result<LogMarkers> {
        let mut file = File::open(log_path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            tracing::info!(
                path = %log_path.display(),
                previous_offset = self.offset,
                len,
                "Session log shrank; rescanning from the start"
            );
            self.offset = 0;
        }
        file.seek(SeekFrom::Start(self.offset))?;

        let mut markers = LogMarkers::default();
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        let mut consumed = self.offset;

        loop {
            buffer.clear();
            let read = reader.read_until(b'\n', &mut buffer)?;
            if read == 0 || buffer.last() != Some(&b'\n') {
                break;
            }
            consumed += read as u64;
            let line = String::from_utf8_lossy(&buffer);
            markers.observe_line(line.trim_end_matches(['\r', '\n']));
        }

        self.offset = consumed;
        Ok(markers)
    }
}
