use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use sentinel_protocol::AtomVerdict;
use tempfile::NamedTempFile;

use super::types::{OverallVerdict, SentinelState, VerdictEntry};
use crate::error::{Result, SentinelError};

/// Verdict history bound; oldest entries are evicted first.
pub const MAX_VERDICTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(OverallVerdict),
    NotFound,
}

/// Appends an entry and evicts the oldest beyond [`MAX_VERDICTS`].
pub fn push_verdict(state: &mut SentinelState, entry: VerdictEntry) {
    state.verdicts.push(entry);
    if state.verdicts.len() > MAX_VERDICTS {
        let excess = state.verdicts.len() - MAX_VERDICTS;
        state.verdicts.drain(..excess);
    }
}

#[derive(Debug, Clone)]
pub struct VerdictStore {
    path: PathBuf,
}

impl VerdictStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state document. Never fails: a missing, empty or corrupt
    /// file reads as a fresh state.
    pub fn read(&self) -> SentinelState {
        if !self.path.exists() {
            return SentinelState::default();
        }

        let content = match fs_err::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read state file, using empty state");
                return SentinelState::default();
            }
        };

        if content.trim().is_empty() {
            return SentinelState::default();
        }

        match serde_json::from_str::<SentinelState>(&content) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "Corrupt state file, using empty state"
                );
                SentinelState::default()
            }
        }
    }

    /// Writes the whole document atomically.
    pub fn write(&self, state: &SentinelState) -> Result<()> {
        let write_failed = |details: String| SentinelError::StateWriteFailed {
            path: self.path.clone(),
            details,
        };

        let content = serde_json::to_string(state)
            .map_err(|err| SentinelError::json("serializing state", err))?;

        let parent_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs_err::create_dir_all(parent_dir).map_err(|err| write_failed(err.to_string()))?;

        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|err| write_failed(err.to_string()))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| write_failed(err.to_string()))?;
        temp_file
            .flush()
            .map_err(|err| write_failed(err.to_string()))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| write_failed(err.error.to_string()))?;

        Ok(())
    }

    /// Read-modify-write helper; returns the state as written.
    pub fn update<F>(&self, mutate: F) -> Result<SentinelState>
    where
        F: FnOnce(&mut SentinelState),
    {
        let mut state = self.read();
        mutate(&mut state);
        self.write(&state)?;
        Ok(state)
    }

    pub fn append_verdict(&self, entry: VerdictEntry) -> Result<()> {
        self.update(|state| push_verdict(state, entry)).map(|_| ())
    }

    /// Entries with atoms and no recorded answers, oldest first.
    pub fn pending(&self) -> Vec<VerdictEntry> {
        self.read()
            .verdicts
            .into_iter()
            .filter(VerdictEntry::is_pending)
            .collect()
    }

    /// Stores the per-atom answers for an apply event and derives the
    /// aggregate. When several entries share the index, the newest wins.
    pub fn record_verdict(
        &self,
        apply_index: u64,
        atom_verdicts: BTreeMap<String, AtomVerdict>,
    ) -> Result<RecordOutcome> {
        let mut state = self.read();
        let Some(entry) = state
            .verdicts
            .iter_mut()
            .rev()
            .find(|entry| entry.apply_index == apply_index)
        else {
            return Ok(RecordOutcome::NotFound);
        };

        let verdict = OverallVerdict::from_atom_verdicts(&atom_verdicts);
        entry.atom_verdicts = atom_verdicts;
        entry.verdict = Some(verdict);

        self.write(&state)?;
        Ok(RecordOutcome::Recorded(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::ChangeKind;
    use crate::state::types::AtomInfo;
    use tempfile::tempdir;

    fn entry(apply_index: u64) -> VerdictEntry {
        VerdictEntry {
            apply_index,
            artifact_pair: format!("Page.{}.1", apply_index),
            verdict: None,
            atoms: vec![
                AtomInfo {
                    kind: ChangeKind::Modify,
                    control_hint: "Label".into(),
                    change_summary: "Changed `a` → `b`".into(),
                    file: "Page.cs".into(),
                    line_hint: 3,
                },
                AtomInfo {
                    kind: ChangeKind::Add,
                    control_hint: "Button".into(),
                    change_summary: "Added Button()".into(),
                    file: "Page.cs".into(),
                    line_hint: 9,
                },
            ],
            atom_verdicts: BTreeMap::new(),
        }
    }

    fn answers(pairs: &[(&str, AtomVerdict)]) -> BTreeMap<String, AtomVerdict> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn read_missing_file_is_empty_state() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));

        assert_eq!(store.read(), SentinelState::default());
    }

    #[test]
    fn corrupt_file_reads_as_empty_state() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = VerdictStore::new(&path);

        assert_eq!(store.read(), SentinelState::default());
    }

    #[test]
    fn write_then_read_round_trips_and_leaves_no_temp_files() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("nested").join("state.json"));
        let mut state = SentinelState {
            watcher_alive: true,
            watcher_pid: Some(42),
            ..SentinelState::default()
        };
        state.counters.apply_count = 7;

        store.write(&state).unwrap();

        assert_eq!(store.read(), state);
        let files: Vec<_> = std::fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn append_keeps_most_recent_fifty() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));

        for index in 1..=60 {
            store.append_verdict(entry(index)).unwrap();
        }

        let verdicts = store.read().verdicts;
        assert_eq!(verdicts.len(), MAX_VERDICTS);
        assert_eq!(verdicts.first().unwrap().apply_index, 11);
        assert_eq!(verdicts.last().unwrap().apply_index, 60);
    }

    #[test]
    fn record_verdict_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));
        store.append_verdict(entry(3)).unwrap();
        let all_yes = answers(&[("0", AtomVerdict::Yes), ("1", AtomVerdict::Yes)]);

        let first = store.record_verdict(3, all_yes.clone()).unwrap();
        let second = store.record_verdict(3, all_yes).unwrap();

        assert_eq!(first, RecordOutcome::Recorded(OverallVerdict::AllGood));
        assert_eq!(second, RecordOutcome::Recorded(OverallVerdict::AllGood));
    }

    #[test]
    fn record_verdict_aggregates() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));
        store.append_verdict(entry(1)).unwrap();
        store.append_verdict(entry(2)).unwrap();

        let mixed = store
            .record_verdict(1, answers(&[("0", AtomVerdict::Yes), ("1", AtomVerdict::No)]))
            .unwrap();
        let skipped = store.record_verdict(2, BTreeMap::new()).unwrap();

        assert_eq!(mixed, RecordOutcome::Recorded(OverallVerdict::Mixed));
        assert_eq!(skipped, RecordOutcome::Recorded(OverallVerdict::Skipped));
        let state = store.read();
        assert_eq!(state.verdicts[0].verdict, Some(OverallVerdict::Mixed));
        assert_eq!(state.verdicts[0].atom_verdict(1), Some(AtomVerdict::No));
    }

    #[test]
    fn record_verdict_unknown_index_is_not_found() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));
        store.append_verdict(entry(1)).unwrap();

        let outcome = store.record_verdict(99, BTreeMap::new()).unwrap();

        assert_eq!(outcome, RecordOutcome::NotFound);
    }

    #[test]
    fn pending_excludes_answered_entries() {
        let temp = tempdir().unwrap();
        let store = VerdictStore::new(temp.path().join("state.json"));
        store.append_verdict(entry(1)).unwrap();
        store.append_verdict(entry(2)).unwrap();
        let mut empty = entry(3);
        empty.atoms.clear();
        store.append_verdict(empty).unwrap();

        store
            .record_verdict(1, answers(&[("0", AtomVerdict::Yes)]))
            .unwrap();

        let pending = store.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].apply_index, 2);
    }
}
