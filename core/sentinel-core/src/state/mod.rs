//! Shared sentinel state and verdict history.
//!
//! One JSON document holds everything: watcher liveness, cumulative log
//! counters, the latest heartbeat, and up to [`MAX_VERDICTS`] verdict
//! entries. The watcher daemon, one-shot commands and the stdio server all
//! read-modify-write the same file.
//!
//! # Consistency
//!
//! There are no locks. Each write is atomic (temp file + rename in the same
//! directory) so readers never see a torn document, but concurrent
//! read-modify-write cycles can lose updates: last writer wins.
//!
//! - [`types`]: the document and verdict records
//! - [`store`]: reading, writing, and verdict bookkeeping

mod store;
mod types;

pub use store::{push_verdict, RecordOutcome, VerdictStore, MAX_VERDICTS};
pub use types::{
    AtomInfo, LogCounters, OverallVerdict, SentinelState, SentinelStatus, VerdictEntry,
};
