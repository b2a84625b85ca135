//! # sentinel-core
//!
//! Core library for the hot reload sentinel. It watches a managed runtime's
//! patch-and-reload cycle and turns the raw evidence into verdicts:
//!
//! - the session log, tailed incrementally ([`logtail`]),
//! - heartbeat pings from the running app ([`endpoints`], [`heartbeat`]),
//! - before/after source snapshots ([`artifacts`], [`diff`], [`atoms`]).
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The watcher is one sequential loop.
//! - **Graceful degradation**: Missing files and unreachable endpoints yield
//!   empty results for the cycle, not errors.
//! - **One shared document**: Every process (watcher daemon, one-shot
//!   commands, the stdio server) communicates only through the state file,
//!   rewritten atomically by [`state::VerdictStore`]. Last writer wins.

pub mod artifacts;
pub mod atoms;
pub mod cancel;
pub mod config;
pub mod counter;
pub mod diagnose;
pub mod diff;
pub mod endpoints;
pub mod error;
pub mod heartbeat;
pub mod issue;
pub mod logtail;
pub mod patterns;
pub mod process;
pub mod report;
pub mod state;
pub mod status;
pub mod watch;

pub use artifacts::ArtifactPair;
pub use atoms::{ChangeAtom, ChangeKind};
pub use cancel::CancelToken;
pub use config::{load_config, SentinelConfig, SentinelPaths};
pub use counter::UpdateCounter;
pub use endpoints::EndpointInfo;
pub use error::{Result, SentinelError};
pub use heartbeat::{HeartbeatPayload, HeartbeatPoller, HeartbeatResult};
pub use logtail::{LogMarkers, LogTailer};
pub use state::{
    AtomInfo, LogCounters, OverallVerdict, RecordOutcome, SentinelState, SentinelStatus,
    VerdictEntry, VerdictStore,
};
pub use status::{compute_status, StatusThresholds};
pub use watch::WatchLoop;
