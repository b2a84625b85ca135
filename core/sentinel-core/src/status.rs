//! Status state machine.
//!
//! | watcher | heartbeat recent | log recent | ever reached app | status   |
//! |---------|------------------|------------|------------------|----------|
//! | dead    | any              | any        | any              | IDLE     |
//! | alive   | yes              | yes        | any              | ACTIVE   |
//! | alive   | exactly one of the two        | any              | DEGRADED |
//! | alive   | no               | no         | yes              | DEGRADED |
//! | alive   | no               | no         | no               | IDLE     |

use chrono::Utc;

use crate::state::{SentinelState, SentinelStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusThresholds {
    pub heartbeat_fresh_secs: f64,
    pub log_fresh_secs: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            heartbeat_fresh_secs: 10.0,
            log_fresh_secs: 20.0,
        }
    }
}

/// Seconds since the epoch with millisecond precision.
pub fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn is_recent(ts: Option<f64>, now: f64, window: f64) -> bool {
    ts.is_some_and(|ts| now - ts < window)
}

pub fn compute_status(
    state: &SentinelState,
    now: f64,
    thresholds: &StatusThresholds,
) -> SentinelStatus {
    if !state.watcher_alive {
        return SentinelStatus::Idle;
    }

    let heartbeat_recent = is_recent(state.last_heartbeat_ts, now, thresholds.heartbeat_fresh_secs);
    let log_recent = is_recent(state.last_log_activity_ts, now, thresholds.log_fresh_secs);

    match (heartbeat_recent, log_recent) {
        (true, true) => SentinelStatus::Active,
        (true, false) | (false, true) => SentinelStatus::Degraded,
        (false, false) if state.last_heartbeat_ts.is_some() => SentinelStatus::Degraded,
        (false, false) => SentinelStatus::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_800_000_000.0;

    fn alive(heartbeat_ago: Option<f64>, log_ago: Option<f64>) -> SentinelState {
        SentinelState {
            watcher_alive: true,
            last_heartbeat_ts: heartbeat_ago.map(|ago| NOW - ago),
            last_log_activity_ts: log_ago.map(|ago| NOW - ago),
            ..SentinelState::default()
        }
    }

    fn status(state: &SentinelState) -> SentinelStatus {
        compute_status(state, NOW, &StatusThresholds::default())
    }

    #[test]
    fn both_recent_is_active() {
        assert_eq!(status(&alive(Some(5.0), Some(5.0))), SentinelStatus::Active);
    }

    #[test]
    fn one_recent_is_degraded() {
        assert_eq!(status(&alive(Some(5.0), None)), SentinelStatus::Degraded);
        assert_eq!(status(&alive(Some(30.0), Some(15.0))), SentinelStatus::Degraded);
    }

    #[test]
    fn stale_after_earlier_heartbeat_is_degraded() {
        // The latest poll failed; the app answered 30s ago.
        let state = alive(Some(30.0), Some(30.0));
        assert!(!state.heartbeat_ok);

        assert_eq!(status(&state), SentinelStatus::Degraded);
    }

    #[test]
    fn never_reached_and_quiet_is_idle() {
        assert_eq!(status(&alive(None, Some(30.0))), SentinelStatus::Idle);
        assert_eq!(status(&alive(None, None)), SentinelStatus::Idle);
    }

    #[test]
    fn dead_watcher_is_idle_regardless() {
        let mut state = alive(Some(1.0), Some(1.0));
        state.heartbeat_ok = true;
        state.watcher_alive = false;

        assert_eq!(status(&state), SentinelStatus::Idle);
    }

    #[test]
    fn freshness_windows_are_exclusive() {
        assert_eq!(status(&alive(None, Some(20.0))), SentinelStatus::Idle);
        assert_eq!(status(&alive(Some(10.0), Some(20.0))), SentinelStatus::Degraded);
        assert_eq!(status(&alive(Some(9.9), Some(19.9))), SentinelStatus::Active);
    }

    #[test]
    fn thresholds_are_configurable() {
        let state = alive(Some(30.0), Some(30.0));
        let loose = StatusThresholds {
            heartbeat_fresh_secs: 60.0,
            log_fresh_secs: 60.0,
        };

        assert_eq!(compute_status(&state, NOW, &loose), SentinelStatus::Active);
    }
}
