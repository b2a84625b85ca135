//! Heartbeat probes against the monitored app.
//!
//! Contract: `GET <url>/heartbeat` answers
//! `{"pid": int, "updateCount": int, "lastUpdateTimestampUtc": string|null}`.
//! Probes use a short timeout and never fail the caller; an unreachable
//! endpoint is an ordinary `ok == false` result carrying the error text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoints::EndpointInfo;
use crate::error::{Result, SentinelError};

pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(2);

/// Heartbeat body served by the monitored app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub update_count: Option<u64>,
    #[serde(default, rename = "lastUpdateTimestampUtc")]
    pub last_update_timestamp_utc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeartbeatResult {
    pub ok: bool,
    pub url: String,
    pub pid: Option<u32>,
    pub update_count: Option<u64>,
    pub last_update_timestamp: Option<String>,
    pub error: Option<String>,
    pub raw_payload: Option<Value>,
}

impl HeartbeatResult {
    fn failure(url: &str, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: url.to_string(),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Outcome of one discovery-order pass over the endpoints.
#[derive(Debug, Clone, Default)]
pub struct PollPass {
    pub selected: Option<(EndpointInfo, HeartbeatResult)>,
    pub last_error: Option<String>,
}

pub struct HeartbeatPoller {
    client: reqwest::blocking::Client,
}

impl HeartbeatPoller {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            // Endpoints are always loopback.
            .no_proxy()
            .build()
            .map_err(|err| SentinelError::HeartbeatClient(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn poll(&self, url: &str) -> HeartbeatResult {
        let heartbeat_url = format!("{}/heartbeat", url.trim_end_matches('/'));

        let body = match self
            .client
            .get(&heartbeat_url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
        {
            Ok(body) => body,
            Err(err) => return HeartbeatResult::failure(url, err.to_string()),
        };

        let raw: Value = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(err) => return HeartbeatResult::failure(url, format!("invalid heartbeat JSON: {}", err)),
        };
        let payload: HeartbeatPayload = match serde_json::from_value(raw.clone()) {
            Ok(payload) => payload,
            Err(err) => return HeartbeatResult::failure(url, format!("invalid heartbeat body: {}", err)),
        };

        HeartbeatResult {
            ok: true,
            url: url.to_string(),
            pid: payload.pid,
            update_count: payload.update_count,
            last_update_timestamp: payload.last_update_timestamp_utc,
            error: None,
            raw_payload: Some(raw),
        }
    }

    /// Probes endpoints in discovery order; the first reachable one wins.
    pub fn poll_first_reachable(&self, endpoints: &[EndpointInfo]) -> PollPass {
        let mut pass = PollPass::default();
        for endpoint in endpoints {
            let result = self.poll(&endpoint.url);
            if result.ok {
                pass.selected = Some((endpoint.clone(), result));
                break;
            }
            tracing::debug!(url = %endpoint.url, error = ?result.error, "Heartbeat probe failed");
            pass.last_error = result.error;
        }
        pass
    }
}
