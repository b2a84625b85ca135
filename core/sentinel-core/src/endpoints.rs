//! Heartbeat endpoint discovery from port marker files.
//!
//! The monitored app drops one small file per process (for example
//! `/tmp/hotreload-diag-4821.port`) holding the decimal TCP port of its
//! heartbeat responder. Discovery re-runs every poll cycle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub port: u16,
    pub file_path: PathBuf,
    pub url: String,
}

impl EndpointInfo {
    pub fn loopback(port: u16, file_path: PathBuf) -> Self {
        Self {
            port,
            file_path,
            url: format!("http://127.0.0.1:{}", port),
        }
    }
}

/// Lists port files matching `port_glob`, in path order.
///
/// Unreadable files and files that don't hold a port are skipped; they may
/// be mid-write or already deleted by an exiting app.
pub fn discover(port_glob: &str) -> Vec<EndpointInfo> {
    let paths = match glob::glob(port_glob) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::warn!(error = %err, pattern = port_glob, "Invalid port file pattern");
            return Vec::new();
        }
    };

    let mut endpoints: Vec<EndpointInfo> = paths
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let port = content.trim().parse::<u16>().ok()?;
            Some(EndpointInfo::loopback(port, path))
        })
        .collect();
    endpoints.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    endpoints
}
