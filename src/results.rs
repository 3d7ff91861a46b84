//! Result enrichment and the on-disk artifact store.
//!
//! Each successful run produces one JSON artifact: the raw iperf3 payload
//! with a `meta_info` block appended so that every file is self-describing.
//! Artifacts are grouped into one directory per (protocol, path label)
//! category under the campaign root. Filenames are deterministic functions of
//! the run key, so re-running an identical combination overwrites the prior
//! artifact rather than accumulating versions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transport protocol under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

impl Protocol {
    pub fn lower(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Position of a run relative to the injected fault. Absent for steady-state
/// campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    During,
    After,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::During => write!(f, "during"),
            Phase::After => write!(f, "after"),
        }
    }
}

/// Metadata appended to each artifact under the `meta_info` key.
///
/// This block fully determines how to reproduce the run: protocol, stream
/// count, both endpoints, duration, and when it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub protocol: Protocol,
    pub streams: u16,
    pub duration_secs: u64,
    pub client: IpAddr,
    pub server: IpAddr,
    pub test_name: String,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

/// Current local time in the artifact timestamp format.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Append the metadata block to a parsed iperf3 payload.
///
/// Fails if the payload is not a JSON object; iperf3 always emits one, so a
/// non-object payload means the client printed garbage.
pub fn enrich(mut payload: Value, meta: &RunMetadata) -> Result<Value, serde_json::Error> {
    use serde::de::Error;
    let obj = payload
        .as_object_mut()
        .ok_or_else(|| serde_json::Error::custom("benchmark payload is not a JSON object"))?;
    obj.insert("meta_info".to_string(), serde_json::to_value(meta)?);
    Ok(payload)
}

/// Directory name for one (protocol, path label) category.
pub fn category_name(label: &str, protocol: Protocol) -> String {
    format!("{}_{label}", protocol.lower())
}

/// Artifact filename for one run key.
pub fn artifact_name(label: &str, protocol: Protocol, streams: u16, phase: Option<Phase>) -> String {
    match phase {
        Some(phase) => format!("iperf_{label}_{protocol}_P{streams}_{phase}.json"),
        None => format!("iperf_{label}_{protocol}_P{streams}.json"),
    }
}

/// Filesystem-backed artifact store rooted at the campaign output directory.
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one artifact, creating `<root>/<category>/` as needed. An
    /// existing file of the same name is overwritten.
    pub fn save(&self, category: &str, filename: &str, payload: &Value) -> io::Result<PathBuf> {
        let dir = self.root.join(category);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        let json = serde_json::to_string_pretty(payload).map_err(io::Error::other)?;
        std::fs::write(&path, json)?;
        debug!("saved artifact to {:?}", path);
        Ok(path)
    }
}
