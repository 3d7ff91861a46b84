//! # Benchmark Runner
//!
//! Executes one benchmark run end to end: restart the iperf3 server on the
//! server endpoint, wait for it to bind, drive the client, parse the JSON
//! payload, enrich it with run metadata, and persist the artifact.
//!
//! ## Failure containment
//!
//! A run can fail three ways, and they are not equal:
//! - [`RunError::Relay`]: the relay path itself broke. Every later run would
//!   fail the same way, so this is campaign-fatal.
//! - [`RunError::Parse`]: the client printed something that is not iperf3
//!   JSON (typically an error message). Only this run is lost.
//! - [`RunError::Store`]: the artifact could not be written. The relay path
//!   is fine, so this is also contained to the single run.

use crate::command;
use crate::relay::{CommandChannel, RelayError};
use crate::results::{self, Phase, Protocol, ResultStore, RunMetadata};
use serde_json::Value;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Everything needed to execute and reproduce one run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Path label, e.g. `intra_leaf`.
    pub label: String,
    pub protocol: Protocol,
    /// Parallel stream count; also the port offset for this run.
    pub streams: u16,
    pub duration: Duration,
    pub client: IpAddr,
    pub server: IpAddr,
    /// Set for fault-tolerance campaigns only.
    pub phase: Option<Phase>,
    /// Campaign-type port base; steady and fault campaigns use different
    /// bases so their servers never collide on shared hosts.
    pub base_port: u16,
}

impl RunSpec {
    /// Deterministic server port for this run. Stream levels are validated
    /// distinct per campaign, so ports never collide within one campaign.
    pub fn port(&self) -> u16 {
        self.base_port + self.streams
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("benchmark output is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot persist artifact: {0}")]
    Store(#[from] std::io::Error),
}

impl RunError {
    /// True for failures that invalidate every subsequent run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunError::Relay(_))
    }
}

/// Runs a single benchmark against one endpoint pair via the relay.
pub struct BenchmarkRunner<'a> {
    relay: &'a dyn CommandChannel,
    store: &'a ResultStore,
    /// Delay between starting the server and launching the client. There is
    /// no readiness probe; iperf3 -D binds well within this window on the
    /// lab images.
    server_settle: Duration,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(relay: &'a dyn CommandChannel, store: &'a ResultStore) -> Self {
        Self {
            relay,
            store,
            server_settle: crate::defaults::SERVER_SETTLE,
        }
    }

    /// Execute one run and persist its artifact. Returns the artifact path.
    pub async fn run(&self, spec: &RunSpec) -> Result<PathBuf, RunError> {
        let port = spec.port();
        match spec.phase {
            Some(phase) => info!(
                "running {} | {} | {} | P={}",
                spec.label, spec.protocol, phase, spec.streams
            ),
            None => info!(
                "running {} | {} | P={}",
                spec.label, spec.protocol, spec.streams
            ),
        }

        // Kill any stale server first; the port must be ours alone.
        self.relay
            .execute(spec.server, &command::restart_server(port))
            .await?;
        tokio::time::sleep(self.server_settle).await;

        let output = self
            .relay
            .execute(
                spec.client,
                &command::run_client(
                    spec.server,
                    port,
                    spec.protocol,
                    spec.streams,
                    spec.duration.as_secs(),
                ),
            )
            .await?;

        let payload: Value = serde_json::from_str(&output)?;
        let meta = RunMetadata {
            phase: spec.phase,
            protocol: spec.protocol,
            streams: spec.streams,
            duration_secs: spec.duration.as_secs(),
            client: spec.client,
            server: spec.server,
            test_name: spec.label.clone(),
            timestamp: results::local_timestamp(),
        };
        let enriched = results::enrich(payload, &meta)?;

        let path = self.store.save(
            &results::category_name(&spec.label, spec.protocol),
            &results::artifact_name(&spec.label, spec.protocol, spec.streams, spec.phase),
            &enriched,
        )?;
        info!("saved {:?}", path);
        Ok(path)
    }
}
