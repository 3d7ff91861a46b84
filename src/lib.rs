//! # Fabric Bench
//!
//! Orchestrates iperf3 measurement campaigns against lab fabric hosts that
//! are only reachable through an SSH bastion. Each remote command rides a
//! fresh double-hop SSH channel; campaigns sweep endpoint pairs, protocols,
//! and parallel stream counts, optionally around an injected link fault, and
//! every successful run lands as one metadata-enriched JSON artifact.
//!
//! ## Module layout
//!
//! - `relay`: the double-hop SSH command channel (the relay trait seam lives
//!   here too)
//! - `command`: intent-keyed remote command builders
//! - `runner`: one benchmark run end to end (server restart, client drive,
//!   parse, enrich, persist)
//! - `fault`: link down/up injection with settle delays
//! - `campaign`: steady-state and fault-tolerance schedulers, including the
//!   fault-cycle state machine
//! - `results`: metadata block, artifact naming, and the filesystem store
//! - `config`: immutable campaign configuration loaded at startup
//! - `cli` / `logging`: argument parsing and console output
//!
//! ## Execution model
//!
//! Fully sequential, one logical thread of control: every remote command is
//! awaited before the next is issued, and the only suspension points are
//! remote I/O and fixed settle delays. The iperf3 server port on a shared
//! host is the one shared mutable resource; the runner force-kills any prior
//! instance before starting its own, and sequential execution does the rest.

pub mod campaign;
pub mod cli;
pub mod command;
pub mod config;
pub mod fault;
pub mod logging;
pub mod relay;
pub mod results;
pub mod runner;

pub use campaign::{CampaignRunner, CampaignSummary, CycleState};
pub use cli::{Args, CampaignKind};
pub use config::CampaignConfig;
pub use relay::{CommandChannel, RelayError, SshRelay};
pub use results::{Phase, Protocol, ResultStore, RunMetadata};
pub use runner::{BenchmarkRunner, RunError, RunSpec};

/// Crate version, embedded for artifact provenance and `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed campaign parameters.
///
/// These mirror the values the original collection campaigns standardized
/// on; everything host-specific lives in the configuration file instead.
pub mod defaults {
    use std::time::Duration;

    /// Server port base for steady-state campaigns. The run port is
    /// `base + stream count`.
    pub const STEADY_BASE_PORT: u16 = 5000;

    /// Server port base for fault-tolerance campaigns. Offset from the
    /// steady base so the two campaign kinds never contend for ports when
    /// run against the same hosts back to back.
    pub const FAULT_BASE_PORT: u16 = 5200;

    /// Per-run duration for steady-state campaigns.
    pub const STEADY_DURATION: Duration = Duration::from_secs(30);

    /// Per-run duration for fault-tolerance campaigns. Long enough that the
    /// during-fault phase captures converged (not just transient) behavior.
    pub const FAULT_DURATION: Duration = Duration::from_secs(120);

    /// Wait between starting the iperf3 server and launching the client.
    /// There is no readiness probe; this is a timing assumption.
    pub const SERVER_SETTLE: Duration = Duration::from_secs(2);

    /// Wait after bringing the fault interface down.
    pub const FAULT_ASSERT_SETTLE: Duration = Duration::from_secs(5);

    /// Wait after bringing the fault interface back up. Recovery gets twice
    /// the failure settle: renegotiation and route convergence are slow.
    pub const FAULT_CLEAR_SETTLE: Duration = Duration::from_secs(10);

    /// Default artifact root for steady-state campaigns.
    pub const STEADY_OUTPUT_DIR: &str = "data_results";

    /// Default artifact root for fault-tolerance campaigns.
    pub const FAULT_OUTPUT_DIR: &str = "fault_tolerance_results";
}
