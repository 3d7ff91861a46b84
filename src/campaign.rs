//! # Campaign Scheduler
//!
//! Drives complete measurement campaigns. Two kinds exist:
//!
//! - **Steady-state**: every (stream level × case) combination once, stream
//!   levels ascending in config order, cases in config order.
//! - **Fault-tolerance**: per case, a full three-phase cycle: sweep before
//!   the fault, assert the fault, sweep during, clear the fault, sweep after.
//!   One case's cycle runs to completion before the next begins, and the
//!   fault is always cleared before moving on, so every case starts from a
//!   fault-free fabric.
//!
//! The fault cycle is an explicit state machine rather than inline
//! sequencing, so the ordering invariant (before → assert → during → clear →
//! after) is enforced by `advance()` and testable in isolation. A future
//! parallel-campaign extension cannot accidentally interleave phases without
//! changing the machine itself.
//!
//! Per-run failures (`Parse`, `Store`) are logged and skipped; relay failures
//! abort the campaign, since a broken relay path invalidates everything that
//! would follow.

use crate::config::{CampaignConfig, FaultTarget, TestCase};
use crate::fault::FaultInjector;
use crate::relay::CommandChannel;
use crate::results::{Phase, ResultStore};
use crate::runner::{BenchmarkRunner, RunSpec};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

/// States of one fault-tolerance cycle. Entering a state performs its
/// action: measurement sweeps for the three phase states, a single fault
/// transition for the two injection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Before,
    FaultAsserted,
    During,
    FaultCleared,
    After,
    Done,
}

impl CycleState {
    /// Total successor function; no transition skips a state and `Done` is
    /// absorbing.
    pub fn advance(self) -> CycleState {
        match self {
            CycleState::Before => CycleState::FaultAsserted,
            CycleState::FaultAsserted => CycleState::During,
            CycleState::During => CycleState::FaultCleared,
            CycleState::FaultCleared => CycleState::After,
            CycleState::After => CycleState::Done,
            CycleState::Done => CycleState::Done,
        }
    }

    /// The measurement phase a state corresponds to, if it is one.
    pub fn phase(self) -> Option<Phase> {
        match self {
            CycleState::Before => Some(Phase::Before),
            CycleState::During => Some(Phase::During),
            CycleState::After => Some(Phase::After),
            _ => None,
        }
    }
}

/// Outcome counts for a finished campaign.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CampaignSummary {
    pub completed: usize,
    pub skipped: usize,
}

/// Sequences benchmark runs and fault transitions for one campaign.
///
/// Fully sequential: each remote command is issued and awaited before the
/// next begins, so the derived server port is never contended.
pub struct CampaignRunner<'a> {
    config: &'a CampaignConfig,
    relay: &'a dyn CommandChannel,
    store: ResultStore,
    duration: Duration,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(
        config: &'a CampaignConfig,
        relay: &'a dyn CommandChannel,
        store: ResultStore,
        duration: Duration,
    ) -> Self {
        Self {
            config,
            relay,
            store,
            duration,
        }
    }

    /// Run the steady-state campaign: one run per (stream level, case).
    pub async fn run_steady(&self) -> Result<CampaignSummary> {
        let mut summary = CampaignSummary::default();
        for &streams in &self.config.stream_levels {
            for case in &self.config.cases {
                let spec = self.spec(case, streams, None, crate::defaults::STEADY_BASE_PORT);
                self.try_run(spec, &mut summary).await?;
            }
        }
        Ok(summary)
    }

    /// Run the fault-tolerance campaign: one full fault cycle per case.
    pub async fn run_fault(&self) -> Result<CampaignSummary> {
        let fault = self
            .config
            .fault
            .as_ref()
            .context("fault-tolerance campaign requires a \"fault\" target in the configuration")?;

        let mut summary = CampaignSummary::default();
        for case in &self.config.cases {
            info!("starting fault cycle for {} ({})", case.label, case.protocol);
            self.run_fault_cycle(case, fault, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn run_fault_cycle(
        &self,
        case: &TestCase,
        fault: &FaultTarget,
        summary: &mut CampaignSummary,
    ) -> Result<()> {
        let injector = FaultInjector::new(self.relay, fault);
        let mut state = CycleState::Before;
        while state != CycleState::Done {
            match state {
                CycleState::FaultAsserted => injector
                    .assert_fault()
                    .await
                    .with_context(|| format!("fault assertion failed for {}", case.label))?,
                CycleState::FaultCleared => injector
                    .clear_fault()
                    .await
                    .with_context(|| format!("fault clearance failed for {}", case.label))?,
                _ => {
                    if let Some(phase) = state.phase() {
                        self.sweep(case, phase, summary).await?;
                    }
                }
            }
            state = state.advance();
        }
        Ok(())
    }

    /// Run every stream level once for one case and phase.
    async fn sweep(
        &self,
        case: &TestCase,
        phase: Phase,
        summary: &mut CampaignSummary,
    ) -> Result<()> {
        for &streams in &self.config.stream_levels {
            let spec = self.spec(case, streams, Some(phase), crate::defaults::FAULT_BASE_PORT);
            self.try_run(spec, summary).await?;
        }
        Ok(())
    }

    fn spec(&self, case: &TestCase, streams: u16, phase: Option<Phase>, base_port: u16) -> RunSpec {
        RunSpec {
            label: case.label.clone(),
            protocol: case.protocol,
            streams,
            duration: self.duration,
            client: case.client,
            server: case.server,
            phase,
            base_port,
        }
    }

    /// Execute one run, containing per-run failures and propagating relay
    /// failures.
    async fn try_run(&self, spec: RunSpec, summary: &mut CampaignSummary) -> Result<()> {
        let runner = BenchmarkRunner::new(self.relay, &self.store);
        match runner.run(&spec).await {
            Ok(_) => summary.completed += 1,
            Err(err) if err.is_fatal() => {
                return Err(anyhow::Error::new(err).context(format!(
                    "relay path failed during {} P{}",
                    spec.label, spec.streams
                )));
            }
            Err(err) => {
                warn!(
                    "run abandoned ({} {} P{}): {}",
                    spec.label, spec.protocol, spec.streams, err
                );
                summary.skipped += 1;
            }
        }
        Ok(())
    }
}
