//! # Fault Injector
//!
//! Simulates a link failure by toggling a network interface on a designated
//! node, via the same relay used for benchmark commands. Injection is
//! best-effort: the resulting interface state is not verified, it is only
//! observed indirectly through the before/during/after result differences.

use crate::command::{self, CommandError, LinkState};
use crate::config::FaultTarget;
use crate::relay::{CommandChannel, RelayError};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Injector failures are always campaign-fatal: either the relay path is
/// broken or the configuration is unusable.
#[derive(Debug, Error)]
pub enum FaultError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

pub struct FaultInjector<'a> {
    relay: &'a dyn CommandChannel,
    target: &'a FaultTarget,
    assert_settle: Duration,
    clear_settle: Duration,
}

impl<'a> FaultInjector<'a> {
    pub fn new(relay: &'a dyn CommandChannel, target: &'a FaultTarget) -> Self {
        Self {
            relay,
            target,
            assert_settle: crate::defaults::FAULT_ASSERT_SETTLE,
            clear_settle: crate::defaults::FAULT_CLEAR_SETTLE,
        }
    }

    /// Bring the fault interface down, then wait for the failure to settle.
    pub async fn assert_fault(&self) -> Result<(), FaultError> {
        info!(
            "disabling link {} on {}",
            self.target.interface, self.target.node
        );
        let cmd = command::set_link(&self.target.interface, LinkState::Down)?;
        self.relay.execute(self.target.node, &cmd).await?;
        tokio::time::sleep(self.assert_settle).await;
        Ok(())
    }

    /// Bring the fault interface back up, then wait for recovery. Link
    /// renegotiation and route convergence are slower than failure, hence
    /// the longer settle.
    pub async fn clear_fault(&self) -> Result<(), FaultError> {
        info!(
            "restoring link {} on {}",
            self.target.interface, self.target.node
        );
        let cmd = command::set_link(&self.target.interface, LinkState::Up)?;
        self.relay.execute(self.target.node, &cmd).await?;
        tokio::time::sleep(self.clear_settle).await;
        Ok(())
    }
}
