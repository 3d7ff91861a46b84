//! Campaign configuration.
//!
//! Everything the original collector scripts kept as module-level globals
//! (bastion credentials, host tables, stream levels, the fault target) lives
//! here as one immutable structure, loaded from a JSON file at startup and
//! passed by reference to the scheduler and relay constructors.

use crate::results::Protocol;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

fn default_ssh_port() -> u16 {
    22
}

/// The relay host every remote command is tunneled through. Authenticated
/// with a private key file.
#[derive(Debug, Clone, Deserialize)]
pub struct BastionConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    pub key_path: PathBuf,
}

/// Login used on every endpoint behind the bastion. Password-authenticated;
/// the lab images share one account.
#[derive(Clone, Deserialize)]
pub struct EndpointLogin {
    pub user: String,
    pub password: String,
}

// Keep the shared password out of debug/log output.
impl std::fmt::Debug for EndpointLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointLogin")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One network path under test: a (client, server) address pair plus the
/// protocol to drive over it and a label naming the path (for example
/// `intra_leaf` or `inter_leaf`).
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub label: String,
    pub protocol: Protocol,
    pub client: IpAddr,
    pub server: IpAddr,
}

/// Host and interface toggled by the fault injector.
#[derive(Debug, Clone, Deserialize)]
pub struct FaultTarget {
    pub node: IpAddr,
    pub interface: String,
}

/// Full campaign configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    pub bastion: BastionConfig,
    pub endpoint_login: EndpointLogin,
    /// Cases run in the order given here.
    pub cases: Vec<TestCase>,
    /// Parallel stream counts for each sweep; also the port offsets, so they
    /// must be positive and distinct.
    pub stream_levels: Vec<u16>,
    /// Required only for fault-tolerance campaigns.
    pub fault: Option<FaultTarget>,
}

impl CampaignConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {:?}", path))?;
        let config: CampaignConfig = serde_json::from_str(&text)
            .with_context(|| format!("cannot parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cases.is_empty() {
            anyhow::bail!("configuration defines no test cases");
        }
        if self.stream_levels.is_empty() {
            anyhow::bail!("configuration defines no stream levels");
        }
        if self.stream_levels.contains(&0) {
            anyhow::bail!("stream levels must be positive");
        }
        if let Some(&level) = self.stream_levels.iter().find(|&&l| l > 1024) {
            anyhow::bail!("stream level {} is too high (maximum 1024)", level);
        }
        let mut seen = std::collections::HashSet::new();
        for &level in &self.stream_levels {
            if !seen.insert(level) {
                anyhow::bail!("duplicate stream level {} would reuse a server port", level);
            }
        }
        if self.bastion.user.is_empty() || self.bastion.host.is_empty() {
            anyhow::bail!("bastion host and user must be set");
        }
        Ok(())
    }
}
