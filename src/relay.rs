//! # Relay Channel
//!
//! Double-hop remote command execution. Every target host sits behind a
//! bastion, so each command rides two independently authenticated SSH
//! sessions: a key-authenticated session to the bastion, and a
//! password-authenticated session to the endpoint multiplexed over a
//! `direct-tcpip` channel the bastion opens toward `(endpoint, 22)`.
//!
//! The channel is stateless by design: every call pays the full
//! double-authentication cost and tears both sessions down before returning.
//! A long-lived session that desynchronizes would silently corrupt every
//! subsequent command in a campaign; a fresh pair of sessions per command
//! cannot.
//!
//! Only stdout is returned to the caller. Stderr and the remote exit status
//! are logged at debug level and otherwise discarded.

use crate::config::{BastionConfig, EndpointLogin};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// SSH port on bastion-routed endpoints.
const SSH_PORT: u16 = 22;

/// Failures of the relay path itself. Any of these invalidates every
/// subsequent run, so the scheduler treats them as campaign-fatal.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The bastion key file could not be read or decoded.
    #[error("cannot load bastion key {path:?}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: russh_keys::Error,
    },

    /// A host could not be reached, or a session broke mid-command. Covers
    /// both the local→bastion hop and the bastion→endpoint channel.
    #[error("transport failure toward {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: russh::Error,
    },

    /// Credentials were rejected at either hop.
    #[error("authentication rejected for {user}@{host}")]
    Auth { user: String, host: String },
}

/// One-shot remote command execution against a single endpoint.
///
/// The trait seam exists so schedulers and runners can be exercised against
/// a recording double without a live fabric.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Run `command` non-interactively on `host` and return its decoded
    /// stdout.
    async fn execute(&self, host: IpAddr, command: &str) -> Result<String, RelayError>;
}

/// Host-key policy for lab fabrics: accept anything. Topologies are torn
/// down and rebuilt constantly, so pinned host keys would churn on every
/// rebuild.
struct AcceptAllKeys;

#[async_trait]
impl client::Handler for AcceptAllKeys {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// The production relay: bastion-tunneled SSH, one command per invocation.
pub struct SshRelay {
    bastion: BastionConfig,
    login: EndpointLogin,
    ssh_config: Arc<client::Config>,
}

impl SshRelay {
    pub fn new(bastion: BastionConfig, login: EndpointLogin) -> Self {
        let ssh_config = client::Config {
            // No client-side timeout: a hung remote command blocks the whole
            // campaign. iperf3 runs self-terminate via their -t argument.
            inactivity_timeout: None,
            ..Default::default()
        };
        Self {
            bastion,
            login,
            ssh_config: Arc::new(ssh_config),
        }
    }

    /// Connect and key-authenticate to the bastion.
    async fn open_bastion(&self) -> Result<Handle<AcceptAllKeys>, RelayError> {
        let key_pair =
            russh_keys::load_secret_key(&self.bastion.key_path, None).map_err(|source| {
                RelayError::Key {
                    path: self.bastion.key_path.clone(),
                    source,
                }
            })?;

        let mut bastion = client::connect(
            self.ssh_config.clone(),
            (self.bastion.host.clone(), self.bastion.port),
            AcceptAllKeys,
        )
        .await
        .map_err(|source| RelayError::Transport {
            host: self.bastion.host.clone(),
            source,
        })?;

        let authenticated = bastion
            .authenticate_publickey(self.bastion.user.clone(), Arc::new(key_pair))
            .await
            .map_err(|source| RelayError::Transport {
                host: self.bastion.host.clone(),
                source,
            })?;
        if !authenticated {
            return Err(RelayError::Auth {
                user: self.bastion.user.clone(),
                host: self.bastion.host.clone(),
            });
        }

        debug!("bastion session established to {}", self.bastion.host);
        Ok(bastion)
    }

    /// Tunnel to the endpoint over the bastion and run the command there.
    async fn run_via(
        &self,
        bastion: &mut Handle<AcceptAllKeys>,
        host: IpAddr,
        command: &str,
    ) -> Result<String, RelayError> {
        // The bastion dials (endpoint, 22) on our behalf, presenting itself
        // as the nominal originator.
        let channel = bastion
            .channel_open_direct_tcpip(
                host.to_string(),
                u32::from(SSH_PORT),
                self.bastion.host.clone(),
                u32::from(SSH_PORT),
            )
            .await
            .map_err(|source| RelayError::Transport {
                host: host.to_string(),
                source,
            })?;

        // Second, independent SSH session, multiplexed over the forwarded
        // channel instead of a direct socket.
        let mut endpoint = client::connect_stream(
            self.ssh_config.clone(),
            channel.into_stream(),
            AcceptAllKeys,
        )
        .await
        .map_err(|source| RelayError::Transport {
            host: host.to_string(),
            source,
        })?;

        let result = self.exec_on(&mut endpoint, host, command).await;

        let _ = endpoint
            .disconnect(Disconnect::ByApplication, "", "English")
            .await;
        result
    }

    async fn exec_on(
        &self,
        endpoint: &mut Handle<AcceptAllKeys>,
        host: IpAddr,
        command: &str,
    ) -> Result<String, RelayError> {
        let transport = |source| RelayError::Transport {
            host: host.to_string(),
            source,
        };

        let authenticated = endpoint
            .authenticate_password(self.login.user.clone(), self.login.password.clone())
            .await
            .map_err(transport)?;
        if !authenticated {
            return Err(RelayError::Auth {
                user: self.login.user.clone(),
                host: host.to_string(),
            });
        }

        let mut channel = endpoint.channel_open_session().await.map_err(transport)?;
        channel.exec(true, command).await.map_err(transport)?;

        let mut stdout = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    // Stderr is not surfaced to the caller.
                    debug!(
                        "stderr from {}: {}",
                        host,
                        String::from_utf8_lossy(data).trim_end()
                    );
                }
                ChannelMsg::ExitStatus { exit_status } if exit_status != 0 => {
                    debug!("command on {} exited with status {}", host, exit_status);
                }
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

#[async_trait]
impl CommandChannel for SshRelay {
    async fn execute(&self, host: IpAddr, command: &str) -> Result<String, RelayError> {
        debug!("relay exec on {}: {}", host, command);
        let mut bastion = self.open_bastion().await?;

        let result = self.run_via(&mut bastion, host, command).await;

        // Teardown runs on every path; a failed disconnect after a failed
        // command adds nothing useful, so it is ignored.
        let _ = bastion
            .disconnect(Disconnect::ByApplication, "", "English")
            .await;
        result
    }
}
