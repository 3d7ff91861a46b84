//! Remote command construction.
//!
//! Every command line sent over the relay is assembled here, keyed by intent.
//! Addresses, ports, and stream counts arrive as typed values (`IpAddr`,
//! `u16`), so nothing user-controlled is interpolated into shell text. The
//! one free-form input, the fault interface name, is validated before use.

use crate::results::Protocol;
use std::net::IpAddr;
use thiserror::Error;

/// Target bitrate passed to UDP client runs. iperf3's UDP default of 1 Mbit/s
/// is far too low to load a fabric link, so the original campaigns fixed 100M.
pub const UDP_BITRATE: &str = "100M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The configured interface name contains characters we refuse to place
    /// in a remote shell command.
    #[error("invalid interface name {0:?}")]
    InvalidInterface(String),
}

/// Desired administrative state for a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

impl LinkState {
    fn as_arg(self) -> &'static str {
        match self {
            LinkState::Down => "down",
            LinkState::Up => "up",
        }
    }
}

/// Kill any previously running iperf3 server, then start a fresh one bound to
/// `port`, detached from the invoking SSH session.
///
/// The unconditional `pkill` is the only mutual-exclusion mechanism for the
/// server port; runs are sequential, so it suffices.
pub fn restart_server(port: u16) -> String {
    format!("pkill iperf3; nohup iperf3 -s -p {port} -D >/dev/null 2>&1 &")
}

/// Build the iperf3 client invocation for one run.
///
/// `-J` requests JSON output on stdout, which the runner parses. UDP runs add
/// a fixed target bitrate; TCP is left to self-pace.
pub fn run_client(
    server: IpAddr,
    port: u16,
    protocol: Protocol,
    streams: u16,
    duration_secs: u64,
) -> String {
    match protocol {
        Protocol::Tcp => {
            format!("iperf3 -c {server} -p {port} -P {streams} -t {duration_secs} -J")
        }
        Protocol::Udp => format!(
            "iperf3 -c {server} -p {port} -u -b {UDP_BITRATE} -P {streams} -t {duration_secs} -J"
        ),
    }
}

/// Bring a network interface administratively down or up.
pub fn set_link(interface: &str, state: LinkState) -> Result<String, CommandError> {
    if interface.is_empty()
        || !interface
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(CommandError::InvalidInterface(interface.to_string()));
    }
    Ok(format!("sudo ip link set {interface} {}", state.as_arg()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_restart_server_kills_before_starting() {
        let cmd = restart_server(5004);
        assert_eq!(
            cmd,
            "pkill iperf3; nohup iperf3 -s -p 5004 -D >/dev/null 2>&1 &"
        );
        // The kill must come first so a stale listener never survives.
        assert!(cmd.find("pkill").unwrap() < cmd.find("iperf3 -s").unwrap());
    }

    #[test]
    fn test_tcp_client_command() {
        let cmd = run_client(addr("192.168.200.17"), 5002, Protocol::Tcp, 2, 30);
        assert_eq!(cmd, "iperf3 -c 192.168.200.17 -p 5002 -P 2 -t 30 -J");
    }

    #[test]
    fn test_udp_client_adds_bitrate() {
        let cmd = run_client(addr("192.168.200.21"), 5208, Protocol::Udp, 8, 120);
        assert_eq!(
            cmd,
            "iperf3 -c 192.168.200.21 -p 5208 -u -b 100M -P 8 -t 120 -J"
        );
    }

    #[test]
    fn test_set_link_states() {
        assert_eq!(
            set_link("eth1", LinkState::Down).unwrap(),
            "sudo ip link set eth1 down"
        );
        assert_eq!(
            set_link("swp1.100", LinkState::Up).unwrap(),
            "sudo ip link set swp1.100 up"
        );
    }

    #[test]
    fn test_set_link_rejects_shell_metacharacters() {
        assert!(set_link("eth0; rm -rf /", LinkState::Down).is_err());
        assert!(set_link("", LinkState::Up).is_err());
        assert!(set_link("eth0 down&&reboot", LinkState::Down).is_err());
    }
}
