//! Steady-state campaign scheduling, verified against a recording fabric
//! double: artifact counts, derived ports, iteration order, and the
//! partial-failure containment policy.

use async_trait::async_trait;
use fabric_bench::campaign::CampaignRunner;
use fabric_bench::config::{BastionConfig, CampaignConfig, EndpointLogin, TestCase};
use fabric_bench::relay::{CommandChannel, RelayError};
use fabric_bench::results::{Protocol, ResultStore};
use serde_json::Value;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const PAYLOAD: &str =
    r#"{"start":{"version":"iperf 3.12"},"end":{"sum_received":{"bits_per_second":9.4e9}}}"#;

/// What the double should do on the nth iperf3 client invocation.
enum Misbehavior {
    None,
    /// Print something unparseable instead of JSON.
    GarbageOn(usize),
    /// Fail the relay path itself.
    TransportOn(usize),
}

/// Test double for the fabric: records every command, answers client runs
/// with a canned iperf3 payload.
struct FabricDouble {
    commands: Mutex<Vec<(IpAddr, String)>>,
    client_runs: AtomicUsize,
    misbehavior: Misbehavior,
}

impl FabricDouble {
    fn new(misbehavior: Misbehavior) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            client_runs: AtomicUsize::new(0),
            misbehavior,
        }
    }

    fn commands(&self) -> Vec<(IpAddr, String)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandChannel for FabricDouble {
    async fn execute(&self, host: IpAddr, command: &str) -> Result<String, RelayError> {
        self.commands
            .lock()
            .unwrap()
            .push((host, command.to_string()));

        if !command.starts_with("iperf3 -c") {
            return Ok(String::new());
        }
        let n = self.client_runs.fetch_add(1, Ordering::SeqCst);
        match self.misbehavior {
            Misbehavior::GarbageOn(i) if i == n => {
                Ok("iperf3: error - unable to connect to server".to_string())
            }
            Misbehavior::TransportOn(i) if i == n => Err(RelayError::Transport {
                host: host.to_string(),
                source: russh::Error::Disconnect,
            }),
            _ => Ok(PAYLOAD.to_string()),
        }
    }
}

fn config(cases: Vec<TestCase>, stream_levels: Vec<u16>) -> CampaignConfig {
    CampaignConfig {
        bastion: BastionConfig {
            host: "bastion.lab".to_string(),
            port: 22,
            user: "ubuntu".to_string(),
            key_path: PathBuf::from("/dev/null"),
        },
        endpoint_login: EndpointLogin {
            user: "ubuntu".to_string(),
            password: "secret".to_string(),
        },
        cases,
        stream_levels,
        fault: None,
    }
}

fn tcp_intra() -> TestCase {
    TestCase {
        label: "intra_leaf".to_string(),
        protocol: Protocol::Tcp,
        client: "192.168.200.15".parse().unwrap(),
        server: "192.168.200.17".parse().unwrap(),
    }
}

fn udp_inter() -> TestCase {
    TestCase {
        label: "inter_leaf".to_string(),
        protocol: Protocol::Udp,
        client: "192.168.200.16".parse().unwrap(),
        server: "192.168.200.21".parse().unwrap(),
    }
}

#[tokio::test(start_paused = true)]
async fn three_levels_produce_three_artifacts_on_derived_ports() {
    let fabric = FabricDouble::new(Misbehavior::None);
    let tmp = TempDir::new().unwrap();
    let config = config(vec![tcp_intra()], vec![1, 2, 4]);
    let runner = CampaignRunner::new(
        &config,
        &fabric,
        ResultStore::new(tmp.path()),
        Duration::from_secs(30),
    );

    let summary = runner.run_steady().await.unwrap();
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.skipped, 0);

    for streams in [1u16, 2, 4] {
        let path = tmp
            .path()
            .join("tcp_intra_leaf")
            .join(format!("iperf_intra_leaf_TCP_P{streams}.json"));
        assert!(path.exists(), "missing artifact for P{streams}");

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["meta_info"]["streams"], streams);
        assert!(saved["meta_info"].get("phase").is_none());
    }

    // Server restarts carry the steady base plus the stream level.
    let server_cmds: Vec<String> = fabric
        .commands()
        .iter()
        .filter(|(_, c)| c.starts_with("pkill"))
        .map(|(_, c)| c.clone())
        .collect();
    assert!(server_cmds[0].contains("-p 5001"));
    assert!(server_cmds[1].contains("-p 5002"));
    assert!(server_cmds[2].contains("-p 5004"));
}

#[tokio::test(start_paused = true)]
async fn cases_iterate_inside_each_stream_level() {
    let fabric = FabricDouble::new(Misbehavior::None);
    let tmp = TempDir::new().unwrap();
    let config = config(vec![tcp_intra(), udp_inter()], vec![1, 2]);
    let runner = CampaignRunner::new(
        &config,
        &fabric,
        ResultStore::new(tmp.path()),
        Duration::from_secs(30),
    );

    runner.run_steady().await.unwrap();

    let client_cmds: Vec<String> = fabric
        .commands()
        .iter()
        .filter(|(_, c)| c.starts_with("iperf3 -c"))
        .map(|(_, c)| c.clone())
        .collect();
    // Level 1: both cases, then level 2: both cases.
    assert_eq!(client_cmds.len(), 4);
    assert!(client_cmds[0].contains("-c 192.168.200.17 -p 5001"));
    assert!(client_cmds[1].contains("-c 192.168.200.21 -p 5001"));
    assert!(client_cmds[2].contains("-c 192.168.200.17 -p 5002"));
    assert!(client_cmds[3].contains("-c 192.168.200.21 -p 5002"));
    // The UDP case carries the fixed bitrate flag; TCP does not.
    assert!(client_cmds[1].contains("-u -b 100M"));
    assert!(!client_cmds[0].contains("-u"));
}

#[tokio::test(start_paused = true)]
async fn parse_failure_skips_only_that_run() {
    let fabric = FabricDouble::new(Misbehavior::GarbageOn(1));
    let tmp = TempDir::new().unwrap();
    let config = config(vec![tcp_intra()], vec![1, 2, 4]);
    let runner = CampaignRunner::new(
        &config,
        &fabric,
        ResultStore::new(tmp.path()),
        Duration::from_secs(30),
    );

    let summary = runner.run_steady().await.unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 1);

    let dir = tmp.path().join("tcp_intra_leaf");
    assert!(dir.join("iperf_intra_leaf_TCP_P1.json").exists());
    assert!(!dir.join("iperf_intra_leaf_TCP_P2.json").exists());
    assert!(dir.join("iperf_intra_leaf_TCP_P4.json").exists());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_aborts_remaining_runs() {
    let fabric = FabricDouble::new(Misbehavior::TransportOn(1));
    let tmp = TempDir::new().unwrap();
    let config = config(vec![tcp_intra()], vec![1, 2, 4]);
    let runner = CampaignRunner::new(
        &config,
        &fabric,
        ResultStore::new(tmp.path()),
        Duration::from_secs(30),
    );

    assert!(runner.run_steady().await.is_err());

    // The first run's artifact survives; the failed and subsequent runs
    // leave nothing behind.
    let dir = tmp.path().join("tcp_intra_leaf");
    assert!(dir.join("iperf_intra_leaf_TCP_P1.json").exists());
    assert!(!dir.join("iperf_intra_leaf_TCP_P2.json").exists());
    assert!(!dir.join("iperf_intra_leaf_TCP_P4.json").exists());
    assert_eq!(fabric.client_runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn rerun_overwrites_rather_than_duplicating() {
    let fabric = FabricDouble::new(Misbehavior::None);
    let tmp = TempDir::new().unwrap();
    let config = config(vec![tcp_intra()], vec![1]);
    let runner = CampaignRunner::new(
        &config,
        &fabric,
        ResultStore::new(tmp.path()),
        Duration::from_secs(30),
    );

    runner.run_steady().await.unwrap();
    runner.run_steady().await.unwrap();

    let entries = std::fs::read_dir(tmp.path().join("tcp_intra_leaf"))
        .unwrap()
        .count();
    assert_eq!(entries, 1);
}
